//! Cloud instance metadata
//!
//! The EC2-style metadata service answers plain-text GETs under
//! `latest/meta-data/`. Keys that have no value for an instance answer 404;
//! the provider reports those as absent rather than failing, so document
//! building can treat every key as optional.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// Base URL of the EC2 instance metadata service
const EC2_METADATA_URL: &str = "http://169.254.169.254/latest";

/// Source of per-instance metadata values
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up a metadata key; `None` when the key has no value here
    async fn fetch(&self, key: &str) -> Option<String>;
}

/// Metadata provider backed by the EC2 instance metadata endpoint
pub struct Ec2MetadataClient {
    base_url: String,
    client: reqwest::Client,
}

impl Ec2MetadataClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(EC2_METADATA_URL)
    }

    /// Point the provider at a different metadata endpoint (tests, proxies).
    ///
    /// Timeouts are short so hosts without a metadata service fail fast.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn key_path(key: &str) -> String {
        // The zone lives under the placement subtree; everything else is flat.
        if key == "availability-zone" {
            "meta-data/placement/availability-zone".to_string()
        } else {
            format!("meta-data/{key}")
        }
    }
}

#[async_trait]
impl MetadataProvider for Ec2MetadataClient {
    async fn fetch(&self, key: &str) -> Option<String> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            Self::key_path(key)
        );
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    debug!("failed to read metadata value for {}: {}", key, e);
                    None
                }
            },
            Ok(response) => {
                debug!("metadata key {} answered status {}", key, response.status());
                None
            }
            Err(e) => {
                debug!("metadata lookup for {} failed: {}", key, e);
                None
            }
        }
    }
}
