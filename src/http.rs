//! HTTP transport
//!
//! Thin wrapper around [`reqwest`] shared by every registry operation. The
//! transport is deliberately endpoint-unaware: walking the endpoint list and
//! deciding what a failure means belongs to the caller.

use std::time::Duration;

use serde::Serialize;

use crate::{
    config::EurekaConfig,
    error::{EurekaError, Result},
};

/// Shared HTTP client carrying the configured timeouts
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &EurekaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()?;
        Ok(Self { client })
    }

    /// POST a JSON body; any 2xx status is success
    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<()> {
        let response = self.client.post(url).json(body).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// PUT with an empty body; any 2xx status is success
    pub async fn put_empty(&self, url: &str) -> Result<()> {
        let response = self.client.put(url).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// GET a JSON document
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(EurekaError::RequestFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}
