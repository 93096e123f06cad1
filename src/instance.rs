//! Instance identity and the registration wire document
//!
//! The registry expects a JSON envelope of the form
//! `{"instance": {"app": ..., "instanceId": ..., "port": {"$": n, "@enabled": "true"}, ...}}`.
//! Identity is rebuilt from configuration and the metadata provider at each
//! registration cycle and is immutable within a cycle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{config::EurekaConfig, host::HostInfo, metadata::MetadataProvider};

/// Java class tag the registry expects on `dataCenterInfo`
pub const DATA_CENTER_CLASS: &str = "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo";

/// Data center name reported when none is configured
pub const DEFAULT_DATA_CENTER: &str = "MyOwn";

/// Metadata keys collected into `dataCenterInfo.metadata` on Amazon hosts
pub const EC2_METADATA_KEYS: [&str; 10] = [
    "ami-launch-index",
    "local-hostname",
    "availability-zone",
    "instance-id",
    "public-ipv4",
    "public-hostname",
    "ami-manifest-path",
    "local-ipv4",
    "ami-id",
    "instance-type",
];

/// Instance status as the registry spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    Unknown,
}

/// Port object in the registry's `{"$": n, "@enabled": "true"}` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    #[serde(rename = "$")]
    pub value: u16,
    #[serde(rename = "@enabled")]
    pub enabled: String,
}

impl PortInfo {
    /// An enabled port, the only kind this client registers
    pub fn enabled(value: u16) -> Self {
        Self {
            value,
            enabled: "true".to_string(),
        }
    }
}

/// `dataCenterInfo` section of the instance document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenterInfo {
    #[serde(rename = "@class")]
    pub class: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// One instance as the registry sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub app: String,
    pub instance_id: String,
    pub host_name: String,
    pub ip_addr: String,
    pub health_check_url: String,
    pub status_page_url: String,
    pub home_page_url: String,
    pub port: PortInfo,
    pub vip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_vip_address: Option<String>,
    pub data_center_info: DataCenterInfo,
    pub status: InstanceStatus,
}

/// Wire envelope for registration requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDocument {
    pub instance: InstanceInfo,
}

/// Assemble the instance document from configuration, the metadata provider
/// and detected host info.
///
/// An explicitly configured hostname always wins; on Amazon the metadata
/// service is asked next, and detection is the last resort. Missing metadata
/// values are omitted rather than treated as errors.
pub async fn build_instance(
    config: &EurekaConfig,
    metadata: &dyn MetadataProvider,
    host: &HostInfo,
    status: InstanceStatus,
) -> InstanceInfo {
    let is_amazon = config.data_center.as_deref() == Some("Amazon");

    let host_name = match &config.host_name {
        Some(explicit) => explicit.clone(),
        None if is_amazon => metadata
            .fetch("hostname")
            .await
            .unwrap_or_else(|| host.hostname.clone()),
        None => host.hostname.clone(),
    };

    let port = config.effective_port();
    let instance_id = config
        .instance_id
        .clone()
        .unwrap_or_else(|| format!("{host_name}:{}:{port}", config.app_name));

    let ip_addr = host
        .ipv4
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let vip_address = config
        .vip_address
        .clone()
        .unwrap_or_else(|| ip_addr.clone());
    let secure_vip_address = config
        .secure_vip_address
        .clone()
        .unwrap_or_else(|| ip_addr.clone());

    // The same probe endpoint backs all three URLs the registry displays.
    let probe_url = format!("{}://{host_name}:{port}/healthcheck", config.scheme());

    let dc_metadata = if is_amazon {
        Some(ec2_metadata(metadata).await)
    } else {
        None
    };

    InstanceInfo {
        app: config.app_name.clone(),
        instance_id,
        host_name,
        ip_addr,
        health_check_url: probe_url.clone(),
        status_page_url: probe_url.clone(),
        home_page_url: probe_url,
        port: PortInfo::enabled(port),
        vip_address,
        secure_vip_address: Some(secure_vip_address),
        data_center_info: DataCenterInfo {
            class: DATA_CENTER_CLASS.to_string(),
            name: config
                .data_center
                .clone()
                .unwrap_or_else(|| DEFAULT_DATA_CENTER.to_string()),
            metadata: dc_metadata,
        },
        status,
    }
}

/// Fetch every EC2 enrichment key, keeping only the ones that resolve
async fn ec2_metadata(metadata: &dyn MetadataProvider) -> HashMap<String, String> {
    let mut values = HashMap::with_capacity(EC2_METADATA_KEYS.len());
    for key in EC2_METADATA_KEYS {
        if let Some(value) = metadata.fetch(key).await {
            values.insert(key.to_string(), value);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct StaticMetadata {
        values: HashMap<String, String>,
    }

    impl StaticMetadata {
        fn new(values: &[(&str, &str)]) -> Self {
            Self {
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }

        fn empty() -> Self {
            Self {
                values: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl MetadataProvider for StaticMetadata {
        async fn fetch(&self, key: &str) -> Option<String> {
            self.values.get(key).cloned()
        }
    }

    fn detected_host() -> HostInfo {
        HostInfo {
            hostname: "detected-host".to_string(),
            ipv4: Some("10.0.0.9".to_string()),
            ipv6: None,
        }
    }

    #[tokio::test]
    async fn test_default_identity() {
        let config = EurekaConfig::new("billing").with_port(8080);
        let instance = build_instance(
            &config,
            &StaticMetadata::empty(),
            &detected_host(),
            InstanceStatus::Up,
        )
        .await;

        assert_eq!(instance.app, "billing");
        assert_eq!(instance.instance_id, "detected-host:billing:8080");
        assert_eq!(instance.host_name, "detected-host");
        assert_eq!(instance.ip_addr, "10.0.0.9");
        assert_eq!(instance.vip_address, "10.0.0.9");
        assert_eq!(instance.secure_vip_address.as_deref(), Some("10.0.0.9"));
        assert_eq!(
            instance.health_check_url,
            "http://detected-host:8080/healthcheck"
        );
        assert_eq!(instance.port, PortInfo::enabled(8080));
        assert_eq!(instance.data_center_info.class, DATA_CENTER_CLASS);
        assert_eq!(instance.data_center_info.name, DEFAULT_DATA_CENTER);
        assert_eq!(instance.data_center_info.metadata, None);
        assert_eq!(instance.status, InstanceStatus::Up);
    }

    #[tokio::test]
    async fn test_secure_identity_uses_https() {
        let config = EurekaConfig::new("billing")
            .with_host_name("mocked_host_name")
            .with_port(8080)
            .with_secure(true);
        let instance = build_instance(
            &config,
            &StaticMetadata::empty(),
            &detected_host(),
            InstanceStatus::Up,
        )
        .await;

        assert_eq!(
            instance.health_check_url,
            "https://mocked_host_name:8080/healthcheck"
        );
        assert_eq!(instance.status_page_url, instance.health_check_url);
        assert_eq!(instance.home_page_url, instance.health_check_url);
        assert_eq!(instance.instance_id, "mocked_host_name:billing:8080");
    }

    #[tokio::test]
    async fn test_insecure_identity_uses_http() {
        let config = EurekaConfig::new("billing")
            .with_host_name("mocked_host_name")
            .with_port(8080);
        let instance = build_instance(
            &config,
            &StaticMetadata::empty(),
            &detected_host(),
            InstanceStatus::Up,
        )
        .await;

        assert_eq!(
            instance.health_check_url,
            "http://mocked_host_name:8080/healthcheck"
        );
    }

    #[tokio::test]
    async fn test_port_falls_back_to_service_default() {
        let config = EurekaConfig::new("billing").with_host_name("h1");
        let instance = build_instance(
            &config,
            &StaticMetadata::empty(),
            &detected_host(),
            InstanceStatus::Up,
        )
        .await;

        assert_eq!(instance.port, PortInfo::enabled(5000));
        assert_eq!(instance.instance_id, "h1:billing:5000");
        assert_eq!(instance.health_check_url, "http://h1:5000/healthcheck");
    }

    #[tokio::test]
    async fn test_amazon_hostname_from_metadata() {
        let metadata = StaticMetadata::new(&[("hostname", "ip-10-0-0-9.ec2.internal")]);
        let config = EurekaConfig::new("billing")
            .with_data_center("Amazon")
            .with_port(8080);
        let instance =
            build_instance(&config, &metadata, &detected_host(), InstanceStatus::Up).await;

        assert_eq!(instance.host_name, "ip-10-0-0-9.ec2.internal");
        assert_eq!(
            instance.instance_id,
            "ip-10-0-0-9.ec2.internal:billing:8080"
        );
        assert_eq!(instance.data_center_info.name, "Amazon");
    }

    #[tokio::test]
    async fn test_explicit_host_name_wins_over_metadata() {
        let metadata = StaticMetadata::new(&[("hostname", "ip-10-0-0-9.ec2.internal")]);
        let config = EurekaConfig::new("billing")
            .with_data_center("Amazon")
            .with_host_name("configured-host")
            .with_port(8080);
        let instance =
            build_instance(&config, &metadata, &detected_host(), InstanceStatus::Up).await;

        assert_eq!(instance.host_name, "configured-host");
    }

    #[tokio::test]
    async fn test_amazon_metadata_enrichment_skips_missing_keys() {
        let metadata = StaticMetadata::new(&[
            ("instance-id", "i-0123456789abcdef0"),
            ("availability-zone", "us-east-1c"),
            ("ami-id", "ami-12345678"),
            ("hostname", "ip-10-0-0-9.ec2.internal"),
        ]);
        let config = EurekaConfig::new("billing")
            .with_data_center("Amazon")
            .with_port(8080);
        let instance =
            build_instance(&config, &metadata, &detected_host(), InstanceStatus::Up).await;

        let enriched = instance.data_center_info.metadata.unwrap();
        assert_eq!(
            enriched.get("instance-id").map(String::as_str),
            Some("i-0123456789abcdef0")
        );
        assert_eq!(
            enriched.get("availability-zone").map(String::as_str),
            Some("us-east-1c")
        );
        assert_eq!(enriched.get("ami-id").map(String::as_str), Some("ami-12345678"));
        assert!(!enriched.contains_key("instance-type"));
        assert!(!enriched.contains_key("public-ipv4"));
    }

    #[tokio::test]
    async fn test_explicit_identity_overrides() {
        let config = EurekaConfig::new("billing")
            .with_host_name("h1")
            .with_port(8080)
            .with_instance_id("custom-id")
            .with_vip_address("billing.vip")
            .with_secure_vip_address("billing.svip");
        let instance = build_instance(
            &config,
            &StaticMetadata::empty(),
            &detected_host(),
            InstanceStatus::Starting,
        )
        .await;

        assert_eq!(instance.instance_id, "custom-id");
        assert_eq!(instance.vip_address, "billing.vip");
        assert_eq!(instance.secure_vip_address.as_deref(), Some("billing.svip"));
        assert_eq!(instance.status, InstanceStatus::Starting);
    }

    #[tokio::test]
    async fn test_document_wire_shape() {
        let config = EurekaConfig::new("billing")
            .with_host_name("h1")
            .with_port(8080);
        let instance = build_instance(
            &config,
            &StaticMetadata::empty(),
            &detected_host(),
            InstanceStatus::Up,
        )
        .await;
        let value = serde_json::to_value(RegistrationDocument { instance }).unwrap();

        let doc = &value["instance"];
        assert_eq!(doc["app"], "billing");
        assert_eq!(doc["instanceId"], "h1:billing:8080");
        assert_eq!(doc["hostName"], "h1");
        assert_eq!(doc["ipAddr"], "10.0.0.9");
        assert_eq!(doc["healthCheckUrl"], "http://h1:8080/healthcheck");
        assert_eq!(doc["statusPageUrl"], "http://h1:8080/healthcheck");
        assert_eq!(doc["homePageUrl"], "http://h1:8080/healthcheck");
        assert_eq!(doc["port"]["$"], 8080);
        assert_eq!(doc["port"]["@enabled"], "true");
        assert_eq!(doc["vipAddress"], "10.0.0.9");
        assert_eq!(doc["secureVipAddress"], "10.0.0.9");
        assert_eq!(doc["dataCenterInfo"]["@class"], DATA_CENTER_CLASS);
        assert_eq!(doc["dataCenterInfo"]["name"], "MyOwn");
        assert!(doc["dataCenterInfo"].get("metadata").is_none());
        assert_eq!(doc["status"], "UP");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&InstanceStatus::Up).unwrap(),
            "\"UP\""
        );
        assert_eq!(
            serde_json::to_string(&InstanceStatus::OutOfService).unwrap(),
            "\"OUT_OF_SERVICE\""
        );
        let status: InstanceStatus = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(status, InstanceStatus::Down);
    }
}
