//! Client configuration
//!
//! One explicit struct with builder-style setters. Fields can also be filled
//! from the process environment via [`EurekaConfig::overlay_env`]; the
//! environment keys are fixed strings, deliberately independent of the field
//! names. Precedence is construction defaults, then the environment overlay,
//! then explicit `with_*` calls, later wins.

use url::Url;

use crate::error::{EurekaError, Result};

/// Port assumed for the hosting service when none is configured
pub const DEFAULT_SERVICE_PORT: u16 = 5000;

/// Default interval between registration renewals, in seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Default resource path for registration and renewal requests
pub const DEFAULT_SERVICE_PATH: &str = "eureka/apps";

/// Default context path appended to DNS-discovered registry hosts
pub const DEFAULT_CONTEXT_PATH: &str = "eureka/v2";

/// Environment keys honored by [`EurekaConfig::overlay_env`]
pub mod env_keys {
    pub const SERVICE_URL: &str = "EUREKA_SERVICE_URL";
    pub const DATACENTER: &str = "EUREKA_INSTANCE_DATACENTER";
    pub const HEARTBEAT_INTERVAL: &str = "EUREKA_HEARTBEAT_INTERVAL";
    pub const SERVICE_PATH: &str = "EUREKA_SERVICE_PATH";
    pub const HOSTNAME: &str = "EUREKA_INSTANCE_HOSTNAME";
    pub const PORT: &str = "EUREKA_INSTANCE_PORT";
}

/// Configuration for [`EurekaClient`](crate::EurekaClient)
#[derive(Debug, Clone)]
pub struct EurekaConfig {
    /// Application name registered with the registry; required, non-empty
    pub app_name: String,
    /// Explicit registry base URL; when set, DNS discovery is bypassed
    pub registry_url: Option<String>,
    /// Data center name; `"Amazon"` enables the instance metadata service
    pub data_center: Option<String>,
    /// Seconds between renewal heartbeats
    pub heartbeat_interval_secs: u64,
    /// Resource path for registration and renewal requests
    pub service_path: String,
    /// Context path appended to DNS-discovered registry hosts
    pub context_path: String,
    /// Hostname reported in the instance document; overrides detection
    pub host_name: Option<String>,
    /// Instance id; defaults to `{host}:{app}:{port}`
    pub instance_id: Option<String>,
    /// Port the hosting service listens on
    pub port: Option<u16>,
    /// Advertise https URLs instead of http
    pub secure: bool,
    /// Virtual hostname; defaults to the local IPv4 address
    pub vip_address: Option<String>,
    /// Virtual hostname for secure traffic; same defaulting as `vip_address`
    pub secure_vip_address: Option<String>,
    /// Region for DNS discovery (`txt.{region}.{domain_name}`)
    pub region: Option<String>,
    /// Domain for DNS discovery
    pub domain_name: Option<String>,
    /// Explicit port appended to DNS-discovered registry hosts
    pub registry_port: Option<u16>,
    /// Try registry endpoints in the caller's own availability zone first
    pub prefer_same_zone: bool,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for EurekaConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            registry_url: None,
            data_center: None,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            service_path: DEFAULT_SERVICE_PATH.to_string(),
            context_path: DEFAULT_CONTEXT_PATH.to_string(),
            host_name: None,
            instance_id: None,
            port: None,
            secure: false,
            vip_address: None,
            secure_vip_address: None,
            region: None,
            domain_name: None,
            registry_port: None,
            prefer_same_zone: true,
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
        }
    }
}

impl EurekaConfig {
    /// Create a configuration for the given application name with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self
    }

    pub fn with_data_center(mut self, data_center: impl Into<String>) -> Self {
        self.data_center = Some(data_center.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    pub fn with_service_path(mut self, service_path: impl Into<String>) -> Self {
        self.service_path = service_path.into();
        self
    }

    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_vip_address(mut self, vip_address: impl Into<String>) -> Self {
        self.vip_address = Some(vip_address.into());
        self
    }

    pub fn with_secure_vip_address(mut self, secure_vip_address: impl Into<String>) -> Self {
        self.secure_vip_address = Some(secure_vip_address.into());
        self
    }

    /// Enable DNS-based endpoint discovery under `txt.{region}.{domain_name}`
    pub fn with_dns_discovery(
        mut self,
        region: impl Into<String>,
        domain_name: impl Into<String>,
    ) -> Self {
        self.region = Some(region.into());
        self.domain_name = Some(domain_name.into());
        self
    }

    pub fn with_registry_port(mut self, registry_port: u16) -> Self {
        self.registry_port = Some(registry_port);
        self
    }

    pub fn with_prefer_same_zone(mut self, prefer_same_zone: bool) -> Self {
        self.prefer_same_zone = prefer_same_zone;
        self
    }

    pub fn with_timeouts(mut self, connect_timeout_ms: u64, read_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self.read_timeout_ms = read_timeout_ms;
        self
    }

    /// Overwrite fields from the process environment where the corresponding
    /// variable is present
    pub fn overlay_env(self) -> Self {
        self.overlay_from(|key| std::env::var(key).ok())
    }

    /// Same as [`overlay_env`](Self::overlay_env) with an explicit lookup, so
    /// tests never have to mutate the real environment
    pub fn overlay_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(env_keys::SERVICE_URL) {
            self.registry_url = Some(value);
        }
        if let Some(value) = lookup(env_keys::DATACENTER) {
            self.data_center = Some(value);
        }
        if let Some(value) = lookup(env_keys::HEARTBEAT_INTERVAL) {
            match value.parse() {
                Ok(secs) => self.heartbeat_interval_secs = secs,
                Err(_) => tracing::warn!(
                    "ignoring unparsable {}: {:?}",
                    env_keys::HEARTBEAT_INTERVAL,
                    value
                ),
            }
        }
        if let Some(value) = lookup(env_keys::SERVICE_PATH) {
            self.service_path = value;
        }
        if let Some(value) = lookup(env_keys::HOSTNAME) {
            self.host_name = Some(value);
        }
        if let Some(value) = lookup(env_keys::PORT) {
            match value.parse() {
                Ok(port) => self.port = Some(port),
                Err(_) => {
                    tracing::warn!("ignoring unparsable {}: {:?}", env_keys::PORT, value);
                }
            }
        }
        self
    }

    /// Check the invariants that must hold before any network activity
    pub(crate) fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(EurekaError::Configuration(
                "app_name must not be empty".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(EurekaError::Configuration(
                "heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if let Some(url) = &self.registry_url {
            Url::parse(url).map_err(|e| {
                EurekaError::Configuration(format!("invalid registry URL {url}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Port the instance document advertises
    pub(crate) fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SERVICE_PORT)
    }

    /// URL scheme the instance document advertises
    pub(crate) fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EurekaConfig::new("billing");
        assert_eq!(config.app_name, "billing");
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.service_path, "eureka/apps");
        assert_eq!(config.context_path, "eureka/v2");
        assert!(config.prefer_same_zone);
        assert!(!config.secure);
        assert_eq!(config.registry_url, None);
        assert_eq!(config.port, None);
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.read_timeout_ms, 30000);
    }

    #[test]
    fn test_builder_methods() {
        let config = EurekaConfig::new("billing")
            .with_registry_url("http://registry.internal:8761/")
            .with_data_center("Amazon")
            .with_heartbeat_interval(10)
            .with_host_name("billing-1")
            .with_instance_id("custom-id")
            .with_port(8080)
            .with_secure(true)
            .with_vip_address("billing.vip")
            .with_secure_vip_address("billing.svip")
            .with_dns_discovery("us-east-1", "discovery.example.com")
            .with_registry_port(7001)
            .with_prefer_same_zone(false)
            .with_timeouts(1000, 2000);

        assert_eq!(
            config.registry_url.as_deref(),
            Some("http://registry.internal:8761/")
        );
        assert_eq!(config.data_center.as_deref(), Some("Amazon"));
        assert_eq!(config.heartbeat_interval_secs, 10);
        assert_eq!(config.host_name.as_deref(), Some("billing-1"));
        assert_eq!(config.instance_id.as_deref(), Some("custom-id"));
        assert_eq!(config.port, Some(8080));
        assert!(config.secure);
        assert_eq!(config.vip_address.as_deref(), Some("billing.vip"));
        assert_eq!(config.secure_vip_address.as_deref(), Some("billing.svip"));
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.domain_name.as_deref(), Some("discovery.example.com"));
        assert_eq!(config.registry_port, Some(7001));
        assert!(!config.prefer_same_zone);
        assert_eq!(config.connect_timeout_ms, 1000);
        assert_eq!(config.read_timeout_ms, 2000);
    }

    #[test]
    fn test_overlay_fills_from_lookup() {
        let config = EurekaConfig::new("billing").overlay_from(|key| match key {
            "EUREKA_SERVICE_URL" => Some("http://registry.internal:8761/".to_string()),
            "EUREKA_INSTANCE_DATACENTER" => Some("Amazon".to_string()),
            "EUREKA_HEARTBEAT_INTERVAL" => Some("12".to_string()),
            "EUREKA_SERVICE_PATH" => Some("registry/apps".to_string()),
            "EUREKA_INSTANCE_HOSTNAME" => Some("billing-env".to_string()),
            "EUREKA_INSTANCE_PORT" => Some("9090".to_string()),
            _ => None,
        });

        assert_eq!(
            config.registry_url.as_deref(),
            Some("http://registry.internal:8761/")
        );
        assert_eq!(config.data_center.as_deref(), Some("Amazon"));
        assert_eq!(config.heartbeat_interval_secs, 12);
        assert_eq!(config.service_path, "registry/apps");
        assert_eq!(config.host_name.as_deref(), Some("billing-env"));
        assert_eq!(config.port, Some(9090));
    }

    #[test]
    fn test_overlay_ignores_unparsable_numbers() {
        let config = EurekaConfig::new("billing").overlay_from(|key| match key {
            "EUREKA_HEARTBEAT_INTERVAL" => Some("soon".to_string()),
            "EUREKA_INSTANCE_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });

        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_builder_wins_over_overlay() {
        let config = EurekaConfig::new("billing")
            .overlay_from(|key| match key {
                "EUREKA_INSTANCE_PORT" => Some("9090".to_string()),
                _ => None,
            })
            .with_port(8080);

        assert_eq!(config.port, Some(8080));
    }

    #[test]
    fn test_validate() {
        assert!(EurekaConfig::new("billing").validate().is_ok());
        assert!(EurekaConfig::new("").validate().is_err());
        assert!(EurekaConfig::new("  ").validate().is_err());
        assert!(
            EurekaConfig::new("billing")
                .with_heartbeat_interval(0)
                .validate()
                .is_err()
        );
        assert!(
            EurekaConfig::new("billing")
                .with_registry_url("not a url")
                .validate()
                .is_err()
        );
        assert!(
            EurekaConfig::new("billing")
                .with_registry_url("http://registry.internal:8761/eureka/v2/")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_effective_port_and_scheme() {
        let config = EurekaConfig::new("billing");
        assert_eq!(config.effective_port(), DEFAULT_SERVICE_PORT);
        assert_eq!(config.scheme(), "http");

        let config = EurekaConfig::new("billing").with_port(8080).with_secure(true);
        assert_eq!(config.effective_port(), 8080);
        assert_eq!(config.scheme(), "https");
    }
}
