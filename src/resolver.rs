//! Registry endpoint discovery
//!
//! Endpoints come from one of two places: an explicitly configured URL, or
//! DNS TXT records laid out by availability zone:
//!
//! - `txt.{region}.{domain}` holds one record value per zone; the first DNS
//!   label of each value names the zone.
//! - `txt.{zone_value}` holds the registry hosts serving that zone.
//!
//! The URL list is computed once per client. Hosts are shuffled within their
//! zone, zones keep their discovered order (the caller's own zone first when
//! same-zone preference is on), and the first URL is fixed as primary while
//! the backups are shuffled once more so failover load spreads out.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use rand::{Rng, seq::SliceRandom};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    config::EurekaConfig,
    error::{EurekaError, Result},
    metadata::MetadataProvider,
};

/// Ordered, immutable list of registry base URLs
#[derive(Debug, Clone)]
pub struct EndpointList {
    urls: Vec<String>,
}

impl EndpointList {
    /// Wrap a pre-built URL list; the first element is the primary
    pub fn new(urls: Vec<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(EurekaError::Configuration(
                "endpoint list must contain at least one URL".to_string(),
            ));
        }
        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn primary(&self) -> &str {
        &self.urls[0]
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.urls.iter()
    }
}

/// One availability zone and the registry hosts serving it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEndpoints {
    pub zone: String,
    pub hosts: Vec<String>,
}

/// DNS TXT lookup seam; tests substitute a static map
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// All TXT record values under `name`
    async fn txt_lookup(&self, name: &str) -> Result<Vec<String>>;
}

/// TXT resolver backed by the system DNS configuration.
///
/// The configuration is loaded on the first lookup, so a client whose
/// endpoints come from an explicit URL never reads it at all.
pub struct SystemTxtResolver {
    inner: OnceCell<TokioAsyncResolver>,
}

impl SystemTxtResolver {
    pub fn new() -> Self {
        Self {
            inner: OnceCell::new(),
        }
    }

    async fn resolver(&self) -> Result<&TokioAsyncResolver> {
        self.inner
            .get_or_try_init(|| async {
                TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
                    EurekaError::Configuration(format!(
                        "failed to load system DNS configuration: {e}"
                    ))
                })
            })
            .await
    }
}

impl Default for SystemTxtResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TxtResolver for SystemTxtResolver {
    async fn txt_lookup(&self, name: &str) -> Result<Vec<String>> {
        let resolver = self.resolver().await?;
        let lookup = resolver.txt_lookup(name).await.map_err(|e| {
            EurekaError::Configuration(format!("DNS TXT lookup for {name} failed: {e}"))
        })?;
        let mut values = Vec::new();
        for record in lookup.iter() {
            for data in record.txt_data() {
                values.push(String::from_utf8_lossy(data).into_owned());
            }
        }
        Ok(values)
    }
}

/// Resolve the ordered endpoint list for this client session.
///
/// An explicitly configured registry URL short-circuits discovery entirely;
/// DNS and the metadata provider are consulted only on the discovery path.
pub async fn resolve(
    config: &EurekaConfig,
    dns: &dyn TxtResolver,
    metadata: &dyn MetadataProvider,
) -> Result<EndpointList> {
    if let Some(url) = &config.registry_url {
        debug!("using explicitly configured registry URL: {}", url);
        return EndpointList::new(vec![url.clone()]);
    }

    let (region, domain) = match (&config.region, &config.domain_name) {
        (Some(region), Some(domain)) => (region, domain),
        _ => {
            return Err(EurekaError::Configuration(
                "either registry_url or both region and domain_name must be set".to_string(),
            ));
        }
    };

    let mut zones = discover_zones(dns, region, domain).await?;
    if zones.is_empty() {
        return Err(EurekaError::Configuration(format!(
            "DNS discovery found no availability zones under txt.{region}.{domain}"
        )));
    }

    if config.prefer_same_zone {
        let own_zone = instance_zone(config, metadata).await?;
        zones = order_zones(zones, own_zone.as_deref());
    }

    let mut rng = rand::rng();
    let urls = build_urls(&zones, config.registry_port, &config.context_path, &mut rng);
    let urls = promote_primary(urls, &mut rng);

    info!("resolved registry endpoints (in order): {:?}", urls);
    EndpointList::new(urls)
}

/// Walk the two-level TXT layout into zone host lists
async fn discover_zones(
    dns: &dyn TxtResolver,
    region: &str,
    domain: &str,
) -> Result<Vec<ZoneEndpoints>> {
    let discovery_name = format!("txt.{region}.{domain}");
    let zone_values = dns.txt_lookup(&discovery_name).await?;
    debug!(
        "zone discovery under {} returned {:?}",
        discovery_name, zone_values
    );

    let mut zones = Vec::with_capacity(zone_values.len());
    for zone_value in zone_values {
        let zone = zone_value
            .split_once('.')
            .map_or(zone_value.as_str(), |(label, _)| label)
            .to_string();
        let hosts = dns.txt_lookup(&format!("txt.{zone_value}")).await?;
        zones.push(ZoneEndpoints { zone, hosts });
    }
    Ok(zones)
}

/// Availability zone this process runs in.
///
/// Only a data center with a metadata service can answer; anything else has
/// no way to know its zone and fails as unsupported.
pub async fn instance_zone(
    config: &EurekaConfig,
    metadata: &dyn MetadataProvider,
) -> Result<Option<String>> {
    match config.data_center.as_deref() {
        Some("Amazon") => {
            let zone = metadata.fetch("availability-zone").await;
            if zone.is_none() {
                debug!("metadata service did not report an availability zone");
            }
            Ok(zone)
        }
        other => Err(EurekaError::Unsupported(format!(
            "zone lookup is not available for data center {}",
            other.unwrap_or("<unset>")
        ))),
    }
}

/// Move the caller's own zone to the front, preserving the order of the
/// rest. A missing or unknown own zone leaves the order untouched.
fn order_zones(mut zones: Vec<ZoneEndpoints>, own_zone: Option<&str>) -> Vec<ZoneEndpoints> {
    let Some(own_zone) = own_zone else {
        return zones;
    };
    match zones.iter().position(|z| z.zone == own_zone) {
        Some(index) => {
            let own = zones.remove(index);
            zones.insert(0, own);
        }
        None => {
            warn!(
                "own zone {} is not among the discovered zones; keeping discovered order",
                own_zone
            );
        }
    }
    zones
}

/// Expand zones into base URLs: hosts shuffled within each zone, zone order
/// preserved, exactly one trailing slash per URL
fn build_urls(
    zones: &[ZoneEndpoints],
    registry_port: Option<u16>,
    context_path: &str,
    rng: &mut impl Rng,
) -> Vec<String> {
    let context = context_path.trim_matches('/');
    let mut urls = Vec::new();
    for zone in zones {
        let mut hosts = zone.hosts.clone();
        hosts.shuffle(rng);
        for host in hosts {
            let mut url = match registry_port {
                Some(port) => format!("http://{host}:{port}"),
                None => format!("http://{host}"),
            };
            if !context.is_empty() {
                url.push('/');
                url.push_str(context);
            }
            url.push('/');
            urls.push(url);
        }
    }
    urls
}

/// Keep the first URL fixed as primary and shuffle the rest, so clients
/// sharing a primary spread their failover traffic across the backups
fn promote_primary(mut urls: Vec<String>, rng: &mut impl Rng) -> Vec<String> {
    if urls.len() > 1 {
        urls[1..].shuffle(rng);
    }
    urls
}
