//! Local host introspection
//!
//! Addressing facts used by the instance document when no explicit
//! hostname or virtual address is configured.

use if_addrs::IfAddr;
use tracing::debug;

/// Hostname and first non-loopback addresses of the local machine
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub hostname: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

impl HostInfo {
    /// Detect the local hostname and addresses.
    ///
    /// Never fails: a machine with no resolvable name reports `localhost`,
    /// and missing addresses stay `None`.
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());

        let mut ipv4 = None;
        let mut ipv6 = None;
        match if_addrs::get_if_addrs() {
            Ok(interfaces) => {
                for iface in interfaces {
                    if iface.is_loopback() {
                        continue;
                    }
                    match iface.addr {
                        IfAddr::V4(ref v4) if ipv4.is_none() => {
                            ipv4 = Some(v4.ip.to_string());
                        }
                        IfAddr::V6(ref v6) if ipv6.is_none() => {
                            ipv6 = Some(v6.ip.to_string());
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => debug!("failed to enumerate network interfaces: {}", e),
        }

        Self {
            hostname,
            ipv4,
            ipv6,
        }
    }
}
