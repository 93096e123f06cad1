//! Liveness probe contract
//!
//! The hosting service mounts this wherever its framework expects handlers;
//! the registry's health, status and home URLs in the instance document all
//! point at it.

use serde::{Deserialize, Serialize};

use crate::instance::InstanceStatus;

/// Body of a health probe response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: InstanceStatus,
}

/// Fixed liveness answer; reachable means up
pub fn healthcheck() -> HealthStatus {
    HealthStatus {
        status: InstanceStatus::Up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthcheck_reports_up() {
        let health = healthcheck();
        assert_eq!(health.status, InstanceStatus::Up);
        assert_eq!(
            serde_json::to_string(&health).unwrap(),
            r#"{"status":"UP"}"#
        );
    }
}
