//! Prometheus metrics for the client
//!
//! Instruments:
//! - Registry request count and duration, labelled by operation
//! - Heartbeat outcomes (success, failed, reregistered)
//! - Current registration state as a gauge
//!
//! Every client owns its own registry so several clients can coexist in one
//! process (and in one test binary) without name collisions.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::warn;

use crate::error::Result;

/// Outcome label for a request or heartbeat that succeeded
pub const OUTCOME_SUCCESS: &str = "success";
/// Outcome label for a request or heartbeat that exhausted every endpoint
pub const OUTCOME_FAILED: &str = "failed";
/// Outcome label for a heartbeat answered with not-found, forcing re-registration
pub const OUTCOME_REREGISTERED: &str = "reregistered";

/// Metrics collector, one per client
#[derive(Clone)]
pub struct ClientMetrics {
    registry: Registry,
    requests: IntCounterVec,
    request_duration: HistogramVec,
    heartbeats: IntCounterVec,
    registration_state: IntGauge,
}

impl ClientMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "eureka_client_requests_total",
                "Total registry requests by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "eureka_client_request_duration_seconds",
                "Registry request duration in seconds by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let heartbeats = IntCounterVec::new(
            Opts::new(
                "eureka_client_heartbeats_total",
                "Total heartbeat cycles by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(heartbeats.clone()))?;

        let registration_state = IntGauge::new(
            "eureka_client_registration_state",
            "Registration state (0 not registered, 1 registered, 2 heartbeat failing)",
        )?;
        registry.register(Box::new(registration_state.clone()))?;

        Ok(Self {
            registry,
            requests,
            request_duration,
            heartbeats,
            registration_state,
        })
    }

    /// Record one registry operation and how long it took
    pub fn record_request(&self, operation: &str, outcome: &str, seconds: f64) {
        self.requests.with_label_values(&[operation, outcome]).inc();
        self.request_duration
            .with_label_values(&[operation])
            .observe(seconds);
    }

    /// Record one heartbeat cycle outcome
    pub fn record_heartbeat(&self, outcome: &str) {
        self.heartbeats.with_label_values(&[outcome]).inc();
    }

    /// Report the current registration state on the gauge
    pub fn set_registration_state(&self, state: i64) {
        self.registration_state.set(state);
    }

    /// Render this client's metrics in the Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_else(|e| {
                warn!("failed to encode metrics: {}", e);
                String::new()
            })
    }
}
