//! Registration lifecycle and registry queries
//!
//! The client owns the register / renew state machine:
//!
//! - [`EurekaClient::register`] walks the endpoint list in order and stops at
//!   the first registry that accepts the instance document.
//! - [`EurekaClient::renew`] heartbeats the same way; a not-found answer means
//!   the registry evicted the instance, and the client re-registers on the
//!   spot instead of probing further endpoints.
//! - [`EurekaClient::start`] registers once and then renews on a fixed
//!   interval in a background task until [`EurekaClient::stop`] is called.
//!
//! Every state transition happens under one lock, so a manual `register`
//! cannot race the scheduled heartbeat. Cloning the client is cheap and all
//! clones share lifecycle state.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::EurekaConfig,
    error::{EurekaError, Result},
    host::HostInfo,
    http::HttpTransport,
    instance::{self, InstanceInfo, InstanceStatus, RegistrationDocument},
    metadata::{Ec2MetadataClient, MetadataProvider},
    metrics::{self, ClientMetrics},
    resolver::{self, EndpointList, SystemTxtResolver, TxtResolver},
};

/// Where the client currently stands with the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    NotRegistered,
    Registered,
    HeartbeatFailed,
}

impl RegistrationState {
    fn gauge_value(self) -> i64 {
        match self {
            RegistrationState::NotRegistered => 0,
            RegistrationState::Registered => 1,
            RegistrationState::HeartbeatFailed => 2,
        }
    }
}

/// Mutable lifecycle state; one lock serializes all transitions
struct Lifecycle {
    state: RegistrationState,
    instance: Option<InstanceInfo>,
}

/// Service registry client
#[derive(Clone)]
pub struct EurekaClient {
    config: Arc<EurekaConfig>,
    transport: HttpTransport,
    endpoints: Arc<EndpointList>,
    metadata: Arc<dyn MetadataProvider>,
    host: HostInfo,
    metrics: Arc<ClientMetrics>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    cancel: CancellationToken,
    heartbeat: Arc<Mutex<Option<JoinHandle<()>>>>,
}

// ============== Construction ==============

impl EurekaClient {
    /// Build a client with the system DNS resolver, the EC2 metadata service
    /// and detected host info
    pub async fn new(config: EurekaConfig) -> Result<Self> {
        let dns: Arc<dyn TxtResolver> = Arc::new(SystemTxtResolver::new());
        let metadata: Arc<dyn MetadataProvider> = Arc::new(Ec2MetadataClient::new()?);
        let host = HostInfo::detect();
        Self::with_components(config, dns, metadata, host).await
    }

    /// Build a client with explicit DNS and metadata providers
    pub async fn with_components(
        config: EurekaConfig,
        dns: Arc<dyn TxtResolver>,
        metadata: Arc<dyn MetadataProvider>,
        host: HostInfo,
    ) -> Result<Self> {
        config.validate()?;
        let endpoints = resolver::resolve(&config, dns.as_ref(), metadata.as_ref()).await?;
        Self::assemble(config, endpoints, metadata, host)
    }

    /// Build a client against a fixed endpoint list, skipping resolution
    pub fn with_endpoints(
        config: EurekaConfig,
        endpoints: EndpointList,
        metadata: Arc<dyn MetadataProvider>,
        host: HostInfo,
    ) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, endpoints, metadata, host)
    }

    fn assemble(
        config: EurekaConfig,
        endpoints: EndpointList,
        metadata: Arc<dyn MetadataProvider>,
        host: HostInfo,
    ) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        let metrics = ClientMetrics::new()?;
        metrics.set_registration_state(RegistrationState::NotRegistered.gauge_value());
        Ok(Self {
            config: Arc::new(config),
            transport,
            endpoints: Arc::new(endpoints),
            metadata,
            host,
            metrics: Arc::new(metrics),
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: RegistrationState::NotRegistered,
                instance: None,
            })),
            cancel: CancellationToken::new(),
            heartbeat: Arc::new(Mutex::new(None)),
        })
    }

    /// Endpoints this client talks to, in failover order
    pub fn endpoints(&self) -> &EndpointList {
        &self.endpoints
    }

    /// Current lifecycle state
    pub async fn registration_state(&self) -> RegistrationState {
        self.lifecycle.lock().await.state
    }

    /// Instance document from the most recent successful registration
    pub async fn current_instance(&self) -> Option<InstanceInfo> {
        self.lifecycle.lock().await.instance.clone()
    }

    /// Metrics collector for this client
    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }
}

// ============== Lifecycle ==============

impl EurekaClient {
    /// Register this instance as `UP`
    pub async fn register(&self) -> Result<()> {
        self.register_with_status(InstanceStatus::Up).await
    }

    /// Register this instance with an explicit initial status
    pub async fn register_with_status(&self, status: InstanceStatus) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.register_locked(&mut lifecycle, status).await
    }

    async fn register_locked(
        &self,
        lifecycle: &mut Lifecycle,
        status: InstanceStatus,
    ) -> Result<()> {
        let instance =
            instance::build_instance(&self.config, self.metadata.as_ref(), &self.host, status)
                .await;
        let document = RegistrationDocument { instance };
        let path = format!(
            "{}/{}",
            self.config.service_path.trim_matches('/'),
            self.config.app_name
        );

        let started = Instant::now();
        for endpoint in self.endpoints.iter() {
            let url = join_url(endpoint, &path);
            match self.transport.post_json(&url, &document).await {
                Ok(()) => {
                    info!(
                        "registered {} as {} with {}",
                        self.config.app_name, document.instance.instance_id, endpoint
                    );
                    self.transition(lifecycle, RegistrationState::Registered);
                    lifecycle.instance = Some(document.instance.clone());
                    self.metrics.record_request(
                        "register",
                        metrics::OUTCOME_SUCCESS,
                        started.elapsed().as_secs_f64(),
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "registration with {} failed: {}; trying next endpoint",
                        endpoint, e
                    );
                }
            }
        }

        self.transition(lifecycle, RegistrationState::NotRegistered);
        lifecycle.instance = None;
        self.metrics.record_request(
            "register",
            metrics::OUTCOME_FAILED,
            started.elapsed().as_secs_f64(),
        );
        error!(
            "registration failed: every endpoint rejected {}",
            self.config.app_name
        );
        Err(EurekaError::RegistrationFailed)
    }

    /// Send one heartbeat.
    ///
    /// Endpoints are tried in list order. A not-found answer means the
    /// registry evicted this instance; the client re-registers immediately
    /// and skips the remaining endpoints for this cycle.
    pub async fn renew(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        let instance_id = match &lifecycle.instance {
            Some(instance) => instance.instance_id.clone(),
            // Never registered through this client; derive the id a
            // registration would use.
            None => {
                instance::build_instance(
                    &self.config,
                    self.metadata.as_ref(),
                    &self.host,
                    InstanceStatus::Up,
                )
                .await
                .instance_id
            }
        };
        let path = format!(
            "{}/{}/{}",
            self.config.service_path.trim_matches('/'),
            self.config.app_name,
            instance_id
        );

        let started = Instant::now();
        for endpoint in self.endpoints.iter() {
            let url = join_url(endpoint, &path);
            match self.transport.put_empty(&url).await {
                Ok(()) => {
                    debug!("renewed {} with {}", instance_id, endpoint);
                    self.transition(&mut lifecycle, RegistrationState::Registered);
                    self.metrics.record_heartbeat(metrics::OUTCOME_SUCCESS);
                    self.metrics.record_request(
                        "renew",
                        metrics::OUTCOME_SUCCESS,
                        started.elapsed().as_secs_f64(),
                    );
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    info!(
                        "registry at {} no longer knows {}; re-registering",
                        endpoint, instance_id
                    );
                    self.transition(&mut lifecycle, RegistrationState::NotRegistered);
                    lifecycle.instance = None;
                    self.metrics.record_heartbeat(metrics::OUTCOME_REREGISTERED);
                    return self
                        .register_locked(&mut lifecycle, InstanceStatus::Up)
                        .await;
                }
                Err(e) => {
                    warn!(
                        "heartbeat via {} failed: {}; trying next endpoint",
                        endpoint, e
                    );
                }
            }
        }

        self.transition(&mut lifecycle, RegistrationState::HeartbeatFailed);
        self.metrics.record_heartbeat(metrics::OUTCOME_FAILED);
        self.metrics.record_request(
            "renew",
            metrics::OUTCOME_FAILED,
            started.elapsed().as_secs_f64(),
        );
        error!(
            "heartbeat failed: every endpoint rejected the renewal for {}",
            instance_id
        );
        Err(EurekaError::HeartbeatFailed)
    }

    fn transition(&self, lifecycle: &mut Lifecycle, next: RegistrationState) {
        if lifecycle.state != next {
            debug!("registration state {:?} -> {:?}", lifecycle.state, next);
        }
        lifecycle.state = next;
        self.metrics.set_registration_state(next.gauge_value());
    }

    /// Register and spawn the recurring heartbeat loop.
    ///
    /// Returns once the initial registration succeeded; the first renewal
    /// follows one full interval later. Calling `start` while the loop is
    /// already running is a no-op. A heartbeat cycle that exhausts every
    /// endpoint is logged and the loop keeps going; the state is observable
    /// through [`EurekaClient::registration_state`] and the metrics gauge.
    pub async fn start(&self) -> Result<()> {
        let mut heartbeat = self.heartbeat.lock().await;
        if heartbeat.is_some() {
            warn!("heartbeat loop already running; ignoring start request");
            return Ok(());
        }

        self.register().await?;

        let client = self.clone();
        let cancel = self.cancel.clone();
        let interval = Duration::from_secs(self.config.heartbeat_interval_secs);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; consume it so
            // the first renewal comes one full interval after registration.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("heartbeat loop stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = client.renew().await {
                            error!("heartbeat failed: {}; retrying next interval", e);
                        }
                    }
                }
            }
        });
        *heartbeat = Some(handle);
        info!(
            "heartbeat loop started with a {}s interval",
            self.config.heartbeat_interval_secs
        );
        Ok(())
    }

    /// Stop the heartbeat loop and wait for the task to finish.
    ///
    /// The loop observes the signal promptly, even mid-sleep. Stopping is
    /// one-way; build a fresh client to register again.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.heartbeat.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("heartbeat task did not shut down cleanly: {}", e);
            }
        }
    }
}

// ============== Registry queries ==============

impl EurekaClient {
    /// GET an arbitrary registry path, trying each endpoint in order and
    /// returning the first parsed response
    pub async fn query_any(&self, relative_path: &str) -> Result<serde_json::Value> {
        let started = Instant::now();
        for endpoint in self.endpoints.iter() {
            let url = join_url(endpoint, relative_path);
            match self.transport.get_json(&url).await {
                Ok(value) => {
                    self.metrics.record_request(
                        "query",
                        metrics::OUTCOME_SUCCESS,
                        started.elapsed().as_secs_f64(),
                    );
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "query {} via {} failed: {}; trying next endpoint",
                        relative_path, endpoint, e
                    );
                }
            }
        }
        self.metrics.record_request(
            "query",
            metrics::OUTCOME_FAILED,
            started.elapsed().as_secs_f64(),
        );
        Err(EurekaError::QueryFailed {
            path: relative_path.to_string(),
        })
    }

    /// All applications known to the registry
    pub async fn get_apps(&self) -> Result<serde_json::Value> {
        self.query_any("apps").await
    }

    /// One application with all of its instances
    pub async fn get_app(&self, app_id: &str) -> Result<serde_json::Value> {
        self.query_any(&format!("apps/{app_id}")).await
    }

    /// Instances registered under a virtual hostname
    pub async fn get_vip(&self, vip_address: &str) -> Result<serde_json::Value> {
        self.query_any(&format!("vips/{vip_address}")).await
    }

    /// Instances registered under a secure virtual hostname
    pub async fn get_svip(&self, svip_address: &str) -> Result<serde_json::Value> {
        self.query_any(&format!("svips/{svip_address}")).await
    }

    /// One instance by id, looked up across all applications
    pub async fn get_instance(&self, instance_id: &str) -> Result<serde_json::Value> {
        self.query_any(&format!("instances/{instance_id}")).await
    }

    /// One instance scoped to its application
    pub async fn get_app_instance(
        &self,
        app_id: &str,
        instance_id: &str,
    ) -> Result<serde_json::Value> {
        self.query_any(&format!("apps/{app_id}/{instance_id}")).await
    }
}

/// Join an endpoint base URL and a relative path with exactly one slash
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
