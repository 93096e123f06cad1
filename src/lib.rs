//! Eureka Client - service registry client for Netflix Eureka
//!
//! This crate provides:
//! - Endpoint discovery from an explicit URL or DNS TXT zone records, with
//!   same-zone preference and load-balancing shuffle
//! - Instance identity construction, including EC2 metadata enrichment
//! - The register / heartbeat / re-register lifecycle with failover across
//!   every discovered endpoint
//! - Read access to the registry's view of applications and instances
//! - Prometheus metrics and a liveness probe contract for the hosting service

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod host;
pub mod http;
pub mod instance;
pub mod metadata;
pub mod metrics;
pub mod resolver;

// Lifecycle re-exports
pub use client::{EurekaClient, RegistrationState};
pub use config::EurekaConfig;
pub use error::{EurekaError, Result};

// Instance document re-exports
pub use instance::{
    DataCenterInfo, InstanceInfo, InstanceStatus, PortInfo, RegistrationDocument,
};

// Discovery and collaborator re-exports
pub use health::{HealthStatus, healthcheck};
pub use host::HostInfo;
pub use metadata::{Ec2MetadataClient, MetadataProvider};
pub use metrics::ClientMetrics;
pub use resolver::{EndpointList, SystemTxtResolver, TxtResolver, ZoneEndpoints};
