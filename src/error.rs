//! Client error types for the Eureka SDK

/// Error type for registry client operations
#[derive(Debug, thiserror::Error)]
pub enum EurekaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("registration failed: every registry endpoint rejected the instance")]
    RegistrationFailed,

    #[error("heartbeat failed: every registry endpoint rejected the renewal")]
    HeartbeatFailed,

    #[error("query failed: GET {path} exhausted every registry endpoint")]
    QueryFailed { path: String },

    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EurekaError {
    /// HTTP status code behind this error, when one exists
    pub fn status(&self) -> Option<u16> {
        match self {
            EurekaError::RequestFailed { status, .. } => Some(*status),
            EurekaError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the registry answered 404, meaning it no longer knows the instance
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, EurekaError>;
