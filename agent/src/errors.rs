//! Error types for the Inventa agent

use thiserror::Error;

/// Main error type for the Inventa agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] rusqlite::Error),

    #[error("Queue is closed")]
    QueueClosed,

    /// A final, non-2xx HTTP response. Status code and body text are
    /// carried verbatim so the caller can log or surface them.
    #[error("Delivery failed: {status}: {body}")]
    DeliveryError { status: u16, body: String },

    #[error("Cancelled by shutdown")]
    Cancelled,

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Artifact hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}

impl AgentError {
    /// Whether a failed delivery attempt may be retried.
    ///
    /// Transport-level failures (connect, timeout, TLS) and 5xx responses
    /// are transient; anything below 500 is a request defect that a retry
    /// will not fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::HttpError(_) => true,
            AgentError::DeliveryError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_by_status() {
        let server_side = AgentError::DeliveryError {
            status: 503,
            body: String::new(),
        };
        assert!(server_side.is_retryable());

        let request_defect = AgentError::DeliveryError {
            status: 400,
            body: String::new(),
        };
        assert!(!request_defect.is_retryable());

        assert!(!AgentError::Cancelled.is_retryable());
        assert!(!AgentError::QueueClosed.is_retryable());
    }
}
