//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::transport::client::TransportConfig;

/// Agent settings, read from `<base>/settings.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Management service configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Delivery policy tuning
    #[serde(default)]
    pub transport: TransportSettings,

    /// Queue tuning
    #[serde(default)]
    pub queue: QueueSettings,

    /// Periodic worker configuration
    #[serde(default)]
    pub workers: WorkerSettings,
}

impl Settings {
    /// Build the transport delivery policy from these settings
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.server.base_url.clone(),
            batch_max_items: self.transport.batch_max_items,
            batch_max_bytes: self.transport.batch_max_bytes,
            compress: self.transport.compress,
            timeout: Duration::from_secs(self.transport.timeout_secs),
            attempts: self.transport.attempts,
            initial_backoff: Duration::from_millis(self.transport.backoff_ms),
            ca_cert_path: self.server.ca_cert_path.clone().map(Into::into),
            client_cert_path: self.server.client_cert_path.clone().map(Into::into),
            client_key_path: self.server.client_key_path.clone().map(Into::into),
        }
    }
}

/// Management service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL for the management service API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional PEM CA bundle path
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    /// Optional mutual-TLS client certificate path
    #[serde(default)]
    pub client_cert_path: Option<String>,

    /// Optional mutual-TLS client key path
    #[serde(default)]
    pub client_key_path: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ca_cert_path: None,
            client_cert_path: None,
            client_key_path: None,
        }
    }
}

/// Delivery policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default = "default_batch_max_items")]
    pub batch_max_items: usize,

    #[serde(default = "default_batch_max_bytes")]
    pub batch_max_bytes: usize,

    #[serde(default = "default_true")]
    pub compress: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_batch_max_items() -> usize {
    100
}

fn default_batch_max_bytes() -> usize {
    1024 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            batch_max_items: default_batch_max_items(),
            batch_max_bytes: default_batch_max_bytes(),
            compress: true,
            timeout_secs: default_timeout_secs(),
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Delivery attempts before a record moves to the failed partition
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    5
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// Periodic worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_collect_interval")]
    pub collect_interval_secs: u64,

    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_deploy_poll_interval")]
    pub deploy_poll_interval_secs: u64,

    #[serde(default = "default_true")]
    pub enable_collector: bool,

    #[serde(default = "default_true")]
    pub enable_drain: bool,

    #[serde(default = "default_true")]
    pub enable_heartbeat: bool,

    #[serde(default = "default_true")]
    pub enable_deployer: bool,
}

fn default_collect_interval() -> u64 {
    300
}

fn default_drain_interval() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_deploy_poll_interval() -> u64 {
    60
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            collect_interval_secs: default_collect_interval(),
            drain_interval_secs: default_drain_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            deploy_poll_interval_secs: default_deploy_poll_interval(),
            enable_collector: true,
            enable_drain: true,
            enable_heartbeat: true,
            enable_deployer: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.transport.attempts, 3);
        assert_eq!(settings.queue.max_retries, 5);
        assert!(settings.workers.enable_drain);
    }

    #[test]
    fn test_transport_config_mapping() {
        let settings = Settings::default();
        let config = settings.transport_config();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.initial_backoff, Duration::from_millis(500));
        assert!(config.compress);
    }
}
