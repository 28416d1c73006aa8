//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::transport::client::TransportConfig;
use crate::workers::{collector, deployer, drain, heartbeat};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Delivery policy for the transport
    pub transport: TransportConfig,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Record retry ceiling before the failed partition
    pub queue_max_retries: u32,

    /// Enable the probe collector worker
    pub enable_collector: bool,

    /// Enable the queue drain worker
    pub enable_drain: bool,

    /// Enable the heartbeat worker
    pub enable_heartbeat: bool,

    /// Enable the deployment poller worker
    pub enable_deployer: bool,

    /// Collector worker options
    pub collector: collector::Options,

    /// Drain worker options
    pub drain: drain::Options,

    /// Heartbeat worker options
    pub heartbeat: heartbeat::Options,

    /// Deployer worker options
    pub deployer: deployer::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            transport: TransportConfig::default(),
            storage: StorageOptions::default(),
            queue_max_retries: 5,
            enable_collector: true,
            enable_drain: true,
            enable_heartbeat: true,
            enable_deployer: true,
            collector: collector::Options::default(),
            drain: drain::Options::default(),
            heartbeat: heartbeat::Options::default(),
            deployer: deployer::Options::default(),
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}
