//! Application state management

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::engine::{DeploymentEngine, HostInfo};
use crate::errors::AgentError;
use crate::probes::{platform_registry, ProbeRegistry};
use crate::queue::store::DurableQueue;
use crate::transport::client::Transport;

/// Shared state owned by the run loop and borrowed by every worker
pub struct AppState {
    pub agent_version: String,
    pub queue: Arc<DurableQueue>,
    pub transport: Arc<Transport>,
    pub engine: Arc<DeploymentEngine>,
    pub probes: Arc<ProbeRegistry>,
}

impl AppState {
    /// Build the shared state: storage layout, durable queue, transport
    /// and engine. The queue store failing to open is fatal — without it
    /// no collected data can be safely buffered.
    pub async fn init(
        agent_version: String,
        options: &AppOptions,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<Self, AgentError> {
        options.storage.layout.setup().await?;

        let queue = Arc::new(DurableQueue::open(
            options.storage.layout.queue_db_path(),
            options.queue_max_retries,
        )?);

        let transport =
            Arc::new(Transport::new(options.transport.clone())?.with_shutdown(cancel_rx));

        let engine = Arc::new(DeploymentEngine::new(
            HostInfo::current(),
            transport.clone(),
        ));

        let probes = Arc::new(platform_registry());

        Ok(Self {
            agent_version,
            queue,
            transport,
            engine,
            probes,
        })
    }

    /// Release the storage handle; called exactly once at shutdown
    pub fn shutdown(&self) -> Result<(), AgentError> {
        info!("Closing queue store...");
        self.queue.close()
    }
}
