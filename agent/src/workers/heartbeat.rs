//! Heartbeat worker: periodic telemetry to the management service

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::deploy::engine::DeploymentEngine;
use crate::queue::store::DurableQueue;
use crate::telemetry::{collect_metrics, AgentMetrics, JobCounts};
use crate::transport::client::Transport;

/// Heartbeat worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Heartbeat interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the heartbeat worker
pub async fn run<S, F>(
    options: &Options,
    agent_version: String,
    queue: Arc<DurableQueue>,
    engine: Arc<DeploymentEngine>,
    transport: Arc<Transport>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Heartbeat worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Heartbeat worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        // A broken store must not masquerade as an empty queue; skip the
        // beat and let the next interval try again.
        let queue_stats = match queue.stats() {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Skipping heartbeat, queue stats unavailable: {}", e);
                continue;
            }
        };

        let metrics = AgentMetrics {
            agent_version: agent_version.clone(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            system: collect_metrics(),
            queue: queue_stats,
            jobs: JobCounts::from_counts(&engine.job_counts().await),
        };

        match transport.send_telemetry(&metrics).await {
            Ok(_) => debug!("Heartbeat delivered"),
            Err(e) => warn!("Heartbeat delivery failed: {}", e),
        }
    }
}
