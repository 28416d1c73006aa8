//! Collection worker: runs probes and buffers their snapshots

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::probes::ProbeRegistry;
use crate::queue::store::DurableQueue;

/// Collector worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Collection interval
    pub interval: Duration,

    /// Initial delay before the first collection
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the collector worker
pub async fn run<S, F>(
    options: &Options,
    registry: Arc<ProbeRegistry>,
    queue: Arc<DurableQueue>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Collector worker starting ({} probes)...", registry.len());

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Collector worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        debug!("Running inventory probes...");

        for probe in registry.iter() {
            match probe.collect().await {
                Ok(payload) => {
                    // An unrecoverable storage error drops this snapshot;
                    // the next collection cycle produces a fresh one.
                    if let Err(e) = queue.push(payload) {
                        error!("Failed to queue snapshot from probe {}: {}", probe.name(), e);
                    }
                }
                Err(e) => {
                    error!("Probe {} failed: {}", probe.name(), e);
                }
            }
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Collector worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
