//! Drain worker: delivers queued records in bounded batches
//!
//! The pop-then-send pattern: records are removed from the pending
//! partition atomically with the read, and re-queued (with the retry
//! counter bumped) when delivery fails. The transport itself never
//! re-queues.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::queue::store::DurableQueue;
use crate::transport::client::Transport;

/// Drain worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Drain interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Run the drain worker
pub async fn run<S, F>(
    options: &Options,
    queue: Arc<DurableQueue>,
    transport: Arc<Transport>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Drain worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Drain worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let batch = match queue.pop_batch(transport.config().batch_max_items) {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to pop batch from queue: {}", e);
                continue;
            }
        };

        if batch.is_empty() {
            continue;
        }

        debug!("Draining {} records", batch.len());

        if let Err(e) = transport.send_batch(&batch).await {
            warn!("Batch delivery failed, re-queuing {} records: {}", batch.len(), e);
            for record in batch {
                let id = record.id.clone();
                if let Err(e) = queue.requeue(record) {
                    error!("Failed to re-queue record {}: {}", id, e);
                }
            }
        }
    }
}
