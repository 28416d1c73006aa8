//! Deployer worker: polls for deployment jobs and executes them

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::deploy::engine::DeploymentEngine;
use crate::transport::client::Transport;

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the deployer worker
pub async fn run<S, F>(
    options: &Options,
    engine: Arc<DeploymentEngine>,
    transport: Arc<Transport>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Deployer worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        debug!("Polling for deployment jobs...");

        let jobs = match transport.fetch_deployments().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to poll for deployments: {}", e);
                continue;
            }
        };

        for job in jobs {
            // A job id runs exactly once; the registry remembers every
            // job this process has seen.
            if engine.is_registered(&job.id).await {
                continue;
            }

            info!("Received deployment job: {} ({})", job.id, job.name);

            // The engine records the terminal status and reports it; the
            // returned error only says this job did not succeed.
            if let Err(e) = engine.execute(job).await {
                error!("Deployment did not succeed: {}", e);
            }
        }
    }
}
