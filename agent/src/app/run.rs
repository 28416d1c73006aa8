//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::workers::{collector, deployer, drain, heartbeat};

/// Run the Inventa agent until the shutdown signal resolves
pub async fn run(
    agent_version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing Inventa Agent...");

    // Workers listen on the broadcast channel; the transport's retry
    // loop watches the cancel flag between attempts.
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), cancel_tx, options.lifecycle.clone());

    if let Err(e) = init(
        agent_version,
        &options,
        cancel_rx,
        shutdown_tx.clone(),
        &mut shutdown_manager,
    )
    .await
    {
        error!("Failed to start agent: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    agent_version: String,
    options: &AppOptions,
    cancel_rx: watch::Receiver<bool>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), AgentError> {
    let app_state = Arc::new(AppState::init(agent_version, options, cancel_rx).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.enable_collector {
        init_collector_worker(
            options.collector.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_drain {
        init_drain_worker(
            options.drain.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_heartbeat {
        init_heartbeat_worker(
            options.heartbeat.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_deployer {
        init_deployer_worker(
            options.deployer.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    Ok(())
}

fn init_collector_worker(
    options: collector::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing collector worker...");

    let registry = app_state.probes.clone();
    let queue = app_state.queue.clone();

    let handle = tokio::spawn(async move {
        collector::run(
            &options,
            registry,
            queue,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_collector_worker_handle(handle)
}

fn init_drain_worker(
    options: drain::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing drain worker...");

    let queue = app_state.queue.clone();
    let transport = app_state.transport.clone();

    let handle = tokio::spawn(async move {
        drain::run(
            &options,
            queue,
            transport,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_drain_worker_handle(handle)
}

fn init_heartbeat_worker(
    options: heartbeat::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing heartbeat worker...");

    let agent_version = app_state.agent_version.clone();
    let queue = app_state.queue.clone();
    let engine = app_state.engine.clone();
    let transport = app_state.transport.clone();

    let handle = tokio::spawn(async move {
        heartbeat::run(
            &options,
            agent_version,
            queue,
            engine,
            transport,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_heartbeat_worker_handle(handle)
}

fn init_deployer_worker(
    options: deployer::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing deployer worker...");

    let engine = app_state.engine.clone();
    let transport = app_state.transport.clone();

    let handle = tokio::spawn(async move {
        deployer::run(
            &options,
            engine,
            transport,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_deployer_worker_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    cancel_tx: watch::Sender<bool>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    collector_worker_handle: Option<JoinHandle<()>>,
    drain_worker_handle: Option<JoinHandle<()>>,
    heartbeat_worker_handle: Option<JoinHandle<()>>,
    deployer_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(
        shutdown_tx: broadcast::Sender<()>,
        cancel_tx: watch::Sender<bool>,
        lifecycle_options: LifecycleOptions,
    ) -> Self {
        Self {
            shutdown_tx,
            cancel_tx,
            lifecycle_options,
            app_state: None,
            collector_worker_handle: None,
            drain_worker_handle: None,
            heartbeat_worker_handle: None,
            deployer_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), AgentError> {
        if self.app_state.is_some() {
            return Err(AgentError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_collector_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.collector_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("collector_handle already set".to_string()));
        }
        self.collector_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_drain_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.drain_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("drain_handle already set".to_string()));
        }
        self.drain_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_heartbeat_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.heartbeat_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("heartbeat_handle already set".to_string()));
        }
        self.heartbeat_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_deployer_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.deployer_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("deployer_handle already set".to_string()));
        }
        self.deployer_worker_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());
        let _ = self.cancel_tx.send(true);

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), AgentError> {
        info!("Shutting down Inventa Agent...");

        // 1. Collector worker
        if let Some(handle) = self.collector_worker_handle.take() {
            handle
                .await
                .map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 2. Drain worker, so no pop is in flight when the queue closes
        if let Some(handle) = self.drain_worker_handle.take() {
            handle
                .await
                .map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 3. Heartbeat worker
        if let Some(handle) = self.heartbeat_worker_handle.take() {
            handle
                .await
                .map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 4. Deployer worker
        if let Some(handle) = self.deployer_worker_handle.take() {
            handle
                .await
                .map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 5. App state (closes the queue store)
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown()?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
