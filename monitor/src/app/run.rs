//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::MonitorError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::monitor;

/// Run the monitor until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MonitorError> {
    info!("Initializing artifactory monitor...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start monitor: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), MonitorError> {
    let app_state = Arc::new(AppState::init(options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    // A single slot: forces requested while one is pending collapse into it
    let (force_tx, force_rx) = mpsc::channel(1);

    init_monitor_worker(
        options.monitor.clone(),
        app_state.clone(),
        force_rx,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    init_server(
        options,
        app_state,
        force_tx,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await
}

fn init_monitor_worker(
    options: monitor::Options,
    app_state: Arc<AppState>,
    force_rx: mpsc::Receiver<()>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    info!("Initializing monitor worker (every {:?})...", options.interval);

    let pipeline = app_state.pipeline.clone();
    let stats = app_state.stats.clone();

    let monitor_handle = tokio::spawn(async move {
        monitor::run(
            &options,
            pipeline,
            stats,
            force_rx,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_monitor_worker_handle(monitor_handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    force_tx: mpsc::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(
        options.info.clone(),
        app_state.ledger.clone(),
        app_state.stats.clone(),
        force_tx,
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), MonitorError>>>,
    monitor_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            monitor_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), MonitorError> {
        if self.app_state.is_some() {
            return Err(MonitorError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_monitor_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), MonitorError> {
        if self.monitor_worker_handle.is_some() {
            return Err(MonitorError::ShutdownError("monitor_handle already set".to_string()));
        }
        self.monitor_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), MonitorError>>,
    ) -> Result<(), MonitorError> {
        if self.server_handle.is_some() {
            return Err(MonitorError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), MonitorError> {
        let _ = self.shutdown_tx.send(());

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

    async fn shutdown_impl(&mut self) -> Result<(), MonitorError> {
        info!("Shutting down artifactory monitor...");

        // 1. HTTP server, so no new force requests arrive
        if let Some(handle) = self.server_handle.take() {
            handle.await.map_err(|e| MonitorError::ShutdownError(e.to_string()))??;
        }

        // 2. Monitor worker, which lets an in-flight cycle finish
        if let Some(handle) = self.monitor_worker_handle.take() {
            handle.await.map_err(|e| MonitorError::ShutdownError(e.to_string()))?;
        }

        // 3. Ledger, once no worker can write to it
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
