//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::ManagerError;
use crate::release::PipelineJob;
use crate::server::serve::serve;
use crate::workers::{pipeline, reconciler};

/// Run the release manager until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ManagerError> {
    info!("Initializing release manager...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start release manager: {}", e);
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
) -> Result<Arc<AppState>, ManagerError> {
    let (app_state, pipeline_rx) = AppState::init(options).await?;
    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    // The worker has to drain the queue before the reconciler fills it
    init_pipeline_worker(
        app_state.clone(),
        pipeline_rx,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_reconciler {
        init_reconciler(app_state.clone(), shutdown_manager, shutdown_tx.subscribe())?;
    }

    init_server(
        options,
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await?;

    Ok(app_state)
}

fn init_pipeline_worker(
    app_state: Arc<AppState>,
    pipeline_rx: mpsc::Receiver<PipelineJob>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ManagerError> {
    info!("Initializing pipeline worker...");

    let coordinator = app_state.coordinator.clone();
    let releases = app_state.releases.clone();

    let pipeline_handle = tokio::spawn(async move {
        pipeline::run(
            coordinator,
            releases,
            pipeline_rx,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_pipeline_worker_handle(pipeline_handle)
}

fn init_reconciler(
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ManagerError> {
    info!("Initializing reconciler...");

    let releases = app_state.releases.clone();

    let reconciler_handle = tokio::spawn(async move {
        reconciler::run(
            releases,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_reconciler_handle(reconciler_handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ManagerError> {
    info!("Initializing HTTP server...");

    let server_state = app_state.server_state(options);

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
    server_handle: Option<JoinHandle<Result<(), ManagerError>>>,
    pipeline_worker_handle: Option<JoinHandle<()>>,
    reconciler_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            pipeline_worker_handle: None,
            reconciler_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), ManagerError> {
        if self.app_state.is_some() {
            return Err(ManagerError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_pipeline_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), ManagerError> {
        if self.pipeline_worker_handle.is_some() {
            return Err(ManagerError::ShutdownError("pipeline_handle already set".to_string()));
        }
        self.pipeline_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_reconciler_handle(&mut self, handle: JoinHandle<()>) -> Result<(), ManagerError> {
        if self.reconciler_handle.is_some() {
            return Err(ManagerError::ShutdownError("reconciler_handle already set".to_string()));
        }
        self.reconciler_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), ManagerError>>,
    ) -> Result<(), ManagerError> {
        if self.server_handle.is_some() {
            return Err(ManagerError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ManagerError> {
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

    async fn shutdown_impl(&mut self) -> Result<(), ManagerError> {
        info!("Shutting down release manager...");

        // 1. HTTP server, stops new jobs from being queued
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| ManagerError::ShutdownError(e.to_string()))??;
        }

        // 2. Reconciler
        if let Some(handle) = self.reconciler_handle.take() {
            handle
                .await
                .map_err(|e| ManagerError::ShutdownError(e.to_string()))?;
        }

        // 3. Pipeline worker
        if let Some(handle) = self.pipeline_worker_handle.take() {
            handle
                .await
                .map_err(|e| ManagerError::ShutdownError(e.to_string()))?;
        }

        // 4. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
