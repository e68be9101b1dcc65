//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::ManagerError;
use crate::server::handlers::{
    configs, devices, gray, health_handler, releases, version_handler,
};
use crate::server::state::ServerState;

/// All routes under `/api/v1`
pub fn router(state: Arc<ServerState>) -> Router {
    let api = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Releases
        .route(
            "/releases",
            get(releases::list_releases).post(releases::create_release),
        )
        .route("/releases/batch-delete", post(releases::batch_delete_releases))
        .route("/releases/{id}", get(releases::get_release))
        .route("/releases/{id}/approve", post(releases::approve_release))
        .route("/releases/{id}/deploy", post(releases::deploy_release))
        .route("/releases/{id}/complete", post(releases::complete_release))
        .route("/releases/{id}/rollback", post(releases::rollback_release))
        // Gray releases
        .route(
            "/gray-releases",
            get(gray::list_gray_releases).post(gray::create_gray_release),
        )
        .route("/gray-releases/device-status", post(gray::report_device_status))
        .route("/gray-releases/check", post(gray::check_device))
        .route("/gray-releases/full-release", post(gray::full_release))
        .route("/gray-releases/stats", get(gray::gray_stats))
        .route(
            "/gray-releases/{id}",
            get(gray::get_gray_release)
                .put(gray::update_gray_release)
                .delete(gray::delete_gray_release),
        )
        // Canaries
        .route(
            "/canary-releases",
            get(gray::list_canaries).post(gray::create_canary),
        )
        .route("/canary-releases/{id}", get(gray::get_canary))
        .route("/canary-releases/{id}/execute", post(gray::execute_canary))
        // Config management
        .route(
            "/configs",
            get(configs::list_configs).post(configs::create_config),
        )
        .route("/configs/compare", get(configs::compare_history))
        .route(
            "/configs/{id}",
            get(configs::get_config)
                .put(configs::update_config)
                .delete(configs::delete_config),
        )
        .route("/configs/{id}/history", get(configs::config_history))
        // Projects
        .route(
            "/projects",
            get(configs::list_projects).post(configs::create_project),
        )
        .route(
            "/projects/{id}",
            get(configs::get_project)
                .put(configs::update_project)
                .delete(configs::delete_project),
        )
        // Version analysis
        .route("/versions/stats", get(gray::version_stats))
        .route("/versions/inconsistencies", get(gray::version_inconsistencies))
        // Devices
        .route(
            "/keepalive",
            get(devices::get_keepalive).post(devices::post_keepalive),
        )
        .route(
            "/bins/{bin_name}",
            get(devices::get_bin).post(devices::post_bin),
        )
        .route(
            "/bins/{bin_name}/progress",
            get(devices::get_progress).post(devices::post_progress),
        )
        .route("/bins/{bin_name}/nodes/{node_id}", get(devices::get_node_bin))
        .route("/download/{file_name}", get(devices::download));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ManagerError>>, ManagerError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ManagerError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ManagerError::ServerError(e.to_string()))
    });

    Ok(handle)
}
