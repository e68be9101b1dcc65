//! HTTP request handlers

pub mod configs;
pub mod devices;
pub mod gray;
pub mod releases;

use std::sync::Arc;

use axum::{extract::State, Json};
use openapi_server::models::{ApiResponse, HealthResponse, VersionResponse};

use crate::errors::ManagerError;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Handler result wrapped in the response envelope
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ManagerError>;

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "graymgr".to_string(),
        version: version_info().version,
        nodes_count: state.registry.nodes_count(),
        bins_count: state.registry.bins_count(),
    })
}

/// Version handler
pub async fn version_handler() -> Json<VersionResponse> {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}
