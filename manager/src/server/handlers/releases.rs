//! Release lifecycle endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use openapi_server::models::{
    ApiResponse, BatchDeleteRequest, BatchDeleteResponse, CreateReleaseRequest, ReleaseListQuery,
    RollbackRequest,
};

use crate::errors::ManagerError;
use crate::models::release::{Release, ReleaseFilter, ReleaseStatus};
use crate::server::handlers::{ok, ApiResult};
use crate::server::state::ServerState;

pub async fn list_releases(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ReleaseListQuery>,
) -> ApiResult<Vec<Release>> {
    let mut filter = ReleaseFilter::new();
    if let Some(project_id) = query.project_id.filter(|p| !p.is_empty()) {
        filter = filter.project(project_id);
    }
    if let Some(environment) = query.environment.filter(|e| !e.is_empty()) {
        filter = filter.environment(environment);
    }
    if let Some(status) = query.status.filter(|s| !s.is_empty()) {
        let status = status
            .parse::<ReleaseStatus>()
            .map_err(ManagerError::ValidationError)?;
        filter = filter.status(status);
    }
    ok(state.releases.list(&filter).await?)
}

pub async fn create_release(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateReleaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Release>>), ManagerError> {
    let release = state.releases.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(release))))
}

pub async fn get_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Release> {
    ok(state.releases.get(&id).await?)
}

pub async fn approve_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Release> {
    ok(state.releases.approve(&id).await?)
}

pub async fn deploy_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Release> {
    ok(state.releases.deploy(&id).await?)
}

pub async fn complete_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Release> {
    ok(state.releases.complete(&id).await?)
}

pub async fn rollback_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<Release> {
    ok(state
        .releases
        .rollback(&id, request.target_version, request.reason)
        .await?)
}

pub async fn batch_delete_releases(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    let deleted = state.releases.batch_delete(&request.ids).await?;
    ok(BatchDeleteResponse { deleted })
}
