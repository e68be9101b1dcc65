//! Gray release, canary and version analysis endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use openapi_server::models::{
    ApiResponse, FullReleaseRequest, GrayCheckResponse, InconsistencyQuery, ScopeQuery,
};

use crate::analyzer::{DriftPolicy, VersionInconsistency, VersionStat};
use crate::errors::ManagerError;
use crate::gray::FullReleaseSummary;
use crate::models::gray::{DeviceGrayStatus, GrayConfigInput, GrayReleaseConfig, GrayReleaseStats};
use crate::models::rollout::{CanaryInput, CanaryRelease};
use crate::server::handlers::{ok, ApiResult};
use crate::server::state::ServerState;

// ================================ GRAY CONFIGS ================================== //

pub async fn list_gray_releases(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Vec<GrayReleaseConfig>> {
    ok(state
        .gray
        .list_configs(&scope.project_id, &scope.environment)
        .await?)
}

pub async fn create_gray_release(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<GrayConfigInput>,
) -> Result<(StatusCode, Json<ApiResponse<GrayReleaseConfig>>), ManagerError> {
    let config = state.gray.create_config(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(config))))
}

pub async fn get_gray_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<GrayReleaseConfig> {
    ok(state.gray.get_config(&id).await?)
}

pub async fn update_gray_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(input): Json<GrayConfigInput>,
) -> ApiResult<GrayReleaseConfig> {
    ok(state.gray.update_config(&id, input).await?)
}

pub async fn delete_gray_release(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ManagerError> {
    state.gray.delete_config(&id).await?;
    Ok(Json(ApiResponse::ok()))
}

pub async fn report_device_status(
    State(state): State<Arc<ServerState>>,
    Json(device): Json<DeviceGrayStatus>,
) -> ApiResult<DeviceGrayStatus> {
    ok(state.gray.report_device_status(device).await?)
}

pub async fn check_device(
    State(state): State<Arc<ServerState>>,
    Json(device): Json<DeviceGrayStatus>,
) -> ApiResult<GrayCheckResponse> {
    let version = state.gray.check_device(&device).await?;
    ok(GrayCheckResponse {
        matched: version.is_some(),
        version,
    })
}

pub async fn full_release(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FullReleaseRequest>,
) -> ApiResult<FullReleaseSummary> {
    ok(state
        .gray
        .full_release(
            &request.project_id,
            &request.environment,
            &request.version,
            &request.operator,
        )
        .await?)
}

pub async fn gray_stats(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Vec<GrayReleaseStats>> {
    ok(state
        .gray
        .device_stats(&scope.project_id, &scope.environment)
        .await?)
}

// ================================== CANARIES ==================================== //

pub async fn list_canaries(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Vec<CanaryRelease>> {
    ok(state
        .canaries
        .list(&scope.project_id, &scope.environment)
        .await?)
}

pub async fn create_canary(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<CanaryInput>,
) -> Result<(StatusCode, Json<ApiResponse<CanaryRelease>>), ManagerError> {
    let canary = state.canaries.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(canary))))
}

pub async fn get_canary(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<CanaryRelease> {
    ok(state.canaries.get(&id).await?)
}

pub async fn execute_canary(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<CanaryRelease> {
    ok(state.canaries.execute(&id).await?)
}

// ================================== VERSIONS ==================================== //

pub async fn version_stats(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Vec<VersionStat>> {
    ok(state
        .analyzer
        .get_version_stats(&scope.project_id, &scope.environment)
        .await?)
}

pub async fn version_inconsistencies(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<InconsistencyQuery>,
) -> ApiResult<Vec<VersionInconsistency>> {
    let policy = match query.policy.as_deref() {
        None | Some("") => DriftPolicy::default(),
        Some(policy) => policy.parse()?,
    };
    ok(state
        .analyzer
        .get_version_inconsistencies(&query.project_id, &query.environment, policy)
        .await?)
}
