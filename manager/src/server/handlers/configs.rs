//! Config management and project catalog endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use openapi_server::models::{ApiResponse, CompareQuery, ScopeQuery};

use crate::errors::ManagerError;
use crate::models::config::{
    ChangeAudit, ConfigChangeRequest, ConfigChangeResult, ConfigHistory, ConfigItem,
    HistoryComparison,
};
use crate::models::project::{Project, ProjectInput};
use crate::server::handlers::{ok, ApiResult};
use crate::server::state::ServerState;

// ================================== CONFIGS ===================================== //

pub async fn list_configs(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Vec<ConfigItem>> {
    ok(state
        .configs
        .list(&scope.project_id, &scope.environment)
        .await?)
}

pub async fn create_config(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ConfigChangeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConfigChangeResult>>), ManagerError> {
    let result = state.configs.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}

pub async fn get_config(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<ConfigItem> {
    ok(state.configs.get(&id).await?)
}

pub async fn update_config(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<ConfigChangeRequest>,
) -> ApiResult<ConfigChangeResult> {
    ok(state.configs.update(&id, request).await?)
}

pub async fn delete_config(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(audit): Json<ChangeAudit>,
) -> ApiResult<ConfigHistory> {
    ok(state.configs.delete(&id, audit).await?)
}

pub async fn config_history(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConfigHistory>> {
    ok(state.configs.history(&id).await?)
}

pub async fn compare_history(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<HistoryComparison> {
    ok(state.configs.compare(&query.id1, &query.id2).await?)
}

// ================================== PROJECTS ==================================== //

pub async fn list_projects(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Project>> {
    ok(state.projects.list().await?)
}

pub async fn create_project(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<ApiResponse<Project>>), ManagerError> {
    let project = state.projects.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(project))))
}

pub async fn get_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<Project> {
    ok(state.projects.get(&id).await?)
}

pub async fn update_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(input): Json<ProjectInput>,
) -> ApiResult<Project> {
    ok(state.projects.update(&id, input).await?)
}

pub async fn delete_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ManagerError> {
    state.projects.delete(&id).await?;
    Ok(Json(ApiResponse::ok()))
}
