//! Endpoints polled by fleet nodes: keepalive, binaries, progress, downloads

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use openapi_server::models::{
    ApiResponse, BinReportRequest, BinVersionResponse, DownloadQuery, KeepaliveRequest,
    NodeBinPath, NodeQuery, ProgressRequest,
};
use tracing::info;

use crate::errors::ManagerError;
use crate::models::node::{NodeBin, NodeInfo, ProgressRecord};
use crate::pipeline::VersionControl;
use crate::server::handlers::{ok, ApiResult};
use crate::server::state::{BinSource, ServerState};
use crate::utils::sha256_hash;

pub async fn get_keepalive(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<NodeQuery>,
) -> ApiResult<NodeInfo> {
    let node = state
        .registry
        .get_node(&query.node_id)
        .ok_or_else(|| ManagerError::NotFound(format!("node {}", query.node_id)))?;
    ok(node)
}

pub async fn post_keepalive(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<KeepaliveRequest>,
) -> Result<(StatusCode, Json<ApiResponse<NodeInfo>>), ManagerError> {
    if request.node_id.trim().is_empty() {
        return Err(ManagerError::ValidationError("node_id is required".to_string()));
    }
    let node = state.registry.register_node(
        &request.node_id,
        &request.cpu_arch,
        &request.os_release,
        &request.node_name,
        &request.bin_proxy_version,
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(node))))
}

/// Version currently published on the mainline and the checksum of its staged file
pub async fn published_bin(
    vcs: &dyn VersionControl,
    source: &BinSource,
    bin_name: &str,
) -> Result<BinVersionResponse, ManagerError> {
    let content = vcs.read_file(&source.version_file, &source.mainline).await?;
    let doc: serde_json::Value = serde_json::from_str(&content)?;
    let version = doc
        .get("version")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ManagerError::VcsError(format!("{} has no version field", source.version_file))
        })?
        .to_string();

    let file = source.downloads.file(&version);
    if !file.exists().await {
        return Err(ManagerError::NotFound(format!(
            "version file {} not in downloads",
            version
        )));
    }
    let bytes = file.read_bytes().await?;

    Ok(BinVersionResponse {
        bin_name: bin_name.to_string(),
        version,
        sha256sum: sha256_hash(&bytes),
    })
}

pub async fn get_bin(
    State(state): State<Arc<ServerState>>,
    Path(bin_name): Path<String>,
) -> ApiResult<BinVersionResponse> {
    ok(published_bin(state.vcs.as_ref(), &state.bins, &bin_name).await?)
}

pub async fn post_bin(
    State(state): State<Arc<ServerState>>,
    Path(bin_name): Path<String>,
    Json(request): Json<BinReportRequest>,
) -> ApiResult<NodeBin> {
    if request.node_id.trim().is_empty() || request.sha256sum.trim().is_empty() {
        return Err(ManagerError::ValidationError(
            "node_id and sha256sum are required".to_string(),
        ));
    }
    ok(state
        .registry
        .record_bin(&request.node_id, &bin_name, &request.sha256sum))
}

/// Checksum a node last reported for a binary
pub async fn get_node_bin(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<NodeBinPath>,
) -> ApiResult<NodeBin> {
    let bin = state
        .registry
        .node_bin(&path.node_id, &path.bin_name)
        .ok_or_else(|| {
            ManagerError::NotFound(format!("{} on node {}", path.bin_name, path.node_id))
        })?;
    ok(bin)
}

/// Latest progress per node for a binary
pub async fn get_progress(
    State(state): State<Arc<ServerState>>,
    Path(bin_name): Path<String>,
) -> ApiResult<Vec<ProgressRecord>> {
    ok(state.registry.progress_for(&bin_name))
}

/// Progress tied to a release is only accepted while that release is approved
pub async fn post_progress(
    State(state): State<Arc<ServerState>>,
    Path(bin_name): Path<String>,
    Json(request): Json<ProgressRequest>,
) -> ApiResult<ProgressRecord> {
    for (field, value) in [
        ("nodeName", &request.node_name),
        ("targetHash", &request.target_hash),
        ("status", &request.status),
    ] {
        if value.trim().is_empty() {
            return Err(ManagerError::ValidationError(format!("{} is required", field)));
        }
    }

    let release_id = request.release_id.filter(|id| !id.is_empty());
    if let Some(id) = &release_id {
        state.releases.ensure_servable(id).await?;
    }

    let record = ProgressRecord {
        node_name: request.node_name,
        bin_name,
        target_hash: request.target_hash,
        status: request.status,
        processing_time: request.processing_time,
        release_id,
        updated_at: Utc::now(),
    };
    state.registry.record_progress(record.clone());
    ok(record)
}

fn validate_file_name(name: &str) -> Result<(), ManagerError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ManagerError::ValidationError(format!(
            "invalid file name: {}",
            name
        )));
    }
    Ok(())
}

/// Serve a staged artifact, gated on the release when one is named
pub async fn download(
    State(state): State<Arc<ServerState>>,
    Path(file_name): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ManagerError> {
    validate_file_name(&file_name)?;
    if let Some(id) = query.release_id.as_deref().filter(|id| !id.is_empty()) {
        state.releases.ensure_servable(id).await?;
    }

    let file = state.bins.downloads.file(&file_name);
    if !file.exists().await {
        return Err(ManagerError::NotFound(format!("file {}", file_name)));
    }
    let bytes = file.read_bytes().await?;
    info!("Serving {} ({} bytes)", file_name, bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}
