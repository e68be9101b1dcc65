//! Manager API models

use serde::{Deserialize, Serialize};

/// Response envelope, `code` is 0 on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
            data: None,
        }
    }
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub nodes_count: usize,
    /// Distinct binaries reported by nodes
    pub bins_count: usize,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Release creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseRequest {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scheduler: String,
}

/// Filters of the release list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseListQuery {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Release rollback request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    #[serde(default)]
    pub target_version: String,
    #[serde(default)]
    pub reason: String,
}

/// Query scoping a read to one project/environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub environment: String,
}

/// Query for version drift detection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InconsistencyQuery {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub environment: String,
    /// `major` or `major_minor`
    #[serde(default)]
    pub policy: Option<String>,
}

/// Full release request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullReleaseRequest {
    pub project_id: String,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub operator: String,
}

/// Gray rule check result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrayCheckResponse {
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Node keepalive registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveRequest {
    pub node_id: String,
    #[serde(default)]
    pub cpu_arch: String,
    #[serde(default)]
    pub os_release: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub bin_proxy_version: String,
}

/// Query selecting a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeQuery {
    pub node_id: String,
}

/// Binary checksum reported by a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinReportRequest {
    pub node_id: String,
    pub sha256sum: String,
}

/// Binary published for the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinVersionResponse {
    pub bin_name: String,
    pub version: String,
    pub sha256sum: String,
}

/// Rollout progress reported by a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub node_name: String,
    pub target_hash: String,
    pub status: String,
    #[serde(default)]
    pub processing_time: Option<u64>,
    #[serde(default)]
    pub release_id: Option<String>,
}

/// Path of one node's copy of a binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBinPath {
    pub bin_name: String,
    pub node_id: String,
}

/// Query of a binary download
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    #[serde(default)]
    pub release_id: Option<String>,
}

/// Query comparing two config history entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompareQuery {
    #[serde(default)]
    pub id1: String,
    #[serde(default)]
    pub id2: String,
}

/// Releases to delete in one call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    pub deleted: usize,
}
