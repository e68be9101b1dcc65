//! Fleet node models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node registered through keepalive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub cpu_arch: String,
    pub os_release: String,
    pub node_name: String,
    pub bin_proxy_version: String,
    pub last_seen: DateTime<Utc>,
}

/// Checksum of a binary installed on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBin {
    pub sha256sum: String,
    pub updated_at: DateTime<Utc>,
}

/// Rollout progress of a binary on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub node_name: String,
    pub bin_name: String,
    pub target_hash: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}
