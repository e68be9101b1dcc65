//! Jenkins JSON API models

use serde::{Deserialize, Serialize};

/// Queue item returned by `/queue/item/{id}/api/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: u64,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub why: Option<String>,
    /// Set once an executor picked the item up
    #[serde(default)]
    pub executable: Option<QueueExecutable>,
}

/// Build started from a queue item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueExecutable {
    pub number: u64,
    #[serde(default)]
    pub url: String,
}

/// Build returned by `/job/{job}/{number}/api/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub number: u64,
    #[serde(default)]
    pub queue_id: u64,
    #[serde(default)]
    pub building: bool,
    /// `SUCCESS`, `FAILURE`, `ABORTED`, ... ; absent while building
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// Archived build artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub file_name: String,
    pub relative_path: String,
}
