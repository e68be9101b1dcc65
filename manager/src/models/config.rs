//! Managed configuration items and their change history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One key/value configuration of a project in an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItem {
    pub id: String,
    pub project_id: String,
    pub key: String,
    pub value: String,
    pub environment: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of a config item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInput {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub description: String,
}

/// Who changed a config and why
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeAudit {
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

/// Immutable record of one change. Its id is the `historyId` canaries and
/// config deployments refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigHistory {
    pub id: String,
    pub config_id: String,
    pub project_id: String,
    pub key: String,
    pub old_value: String,
    pub new_value: String,
    pub change_type: ChangeType,
    pub reason: String,
    pub operator: String,
    pub created_at: DateTime<Utc>,
}

/// Side by side view of two history entries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryComparison {
    pub history1: ConfigHistory,
    pub history2: ConfigHistory,
    pub diff: HistoryDiff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDiff {
    pub same_key: bool,
    pub old_value: String,
    pub new_value1: String,
    pub new_value2: String,
}

impl HistoryComparison {
    pub fn new(history1: ConfigHistory, history2: ConfigHistory) -> Self {
        let diff = HistoryDiff {
            same_key: history1.key == history2.key,
            old_value: history1.old_value.clone(),
            new_value1: history1.new_value.clone(),
            new_value2: history2.new_value.clone(),
        };
        Self {
            history1,
            history2,
            diff,
        }
    }
}

/// Create or update payload, optionally proposing the change as a merge request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChangeRequest {
    pub config: ConfigInput,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "submitToGitLab")]
    pub submit_to_gitlab: bool,
}

impl ConfigChangeRequest {
    pub fn audit(&self) -> ChangeAudit {
        ChangeAudit {
            operator: self.operator.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Saved config plus the merge request opened for it, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChangeResult {
    pub config: ConfigItem,
    pub history_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mr_url: Option<String>,
}
