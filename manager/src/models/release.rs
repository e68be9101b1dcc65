//! Release models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    PendingApproval,
    Approved,
    Deploying,
    Completed,
    RolledBack,
}

impl ReleaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReleaseStatus::Completed | ReleaseStatus::RolledBack)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::PendingApproval => "pending_approval",
            ReleaseStatus::Approved => "approved",
            ReleaseStatus::Deploying => "deploying",
            ReleaseStatus::Completed => "completed",
            ReleaseStatus::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_approval" => Ok(ReleaseStatus::PendingApproval),
            "approved" => Ok(ReleaseStatus::Approved),
            "deploying" => Ok(ReleaseStatus::Deploying),
            "completed" => Ok(ReleaseStatus::Completed),
            "rolled_back" => Ok(ReleaseStatus::RolledBack),
            other => Err(format!("unknown release status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Rolling,
    BlueGreen,
    Canary,
    AllAtOnce,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rolling" => Ok(Strategy::Rolling),
            "blue_green" => Ok(Strategy::BlueGreen),
            "canary" => Ok(Strategy::Canary),
            "all_at_once" => Ok(Strategy::AllAtOnce),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Progress of the background build-and-publish job of a release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Queued,
    Building,
    Publishing,
    Succeeded,
    Failed,
}

impl PipelineState {
    /// Whether the job still has work to do
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PipelineState::Queued | PipelineState::Building | PipelineState::Publishing
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRecord {
    pub state: PipelineState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackInfo {
    pub target_version: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// A versioned deployment attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub application_id: String,
    pub version: String,
    pub environment: String,
    #[serde(default)]
    pub strategy: Strategy,
    pub status: ReleaseStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scheduler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab_pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tar_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackInfo>,
    #[serde(default)]
    pub pipeline: PipelineRecord,
}

/// Filter over the release collection, unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct ReleaseFilter {
    pub project_id: Option<String>,
    pub environment: Option<String>,
    pub status: Option<ReleaseStatus>,
}

impl ReleaseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn status(mut self, status: ReleaseStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, release: &Release) -> bool {
        self.project_id
            .as_deref()
            .map_or(true, |p| p == release.project_id)
            && self
                .environment
                .as_deref()
                .map_or(true, |e| e == release.environment)
            && self.status.map_or(true, |s| s == release.status)
    }
}
