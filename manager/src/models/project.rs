//! Project catalog models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repository_url: String,
    #[serde(default)]
    pub github_url: String,
    #[serde(default)]
    pub build_tool: String,
    #[serde(default)]
    pub deployment_type: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a client sets on create or update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repository_url: String,
    #[serde(default)]
    pub github_url: String,
    #[serde(default)]
    pub build_tool: String,
    #[serde(default)]
    pub deployment_type: String,
}

impl Project {
    /// Overwrite every editable field from `input`
    pub fn apply(&mut self, input: ProjectInput, at: DateTime<Utc>) {
        self.name = input.name;
        self.code = input.code;
        self.description = input.description;
        self.owner = input.owner;
        self.repository_url = input.repository_url;
        self.github_url = input.github_url;
        self.build_tool = input.build_tool;
        self.deployment_type = input.deployment_type;
        self.updated_at = at;
    }
}
