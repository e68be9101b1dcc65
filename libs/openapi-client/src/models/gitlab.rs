//! GitLab REST v4 models

use serde::{Deserialize, Serialize};

/// Body for creating a branch from `git_ref`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBranchRequest {
    pub branch: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Branch creation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub commit: Option<Commit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
}

/// Repository file, `content` is base64 encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryFile {
    pub file_name: String,
    pub file_path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

/// Body for creating or updating a repository file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFileRequest {
    pub branch: String,
    pub content: String,
    pub commit_message: String,
}

/// Response of a file create/update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFileResponse {
    pub file_path: String,
    pub branch: String,
}

/// Body for opening a merge request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
}

/// Merge request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    /// `opened`, `closed`, `merged`, `locked`
    pub state: String,
    pub web_url: String,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
}
