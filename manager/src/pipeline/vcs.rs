//! Version control abstraction

use async_trait::async_trait;
use openapi_client::models::gitlab::MergeRequest;

use crate::errors::ManagerError;

/// Repository hosting the tracked version file
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn create_branch(&self, name: &str, from: &str) -> Result<(), ManagerError>;

    /// Decoded content of `path` at `git_ref`
    async fn read_file(&self, path: &str, git_ref: &str) -> Result<String, ManagerError>;

    async fn write_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), ManagerError>;

    async fn open_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest, ManagerError>;

    /// Merge requests in `state` (`opened`, `merged`, ...)
    async fn list_merge_requests(&self, state: &str) -> Result<Vec<MergeRequest>, ManagerError>;
}
