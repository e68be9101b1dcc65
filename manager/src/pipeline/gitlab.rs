//! GitLab REST v4 client

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use openapi_client::models::gitlab::{
    Branch, CommitFileRequest, CommitFileResponse, CreateBranchRequest, CreateMergeRequest,
    MergeRequest, RepositoryFile,
};
use tracing::info;

use crate::errors::ManagerError;
use crate::http::client::{Auth, HttpClient};
use crate::pipeline::vcs::VersionControl;
use crate::storage::settings::GitlabSettings;

pub struct GitlabClient {
    http: HttpClient,
    /// Url-encoded project id or path
    project: String,
}

fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

impl GitlabClient {
    pub fn new(http: HttpClient, project_id: &str) -> Self {
        Self {
            http,
            project: encode_segment(project_id),
        }
    }

    pub fn from_settings(settings: &GitlabSettings) -> Result<Self, ManagerError> {
        let http = HttpClient::new(
            "gitlab",
            &settings.url,
            Auth::PrivateToken(settings.private_token.clone()),
        )?;
        Ok(Self::new(http, &settings.project_id))
    }

    fn project_path(&self, rest: &str) -> String {
        format!("/projects/{}{}", self.project, rest)
    }
}

fn vcs_error(context: &str, err: ManagerError) -> ManagerError {
    ManagerError::VcsError(format!("{}: {}", context, err))
}

#[async_trait]
impl VersionControl for GitlabClient {
    async fn create_branch(&self, name: &str, from: &str) -> Result<(), ManagerError> {
        let body = CreateBranchRequest {
            branch: name.to_string(),
            git_ref: from.to_string(),
        };
        let branch: Branch = self
            .http
            .post(&self.project_path("/repository/branches"), &body)
            .await
            .map_err(|e| vcs_error(&format!("create branch {}", name), e))?;
        info!("Created branch {} from {}", branch.name, from);
        Ok(())
    }

    async fn read_file(&self, path: &str, git_ref: &str) -> Result<String, ManagerError> {
        let file: RepositoryFile = self
            .http
            .get_with_query(
                &self.project_path(&format!("/repository/files/{}", encode_segment(path))),
                &[("ref", git_ref)],
            )
            .await
            .map_err(|e| vcs_error(&format!("read {}@{}", path, git_ref), e))?;

        let compact: String = file.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ManagerError::VcsError(format!("{} is not valid base64: {}", path, e)))?;
        String::from_utf8(bytes)
            .map_err(|e| ManagerError::VcsError(format!("{} is not valid UTF-8: {}", path, e)))
    }

    async fn write_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), ManagerError> {
        let body = CommitFileRequest {
            branch: branch.to_string(),
            content: content.to_string(),
            commit_message: commit_message.to_string(),
        };
        let _: CommitFileResponse = self
            .http
            .put(
                &self.project_path(&format!("/repository/files/{}", encode_segment(path))),
                &body,
            )
            .await
            .map_err(|e| vcs_error(&format!("write {} on {}", path, branch), e))?;
        Ok(())
    }

    async fn open_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest, ManagerError> {
        let body = CreateMergeRequest {
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        };
        let mr: MergeRequest = self
            .http
            .post(&self.project_path("/merge_requests"), &body)
            .await
            .map_err(|e| vcs_error("open merge request", e))?;
        info!("Opened merge request !{}: {}", mr.iid, mr.web_url);
        Ok(mr)
    }

    async fn list_merge_requests(&self, state: &str) -> Result<Vec<MergeRequest>, ManagerError> {
        self.http
            .get_with_query(&self.project_path("/merge_requests"), &[("state", state)])
            .await
            .map_err(|e| vcs_error(&format!("list {} merge requests", state), e))
    }
}
