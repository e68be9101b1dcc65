//! Build system abstraction

use async_trait::async_trait;
use openapi_client::models::jenkins::Artifact;

use crate::errors::ManagerError;

pub const RESULT_SUCCESS: &str = "SUCCESS";

/// Finished build as reported by the build system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Identifier returned when the build was submitted
    pub build_id: u64,
    /// Build number assigned by the executor, 0 when it never ran
    pub number: u64,
    pub url: String,
    pub result: Option<String>,
    pub artifacts: Vec<Artifact>,
}

impl BuildResult {
    /// The packaged `.tar.gz` artifact, if any
    pub fn tarball(&self) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.file_name.ends_with(".tar.gz"))
    }

    pub fn has_readme(&self) -> bool {
        self.artifacts.iter().any(|a| a.file_name.ends_with("README"))
    }

    /// Successful builds report `SUCCESS` and ship both a tarball and a README
    pub fn is_success(&self) -> bool {
        self.result.as_deref() == Some(RESULT_SUCCESS) && self.tarball().is_some() && self.has_readme()
    }

    /// Why the build does not count as a success
    pub fn failure_reason(&self) -> String {
        match self.result.as_deref() {
            Some(RESULT_SUCCESS) if self.tarball().is_none() => {
                format!("build {} produced no .tar.gz artifact", self.build_id)
            }
            Some(RESULT_SUCCESS) => format!("build {} produced no README", self.build_id),
            Some(other) => format!("build {} finished with result {}", self.build_id, other),
            None => format!("build {} finished without a result", self.build_id),
        }
    }

    pub fn artifact(&self, file_name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.file_name == file_name)
    }
}

/// External build job runner
#[async_trait]
pub trait BuildSystem: Send + Sync {
    /// Submit `job` with parameters, returns an opaque build identifier
    async fn start_build(&self, job: &str, params: &[(String, String)])
        -> Result<u64, ManagerError>;

    /// `None` while the build is queued or running
    async fn poll_build(&self, job: &str, build_id: u64)
        -> Result<Option<BuildResult>, ManagerError>;

    async fn fetch_artifact(
        &self,
        job: &str,
        build: &BuildResult,
        artifact: &Artifact,
    ) -> Result<Vec<u8>, ManagerError>;
}
