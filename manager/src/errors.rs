//! Error types for the release manager

use thiserror::Error;

/// Main error type for the release manager
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    UpstreamStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A state precondition does not hold, nothing was mutated
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Build {build_id} timed out after {elapsed_secs}s")]
    BuildTimeout { build_id: u64, elapsed_secs: i64 },

    #[error("Artifact not found: {0}")]
    ArtifactMissing(String),

    #[error("Version control error: {0}")]
    VcsError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ManagerError {
    /// Whether the error was caused by an external collaborator
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ManagerError::HttpError(_)
                | ManagerError::UpstreamStatus { .. }
                | ManagerError::BuildError(_)
                | ManagerError::BuildTimeout { .. }
                | ManagerError::ArtifactMissing(_)
                | ManagerError::VcsError(_)
        )
    }
}

impl From<anyhow::Error> for ManagerError {
    fn from(err: anyhow::Error) -> Self {
        ManagerError::Internal(err.to_string())
    }
}
