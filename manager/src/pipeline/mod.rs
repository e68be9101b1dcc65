pub mod build;
pub mod coordinator;
pub mod gitlab;
pub mod jenkins;
pub mod vcs;

pub use build::{BuildResult, BuildSystem};
pub use coordinator::{BuildCoordinator, PipelineOptions, PipelineOutput, PipelineProgress};
pub use vcs::VersionControl;
