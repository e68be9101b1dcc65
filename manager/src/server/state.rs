//! Server state

use std::sync::Arc;

use crate::analyzer::VersionAnalyzer;
use crate::catalog::{ConfigService, ProjectService};
use crate::filesys::dir::Dir;
use crate::fleet::NodeRegistry;
use crate::gray::GrayEngine;
use crate::pipeline::VersionControl;
use crate::release::ReleaseManager;
use crate::rollout::CanaryExecutor;

/// Where the published binary version is tracked
#[derive(Debug, Clone)]
pub struct BinSource {
    pub version_file: String,
    pub mainline: String,
    /// Staged artifacts, served by name
    pub downloads: Dir,
}

/// Server state shared across handlers
pub struct ServerState {
    pub releases: ReleaseManager,
    pub gray: Arc<GrayEngine>,
    pub canaries: Arc<CanaryExecutor>,
    pub analyzer: Arc<VersionAnalyzer>,
    pub configs: Arc<ConfigService>,
    pub projects: Arc<ProjectService>,
    pub registry: Arc<NodeRegistry>,
    pub vcs: Arc<dyn VersionControl>,
    pub bins: BinSource,
}
