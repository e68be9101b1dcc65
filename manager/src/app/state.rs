//! Application state management

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::analyzer::VersionAnalyzer;
use crate::catalog::{ConfigService, ProjectService};
use crate::app::options::AppOptions;
use crate::errors::ManagerError;
use crate::fleet::NodeRegistry;
use crate::gray::GrayEngine;
use crate::pipeline::gitlab::GitlabClient;
use crate::pipeline::jenkins::JenkinsClient;
use crate::pipeline::{BuildCoordinator, BuildSystem, PipelineOptions, VersionControl};
use crate::release::{PipelineJob, ReleaseManager};
use crate::rollout::CanaryExecutor;
use crate::server::state::{BinSource, ServerState};
use crate::store::MemoryStore;

/// Main application state
pub struct AppState {
    /// Document store shared by every service
    pub store: Arc<MemoryStore>,

    pub releases: ReleaseManager,
    pub coordinator: Arc<BuildCoordinator>,
    pub vcs: Arc<dyn VersionControl>,
    pub gray: Arc<GrayEngine>,
    pub canaries: Arc<CanaryExecutor>,
    pub analyzer: Arc<VersionAnalyzer>,
    pub configs: Arc<ConfigService>,
    pub projects: Arc<ProjectService>,
    pub registry: Arc<NodeRegistry>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Returns the receiving end of the pipeline queue for the pipeline worker.
    pub async fn init(
        options: &AppOptions,
    ) -> Result<(Self, mpsc::Receiver<PipelineJob>), ManagerError> {
        info!("Initializing application state...");

        options.layout.setup().await?;

        let store = if options.store_snapshot {
            Arc::new(MemoryStore::with_snapshot(options.layout.store_file()).await?)
        } else {
            Arc::new(MemoryStore::new())
        };

        let build: Arc<dyn BuildSystem> = Arc::new(JenkinsClient::from_settings(&options.jenkins)?);
        let vcs: Arc<dyn VersionControl> = Arc::new(GitlabClient::from_settings(&options.gitlab)?);

        Ok(Self::assemble(store, build, vcs, options))
    }

    /// Wire the services around already-built collaborators
    pub fn assemble(
        store: Arc<MemoryStore>,
        build: Arc<dyn BuildSystem>,
        vcs: Arc<dyn VersionControl>,
        options: &AppOptions,
    ) -> (Self, mpsc::Receiver<PipelineJob>) {
        let (pipeline_tx, pipeline_rx) = mpsc::channel(options.pipeline_worker.queue_capacity);

        let releases = ReleaseManager::new(store.clone(), pipeline_tx, options.deploy.completion);
        let coordinator = Arc::new(BuildCoordinator::new(
            build,
            vcs.clone(),
            PipelineOptions::from_settings(
                &options.jenkins,
                &options.gitlab,
                options.layout.downloads_dir(),
            ),
        ));

        let configs = Arc::new(ConfigService::new(
            store.clone(),
            vcs.clone(),
            options.gitlab.mainline.clone(),
        ));

        let state = Self {
            releases,
            coordinator,
            vcs,
            gray: Arc::new(GrayEngine::new(store.clone())),
            canaries: Arc::new(CanaryExecutor::new(store.clone(), store.clone())),
            analyzer: Arc::new(VersionAnalyzer::new(store.clone())),
            configs,
            projects: Arc::new(ProjectService::new(store.clone())),
            registry: Arc::new(NodeRegistry::new()),
            store,
        };
        (state, pipeline_rx)
    }

    /// State handed to the HTTP handlers
    pub fn server_state(&self, options: &AppOptions) -> ServerState {
        ServerState {
            releases: self.releases.clone(),
            gray: self.gray.clone(),
            canaries: self.canaries.clone(),
            analyzer: self.analyzer.clone(),
            configs: self.configs.clone(),
            projects: self.projects.clone(),
            registry: self.registry.clone(),
            vcs: self.vcs.clone(),
            bins: BinSource {
                version_file: options.gitlab.version_file.clone(),
                mainline: options.gitlab.mainline.clone(),
                downloads: options.layout.downloads_dir(),
            },
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), ManagerError> {
        info!("Shutting down application state...");
        Ok(())
    }
}
