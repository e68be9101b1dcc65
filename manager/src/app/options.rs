//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::{DeploySettings, GitlabSettings, JenkinsSettings, Settings};
use crate::workers::pipeline;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Persist the store to the layout's snapshot file
    pub store_snapshot: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Pipeline worker options
    pub pipeline_worker: pipeline::Options,

    /// Run the start-up reconciliation
    pub enable_reconciler: bool,

    pub jenkins: JenkinsSettings,
    pub gitlab: GitlabSettings,
    pub deploy: DeploySettings,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.shutdown_timeout_secs),
            },
            layout,
            store_snapshot: settings.store_snapshot,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            pipeline_worker: pipeline::Options::default(),
            enable_reconciler: true,
            jenkins: settings.jenkins.clone(),
            gitlab: settings.gitlab.clone(),
            deploy: settings.deploy.clone(),
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

/// Lifecycle options for the manager
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 38012,
        }
    }
}
