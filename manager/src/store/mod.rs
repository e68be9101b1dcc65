//! Document storage for releases, gray configs, device state, canaries,
//! managed configs and projects.
//!
//! The traits are split per collection so services only depend on what they
//! touch. [`MemoryStore`] implements all of them.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::ManagerError;
use crate::models::config::{ConfigHistory, ConfigItem};
use crate::models::gray::{DeviceFilter, DeviceGrayStatus, GrayConfigStatus, GrayReleaseConfig};
use crate::models::project::Project;
use crate::models::release::{Release, ReleaseFilter, ReleaseStatus};
use crate::models::rollout::{CanaryRelease, ConfigDeployment};

/// In-place `$set` style mutation of a release
pub type ReleasePatch = Box<dyn FnOnce(&mut Release) + Send>;

/// Mutation applied to every matching device
pub type DevicePatch = Box<dyn Fn(&mut DeviceGrayStatus) + Send + Sync>;

pub type GrayConfigPatch = Box<dyn FnOnce(&mut GrayReleaseConfig) + Send>;

pub type CanaryPatch = Box<dyn FnOnce(&mut CanaryRelease) + Send>;

pub type ProjectPatch = Box<dyn FnOnce(&mut Project) + Send>;

#[derive(Debug, Clone, Default)]
pub struct GrayConfigFilter {
    pub project_id: Option<String>,
    pub environment: Option<String>,
    pub status: Option<GrayConfigStatus>,
}

impl GrayConfigFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty values are treated as "any"
    pub fn scope(mut self, project_id: &str, environment: &str) -> Self {
        if !project_id.is_empty() {
            self.project_id = Some(project_id.to_string());
        }
        if !environment.is_empty() {
            self.environment = Some(environment.to_string());
        }
        self
    }

    pub fn status(mut self, status: GrayConfigStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, config: &GrayReleaseConfig) -> bool {
        self.project_id
            .as_deref()
            .map_or(true, |p| p == config.project_id)
            && self
                .environment
                .as_deref()
                .map_or(true, |e| e == config.environment)
            && self.status.map_or(true, |s| s == config.status)
    }
}

#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Insert a new release, returns its id
    async fn insert_release(&self, release: &Release) -> Result<String, ManagerError>;

    async fn get_release(&self, id: &str) -> Result<Option<Release>, ManagerError>;

    /// Releases matching `filter`, newest first
    async fn list_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, ManagerError>;

    /// Apply `patch` unconditionally
    async fn update_release(&self, id: &str, patch: ReleasePatch) -> Result<Release, ManagerError>;

    /// Apply `patch` only while the stored status equals `expected`.
    ///
    /// Returns `None` when the status moved on, without touching the document.
    async fn update_release_if_status(
        &self,
        id: &str,
        expected: ReleaseStatus,
        patch: ReleasePatch,
    ) -> Result<Option<Release>, ManagerError>;

    /// Remove every listed release, unknown ids are skipped. Returns the count.
    async fn delete_releases(&self, ids: &[String]) -> Result<usize, ManagerError>;
}

#[async_trait]
pub trait GrayStore: Send + Sync {
    async fn insert_gray_config(&self, config: &GrayReleaseConfig) -> Result<String, ManagerError>;

    async fn get_gray_config(&self, id: &str) -> Result<Option<GrayReleaseConfig>, ManagerError>;

    /// Configs matching `filter`, newest first
    async fn list_gray_configs(
        &self,
        filter: &GrayConfigFilter,
    ) -> Result<Vec<GrayReleaseConfig>, ManagerError>;

    async fn update_gray_config(
        &self,
        id: &str,
        patch: GrayConfigPatch,
    ) -> Result<GrayReleaseConfig, ManagerError>;

    /// Returns whether a config was removed
    async fn delete_gray_config(&self, id: &str) -> Result<bool, ManagerError>;

    /// Move every active config in scope to `completed`, returns the count
    async fn complete_active_configs(
        &self,
        project_id: &str,
        environment: &str,
        at: DateTime<Utc>,
    ) -> Result<usize, ManagerError>;

    /// Insert or replace keyed by (nodeId, projectId, environment)
    async fn upsert_device_status(&self, device: &DeviceGrayStatus) -> Result<(), ManagerError>;

    async fn list_device_statuses(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Vec<DeviceGrayStatus>, ManagerError>;

    /// Apply `patch` to every matching device, returns the count
    async fn update_device_statuses(
        &self,
        filter: &DeviceFilter,
        patch: DevicePatch,
    ) -> Result<usize, ManagerError>;
}

#[async_trait]
pub trait RolloutStore: Send + Sync {
    async fn insert_canary(&self, canary: &CanaryRelease) -> Result<String, ManagerError>;

    async fn get_canary(&self, id: &str) -> Result<Option<CanaryRelease>, ManagerError>;

    /// Canaries in scope, newest first. Empty values match anything.
    async fn list_canaries(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<CanaryRelease>, ManagerError>;

    async fn update_canary(&self, id: &str, patch: CanaryPatch)
        -> Result<CanaryRelease, ManagerError>;

    /// Insert or replace keyed by (nodeId, historyId)
    async fn upsert_config_deployment(
        &self,
        deployment: &ConfigDeployment,
    ) -> Result<(), ManagerError>;

    async fn list_config_deployments(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<ConfigDeployment>, ManagerError>;

    /// Deployment count per version, sorted by version
    async fn count_deployments_by_version(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<(String, usize)>, ManagerError>;
}

/// Config items and their append-only history.
///
/// Every write stores the item change and its history entry together.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn insert_config(
        &self,
        config: &ConfigItem,
        history: &ConfigHistory,
    ) -> Result<(), ManagerError>;

    async fn get_config(&self, id: &str) -> Result<Option<ConfigItem>, ManagerError>;

    /// Configs in scope, newest first. Empty values match anything.
    async fn list_configs(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<ConfigItem>, ManagerError>;

    /// Replace a stored config, `NotFound` when it is missing
    async fn replace_config(
        &self,
        config: &ConfigItem,
        history: &ConfigHistory,
    ) -> Result<(), ManagerError>;

    /// Remove a stored config, `NotFound` when it is missing
    async fn delete_config(&self, id: &str, history: &ConfigHistory) -> Result<(), ManagerError>;

    async fn get_config_history(&self, id: &str) -> Result<Option<ConfigHistory>, ManagerError>;

    /// History of one config, newest first
    async fn list_config_history(&self, config_id: &str)
        -> Result<Vec<ConfigHistory>, ManagerError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, project: &Project) -> Result<String, ManagerError>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>, ManagerError>;

    /// Every project, newest first
    async fn list_projects(&self) -> Result<Vec<Project>, ManagerError>;

    async fn update_project(&self, id: &str, patch: ProjectPatch)
        -> Result<Project, ManagerError>;

    /// Returns whether a project was removed
    async fn delete_project(&self, id: &str) -> Result<bool, ManagerError>;
}
