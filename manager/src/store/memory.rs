//! In-memory document store with an optional JSON snapshot on disk.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::ManagerError;
use crate::filesys::file::File;
use crate::models::config::{ConfigHistory, ConfigItem};
use crate::models::gray::{DeviceFilter, DeviceGrayStatus, GrayConfigStatus, GrayReleaseConfig};
use crate::models::project::Project;
use crate::models::release::{Release, ReleaseFilter, ReleaseStatus};
use crate::models::rollout::{CanaryRelease, ConfigDeployment};

use super::{
    CanaryPatch, ConfigStore, DevicePatch, GrayConfigFilter, GrayConfigPatch, GrayStore,
    ProjectPatch, ProjectStore, ReleasePatch, ReleaseStore, RolloutStore,
};

/// Insertion sequence per document id, breaks ties between equal timestamps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct InsertOrder {
    next: u64,
    seq: HashMap<String, u64>,
}

impl InsertOrder {
    fn record(&mut self, id: &str) {
        if !self.seq.contains_key(id) {
            self.next += 1;
            self.seq.insert(id.to_string(), self.next);
        }
    }

    /// Documents loaded from an older snapshot have no sequence and sort last
    fn of(&self, id: &str) -> u64 {
        self.seq.get(id).copied().unwrap_or(0)
    }

    fn forget(&mut self, id: &str) {
        self.seq.remove(id);
    }

    /// Newest `created_at` first, later inserts first on ties
    fn sort_newest_first<T, F>(&self, items: &mut [T], key: F)
    where
        F: Fn(&T) -> (DateTime<Utc>, &str),
    {
        items.sort_by(|a, b| {
            let (a_at, a_id) = key(a);
            let (b_at, b_id) = key(b);
            b_at.cmp(&a_at)
                .then_with(|| self.of(b_id).cmp(&self.of(a_id)))
        });
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    releases: HashMap<String, Release>,
    #[serde(default)]
    gray_configs: HashMap<String, GrayReleaseConfig>,
    /// Keyed by `nodeId/projectId/environment`
    #[serde(default)]
    device_statuses: BTreeMap<String, DeviceGrayStatus>,
    #[serde(default)]
    canaries: HashMap<String, CanaryRelease>,
    /// Keyed by `nodeId/historyId`
    #[serde(default)]
    config_deployments: BTreeMap<String, ConfigDeployment>,
    #[serde(default)]
    configs: HashMap<String, ConfigItem>,
    #[serde(default)]
    config_history: HashMap<String, ConfigHistory>,
    #[serde(default)]
    projects: HashMap<String, Project>,
    #[serde(default)]
    order: InsertOrder,
}

fn device_key(node_id: &str, project_id: &str, environment: &str) -> String {
    format!("{}/{}/{}", node_id, project_id, environment)
}

fn deployment_key(node_id: &str, history_id: &str) -> String {
    format!("{}/{}", node_id, history_id)
}

fn in_scope(value: &str, wanted: &str) -> bool {
    wanted.is_empty() || value == wanted
}

/// Store keeping every collection in memory.
///
/// With a snapshot file configured each mutation is applied to a staged copy,
/// written to disk while the write lock is held, and only then swapped in.
/// The file and memory therefore always hold the same committed state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    snapshot: Option<File>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `file`, loading it when it exists
    pub async fn with_snapshot(file: File) -> Result<Self, ManagerError> {
        let data = if file.exists().await {
            let data: Collections = file.read_json().await?;
            info!(
                "Loaded store snapshot from {:?}: {} releases, {} gray configs, {} devices, {} configs",
                file.path(),
                data.releases.len(),
                data.gray_configs.len(),
                data.device_statuses.len(),
                data.configs.len()
            );
            data
        } else {
            Collections::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            snapshot: Some(file),
        })
    }

    /// Apply `mutate` under the write lock and persist the outcome.
    ///
    /// An error from `mutate` or from the snapshot write leaves the stored
    /// collections unchanged.
    async fn commit<T, F>(&self, mutate: F) -> Result<T, ManagerError>
    where
        F: FnOnce(&mut Collections) -> Result<T, ManagerError> + Send,
        T: Send,
    {
        let mut data = self.data.write().await;
        let Some(file) = &self.snapshot else {
            return mutate(&mut data);
        };

        let mut staged = data.clone();
        let out = mutate(&mut staged)?;
        file.write_json(&staged)
            .await
            .map_err(|e| ManagerError::StorageError(format!("snapshot write failed: {}", e)))?;
        debug!("Store snapshot written to {:?}", file.path());
        *data = staged;
        Ok(out)
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn insert_release(&self, release: &Release) -> Result<String, ManagerError> {
        self.commit(|data| {
            if data.releases.contains_key(&release.id) {
                return Err(ManagerError::StorageError(format!(
                    "release {} already exists",
                    release.id
                )));
            }
            data.order.record(&release.id);
            data.releases.insert(release.id.clone(), release.clone());
            Ok(release.id.clone())
        })
        .await
    }

    async fn get_release(&self, id: &str) -> Result<Option<Release>, ManagerError> {
        Ok(self.data.read().await.releases.get(id).cloned())
    }

    async fn list_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, ManagerError> {
        let data = self.data.read().await;
        let mut releases: Vec<_> = data
            .releases
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        data.order
            .sort_newest_first(&mut releases, |r| (r.created_at, r.id.as_str()));
        Ok(releases)
    }

    async fn update_release(&self, id: &str, patch: ReleasePatch) -> Result<Release, ManagerError> {
        self.commit(|data| {
            let release = data
                .releases
                .get_mut(id)
                .ok_or_else(|| ManagerError::NotFound(format!("release {}", id)))?;
            patch(release);
            Ok(release.clone())
        })
        .await
    }

    async fn update_release_if_status(
        &self,
        id: &str,
        expected: ReleaseStatus,
        patch: ReleasePatch,
    ) -> Result<Option<Release>, ManagerError> {
        {
            let data = self.data.read().await;
            match data.releases.get(id) {
                None => return Err(ManagerError::NotFound(format!("release {}", id))),
                Some(release) if release.status != expected => return Ok(None),
                Some(_) => {}
            }
        }
        self.commit(|data| {
            let release = data
                .releases
                .get_mut(id)
                .ok_or_else(|| ManagerError::NotFound(format!("release {}", id)))?;
            if release.status != expected {
                return Ok(None);
            }
            patch(release);
            Ok(Some(release.clone()))
        })
        .await
    }

    async fn delete_releases(&self, ids: &[String]) -> Result<usize, ManagerError> {
        self.commit(|data| {
            let mut count = 0;
            for id in ids {
                if data.releases.remove(id).is_some() {
                    data.order.forget(id);
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
    }
}

#[async_trait]
impl GrayStore for MemoryStore {
    async fn insert_gray_config(&self, config: &GrayReleaseConfig) -> Result<String, ManagerError> {
        self.commit(|data| {
            data.order.record(&config.id);
            data.gray_configs.insert(config.id.clone(), config.clone());
            Ok(config.id.clone())
        })
        .await
    }

    async fn get_gray_config(&self, id: &str) -> Result<Option<GrayReleaseConfig>, ManagerError> {
        Ok(self.data.read().await.gray_configs.get(id).cloned())
    }

    async fn list_gray_configs(
        &self,
        filter: &GrayConfigFilter,
    ) -> Result<Vec<GrayReleaseConfig>, ManagerError> {
        let data = self.data.read().await;
        let mut configs: Vec<_> = data
            .gray_configs
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        data.order
            .sort_newest_first(&mut configs, |c| (c.created_at, c.id.as_str()));
        Ok(configs)
    }

    async fn update_gray_config(
        &self,
        id: &str,
        patch: GrayConfigPatch,
    ) -> Result<GrayReleaseConfig, ManagerError> {
        self.commit(|data| {
            let config = data
                .gray_configs
                .get_mut(id)
                .ok_or_else(|| ManagerError::NotFound(format!("gray release config {}", id)))?;
            patch(config);
            Ok(config.clone())
        })
        .await
    }

    async fn delete_gray_config(&self, id: &str) -> Result<bool, ManagerError> {
        if !self.data.read().await.gray_configs.contains_key(id) {
            return Ok(false);
        }
        self.commit(|data| {
            data.order.forget(id);
            Ok(data.gray_configs.remove(id).is_some())
        })
        .await
    }

    async fn complete_active_configs(
        &self,
        project_id: &str,
        environment: &str,
        at: DateTime<Utc>,
    ) -> Result<usize, ManagerError> {
        self.commit(|data| {
            let mut count = 0;
            for config in data.gray_configs.values_mut().filter(|c| {
                c.status == GrayConfigStatus::Active
                    && c.project_id == project_id
                    && c.environment == environment
            }) {
                config.status = GrayConfigStatus::Completed;
                config.updated_at = at;
                count += 1;
            }
            Ok(count)
        })
        .await
    }

    async fn upsert_device_status(&self, device: &DeviceGrayStatus) -> Result<(), ManagerError> {
        self.commit(|data| {
            let key = device_key(&device.node_id, &device.project_id, &device.environment);
            data.device_statuses.insert(key, device.clone());
            Ok(())
        })
        .await
    }

    async fn list_device_statuses(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Vec<DeviceGrayStatus>, ManagerError> {
        let data = self.data.read().await;
        Ok(data
            .device_statuses
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn update_device_statuses(
        &self,
        filter: &DeviceFilter,
        patch: DevicePatch,
    ) -> Result<usize, ManagerError> {
        self.commit(|data| {
            let mut count = 0;
            for device in data.device_statuses.values_mut().filter(|d| filter.matches(d)) {
                patch(device);
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}

#[async_trait]
impl RolloutStore for MemoryStore {
    async fn insert_canary(&self, canary: &CanaryRelease) -> Result<String, ManagerError> {
        self.commit(|data| {
            data.order.record(&canary.id);
            data.canaries.insert(canary.id.clone(), canary.clone());
            Ok(canary.id.clone())
        })
        .await
    }

    async fn get_canary(&self, id: &str) -> Result<Option<CanaryRelease>, ManagerError> {
        Ok(self.data.read().await.canaries.get(id).cloned())
    }

    async fn list_canaries(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<CanaryRelease>, ManagerError> {
        let data = self.data.read().await;
        let mut canaries: Vec<_> = data
            .canaries
            .values()
            .filter(|c| in_scope(&c.project_id, project_id) && in_scope(&c.environment, environment))
            .cloned()
            .collect();
        data.order
            .sort_newest_first(&mut canaries, |c| (c.created_at, c.id.as_str()));
        Ok(canaries)
    }

    async fn update_canary(
        &self,
        id: &str,
        patch: CanaryPatch,
    ) -> Result<CanaryRelease, ManagerError> {
        self.commit(|data| {
            let canary = data
                .canaries
                .get_mut(id)
                .ok_or_else(|| ManagerError::NotFound(format!("canary release {}", id)))?;
            patch(canary);
            Ok(canary.clone())
        })
        .await
    }

    async fn upsert_config_deployment(
        &self,
        deployment: &ConfigDeployment,
    ) -> Result<(), ManagerError> {
        self.commit(|data| {
            let key = deployment_key(&deployment.node_id, &deployment.history_id);
            let mut row = deployment.clone();
            if let Some(existing) = data.config_deployments.get(&key) {
                row.id = existing.id.clone();
            }
            data.config_deployments.insert(key, row);
            Ok(())
        })
        .await
    }

    async fn list_config_deployments(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<ConfigDeployment>, ManagerError> {
        let data = self.data.read().await;
        Ok(data
            .config_deployments
            .values()
            .filter(|d| in_scope(&d.project_id, project_id) && in_scope(&d.environment, environment))
            .cloned()
            .collect())
    }

    async fn count_deployments_by_version(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<(String, usize)>, ManagerError> {
        let data = self.data.read().await;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for deployment in data
            .config_deployments
            .values()
            .filter(|d| in_scope(&d.project_id, project_id) && in_scope(&d.environment, environment))
        {
            *counts.entry(deployment.version.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn insert_config(
        &self,
        config: &ConfigItem,
        history: &ConfigHistory,
    ) -> Result<(), ManagerError> {
        self.commit(|data| {
            if data.configs.contains_key(&config.id) {
                return Err(ManagerError::StorageError(format!(
                    "config {} already exists",
                    config.id
                )));
            }
            data.order.record(&config.id);
            data.order.record(&history.id);
            data.configs.insert(config.id.clone(), config.clone());
            data.config_history.insert(history.id.clone(), history.clone());
            Ok(())
        })
        .await
    }

    async fn get_config(&self, id: &str) -> Result<Option<ConfigItem>, ManagerError> {
        Ok(self.data.read().await.configs.get(id).cloned())
    }

    async fn list_configs(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<ConfigItem>, ManagerError> {
        let data = self.data.read().await;
        let mut configs: Vec<_> = data
            .configs
            .values()
            .filter(|c| in_scope(&c.project_id, project_id) && in_scope(&c.environment, environment))
            .cloned()
            .collect();
        data.order
            .sort_newest_first(&mut configs, |c| (c.created_at, c.id.as_str()));
        Ok(configs)
    }

    async fn replace_config(
        &self,
        config: &ConfigItem,
        history: &ConfigHistory,
    ) -> Result<(), ManagerError> {
        self.commit(|data| {
            let stored = data
                .configs
                .get_mut(&config.id)
                .ok_or_else(|| ManagerError::NotFound(format!("config {}", config.id)))?;
            *stored = config.clone();
            data.order.record(&history.id);
            data.config_history.insert(history.id.clone(), history.clone());
            Ok(())
        })
        .await
    }

    async fn delete_config(&self, id: &str, history: &ConfigHistory) -> Result<(), ManagerError> {
        self.commit(|data| {
            data.configs
                .remove(id)
                .ok_or_else(|| ManagerError::NotFound(format!("config {}", id)))?;
            data.order.forget(id);
            data.order.record(&history.id);
            data.config_history.insert(history.id.clone(), history.clone());
            Ok(())
        })
        .await
    }

    async fn get_config_history(&self, id: &str) -> Result<Option<ConfigHistory>, ManagerError> {
        Ok(self.data.read().await.config_history.get(id).cloned())
    }

    async fn list_config_history(
        &self,
        config_id: &str,
    ) -> Result<Vec<ConfigHistory>, ManagerError> {
        let data = self.data.read().await;
        let mut history: Vec<_> = data
            .config_history
            .values()
            .filter(|h| h.config_id == config_id)
            .cloned()
            .collect();
        data.order
            .sort_newest_first(&mut history, |h| (h.created_at, h.id.as_str()));
        Ok(history)
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, project: &Project) -> Result<String, ManagerError> {
        self.commit(|data| {
            if data.projects.contains_key(&project.id) {
                return Err(ManagerError::StorageError(format!(
                    "project {} already exists",
                    project.id
                )));
            }
            data.order.record(&project.id);
            data.projects.insert(project.id.clone(), project.clone());
            Ok(project.id.clone())
        })
        .await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, ManagerError> {
        Ok(self.data.read().await.projects.get(id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ManagerError> {
        let data = self.data.read().await;
        let mut projects: Vec<_> = data.projects.values().cloned().collect();
        data.order
            .sort_newest_first(&mut projects, |p| (p.created_at, p.id.as_str()));
        Ok(projects)
    }

    async fn update_project(
        &self,
        id: &str,
        patch: ProjectPatch,
    ) -> Result<Project, ManagerError> {
        self.commit(|data| {
            let project = data
                .projects
                .get_mut(id)
                .ok_or_else(|| ManagerError::NotFound(format!("project {}", id)))?;
            patch(project);
            Ok(project.clone())
        })
        .await
    }

    async fn delete_project(&self, id: &str) -> Result<bool, ManagerError> {
        if !self.data.read().await.projects.contains_key(id) {
            return Ok(false);
        }
        self.commit(|data| {
            data.order.forget(id);
            Ok(data.projects.remove(id).is_some())
        })
        .await
    }
}
