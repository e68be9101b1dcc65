//! Gray release configs, device status reports and full release

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::ManagerError;
use crate::gray::rules::select_version;
use crate::models::gray::{
    DeviceFilter, DeviceGrayStatus, DeviceReleaseState, GrayConfigInput, GrayConfigStatus,
    GrayReleaseConfig, GrayReleaseStats,
};
use crate::store::{GrayConfigFilter, GrayStore};
use crate::utils::generate_uuid;

/// Outcome of promoting a version to a whole project/environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullReleaseSummary {
    pub devices_updated: usize,
    pub configs_completed: usize,
}

fn require(field: &str, value: &str) -> Result<(), ManagerError> {
    if value.trim().is_empty() {
        return Err(ManagerError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_input(input: &GrayConfigInput) -> Result<(), ManagerError> {
    require("projectId", &input.project_id)?;
    require("environment", &input.environment)?;
    require("version", &input.version)?;
    if let Some(strategy) = input.strategies.iter().find(|s| s.weight > 100) {
        return Err(ManagerError::ValidationError(format!(
            "strategy weight {} exceeds 100",
            strategy.weight
        )));
    }
    Ok(())
}

pub struct GrayEngine {
    store: Arc<dyn GrayStore>,
}

impl GrayEngine {
    pub fn new(store: Arc<dyn GrayStore>) -> Self {
        Self { store }
    }

    pub async fn create_config(&self, input: GrayConfigInput) -> Result<GrayReleaseConfig, ManagerError> {
        validate_input(&input)?;

        let now = Utc::now();
        let config = GrayReleaseConfig {
            id: generate_uuid(),
            name: input.name,
            project_id: input.project_id,
            environment: input.environment,
            version: input.version,
            rules: input.rules,
            strategies: input.strategies,
            status: GrayConfigStatus::Active,
            description: input.description,
            creator: input.creator,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_gray_config(&config).await?;
        info!(
            "Created gray release {} for {}/{} -> {}",
            config.id, config.project_id, config.environment, config.version
        );
        Ok(config)
    }

    /// Configs in scope, newest first. Empty values match anything.
    pub async fn list_configs(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<GrayReleaseConfig>, ManagerError> {
        self.store
            .list_gray_configs(&GrayConfigFilter::new().scope(project_id, environment))
            .await
    }

    pub async fn get_config(&self, id: &str) -> Result<GrayReleaseConfig, ManagerError> {
        self.store
            .get_gray_config(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(format!("gray release config {}", id)))
    }

    /// Replace the mutable fields of a config; scope and creation time stay
    pub async fn update_config(
        &self,
        id: &str,
        input: GrayConfigInput,
    ) -> Result<GrayReleaseConfig, ManagerError> {
        require("version", &input.version)?;
        if input.strategies.iter().any(|s| s.weight > 100) {
            return Err(ManagerError::ValidationError(
                "strategy weight exceeds 100".to_string(),
            ));
        }

        let now = Utc::now();
        self.store
            .update_gray_config(
                id,
                Box::new(move |config| {
                    if !input.name.is_empty() {
                        config.name = input.name;
                    }
                    config.version = input.version;
                    config.rules = input.rules;
                    config.strategies = input.strategies;
                    if let Some(status) = input.status {
                        config.status = status;
                    }
                    config.description = input.description;
                    config.updated_at = now;
                }),
            )
            .await
    }

    pub async fn delete_config(&self, id: &str) -> Result<(), ManagerError> {
        if !self.store.delete_gray_config(id).await? {
            return Err(ManagerError::NotFound(format!("gray release config {}", id)));
        }
        info!("Deleted gray release {}", id);
        Ok(())
    }

    /// Record the current state of a device, replacing its previous report
    pub async fn report_device_status(
        &self,
        mut device: DeviceGrayStatus,
    ) -> Result<DeviceGrayStatus, ManagerError> {
        require("nodeId", &device.node_id)?;
        require("projectId", &device.project_id)?;
        require("environment", &device.environment)?;

        device.updated_at = Utc::now();
        self.store.upsert_device_status(&device).await?;
        Ok(device)
    }

    /// Version the device should run, if any active config targets it
    pub async fn check_device(&self, device: &DeviceGrayStatus) -> Result<Option<String>, ManagerError> {
        self.check_device_at(device, Utc::now()).await
    }

    pub async fn check_device_at(
        &self,
        device: &DeviceGrayStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ManagerError> {
        let filter = GrayConfigFilter {
            project_id: Some(device.project_id.clone()),
            environment: Some(device.environment.clone()),
            status: Some(GrayConfigStatus::Active),
        };
        let configs = self.store.list_gray_configs(&filter).await?;
        Ok(select_version(&configs, device, now).map(str::to_string))
    }

    /// Promote `version` to every device in scope and close the active configs
    pub async fn full_release(
        &self,
        project_id: &str,
        environment: &str,
        version: &str,
        operator: &str,
    ) -> Result<FullReleaseSummary, ManagerError> {
        require("projectId", project_id)?;
        require("environment", environment)?;
        require("version", version)?;

        let now = Utc::now();
        let target = version.to_string();
        let devices_updated = self
            .store
            .update_device_statuses(
                &DeviceFilter::scope(project_id, environment),
                Box::new(move |device| {
                    device.current_version = target.clone();
                    device.status = DeviceReleaseState::Released;
                    device.updated_at = now;
                }),
            )
            .await?;

        let configs_completed = self
            .store
            .complete_active_configs(project_id, environment, now)
            .await?;

        if devices_updated == 0 {
            warn!("Full release of {}/{} touched no devices", project_id, environment);
        }
        info!(
            "Full release of {}/{} to {} by {}: {} devices, {} configs completed",
            project_id, environment, version, operator, devices_updated, configs_completed
        );

        Ok(FullReleaseSummary {
            devices_updated,
            configs_completed,
        })
    }

    /// Device count per current version with per-dimension breakdown
    pub async fn device_stats(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<GrayReleaseStats>, ManagerError> {
        let mut filter = DeviceFilter::default();
        if !project_id.is_empty() {
            filter.project_id = Some(project_id.to_string());
        }
        if !environment.is_empty() {
            filter.environment = Some(environment.to_string());
        }
        let devices = self.store.list_device_statuses(&filter).await?;

        let mut grouped: BTreeMap<String, GrayReleaseStats> = BTreeMap::new();
        for device in &devices {
            let stats = grouped
                .entry(device.current_version.clone())
                .or_insert_with(|| GrayReleaseStats {
                    version: device.current_version.clone(),
                    device_count: 0,
                    by_dimension: BTreeMap::new(),
                });
            stats.device_count += 1;

            for (prefix, value) in [
                ("isp", &device.isp),
                ("region", &device.region),
                ("province", &device.province),
                ("datacenter", &device.data_center),
            ] {
                if !value.is_empty() {
                    *stats
                        .by_dimension
                        .entry(format!("{}_{}", prefix, value))
                        .or_insert(0) += 1;
                }
            }
        }

        Ok(grouped.into_values().collect())
    }
}
