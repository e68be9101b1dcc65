//! Canary directives and their fan-out into per-device config deployments

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::errors::ManagerError;
use crate::models::rollout::{
    CanaryInput, CanaryRelease, CanaryStatus, ConfigDeployment, ConfigDeploymentStatus,
};
use crate::store::{GrayStore, RolloutStore};
use crate::utils::generate_uuid;

pub struct CanaryExecutor {
    devices: Arc<dyn GrayStore>,
    rollouts: Arc<dyn RolloutStore>,
}

impl CanaryExecutor {
    pub fn new(devices: Arc<dyn GrayStore>, rollouts: Arc<dyn RolloutStore>) -> Self {
        Self { devices, rollouts }
    }

    pub async fn create(&self, input: CanaryInput) -> Result<CanaryRelease, ManagerError> {
        for (field, value) in [
            ("projectId", &input.project_id),
            ("environment", &input.environment),
            ("historyId", &input.history_id),
            ("version", &input.version),
        ] {
            if value.trim().is_empty() {
                return Err(ManagerError::ValidationError(format!("{} is required", field)));
            }
        }
        if input.target.is_empty() {
            return Err(ManagerError::ValidationError(
                "target must select at least one value".to_string(),
            ));
        }

        let canary = CanaryRelease {
            id: generate_uuid(),
            project_id: input.project_id,
            environment: input.environment,
            history_id: input.history_id,
            version: input.version,
            target: input.target,
            status: CanaryStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            device_count: 0,
        };
        self.rollouts.insert_canary(&canary).await?;
        info!("Created canary {} for version {}", canary.id, canary.version);
        Ok(canary)
    }

    pub async fn list(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<CanaryRelease>, ManagerError> {
        self.rollouts.list_canaries(project_id, environment).await
    }

    pub async fn get(&self, id: &str) -> Result<CanaryRelease, ManagerError> {
        self.rollouts
            .get_canary(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(format!("canary release {}", id)))
    }

    /// Write one deployment row per targeted device, then mark the canary completed.
    ///
    /// The first failed write aborts the fan-out; rows already written are kept.
    pub async fn execute(&self, canary_id: &str) -> Result<CanaryRelease, ManagerError> {
        let canary = self.get(canary_id).await?;
        if canary.status == CanaryStatus::Completed {
            return Err(ManagerError::Forbidden(format!(
                "canary release {} has already been executed",
                canary_id
            )));
        }

        let filter = canary
            .target
            .to_filter(&canary.project_id, &canary.environment);
        let devices = self.devices.list_device_statuses(&filter).await?;

        let now = Utc::now();
        for device in &devices {
            let deployment = ConfigDeployment {
                id: generate_uuid(),
                node_id: device.node_id.clone(),
                project_id: canary.project_id.clone(),
                environment: canary.environment.clone(),
                history_id: canary.history_id.clone(),
                version: canary.version.clone(),
                canary_id: Some(canary.id.clone()),
                status: ConfigDeploymentStatus::Deployed,
                deployed_at: now,
            };
            if let Err(e) = self.rollouts.upsert_config_deployment(&deployment).await {
                error!(
                    "Canary {} aborted at node {}: {}",
                    canary.id, device.node_id, e
                );
                return Err(e);
            }
        }

        let device_count = devices.len();
        let completed = self
            .rollouts
            .update_canary(
                canary_id,
                Box::new(move |c| {
                    c.status = CanaryStatus::Completed;
                    c.completed_at = Some(now);
                    c.device_count = device_count;
                }),
            )
            .await?;

        info!(
            "Executed canary {}: version {} deployed to {} devices",
            completed.id, completed.version, device_count
        );
        Ok(completed)
    }
}
