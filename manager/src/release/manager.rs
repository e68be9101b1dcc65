//! Release lifecycle manager

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openapi_server::models::CreateReleaseRequest;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::ManagerError;
use crate::models::release::{
    PipelineRecord, PipelineState, Release, ReleaseFilter, ReleaseStatus, RollbackInfo, Strategy,
};
use crate::pipeline::coordinator::{PipelineOutput, PipelineProgress};
use crate::release::fsm::ReleaseEvent;
use crate::storage::settings::CompletionMode;
use crate::store::ReleaseStore;
use crate::utils::generate_uuid;

/// Request to build and publish the artifact of a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    pub release_id: String,
}

/// Owns every status change of a release.
///
/// Writes are compare-and-swap on the status read just before, so two racing
/// callers cannot both move the same release.
#[derive(Clone)]
pub struct ReleaseManager {
    store: Arc<dyn ReleaseStore>,
    pipeline_tx: mpsc::Sender<PipelineJob>,
    completion: CompletionMode,
}

impl ReleaseManager {
    pub fn new(
        store: Arc<dyn ReleaseStore>,
        pipeline_tx: mpsc::Sender<PipelineJob>,
        completion: CompletionMode,
    ) -> Self {
        Self {
            store,
            pipeline_tx,
            completion,
        }
    }

    pub async fn create(&self, request: CreateReleaseRequest) -> Result<Release, ManagerError> {
        for (field, value) in [
            ("projectId", &request.project_id),
            ("version", &request.version),
            ("environment", &request.environment),
        ] {
            if value.trim().is_empty() {
                return Err(ManagerError::ValidationError(format!("{} is required", field)));
            }
        }

        let strategy = match request.strategy.as_deref() {
            None | Some("") => Strategy::default(),
            Some(s) => s.parse::<Strategy>().map_err(ManagerError::ValidationError)?,
        };

        let release = Release {
            id: generate_uuid(),
            project_id: request.project_id,
            project_name: request.project_name,
            application_id: request.application_id,
            version: request.version,
            environment: request.environment,
            strategy,
            status: ReleaseStatus::PendingApproval,
            description: request.description,
            scheduler: request.scheduler,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            gitlab_pr_url: None,
            tar_file_name: None,
            rollback: None,
            pipeline: PipelineRecord::default(),
        };

        self.store.insert_release(&release).await?;
        info!(
            "Created release {} for {}/{} version {}",
            release.id, release.project_id, release.environment, release.version
        );

        self.enqueue(&release.id).await;
        Ok(release)
    }

    /// Hand a release to the pipeline worker.
    ///
    /// A closed queue only logs; the pipeline record stays `queued` and is
    /// picked up by the reconciler on the next start.
    pub async fn enqueue(&self, release_id: &str) {
        let job = PipelineJob {
            release_id: release_id.to_string(),
        };
        if let Err(e) = self.pipeline_tx.send(job).await {
            warn!("Pipeline queue closed, release {} stays queued: {}", release_id, e);
        }
    }

    pub async fn get(&self, id: &str) -> Result<Release, ManagerError> {
        self.store
            .get_release(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(format!("release {}", id)))
    }

    pub async fn list(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, ManagerError> {
        self.store.list_releases(filter).await
    }

    pub async fn approve(&self, id: &str) -> Result<Release, ManagerError> {
        let release = self.transition(id, ReleaseEvent::Approve, |_| {}).await?;
        info!("Release {} approved", id);
        Ok(release)
    }

    pub async fn deploy(&self, id: &str) -> Result<Release, ManagerError> {
        let now = Utc::now();
        let release = self
            .transition(id, ReleaseEvent::Deploy, move |r| {
                r.started_at.get_or_insert(now);
            })
            .await?;
        info!("Release {} deploying", id);
        self.arm_completion(&release);
        Ok(release)
    }

    pub async fn complete(&self, id: &str) -> Result<Release, ManagerError> {
        let now = Utc::now();
        let release = self
            .transition(id, ReleaseEvent::Complete, move |r| {
                r.completed_at.get_or_insert(now);
            })
            .await?;
        info!("Release {} completed", id);
        Ok(release)
    }

    /// Mark the release rolled back. The build and the merge request stay as they are.
    pub async fn rollback(
        &self,
        id: &str,
        target_version: String,
        reason: String,
    ) -> Result<Release, ManagerError> {
        let now = Utc::now();
        let release = self
            .transition(id, ReleaseEvent::Rollback, move |r| {
                r.rollback = Some(RollbackInfo {
                    target_version,
                    reason,
                    at: now,
                });
            })
            .await?;
        warn!("Release {} rolled back", id);
        Ok(release)
    }

    /// Delete the listed releases in one write, unknown ids are skipped
    pub async fn batch_delete(&self, ids: &[String]) -> Result<usize, ManagerError> {
        if ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ManagerError::ValidationError("ids is required".to_string()));
        }
        let deleted = self.store.delete_releases(ids).await?;
        info!("Deleted {} of {} releases", deleted, ids.len());
        Ok(deleted)
    }

    /// Binaries and progress tied to a release are only served while it is approved
    pub async fn ensure_servable(&self, id: &str) -> Result<Release, ManagerError> {
        let release = self.get(id).await?;
        if release.status != ReleaseStatus::Approved {
            return Err(ManagerError::Forbidden(format!(
                "release {} is {}, not approved",
                id, release.status
            )));
        }
        Ok(release)
    }

    /// Schedule the automatic completion of a deploying release.
    ///
    /// The delay counts from `startedAt`, so re-arming after a restart only
    /// waits for what is left.
    pub fn arm_completion(&self, release: &Release) -> Option<JoinHandle<()>> {
        let delay_secs = match self.completion {
            CompletionMode::External => {
                debug!("Release {} waits for external completion", release.id);
                return None;
            }
            CompletionMode::Fixed { delay_secs } => delay_secs,
        };

        let started_at = release.started_at.unwrap_or_else(Utc::now);
        let remaining = remaining_delay(started_at, delay_secs, Utc::now());
        let manager = self.clone();
        let id = release.id.clone();

        Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            match manager.complete(&id).await {
                Ok(_) => {}
                Err(ManagerError::Forbidden(reason)) => {
                    debug!("Skipping completion of release {}: {}", id, reason)
                }
                Err(e) => error!("Failed to complete release {}: {}", id, e),
            }
        }))
    }

    /// Write the pipeline outcome back onto the release
    pub async fn record_pipeline_outcome(
        &self,
        id: &str,
        outcome: Result<PipelineOutput, ManagerError>,
    ) -> Result<Release, ManagerError> {
        let now = Utc::now();
        let patch: Box<dyn FnOnce(&mut Release) + Send> = match outcome {
            Ok(output) => {
                info!(
                    "Pipeline of release {} succeeded: {} -> {}",
                    id, output.tar_file_name, output.mr_url
                );
                Box::new(move |r| {
                    r.pipeline.state = PipelineState::Succeeded;
                    r.pipeline.finished_at = Some(now);
                    r.pipeline.error = None;
                    r.gitlab_pr_url = Some(output.mr_url);
                    r.tar_file_name = Some(output.tar_file_name);
                })
            }
            Err(e) => {
                error!("Pipeline of release {} failed: {}", id, e);
                let reason = e.to_string();
                Box::new(move |r| {
                    r.pipeline.state = PipelineState::Failed;
                    r.pipeline.finished_at = Some(now);
                    r.pipeline.error = Some(reason);
                })
            }
        };
        self.store.update_release(id, patch).await
    }

    async fn transition<F>(
        &self,
        id: &str,
        event: ReleaseEvent,
        patch: F,
    ) -> Result<Release, ManagerError>
    where
        F: FnOnce(&mut Release) + Send + 'static,
    {
        let current = self.get(id).await?;
        let next = current
            .status
            .apply(event)
            .map_err(|reason| ManagerError::Forbidden(format!("release {}: {}", id, reason)))?;

        self.store
            .update_release_if_status(
                id,
                current.status,
                Box::new(move |r| {
                    r.status = next;
                    patch(r);
                }),
            )
            .await?
            .ok_or_else(|| {
                ManagerError::Forbidden(format!(
                    "release {} left status {} concurrently",
                    id, current.status
                ))
            })
    }
}

#[async_trait]
impl PipelineProgress for ReleaseManager {
    async fn build_started(
        &self,
        release_id: &str,
        build_id: u64,
        started_at: DateTime<Utc>,
    ) -> Result<(), ManagerError> {
        self.store
            .update_release(
                release_id,
                Box::new(move |r| {
                    r.pipeline.state = PipelineState::Building;
                    r.pipeline.build_id = Some(build_id);
                    r.pipeline.started_at = Some(started_at);
                }),
            )
            .await?;
        Ok(())
    }

    async fn publishing(&self, release_id: &str) -> Result<(), ManagerError> {
        self.store
            .update_release(
                release_id,
                Box::new(|r| r.pipeline.state = PipelineState::Publishing),
            )
            .await?;
        Ok(())
    }
}

fn remaining_delay(started_at: DateTime<Utc>, delay_secs: u64, now: DateTime<Utc>) -> Duration {
    let elapsed = (now - started_at).num_seconds().max(0) as u64;
    Duration::from_secs(delay_secs.saturating_sub(elapsed))
}
