//! Pipeline worker: consumes queued release jobs and runs the build pipeline

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::pipeline::BuildCoordinator;
use crate::release::{PipelineJob, ReleaseManager};

/// Pipeline worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Capacity of the job queue
    pub queue_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// Run the pipeline worker until shutdown or until every sender is dropped.
///
/// Each job runs on its own task. Jobs still running at shutdown are aborted;
/// their pipeline record stays in flight and the reconciler resumes them.
pub async fn run<S, F>(
    coordinator: Arc<BuildCoordinator>,
    manager: ReleaseManager,
    mut jobs: mpsc::Receiver<PipelineJob>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send,
{
    info!("Pipeline worker starting...");

    let mut running: JoinSet<String> = JoinSet::new();
    let mut active: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Pipeline worker shutting down, {} jobs in flight...", running.len());
                running.abort_all();
                break;
            }
            job = jobs.recv() => {
                let Some(job) = job else {
                    info!("Pipeline queue closed");
                    break;
                };
                if !active.insert(job.release_id.clone()) {
                    debug!("Release {} already in the pipeline, skipping", job.release_id);
                    continue;
                }
                let coordinator = coordinator.clone();
                let manager = manager.clone();
                let sleep_fn = sleep_fn.clone();
                running.spawn(async move {
                    process_job(&coordinator, &manager, &job, sleep_fn).await;
                    job.release_id
                });
            }
            Some(done) = running.join_next(), if !running.is_empty() => {
                match done {
                    Ok(release_id) => {
                        active.remove(&release_id);
                    }
                    Err(e) => error!("Pipeline task failed: {}", e),
                }
            }
        }
    }

    while let Some(done) = running.join_next().await {
        if let Err(e) = done {
            if !e.is_cancelled() {
                error!("Pipeline task failed: {}", e);
            }
        }
    }
}

/// Run one release through the pipeline and record the outcome on it
pub async fn process_job<S, F>(
    coordinator: &BuildCoordinator,
    manager: &ReleaseManager,
    job: &PipelineJob,
    sleep_fn: S,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let release = match manager.get(&job.release_id).await {
        Ok(release) => release,
        Err(e) => {
            error!("Unable to load release {}: {}", job.release_id, e);
            return;
        }
    };

    if !release.pipeline.state.is_in_flight() {
        warn!(
            "Release {} pipeline already {:?}, skipping",
            release.id, release.pipeline.state
        );
        return;
    }

    info!("Running pipeline for release {}", release.id);
    let outcome = coordinator.run(&release, manager, sleep_fn).await;
    if let Err(e) = manager.record_pipeline_outcome(&release.id, outcome).await {
        error!("Failed to record pipeline outcome of {}: {}", release.id, e);
    }
}
