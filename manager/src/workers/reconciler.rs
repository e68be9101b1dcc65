//! Start-up reconciliation of releases interrupted by a restart

use std::future::Future;
use std::pin::Pin;

use tracing::{error, info};

use crate::errors::ManagerError;
use crate::models::release::{ReleaseFilter, ReleaseStatus};
use crate::release::ReleaseManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Releases handed back to the pipeline worker
    pub requeued: usize,
    /// Deploying releases whose completion was re-armed
    pub rearmed: usize,
}

/// Re-enqueue unfinished pipelines and re-arm the completion of deploying releases
pub async fn reconcile(manager: &ReleaseManager) -> Result<ReconcileReport, ManagerError> {
    let mut report = ReconcileReport::default();

    for release in manager.list(&ReleaseFilter::new()).await? {
        if release.pipeline.state.is_in_flight() {
            info!(
                "Resuming pipeline of release {} ({:?})",
                release.id, release.pipeline.state
            );
            manager.enqueue(&release.id).await;
            report.requeued += 1;
        }

        if release.status == ReleaseStatus::Deploying && manager.arm_completion(&release).is_some() {
            report.rearmed += 1;
        }
    }

    Ok(report)
}

/// Run the reconciliation once, unless shutdown comes first
pub async fn run(
    manager: ReleaseManager,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Reconciler starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Reconciler shutting down...");
        }
        result = reconcile(&manager) => match result {
            Ok(report) => info!(
                "Reconciliation done: {} pipelines resumed, {} completions re-armed",
                report.requeued, report.rearmed
            ),
            Err(e) => error!("Reconciliation failed: {}", e),
        }
    }
}
