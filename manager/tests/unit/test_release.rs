//! Release lifecycle tests

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use graymgr::errors::ManagerError;
use graymgr::models::release::{PipelineState, ReleaseFilter, ReleaseStatus};
use graymgr::pipeline::PipelineOutput;
use graymgr::storage::settings::CompletionMode;
use graymgr::store::{MemoryStore, ReleaseStore};
use graymgr::workers::reconciler::reconcile;
use tokio_test::{assert_err, assert_ok};

use crate::common::{release_manager, release_request};

const EXTERNAL: CompletionMode = CompletionMode::External;

#[tokio::test]
async fn test_create_enqueues_pipeline_job() {
    let store = Arc::new(MemoryStore::new());
    let (manager, mut jobs) = release_manager(store, EXTERNAL);

    let release = manager.create(release_request("p1", "v1")).await.unwrap();
    assert_eq!(release.status, ReleaseStatus::PendingApproval);
    assert_eq!(release.pipeline.state, PipelineState::Queued);

    let job = assert_ok!(jobs.try_recv());
    assert_eq!(job.release_id, release.id);
}

#[tokio::test]
async fn test_create_rejects_missing_fields_without_mutation() {
    let store = Arc::new(MemoryStore::new());
    let (manager, mut jobs) = release_manager(store, EXTERNAL);

    let err = manager.create(release_request("p1", "")).await.unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));

    let mut bad_strategy = release_request("p1", "v1");
    bad_strategy.strategy = Some("yolo".to_string());
    let err = manager.create(bad_strategy).await.unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));

    assert!(manager.list(&ReleaseFilter::new()).await.unwrap().is_empty());
    assert_err!(jobs.try_recv());
}

#[tokio::test]
async fn test_full_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let release = manager.create(release_request("p1", "v1")).await.unwrap();

    let approved = manager.approve(&release.id).await.unwrap();
    assert_eq!(approved.status, ReleaseStatus::Approved);

    let deploying = manager.deploy(&release.id).await.unwrap();
    assert_eq!(deploying.status, ReleaseStatus::Deploying);
    assert!(deploying.started_at.is_some());

    let completed = manager.complete(&release.id).await.unwrap();
    assert_eq!(completed.status, ReleaseStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.started_at, deploying.started_at);
}

#[tokio::test]
async fn test_complete_requires_deploying() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let release = manager.create(release_request("p1", "v1")).await.unwrap();

    let err = manager.complete(&release.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::Forbidden(_)));

    manager.approve(&release.id).await.unwrap();
    let err = manager.complete(&release.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::Forbidden(_)));

    let current = manager.get(&release.id).await.unwrap();
    assert_eq!(current.status, ReleaseStatus::Approved);
    assert!(current.completed_at.is_none());
}

#[tokio::test]
async fn test_rollback_from_approved_blocks_deploy() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let release = manager.create(release_request("p1", "v2")).await.unwrap();
    manager.approve(&release.id).await.unwrap();

    let rolled_back = manager
        .rollback(&release.id, "v1".to_string(), "bad metrics".to_string())
        .await
        .unwrap();
    assert_eq!(rolled_back.status, ReleaseStatus::RolledBack);
    let info = rolled_back.rollback.unwrap();
    assert_eq!(info.target_version, "v1");
    assert_eq!(info.reason, "bad metrics");

    assert!(matches!(
        manager.deploy(&release.id).await.unwrap_err(),
        ManagerError::Forbidden(_)
    ));
}

#[tokio::test]
async fn test_completed_release_can_roll_back() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let release = manager.create(release_request("p1", "v2")).await.unwrap();
    manager.approve(&release.id).await.unwrap();
    manager.deploy(&release.id).await.unwrap();
    manager.complete(&release.id).await.unwrap();

    let rolled_back = assert_ok!(
        manager
            .rollback(&release.id, "v1".to_string(), "regression in prod".to_string())
            .await
    );
    assert_eq!(rolled_back.status, ReleaseStatus::RolledBack);
    assert!(rolled_back.completed_at.is_some());

    // A second rollback re-records the target and reason
    let again = assert_ok!(
        manager
            .rollback(&release.id, "v0".to_string(), "v1 also broken".to_string())
            .await
    );
    assert_eq!(again.status, ReleaseStatus::RolledBack);
    let info = again.rollback.unwrap();
    assert_eq!(info.target_version, "v0");
    assert_eq!(info.reason, "v1 also broken");

    assert_err!(manager.complete(&release.id).await);
}

#[tokio::test]
async fn test_unknown_release_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);

    assert!(matches!(
        manager.approve("missing").await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
    assert!(matches!(
        manager.ensure_servable("missing").await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_only_approved_releases_are_servable() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let release = manager.create(release_request("p1", "v1")).await.unwrap();

    assert!(matches!(
        manager.ensure_servable(&release.id).await.unwrap_err(),
        ManagerError::Forbidden(_)
    ));

    manager.approve(&release.id).await.unwrap();
    assert_ok!(manager.ensure_servable(&release.id).await);

    manager.deploy(&release.id).await.unwrap();
    assert!(matches!(
        manager.ensure_servable(&release.id).await.unwrap_err(),
        ManagerError::Forbidden(_)
    ));
}

#[tokio::test]
async fn test_fixed_completion_after_delay() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, CompletionMode::Fixed { delay_secs: 0 });
    let release = manager.create(release_request("p1", "v1")).await.unwrap();
    manager.approve(&release.id).await.unwrap();
    manager.deploy(&release.id).await.unwrap();

    let mut status = ReleaseStatus::Deploying;
    for _ in 0..100 {
        status = manager.get(&release.id).await.unwrap().status;
        if status == ReleaseStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, ReleaseStatus::Completed);
}

#[tokio::test]
async fn test_external_completion_waits() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let release = manager.create(release_request("p1", "v1")).await.unwrap();
    manager.approve(&release.id).await.unwrap();
    let deploying = manager.deploy(&release.id).await.unwrap();

    assert!(manager.arm_completion(&deploying).is_none());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        manager.get(&release.id).await.unwrap().status,
        ReleaseStatus::Deploying
    );
}

#[tokio::test]
async fn test_pipeline_outcome_written_back() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let ok = manager.create(release_request("p1", "v1")).await.unwrap();
    let failed = manager.create(release_request("p1", "v2")).await.unwrap();

    let ok = manager
        .record_pipeline_outcome(
            &ok.id,
            Ok(PipelineOutput {
                mr_url: "http://gitlab.local/mr/1".to_string(),
                tar_file_name: "MIKUD_LIVE.2025-01-01-00-00-00.tar.gz".to_string(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(ok.pipeline.state, PipelineState::Succeeded);
    assert_eq!(ok.gitlab_pr_url.as_deref(), Some("http://gitlab.local/mr/1"));
    assert!(ok.pipeline.finished_at.is_some());
    // The release lifecycle is independent of the build
    assert_eq!(ok.status, ReleaseStatus::PendingApproval);

    let failed = manager
        .record_pipeline_outcome(&failed.id, Err(ManagerError::BuildError("boom".to_string())))
        .await
        .unwrap();
    assert_eq!(failed.pipeline.state, PipelineState::Failed);
    assert!(failed.pipeline.error.unwrap().contains("boom"));
    assert!(failed.tar_file_name.is_none());
}

#[tokio::test]
async fn test_list_filters_newest_first() {
    let store = Arc::new(MemoryStore::new());
    let (manager, _jobs) = release_manager(store, EXTERNAL);
    let first = manager.create(release_request("p1", "v1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = manager.create(release_request("p1", "v2")).await.unwrap();
    manager.create(release_request("p2", "v1")).await.unwrap();
    manager.approve(&first.id).await.unwrap();

    let p1 = manager
        .list(&ReleaseFilter::new().project("p1"))
        .await
        .unwrap();
    let ids: Vec<&str> = p1.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

    let approved = manager
        .list(&ReleaseFilter::new().status(ReleaseStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, first.id);
}

#[tokio::test]
async fn test_reconcile_resumes_interrupted_work() {
    let store = Arc::new(MemoryStore::new());
    let (manager, mut jobs) = release_manager(store.clone(), CompletionMode::Fixed { delay_secs: 60 });

    let building = manager.create(release_request("p1", "v1")).await.unwrap();
    let deploying = manager.create(release_request("p1", "v2")).await.unwrap();
    while jobs.try_recv().is_ok() {}

    store
        .update_release(
            &building.id,
            Box::new(|r| {
                r.pipeline.state = PipelineState::Building;
                r.pipeline.build_id = Some(17);
            }),
        )
        .await
        .unwrap();
    let long_ago = Utc::now() - chrono::Duration::seconds(600);
    store
        .update_release(
            &deploying.id,
            Box::new(move |r| {
                r.status = ReleaseStatus::Deploying;
                r.started_at = Some(long_ago);
                r.pipeline.state = PipelineState::Succeeded;
            }),
        )
        .await
        .unwrap();

    let report = reconcile(&manager).await.unwrap();
    assert_eq!(report.requeued, 1);
    assert_eq!(report.rearmed, 1);
    assert_eq!(jobs.try_recv().unwrap().release_id, building.id);

    // The completion delay already elapsed, so it fires right away
    let mut status = ReleaseStatus::Deploying;
    for _ in 0..100 {
        status = manager.get(&deploying.id).await.unwrap().status;
        if status == ReleaseStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, ReleaseStatus::Completed);
}
