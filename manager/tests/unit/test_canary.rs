//! Canary fan-out tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use graymgr::errors::ManagerError;
use graymgr::models::rollout::{
    CanaryInput, CanaryRelease, CanaryStatus, CanaryTarget, ConfigDeployment,
};
use graymgr::rollout::CanaryExecutor;
use graymgr::store::{CanaryPatch, GrayStore, MemoryStore, RolloutStore};

use crate::common::device;

fn canary_input(target: CanaryTarget) -> CanaryInput {
    CanaryInput {
        project_id: "p1".to_string(),
        environment: "prod".to_string(),
        history_id: "h-42".to_string(),
        version: "v2".to_string(),
        target,
    }
}

async fn fleet(store: &MemoryStore) {
    for (node, isp) in [("n1", "telecom"), ("n2", "telecom"), ("n3", "unicom")] {
        store
            .upsert_device_status(&device(node, isp, "east"))
            .await
            .unwrap();
    }
}

/// Rollout store failing every deployment write after `limit` successes
struct FlakyRollouts {
    inner: Arc<MemoryStore>,
    limit: usize,
    writes: AtomicUsize,
}

#[async_trait]
impl RolloutStore for FlakyRollouts {
    async fn insert_canary(&self, canary: &CanaryRelease) -> Result<String, ManagerError> {
        self.inner.insert_canary(canary).await
    }

    async fn get_canary(&self, id: &str) -> Result<Option<CanaryRelease>, ManagerError> {
        self.inner.get_canary(id).await
    }

    async fn list_canaries(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<CanaryRelease>, ManagerError> {
        self.inner.list_canaries(project_id, environment).await
    }

    async fn update_canary(
        &self,
        id: &str,
        patch: CanaryPatch,
    ) -> Result<CanaryRelease, ManagerError> {
        self.inner.update_canary(id, patch).await
    }

    async fn upsert_config_deployment(
        &self,
        deployment: &ConfigDeployment,
    ) -> Result<(), ManagerError> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.limit {
            return Err(ManagerError::StorageError("disk full".to_string()));
        }
        self.inner.upsert_config_deployment(deployment).await
    }

    async fn list_config_deployments(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<ConfigDeployment>, ManagerError> {
        self.inner.list_config_deployments(project_id, environment).await
    }

    async fn count_deployments_by_version(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<(String, usize)>, ManagerError> {
        self.inner
            .count_deployments_by_version(project_id, environment)
            .await
    }
}

#[tokio::test]
async fn test_operator_target_fans_out() {
    let store = Arc::new(MemoryStore::new());
    fleet(&store).await;
    let executor = CanaryExecutor::new(store.clone(), store.clone());

    let canary = executor
        .create(canary_input(CanaryTarget::Operator(vec!["telecom".to_string()])))
        .await
        .unwrap();
    assert_eq!(canary.status, CanaryStatus::Pending);

    let done = executor.execute(&canary.id).await.unwrap();
    assert_eq!(done.status, CanaryStatus::Completed);
    assert_eq!(done.device_count, 2);
    assert!(done.completed_at.is_some());

    let mut rows = store.list_config_deployments("p1", "prod").await.unwrap();
    rows.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    let nodes: Vec<&str> = rows.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(nodes, vec!["n1", "n2"]);
    for row in &rows {
        assert_eq!(row.version, "v2");
        assert_eq!(row.history_id, "h-42");
        assert_eq!(row.canary_id.as_deref(), Some(canary.id.as_str()));
    }
}

#[tokio::test]
async fn test_nodes_target_selects_listed_devices() {
    let store = Arc::new(MemoryStore::new());
    fleet(&store).await;
    let executor = CanaryExecutor::new(store.clone(), store.clone());

    let canary = executor
        .create(canary_input(CanaryTarget::Nodes(vec![
            "n3".to_string(),
            "missing".to_string(),
        ])))
        .await
        .unwrap();
    let done = executor.execute(&canary.id).await.unwrap();
    assert_eq!(done.device_count, 1);
}

#[tokio::test]
async fn test_executed_canary_cannot_rerun() {
    let store = Arc::new(MemoryStore::new());
    fleet(&store).await;
    let executor = CanaryExecutor::new(store.clone(), store.clone());

    let canary = executor
        .create(canary_input(CanaryTarget::Region(vec!["east".to_string()])))
        .await
        .unwrap();
    executor.execute(&canary.id).await.unwrap();

    let err = executor.execute(&canary.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::Forbidden(_)));
    assert_eq!(
        store.list_config_deployments("p1", "prod").await.unwrap().len(),
        3
    );
}

#[tokio::test]
async fn test_invalid_canaries_rejected() {
    let store = Arc::new(MemoryStore::new());
    let executor = CanaryExecutor::new(store.clone(), store.clone());

    let err = executor
        .create(canary_input(CanaryTarget::Operator(Vec::new())))
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));

    let mut no_history = canary_input(CanaryTarget::Nodes(vec!["n1".to_string()]));
    no_history.history_id = String::new();
    let err = executor.create(no_history).await.unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));

    assert!(executor.list("", "").await.unwrap().is_empty());
    assert!(matches!(
        executor.execute("missing").await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_failed_write_aborts_and_keeps_written_rows() {
    let store = Arc::new(MemoryStore::new());
    fleet(&store).await;
    let rollouts = Arc::new(FlakyRollouts {
        inner: store.clone(),
        limit: 1,
        writes: AtomicUsize::new(0),
    });
    let executor = CanaryExecutor::new(store.clone(), rollouts);

    let canary = executor
        .create(canary_input(CanaryTarget::Region(vec!["east".to_string()])))
        .await
        .unwrap();
    let err = executor.execute(&canary.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::StorageError(_)));

    assert_eq!(
        store.list_config_deployments("p1", "prod").await.unwrap().len(),
        1
    );
    let current = executor.get(&canary.id).await.unwrap();
    assert_eq!(current.status, CanaryStatus::Pending);
    assert_eq!(current.device_count, 0);
}
