//! Version consistency analyzer tests

use std::sync::Arc;

use chrono::Utc;
use graymgr::analyzer::{DriftPolicy, VersionAnalyzer, VersionStat};
use graymgr::store::{MemoryStore, RolloutStore};

use crate::common::deployment;

async fn seeded(rows: &[(&str, &str)]) -> (Arc<MemoryStore>, VersionAnalyzer) {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for (node, version) in rows {
        store
            .upsert_config_deployment(&deployment(node, version, now))
            .await
            .unwrap();
    }
    (store.clone(), VersionAnalyzer::new(store))
}

#[tokio::test]
async fn test_major_drift_is_reported() {
    let (_store, analyzer) = seeded(&[("n1", "2.3.0"), ("n2", "2.4.1")]).await;

    let drift = analyzer
        .get_version_inconsistencies("p1", "prod", DriftPolicy::Major)
        .await
        .unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].bucket, "2");
    assert_eq!(drift[0].versions, vec!["2.3.0", "2.4.1"]);
    assert_eq!(drift[0].device_count, 2);
    assert_eq!(drift[0].node_ids, vec!["n1", "n2"]);
}

#[tokio::test]
async fn test_uniform_fleet_has_no_drift() {
    let (_store, analyzer) = seeded(&[("n1", "2.3.0"), ("n2", "2.3.0"), ("n3", "3.0.0")]).await;

    let drift = analyzer
        .get_version_inconsistencies("p1", "prod", DriftPolicy::Major)
        .await
        .unwrap();
    assert!(drift.is_empty());
}

#[tokio::test]
async fn test_major_minor_policy_splits_buckets() {
    let (_store, analyzer) =
        seeded(&[("n1", "2.3.0"), ("n2", "2.3.7"), ("n3", "2.4.1")]).await;

    let drift = analyzer
        .get_version_inconsistencies("p1", "prod", DriftPolicy::MajorMinor)
        .await
        .unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].bucket, "2.3");
    assert_eq!(drift[0].versions, vec!["2.3.0", "2.3.7"]);
}

#[tokio::test]
async fn test_other_scopes_are_ignored() {
    let (store, analyzer) = seeded(&[("n1", "2.3.0")]).await;
    let mut foreign = deployment("n2", "2.4.1", Utc::now());
    foreign.environment = "staging".to_string();
    store.upsert_config_deployment(&foreign).await.unwrap();

    let drift = analyzer
        .get_version_inconsistencies("p1", "prod", DriftPolicy::Major)
        .await
        .unwrap();
    assert!(drift.is_empty());
}

#[tokio::test]
async fn test_stats_are_stable_across_calls() {
    let (_store, analyzer) = seeded(&[("n1", "1.0.0"), ("n2", "1.0.0"), ("n3", "1.1.0")]).await;

    let first = analyzer.get_version_stats("p1", "prod").await.unwrap();
    let second = analyzer.get_version_stats("p1", "prod").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            VersionStat {
                version: "1.0.0".to_string(),
                device_count: 2,
            },
            VersionStat {
                version: "1.1.0".to_string(),
                device_count: 1,
            },
        ]
    );
}

#[tokio::test]
async fn test_redeploy_replaces_row() {
    let (store, analyzer) = seeded(&[("n1", "1.0.0")]).await;
    store
        .upsert_config_deployment(&deployment("n1", "1.0.0", Utc::now()))
        .await
        .unwrap();

    let stats = analyzer.get_version_stats("p1", "prod").await.unwrap();
    assert_eq!(stats[0].device_count, 1);
}

#[test]
fn test_policy_parsing() {
    assert_eq!("major".parse::<DriftPolicy>().unwrap(), DriftPolicy::Major);
    assert_eq!(
        "major-minor".parse::<DriftPolicy>().unwrap(),
        DriftPolicy::MajorMinor
    );
    assert!("patch".parse::<DriftPolicy>().is_err());
}
