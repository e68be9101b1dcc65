//! Gray release engine tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use graymgr::errors::ManagerError;
use graymgr::gray::GrayEngine;
use graymgr::models::gray::{
    DeviceFilter, DeviceReleaseState, Dimension, GrayConfigInput, GrayConfigStatus,
    GrayReleaseConfig, GrayRule, GrayStrategy,
};
use graymgr::store::{GrayConfigFilter, GrayStore, MemoryStore};

use crate::common::device;

fn rule(dimension: Dimension, values: &[&str]) -> GrayRule {
    GrayRule {
        dimension,
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

fn input(version: &str, rules: Vec<GrayRule>) -> GrayConfigInput {
    GrayConfigInput {
        name: format!("gray {}", version),
        project_id: "p1".to_string(),
        environment: "prod".to_string(),
        version: version.to_string(),
        rules,
        creator: "alice".to_string(),
        ..Default::default()
    }
}

fn config_at(id: &str, version: &str, rules: Vec<GrayRule>, age_secs: i64) -> GrayReleaseConfig {
    let at = Utc::now() - Duration::seconds(age_secs);
    GrayReleaseConfig {
        id: id.to_string(),
        name: id.to_string(),
        project_id: "p1".to_string(),
        environment: "prod".to_string(),
        version: version.to_string(),
        rules,
        strategies: Vec::new(),
        status: GrayConfigStatus::Active,
        description: String::new(),
        creator: "alice".to_string(),
        created_at: at,
        updated_at: at,
    }
}

fn engine() -> (Arc<MemoryStore>, GrayEngine) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), GrayEngine::new(store))
}

#[tokio::test]
async fn test_single_rule_match_and_miss() {
    let (_store, engine) = engine();
    engine
        .create_config(input("v2", vec![rule(Dimension::Isp, &["telecom"])]))
        .await
        .unwrap();

    let hit = engine
        .check_device(&device("n1", "telecom", "east"))
        .await
        .unwrap();
    assert_eq!(hit.as_deref(), Some("v2"));

    let miss = engine
        .check_device(&device("n2", "unicom", "east"))
        .await
        .unwrap();
    assert!(miss.is_none());
}

#[tokio::test]
async fn test_rules_are_anded() {
    let (_store, engine) = engine();
    engine
        .create_config(input(
            "v2",
            vec![
                rule(Dimension::Isp, &["telecom"]),
                rule(Dimension::Region, &["east"]),
            ],
        ))
        .await
        .unwrap();

    let both = engine
        .check_device(&device("n1", "telecom", "east"))
        .await
        .unwrap();
    assert_eq!(both.as_deref(), Some("v2"));

    let one = engine
        .check_device(&device("n2", "telecom", "west"))
        .await
        .unwrap();
    assert!(one.is_none());
}

#[tokio::test]
async fn test_newest_config_wins() {
    let (store, engine) = engine();
    let rules = vec![rule(Dimension::Isp, &["telecom"])];
    store
        .insert_gray_config(&config_at("t1", "v1", rules.clone(), 120))
        .await
        .unwrap();
    store
        .insert_gray_config(&config_at("t2", "v2", rules, 60))
        .await
        .unwrap();

    let version = engine
        .check_device(&device("n1", "telecom", "east"))
        .await
        .unwrap();
    assert_eq!(version.as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_scope_is_respected() {
    let (_store, engine) = engine();
    engine
        .create_config(input("v2", vec![rule(Dimension::Isp, &["telecom"])]))
        .await
        .unwrap();

    let mut staging = device("n1", "telecom", "east");
    staging.environment = "staging".to_string();
    assert!(engine.check_device(&staging).await.unwrap().is_none());
}

#[tokio::test]
async fn test_closed_strategy_blocks_match() {
    let (_store, engine) = engine();
    let mut gated = input("v3", vec![rule(Dimension::Isp, &["telecom"])]);
    gated.strategies = vec![GrayStrategy {
        weight: 100,
        start_at: Some(Utc::now() + Duration::hours(1)),
        end_at: None,
    }];
    engine.create_config(gated).await.unwrap();

    assert!(engine
        .check_device(&device("n1", "telecom", "east"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_full_release_promotes_and_closes() {
    let (store, engine) = engine();
    engine
        .create_config(input("v4", vec![rule(Dimension::Isp, &["telecom"])]))
        .await
        .unwrap();
    for (node, isp) in [("n1", "telecom"), ("n2", "unicom"), ("n3", "mobile")] {
        engine
            .report_device_status(device(node, isp, "east"))
            .await
            .unwrap();
    }
    let mut other = device("n9", "telecom", "east");
    other.project_id = "p2".to_string();
    engine.report_device_status(other).await.unwrap();

    let summary = engine.full_release("p1", "prod", "v5", "alice").await.unwrap();
    assert_eq!(summary.devices_updated, 3);
    assert_eq!(summary.configs_completed, 1);

    let devices = store
        .list_device_statuses(&DeviceFilter::scope("p1", "prod"))
        .await
        .unwrap();
    assert_eq!(devices.len(), 3);
    for d in &devices {
        assert_eq!(d.current_version, "v5");
        assert_eq!(d.status, DeviceReleaseState::Released);
    }

    let untouched = store
        .list_device_statuses(&DeviceFilter::scope("p2", "prod"))
        .await
        .unwrap();
    assert_eq!(untouched[0].current_version, "v1");

    let active = store
        .list_gray_configs(&GrayConfigFilter::new().scope("p1", "prod").status(GrayConfigStatus::Active))
        .await
        .unwrap();
    assert!(active.is_empty());

    assert!(engine
        .check_device(&device("n1", "telecom", "east"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_full_release_requires_scope() {
    let (_store, engine) = engine();
    let err = engine.full_release("", "prod", "v5", "alice").await.unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));
}

#[tokio::test]
async fn test_device_status_upsert_replaces() {
    let (store, engine) = engine();
    engine
        .report_device_status(device("n1", "telecom", "east"))
        .await
        .unwrap();
    let mut moved = device("n1", "unicom", "west");
    moved.current_version = "v2".to_string();
    engine.report_device_status(moved).await.unwrap();

    let devices = store
        .list_device_statuses(&DeviceFilter::scope("p1", "prod"))
        .await
        .unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].isp, "unicom");
    assert_eq!(devices[0].current_version, "v2");
}

#[tokio::test]
async fn test_device_stats_breakdown() {
    let (_store, engine) = engine();
    engine
        .report_device_status(device("n1", "telecom", "east"))
        .await
        .unwrap();
    engine
        .report_device_status(device("n2", "telecom", "west"))
        .await
        .unwrap();
    let mut newer = device("n3", "", "west");
    newer.current_version = "v2".to_string();
    engine.report_device_status(newer).await.unwrap();

    let stats = engine.device_stats("p1", "prod").await.unwrap();
    assert_eq!(stats.len(), 2);

    assert_eq!(stats[0].version, "v1");
    assert_eq!(stats[0].device_count, 2);
    assert_eq!(stats[0].by_dimension["isp_telecom"], 2);
    assert_eq!(stats[0].by_dimension["region_east"], 1);
    assert_eq!(stats[0].by_dimension["datacenter_dc-1"], 2);

    assert_eq!(stats[1].version, "v2");
    assert!(!stats[1].by_dimension.keys().any(|k| k.starts_with("isp_")));
}

#[tokio::test]
async fn test_config_crud() {
    let (_store, engine) = engine();
    let created = engine
        .create_config(input("v2", vec![rule(Dimension::Province, &["zhejiang"])]))
        .await
        .unwrap();
    assert_eq!(created.status, GrayConfigStatus::Active);

    let mut change = input("v3", vec![rule(Dimension::Province, &["jiangsu"])]);
    change.status = Some(GrayConfigStatus::Completed);
    let updated = engine.update_config(&created.id, change).await.unwrap();
    assert_eq!(updated.version, "v3");
    assert_eq!(updated.status, GrayConfigStatus::Completed);
    assert_eq!(updated.created_at, created.created_at);

    assert_eq!(engine.list_configs("p1", "").await.unwrap().len(), 1);

    engine.delete_config(&created.id).await.unwrap();
    assert!(matches!(
        engine.get_config(&created.id).await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
    assert!(matches!(
        engine.delete_config(&created.id).await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_invalid_configs_rejected() {
    let (_store, engine) = engine();
    let err = engine.create_config(input("", Vec::new())).await.unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));

    let mut heavy = input("v2", vec![rule(Dimension::Isp, &["telecom"])]);
    heavy.strategies = vec![GrayStrategy {
        weight: 150,
        start_at: None,
        end_at: None,
    }];
    let err = engine.create_config(heavy).await.unwrap_err();
    assert!(matches!(err, ManagerError::ValidationError(_)));
}
