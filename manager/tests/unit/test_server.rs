//! HTTP API tests driven through the router

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use graymgr::analyzer::VersionAnalyzer;
use graymgr::catalog::{ConfigService, ProjectService};
use graymgr::filesys::dir::Dir;
use graymgr::fleet::NodeRegistry;
use graymgr::gray::GrayEngine;
use graymgr::release::PipelineJob;
use graymgr::rollout::CanaryExecutor;
use graymgr::server::serve::router;
use graymgr::server::state::{BinSource, ServerState};
use graymgr::storage::settings::CompletionMode;
use graymgr::store::MemoryStore;
use graymgr::utils::sha256_hash;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use crate::common::{release_manager, FakeVcs};

const PACKAGE: &str = "MIKUD_LIVE.2025-10-25-14-38-30.tar.gz";

struct TestApp {
    router: Router,
    downloads: Dir,
    vcs: Arc<FakeVcs>,
    _jobs: mpsc::Receiver<PipelineJob>,
}

async fn test_app(vcs: FakeVcs) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let (releases, jobs) = release_manager(store.clone(), CompletionMode::External);
    let downloads = Dir::create_temp_dir("graymgr-server").await.unwrap();
    let vcs = Arc::new(vcs);
    let state = ServerState {
        releases,
        gray: Arc::new(GrayEngine::new(store.clone())),
        canaries: Arc::new(CanaryExecutor::new(store.clone(), store.clone())),
        analyzer: Arc::new(VersionAnalyzer::new(store.clone())),
        configs: Arc::new(ConfigService::new(
            store.clone(),
            vcs.clone(),
            "master".to_string(),
        )),
        projects: Arc::new(ProjectService::new(store)),
        registry: Arc::new(NodeRegistry::new()),
        vcs: vcs.clone(),
        bins: BinSource {
            version_file: "streamd.json".to_string(),
            mainline: "master".to_string(),
            downloads: downloads.clone(),
        },
    };
    TestApp {
        router: router(Arc::new(state)),
        downloads,
        vcs,
        _jobs: jobs,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", uri, body).await
    }

    async fn create_release(&self) -> String {
        let (status, body) = self
            .post(
                "/api/v1/releases",
                json!({"projectId": "p1", "projectName": "live", "version": "v1", "environment": "prod"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

fn progress(release_id: &str) -> Value {
    json!({
        "nodeName": "edge-1",
        "targetHash": "abc",
        "status": "success",
        "processingTime": 12,
        "releaseId": release_id
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app(FakeVcs::default()).await;
    let (status, body) = app.get("/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["nodes_count"], 0);
    assert_eq!(body["bins_count"], 0);
}

#[tokio::test]
async fn test_release_lifecycle_over_http() {
    let app = test_app(FakeVcs::default()).await;
    let id = app.create_release().await;

    let (status, body) = app.get(&format!("/api/v1/releases/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "pending_approval");

    let (status, _) = app
        .post(&format!("/api/v1/releases/{}/complete", id), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for step in ["approve", "deploy", "complete"] {
        let (status, _) = app
            .post(&format!("/api/v1/releases/{}/{}", id, step), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{} failed", step);
    }

    let (_, body) = app.get("/api/v1/releases?status=completed").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/v1/releases?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
}

#[tokio::test]
async fn test_errors_use_envelope() {
    let app = test_app(FakeVcs::default()).await;

    let (status, body) = app.get("/api/v1/releases/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 1);
    assert!(body["message"].as_str().unwrap().contains("missing"));
    assert!(body.get("data").is_none());

    let (status, body) = app
        .post("/api/v1/releases", json!({"projectId": "p1"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
}

#[tokio::test]
async fn test_download_gated_on_approval() {
    let app = test_app(FakeVcs::default()).await;
    app.downloads
        .file(PACKAGE)
        .write_atomic(b"package-bytes")
        .await
        .unwrap();
    let id = app.create_release().await;
    let uri = format!("/api/v1/download/{}?releaseId={}", PACKAGE, id);

    let (status, _) = app
        .send(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post("/api/v1/bins/streamd/progress", progress(&id))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.post(&format!("/api/v1/releases/{}/approve", id), json!({}))
        .await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}\"", PACKAGE)
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"package-bytes");

    let (status, body) = app
        .post("/api/v1/bins/streamd/progress", progress(&id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["binName"], "streamd");

    // Progress never completes the release
    let (_, body) = app.get(&format!("/api/v1/releases/{}", id)).await;
    assert_eq!(body["data"]["status"], "approved");
}

#[tokio::test]
async fn test_download_rejects_bad_names() {
    let app = test_app(FakeVcs::default()).await;

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/v1/download/..%2Fsettings.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/v1/download/absent.tar.gz")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_published_bin_checksum() {
    let vcs = FakeVcs::with_file(
        "streamd.json",
        "master",
        &json!({"name": "streamd", "version": PACKAGE}).to_string(),
    );
    let app = test_app(vcs).await;

    let (status, _) = app.get("/api/v1/bins/streamd").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.downloads
        .file(PACKAGE)
        .write_atomic(b"package-bytes")
        .await
        .unwrap();
    let (status, body) = app.get("/api/v1/bins/streamd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bin_name"], "streamd");
    assert_eq!(body["data"]["version"], PACKAGE);
    assert_eq!(body["data"]["sha256sum"], sha256_hash(b"package-bytes"));
}

#[tokio::test]
async fn test_keepalive_registers_node() {
    let app = test_app(FakeVcs::default()).await;

    let (status, _) = app.get("/api/v1/keepalive?node_id=n1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/v1/keepalive",
            json!({"node_id": "n1", "cpu_arch": "x86_64", "node_name": "edge-1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get("/api/v1/keepalive?node_id=n1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["node_name"], "edge-1");

    let (_, body) = app.get("/api/v1/health").await;
    assert_eq!(body["nodes_count"], 1);
}

#[tokio::test]
async fn test_gray_check_over_http() {
    let app = test_app(FakeVcs::default()).await;
    let (status, _) = app
        .post(
            "/api/v1/gray-releases",
            json!({
                "projectId": "p1",
                "environment": "prod",
                "version": "v2",
                "rules": [{"dimension": "isp", "values": ["telecom"]}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let device = |isp: &str| {
        json!({"nodeId": "n1", "projectId": "p1", "environment": "prod", "isp": isp})
    };
    let (_, body) = app
        .post("/api/v1/gray-releases/check", device("telecom"))
        .await;
    assert_eq!(body["data"]["matched"], true);
    assert_eq!(body["data"]["version"], "v2");

    let (_, body) = app
        .post("/api/v1/gray-releases/check", device("unicom"))
        .await;
    assert_eq!(body["data"]["matched"], false);

    let (status, _) = app
        .get("/api/v1/versions/inconsistencies?projectId=p1&environment=prod&policy=patch")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_node_bins_and_progress_are_readable() {
    let app = test_app(FakeVcs::default()).await;

    let (status, _) = app.get("/api/v1/bins/streamd/nodes/n1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for (node, bin) in [("n1", "streamd"), ("n2", "streamd"), ("n2", "relay")] {
        let (status, _) = app
            .post(
                &format!("/api/v1/bins/{}", bin),
                json!({"node_id": node, "sha256sum": format!("{}-{}", node, bin)}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.get("/api/v1/bins/streamd/nodes/n2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sha256sum"], "n2-streamd");

    let (_, body) = app.get("/api/v1/health").await;
    assert_eq!(body["bins_count"], 2);

    let (_, body) = app.get("/api/v1/bins/streamd/progress").await;
    assert!(body["data"].as_array().unwrap().is_empty());

    for node in ["edge-2", "edge-1"] {
        let (status, _) = app
            .post(
                "/api/v1/bins/streamd/progress",
                json!({"nodeName": node, "targetHash": "abc", "status": "success"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.get("/api/v1/bins/streamd/progress").await;
    assert_eq!(status, StatusCode::OK);
    let nodes: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["nodeName"].as_str().unwrap())
        .collect();
    assert_eq!(nodes, vec!["edge-1", "edge-2"]);
}

#[tokio::test]
async fn test_batch_delete_releases() {
    let app = test_app(FakeVcs::default()).await;
    let first = app.create_release().await;
    let second = app.create_release().await;

    let (status, body) = app
        .post(
            "/api/v1/releases/batch-delete",
            json!({"ids": [first, "missing"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 1);

    let (status, _) = app.get(&format!("/api/v1/releases/{}", first)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/api/v1/releases/{}", second)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/v1/releases/batch-delete", json!({"ids": []}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_changes_are_audited() {
    let app = test_app(FakeVcs::default()).await;

    let (status, body) = app
        .post(
            "/api/v1/configs",
            json!({
                "config": {"projectId": "p1", "key": "timeout", "value": "30", "environment": "prod"},
                "operator": "alice",
                "reason": "initial",
                "submitToGitlab": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["config"]["id"].as_str().unwrap().to_string();
    let created_history = body["data"]["historyId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["mrUrl"], "http://gitlab.local/mr/1");
    {
        let requests = app.vcs.merge_requests.lock().unwrap();
        assert_eq!(requests[0].title, "Config update: timeout");
        let files = app.vcs.files.lock().unwrap();
        let (_, content) = files
            .iter()
            .find(|((path, _), _)| path == "configs/prod/p1_timeout.json")
            .unwrap();
        let doc: Value = serde_json::from_str(content).unwrap();
        assert_eq!(doc["value"], "30");
    }

    let (status, body) = app
        .send_json(
            "PUT",
            &format!("/api/v1/configs/{}", id),
            json!({
                "config": {"key": "timeout", "value": "45", "environment": "prod"},
                "operator": "bob",
                "reason": "slow upstream"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["config"]["value"], "45");
    assert_eq!(body["data"]["config"]["projectId"], "p1");
    assert!(body["data"].get("mrUrl").is_none());
    let updated_history = body["data"]["historyId"].as_str().unwrap().to_string();

    let (_, body) = app
        .get(&format!(
            "/api/v1/configs/compare?id1={}&id2={}",
            created_history, updated_history
        ))
        .await;
    assert_eq!(body["data"]["diff"]["sameKey"], true);
    assert_eq!(body["data"]["diff"]["newValue1"], "30");
    assert_eq!(body["data"]["diff"]["newValue2"], "45");

    let (status, _) = app.get("/api/v1/configs/compare?id1=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_json(
            "DELETE",
            &format!("/api/v1/configs/{}", id),
            json!({"reason": "cleanup"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .send_json(
            "DELETE",
            &format!("/api/v1/configs/{}", id),
            json!({"operator": "carol", "reason": "cleanup"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changeType"], "delete");
    assert_eq!(body["data"]["oldValue"], "45");

    let (status, _) = app.get(&format!("/api/v1/configs/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get(&format!("/api/v1/configs/{}/history", id)).await;
    let changes: Vec<(&str, &str)> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| (h["changeType"].as_str().unwrap(), h["operator"].as_str().unwrap()))
        .collect();
    assert_eq!(
        changes,
        vec![("delete", "carol"), ("update", "bob"), ("create", "alice")]
    );
}

#[tokio::test]
async fn test_project_crud_over_http() {
    let app = test_app(FakeVcs::default()).await;

    let (status, _) = app.post("/api/v1/projects", json!({"code": "live"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/v1/projects",
            json!({"name": "Live", "code": "live", "owner": "ops"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "active");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send_json(
            "PUT",
            &format!("/api/v1/projects/{}", id),
            json!({"name": "Live CDN", "code": "live"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Live CDN");
    assert_eq!(body["data"]["owner"], "");

    let (_, body) = app.get("/api/v1/projects").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/projects/{}", id);
    let (status, _) = app.send_json("DELETE", &uri, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send_json("DELETE", &uri, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
