// tests/api_test.rs
// Full-router tests: a seeded temp workspace served through the real axum
// router, store-backed and cache-backed.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use planboard::api::router::app;
use planboard::config::{PlanboardConfig, StorageMode};
use planboard::state::AppState;

const CRON_SECRET: &str = "s3cret";

/// Helper to set up a clean, isolated test environment: a two-project
/// workspace and an app over an in-memory database.
fn setup(mode: StorageMode) -> (TempDir, Router) {
    let root = seed_workspace();
    let config = PlanboardConfig {
        workspace_root: root.path().display().to_string(),
        output_content_max: 16384,
        database_url: "sqlite::memory:".to_string(),
        sqlite_max_connections: 1,
        storage_mode: mode,
        cache_ttl_secs: 300,
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origin: "http://localhost:3000".to_string(),
        cron_secret: Some(CRON_SECRET.to_string()),
        log_level: "info".to_string(),
    };
    let router = app(Arc::new(AppState::from_config(config)));
    (root, router)
}

fn seed_workspace() -> TempDir {
    let root = TempDir::new().unwrap();

    let alpha = root.path().join("project-alpha");
    fs::create_dir_all(alpha.join("tasks")).unwrap();
    fs::create_dir_all(alpha.join("outputs")).unwrap();
    fs::write(
        alpha.join("overview.md"),
        "# PROJ: Alpha\n\n## Snapshot\n- Objective: Ship alpha\n\n## Meta\n- Status: active\n- Priority: P1\n",
    )
    .unwrap();
    fs::write(
        alpha.join("tasks").join("T-001.md"),
        "# T-001: First task\n\n## Meta\n- Owner: ana\n- Status: in_progress\n",
    )
    .unwrap();
    fs::write(
        alpha.join("tasks").join("T-002.md"),
        "# T-002: Second task\n\n## Meta\n- Owner: ben\n",
    )
    .unwrap();
    fs::write(
        alpha.join("outputs").join("report.md"),
        "# OUT-001: Report\n- Type: report\n- Task: T-001\n\nFindings.\n",
    )
    .unwrap();

    let beta = root.path().join("project-beta");
    fs::create_dir_all(beta.join("tasks")).unwrap();
    fs::write(
        beta.join("overview.md"),
        "# PROJ: Beta\n\n## Meta\n- Status: paused\n",
    )
    .unwrap();
    fs::write(
        beta.join("tasks").join("T-001.md"),
        "# T-001: Beta's first\n\n## Meta\n- Owner: cam\n",
    )
    .unwrap();

    root
}

async fn request(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    request(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    request(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn refresh(router: &Router) -> Value {
    let (status, body) = request(
        router,
        Request::builder()
            .method("POST")
            .uri("/api/refresh")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_refresh_reports_counts_and_populates_store() {
    let (_root, router) = setup(StorageMode::Store);

    let body = refresh(&router).await;
    assert_eq!(body["synced"]["projects"], 2);
    assert_eq!(body["synced"]["tasks"], 3);
    assert_eq!(body["synced"]["outputs"], 1);

    let (status, projects) = get(&router, "/api/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(projects.as_array().unwrap().len(), 2);

    let (_, active) = get(&router, "/api/projects?status=active").await;
    let active = active.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["slug"], "alpha");
    assert_eq!(active[0]["priority"], "P1");
}

#[tokio::test]
async fn test_task_filters_and_id_normalization() {
    let (_root, router) = setup(StorageMode::Store);
    refresh(&router).await;

    let (_, alpha_tasks) = get(&router, "/api/tasks?project=alpha").await;
    assert_eq!(alpha_tasks.as_array().unwrap().len(), 2);

    // Both projects carry a T-001; the bare id filter finds both, the
    // project filter disambiguates.
    let (_, both) = get(&router, "/api/tasks?id=001").await;
    assert_eq!(both.as_array().unwrap().len(), 2);

    let (_, scoped) = get(&router, "/api/tasks?id=T-001&project=beta").await;
    let scoped = scoped.as_array().unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0]["owner"], "cam");

    // Unknown query parameters are ignored rather than rejected.
    let (status, _) = get(&router, "/api/tasks?sort=title&project=alpha").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_output_filters() {
    let (_root, router) = setup(StorageMode::Store);
    refresh(&router).await;

    let (_, outputs) = get(&router, "/api/outputs?task=001").await;
    let outputs = outputs.as_array().unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0]["id"], "OUT-001");
    assert_eq!(outputs[0]["outputType"], "report");

    let (_, by_id) = get(&router, "/api/outputs?id=001").await;
    assert_eq!(by_id.as_array().unwrap().len(), 1);

    let (_, none) = get(&router, "/api/outputs?project=beta").await;
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_rejects_partial_payload_without_mutation() {
    let (_root, router) = setup(StorageMode::Store);
    refresh(&router).await;

    let (status, body) = post_json(
        &router,
        "/api/webhook",
        json!({ "projects": [], "tasks": [], "lastSync": "2025-03-01T00:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);

    // Stored data is untouched.
    let (_, tasks) = get(&router, "/api/tasks").await;
    assert_eq!(tasks.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_webhook_publishes_supplied_snapshot() {
    let (_root, router) = setup(StorageMode::Store);

    let payload = json!({
        "projects": [{
            "slug": "gamma",
            "title": "Gamma",
            "objective": "Pushed from another host",
            "successMetrics": [],
            "status": "active",
            "priority": "P2",
            "lastUpdated": "2025-03-01T00:00:00Z",
            "path": "project-gamma/overview.md"
        }],
        "tasks": [],
        "outputs": [],
        "lastSync": "2025-03-01T00:00:00Z"
    });
    let (status, body) = post_json(&router, "/api/webhook", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synced"]["projects"], 1);

    let (_, projects) = get(&router, "/api/projects").await;
    let projects = projects.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["slug"], "gamma");
}

#[tokio::test]
async fn test_cron_requires_the_shared_secret() {
    let (_root, router) = setup(StorageMode::Store);

    let (status, _) = get(&router, "/api/cron").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(
        &router,
        Request::builder()
            .uri("/api/cron")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // No side effects from the rejected calls.
    let (_, projects) = get(&router, "/api/projects").await;
    assert!(projects.as_array().unwrap().is_empty());

    let (status, body) = request(
        &router,
        Request::builder()
            .uri("/api/cron")
            .header(header::AUTHORIZATION, format!("Bearer {CRON_SECRET}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], true);

    // Immediately after, the data is fresh and the periodic trigger skips.
    let (status, body) = request(
        &router,
        Request::builder()
            .uri("/api/cron")
            .header(header::AUTHORIZATION, format!("Bearer {CRON_SECRET}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], false);
}

#[tokio::test]
async fn test_cache_mode_serves_reads_through_the_snapshot() {
    let (_root, router) = setup(StorageMode::Cache);

    // No refresh first: the read-through path scans on miss.
    let (status, tasks) = get(&router, "/api/tasks?project=alpha").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().unwrap().len(), 2);

    let (_, in_progress) = get(&router, "/api/tasks?status=in_progress").await;
    let in_progress = in_progress.as_array().unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0]["id"], "T-001");
    assert_eq!(in_progress[0]["owner"], "ana");
}

#[tokio::test]
async fn test_health_reports_backend() {
    let (_root, router) = setup(StorageMode::Store);
    let (status, body) = get(&router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "store");
    assert_eq!(body["healthy"], true);

    let (_root, router) = setup(StorageMode::Cache);
    let (_, body) = get(&router, "/api/health").await;
    assert_eq!(body["backend"], "cache");
}
