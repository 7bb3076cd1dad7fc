//! Router-level tests: requests go through the full axum stack against an
//! on-disk SQLite database.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use db::models::PermissionLevel;
use db::repository::{deployments, permissions, users, workflows};
use db::{create_pool, run_migrations, DbPool};

use crate::auth::USER_ID_HEADER;
use crate::{router, AppState};

const READER: &str = "u-reader";
const WRITER: &str = "u-writer";
const OUTSIDER: &str = "u-outsider";

struct Fixture {
    pool: DbPool,
    app: Router,
    workflow_id: Uuid,
    _dir: tempfile::TempDir,
}

fn snapshot(title: &str) -> Value {
    json!({
        "blocks": [
            { "id": "start", "type": "starter" },
            { "id": "notify", "type": "api", "title": title, "config": { "url": "https://hooks.example.com" } }
        ],
        "edges": [{ "id": "e1", "source": "start", "target": "notify" }]
    })
}

/// Workflow in `ws-1` with versions 1 and 2 (2 active), one reader and one
/// writer.
async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("api.db").display());
    let pool = create_pool(&url, 4).await.unwrap();
    run_migrations(&pool).await.unwrap();

    users::upsert_user(&pool, READER, "Rita Reader").await.unwrap();
    users::upsert_user(&pool, WRITER, "Wes Writer").await.unwrap();
    users::upsert_user(&pool, OUTSIDER, "Olga Outsider").await.unwrap();
    permissions::grant(&pool, "ws-1", READER, PermissionLevel::Read).await.unwrap();
    permissions::grant(&pool, "ws-1", WRITER, PermissionLevel::Write).await.unwrap();
    permissions::grant(&pool, "ws-2", OUTSIDER, PermissionLevel::Admin).await.unwrap();

    let workflow = workflows::create_workflow(&pool, "Lead intake", "ws-1").await.unwrap();
    deployments::deploy(&pool, workflow.id, &snapshot("v1"), Some(WRITER), None).await.unwrap();
    deployments::deploy(&pool, workflow.id, &snapshot("v2"), Some(WRITER), None).await.unwrap();

    Fixture {
        app: router(AppState::new(pool.clone())),
        pool,
        workflow_id: workflow.id,
        _dir: dir,
    }
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(USER_ID_HEADER, user);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ============================================================
// Identity and permissions
// ============================================================

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let fx = fixture().await;
    let (status, body) = send(&fx.app, "GET", &format!("/workflows/{}/deployments", fx.workflow_id), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing caller identity");
}

#[tokio::test]
async fn user_from_another_workspace_is_forbidden() {
    let fx = fixture().await;
    let (status, _) = send(&fx.app, "GET", &format!("/workflows/{}/deployments", fx.workflow_id), Some(OUTSIDER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_workflow_is_not_found() {
    let fx = fixture().await;
    let (status, body) = send(&fx.app, "GET", &format!("/workflows/{}/deployments", Uuid::new_v4()), Some(READER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "workflow not found");
}

#[tokio::test]
async fn readers_cannot_change_anything() {
    let fx = fixture().await;
    let base = format!("/workflows/{}/deployments", fx.workflow_id);

    let (status, _) = send(&fx.app, "POST", &format!("{base}/1/activate"), Some(READER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&fx.app, "PATCH", &format!("{base}/1"), Some(READER), Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let active = deployments::get_active(&fx.pool, fx.workflow_id).await.unwrap().unwrap();
    assert_eq!(active.version, 2);
}

// ============================================================
// Reads
// ============================================================

#[tokio::test]
async fn list_returns_versions_newest_first() {
    let fx = fixture().await;
    let (status, body) = send(&fx.app, "GET", &format!("/workflows/{}/deployments", fx.workflow_id), Some(READER), None).await;

    assert_eq!(status, StatusCode::OK);
    let versions = body["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["version"], 2);
    assert_eq!(versions[0]["isActive"], true);
    assert_eq!(versions[0]["deployedBy"], "Wes Writer");
    assert_eq!(versions[1]["version"], 1);
    assert_eq!(versions[1]["isActive"], false);
}

#[tokio::test]
async fn get_returns_the_deployed_state() {
    let fx = fixture().await;
    let base = format!("/workflows/{}/deployments", fx.workflow_id);

    let (status, body) = send(&fx.app, "GET", &format!("{base}/1"), Some(READER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deployedState"], snapshot("v1"));

    let (status, body) = send(&fx.app, "GET", &format!("{base}/9"), Some(READER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("version 9"));
}

// ============================================================
// Writes
// ============================================================

#[tokio::test]
async fn rename_validates_and_returns_the_trimmed_name() {
    let fx = fixture().await;
    let uri = format!("/workflows/{}/deployments/1", fx.workflow_id);

    let (status, body) = send(&fx.app, "PATCH", &uri, Some(WRITER), Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name must not be empty");

    let (status, _) = send(&fx.app, "PATCH", &uri, Some(WRITER), Some(json!({ "name": "n".repeat(101) }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&fx.app, "PATCH", &uri, Some(WRITER), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&fx.app, "PATCH", &uri, Some(WRITER), Some(json!({ "name": " Holiday campaign " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": "Holiday campaign" }));

    let missing = format!("/workflows/{}/deployments/5", fx.workflow_id);
    let (status, _) = send(&fx.app, "PATCH", &missing, Some(WRITER), Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn activate_switches_the_live_version() {
    let fx = fixture().await;
    let base = format!("/workflows/{}/deployments", fx.workflow_id);

    let (status, body) = send(&fx.app, "POST", &format!("{base}/1/activate"), Some(WRITER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["deployedAt"].is_string());

    let active = deployments::get_active(&fx.pool, fx.workflow_id).await.unwrap().unwrap();
    assert_eq!(active.version, 1);

    let (status, _) = send(&fx.app, "POST", &format!("{base}/42/activate"), Some(WRITER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let active = deployments::get_active(&fx.pool, fx.workflow_id).await.unwrap().unwrap();
    assert_eq!(active.version, 1);
}

#[tokio::test]
async fn deploy_appends_a_checked_snapshot() {
    let fx = fixture().await;
    let uri = format!("/workflows/{}/deployments", fx.workflow_id);

    let unknown_kind = json!({ "state": { "blocks": [{ "id": "x", "type": "spreadsheet" }], "edges": [] } });
    let (status, _) = send(&fx.app, "POST", &uri, Some(WRITER), Some(unknown_kind)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let dangling = json!({ "state": {
        "blocks": [{ "id": "start", "type": "starter" }],
        "edges": [{ "id": "e1", "source": "start", "target": "ghost" }]
    }});
    let (status, body) = send(&fx.app, "POST", &uri, Some(WRITER), Some(dangling)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let (status, body) = send(
        &fx.app,
        "POST",
        &uri,
        Some(WRITER),
        Some(json!({ "state": snapshot("v3"), "name": "Third" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["version"], 3);
    assert_eq!(body["isActive"], true);
    assert_eq!(body["name"], "Third");
    assert_eq!(body["createdBy"], WRITER);
}

// ============================================================
// Malformed requests
// ============================================================

#[tokio::test]
async fn bad_path_segments_answer_with_a_json_error() {
    let fx = fixture().await;

    let (status, body) = send(&fx.app, "GET", "/workflows/not-a-uuid/deployments", Some(READER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let uri = format!("/workflows/{}/deployments/latest", fx.workflow_id);
    let (status, body) = send(&fx.app, "POST", &format!("{uri}/activate"), Some(WRITER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unparseable_bodies_answer_with_a_json_error() {
    let fx = fixture().await;
    let uri = format!("/workflows/{}/deployments/1", fx.workflow_id);

    let request = Request::builder()
        .method("PATCH")
        .uri(&uri)
        .header(USER_ID_HEADER, WRITER)
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let response = fx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    let (status, body) = send(&fx.app, "PATCH", &uri, Some(WRITER), Some(json!({ "name": 7 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&fx.app, "POST", &format!("/workflows/{}/deployments", fx.workflow_id), Some(WRITER), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let active = deployments::get_active(&fx.pool, fx.workflow_id).await.unwrap().unwrap();
    assert_eq!(active.version, 2);
}
