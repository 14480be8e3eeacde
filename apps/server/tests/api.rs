//! Router-level tests against a real SQLite database in a temp directory.

use std::collections::HashMap;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

use adpulse_server::{app_router, build_state, ServerConfig};

async fn test_app() -> Router {
    let data_dir = tempdir()
        .expect("tempdir")
        .keep()
        .to_string_lossy()
        .to_string();
    let vars: HashMap<&str, String> = HashMap::from([
        ("ADPULSE_DATA_DIR", data_dir),
        // Nothing listens here; tests never reach a platform.
        ("META_API_BASE_URL", "http://127.0.0.1:9".to_string()),
        ("GOOGLE_ADS_API_BASE_URL", "http://127.0.0.1:9".to_string()),
        ("GOOGLE_OAUTH_TOKEN_URL", "http://127.0.0.1:9/token".to_string()),
    ]);
    let config = ServerConfig::from_lookup(|key| vars.get(key).cloned()).expect("config");
    let state = build_state(&config).await.expect("state");
    app_router(state, &config.frontend_url)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_check_reports_ok() {
    let app = test_app().await;
    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn insights_start_empty_and_reject_unknown_ranges() {
    let app = test_app().await;

    let (status, body) = send(&app, get("/insights?range=30")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, get("/insights?range=14")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/insights/all")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "7": [], "30": [], "180": [] }));
}

#[tokio::test]
async fn sync_budget_is_enforced_and_resettable() {
    let app = test_app().await;

    let (status, body) = send(&app, get("/insights/sync/last-run")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());

    let (status, body) = send(&app, get("/insights/sync-status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["syncsRemaining"], 3);
    assert_eq!(body["canSync"], true);

    for expected_remaining in [2, 1, 0] {
        let (status, body) = send(&app, post_empty("/insights/sync")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "started");
        assert_eq!(body["syncsRemaining"], expected_remaining);
    }

    let (status, body) = send(&app, post_empty("/insights/sync")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["syncsRemaining"], 0);
    assert!(body["nextFreeAt"].is_string());
    assert!(body["cooldownSecondsRemaining"].as_i64().unwrap() > 0);

    let (status, body) = send(&app, post_empty("/insights/sync/reset")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["syncStatus"]["syncsRemaining"], 3);
}

#[tokio::test]
async fn integrations_are_stored_and_listed_masked() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/integrations",
            json!({
                "platform": "meta",
                "accountId": "act_42",
                "email": "owner@example.com",
                "accessToken": "EAAsecret"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["integration"]["accessToken"], "********");
    assert_eq!(body["syncStarted"], true);

    let (status, body) = send(&app, get("/integrations?platform=meta")).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().expect("array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["accountId"], "act_42");
    assert_eq!(listed[0]["accountName"], "act_42");
    assert_eq!(listed[0]["accessToken"], "********");

    let (_, body) = send(&app, get("/integrations?platform=google")).await;
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, get("/integrations?platform=tiktok")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn integration_without_token_is_rejected() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        post_json(
            "/integrations",
            json!({ "platform": "google", "accountId": "123-456-7890", "accessToken": "  " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn index_status_lists_both_tables() {
    let app = test_app().await;
    let (status, body) = send(&app, get("/admin/index-status")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["status"] == "Active"));
    assert_eq!(entries[0]["table"], "meta_campaign_metrics");
}
