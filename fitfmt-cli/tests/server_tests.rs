#![allow(clippy::unwrap_used)]
//! Integration tests for the HTTP invocation endpoint.
//!
//! Requests are sent straight to the router; no socket is bound.

use std::fs;
use std::path::PathBuf;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fitfmt::Engine;
use fitfmt_cli::file_store::JsonFileStore;
use fitfmt_cli::server::{AppState, router};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

const MESSY: &str = "<p>Easy pace on day one.</p>\n<p>Keep it steady.</p>";

fn app(dir: &TempDir) -> (Router, PathBuf) {
    let path = dir.path().join("records.json");
    let records = json!([
        { "id": "p-1", "kind": "program", "category": "CARDIO", "format": "CIRCUIT", "body": MESSY },
        { "id": "s-1", "kind": "program", "category": "STRENGTH", "format": "REPS & SETS", "body": MESSY },
    ]);
    fs::write(&path, records.to_string()).unwrap();
    let store = JsonFileStore::open(&path).unwrap();
    (router(AppState::new(Engine::standard(), store), 0), path)
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn invoke(app: Router, invocation: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/integrity")
        .header("content-type", "application/json")
        .body(Body::from(invocation.to_string()))
        .unwrap();
    call(app, request).await
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    call(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

// ─────────────────────────────────────────────────────────────────────────────
// POST /integrity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_audit_invocation() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(&dir);

    let (status, body) = invoke(app, &json!({ "mode": "audit", "batchSize": 1 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "audit");
    assert_eq!(body["totalScanned"], 1);
    assert_eq!(body["violating"], 1);
    assert_eq!(body["nextOffset"], 1);
}

#[tokio::test]
async fn test_repair_invocation_persists() {
    let dir = TempDir::new().unwrap();
    let (app, path) = app(&dir);

    let (status, body) = invoke(app, &json!({ "mode": "repair" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "repair");
    assert_eq!(body["repairedIds"], json!(["p-1", "s-1"]));
    assert_eq!(body["dryRun"], false);

    let saved = JsonFileStore::open(&path).unwrap();
    assert!(saved.records().iter().all(|r| !r.body.contains('\n')));
}

#[tokio::test]
async fn test_dry_run_invocation_does_not_write() {
    let dir = TempDir::new().unwrap();
    let (app, path) = app(&dir);
    let before = fs::read_to_string(&path).unwrap();

    let (status, body) = invoke(app, &json!({ "mode": "repair", "dryRun": true })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["repairedIds"], json!(["p-1", "s-1"]));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_category_invocation() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(&dir);

    let (status, body) = invoke(app, &json!({ "mode": "audit", "category": "STRENGTH" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalScanned"], 1);
    assert_eq!(body["records"][0]["id"], "s-1");
}

#[tokio::test]
async fn test_zero_batch_size_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(&dir);

    let (status, body) = invoke(app, &json!({ "mode": "audit", "batchSize": 0 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid page request"));
}

#[tokio::test]
async fn test_unknown_target_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(&dir);

    let (status, body) = invoke(app, &json!({ "mode": "repair", "targetId": "missing" })).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "record missing not found");
}

// ─────────────────────────────────────────────────────────────────────────────
// GET endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rules_endpoint() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(&dir);

    let (status, body) = get(app, "/rules").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classes"]["list_item"], "tiptap-list-item");
    assert_eq!(body["fixed_formats"]["RECOVERY"], json!(["MIX"]));
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let (app, _) = app(&dir);

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
