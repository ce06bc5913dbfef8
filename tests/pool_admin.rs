//! Integration tests for the pool admin endpoints and shared-secret auth.
//!
//! Verifies that:
//! - GET /health is reachable without credentials
//! - Every other route rejects missing or wrong bearer secrets with 401
//! - Rejected requests never mutate the pool
//! - add/del/disp/empty round-trip through the persisted pool file
//! - Duplicate adds and deletes of unknown tokens map to 400/404

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http::{header, Request, StatusCode};
use tower::ServiceExt;

use keywheel::config::{AuthConfig, Config, PoolConfig, ServerConfig, UpstreamConfig};
use keywheel::pool::{TokenPool, CHECKSUM_PREFIX};
use keywheel::proxy::{create_router, AppState, ClientCache};

const SECRET: &str = "test-secret";

/// Build a test app backed by a pool file inside `dir`.
async fn setup_app(dir: &tempfile::TempDir) -> (axum::Router, Arc<TokenPool>) {
    let pool_path = dir.path().join("pool.json");

    let config = Config {
        server: ServerConfig::default(),
        upstream: UpstreamConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            connect_timeout_secs: 1,
            request_timeout_secs: 5,
            completion_timeout_secs: 5,
        },
        auth: AuthConfig {
            secret: SECRET.into(),
        },
        pool: PoolConfig {
            path: pool_path.to_string_lossy().into_owned(),
        },
    };

    let pool = Arc::new(TokenPool::load(&pool_path).await);
    let clients = Arc::new(ClientCache::new(
        &config.upstream.base_url,
        Duration::from_secs(1),
        Duration::from_secs(5),
    ));

    let state = AppState {
        pool: pool.clone(),
        clients,
        config: Arc::new(config),
    };

    (create_router(state), pool)
}

fn request(method: &str, uri: &str, secret: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(secret) = secret {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {secret}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Parse the response body as JSON and return (status_code, json_value).
async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn health_requires_no_auth() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = setup_app(&dir).await;

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn protected_routes_reject_missing_secret() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = setup_app(&dir).await;

    for (method, uri) in [
        ("POST", "/v1/chat/completions"),
        ("POST", "/pool/add"),
        ("POST", "/pool/del"),
        ("GET", "/pool/disp"),
        ("POST", "/pool/empty"),
    ] {
        let response = app
            .clone()
            .oneshot(request(method, uri, None, Some(r#"{"token":"t"}"#)))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {uri} should require auth"
        );
    }
}

#[tokio::test]
async fn wrong_secret_is_rejected_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let (app, pool) = setup_app(&dir).await;

    let response = app
        .oneshot(request(
            "POST",
            "/pool/add",
            Some("not-the-secret"),
            Some(r#"{"token":"tok-1"}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(pool.is_empty().await, "rejected request must not mutate the pool");
}

#[tokio::test]
async fn add_disp_del_empty_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = setup_app(&dir).await;

    // Add a token
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/pool/add",
            Some(SECRET),
            Some(r#"{"token":"tok-1"}"#),
        ))
        .await
        .unwrap();
    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Token added successfully");

    // It shows up in disp with a generated checksum
    let response = app
        .clone()
        .oneshot(request("GET", "/pool/disp", Some(SECRET), None))
        .await
        .unwrap();
    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    let checksum = json["tok-1"].as_str().unwrap();
    assert!(checksum.starts_with(CHECKSUM_PREFIX));
    assert!(checksum.contains('/'));

    // Delete it
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/pool/del",
            Some(SECRET),
            Some(r#"{"token":"tok-1"}"#),
        ))
        .await
        .unwrap();
    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Token deleted successfully");

    // Empty an already-empty pool still succeeds
    let response = app
        .oneshot(request("POST", "/pool/empty", Some(SECRET), None))
        .await
        .unwrap();
    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Pool emptied successfully");
}

#[tokio::test]
async fn duplicate_add_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = setup_app(&dir).await;

    for expected in [StatusCode::OK, StatusCode::BAD_REQUEST] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/pool/add",
                Some(SECRET),
                Some(r#"{"token":"tok-1"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn delete_unknown_token_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = setup_app(&dir).await;

    let response = app
        .oneshot(request(
            "POST",
            "/pool/del",
            Some(SECRET),
            Some(r#"{"token":"never-added"}"#),
        ))
        .await
        .unwrap();

    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], 404);
}

#[tokio::test]
async fn missing_token_field_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = setup_app(&dir).await;

    let response = app
        .clone()
        .oneshot(request("POST", "/pool/add", Some(SECRET), Some("{}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(request("POST", "/pool/add", Some(SECRET), Some("not json")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_clears_every_token() {
    let dir = tempfile::tempdir().unwrap();
    let (app, pool) = setup_app(&dir).await;

    for token in ["a", "b", "c"] {
        pool.add(token).await.unwrap();
    }
    assert_eq!(pool.len().await, 3);

    let response = app
        .clone()
        .oneshot(request("POST", "/pool/empty", Some(SECRET), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", "/pool/disp", Some(SECRET), None))
        .await
        .unwrap();
    let (_, json) = parse_body(response).await;
    assert_eq!(json, serde_json::json!({}));
}
