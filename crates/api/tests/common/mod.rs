#![allow(dead_code)] // each test binary uses a subset of these helpers

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use zrep_api::config::ServerConfig;
use zrep_api::registry::JobRegistry;
use zrep_api::router::build_app_router;
use zrep_api::state::AppState;
use zrep_core::MetricsSink;
use zrep_db::{MemoryStorage, Storage};
use zrep_events::WebhookDispatcher;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        prover_url: "http://localhost:4101".to_string(),
        prover_timeout_secs: 60,
        poll_interval_ms: 5000,
        poll_batch_size: 10,
        job_retention_hours: 24,
        webhook_max_concurrency: 8,
    }
}

/// Build the full application router over in-memory storage.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses. The storage handle is returned so
/// tests can seed or inspect state directly.
pub fn build_test_app() -> (Router, Arc<MemoryStorage>) {
    let config = test_config();
    let storage = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(MetricsSink::new());
    let dispatcher = WebhookDispatcher::new(config.webhook_max_concurrency, Arc::clone(&metrics));
    let registry = JobRegistry::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::clone(&metrics),
    );

    let state = AppState {
        storage: Arc::clone(&storage) as Arc<dyn Storage>,
        registry,
        dispatcher,
        metrics,
        config: Arc::new(config.clone()),
    };

    (build_app_router(state, &config), storage)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a DELETE request against the app.
pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
