// tests/common/mod.rs

//! Shared integration-test harness: an in-process mock SPARQL backend (a
//! second tiny `axum` server, not a network-mocking crate) and a way to
//! stand up the real proxy router against it over a real `TcpListener`,
//! matching the host crate's "exercise the real stack" philosophy.

#![allow(dead_code)]

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use parking_lot::Mutex;
use reqwest::Client;
use sparql_cache_proxy::config::{CacheStoreKind, Config};
use sparql_cache_proxy::core::cache;
use sparql_cache_proxy::core::queue::Queue;
use sparql_cache_proxy::core::tasks::spawn_sweeper;
use sparql_cache_proxy::server;
use sparql_cache_proxy::server::state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A backend that serves canned JSON pages in order (repeating the last one
/// once exhausted) and records every request body it received.
pub struct MockBackend {
    pub url: String,
    pub received: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone)]
struct MockState {
    pages: Arc<Vec<serde_json::Value>>,
    received: Arc<Mutex<Vec<String>>>,
    cursor: Arc<AtomicUsize>,
    delay: Duration,
}

async fn mock_handler(State(state): State<MockState>, body: axum::body::Bytes) -> Response {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.received.lock().push(String::from_utf8_lossy(&body).into_owned());
    let idx = state.cursor.fetch_add(1, Ordering::SeqCst);
    let page = state
        .pages
        .get(idx)
        .or_else(|| state.pages.last())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"head": {"vars": []}, "results": {"bindings": []}}));
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/sparql-results+json")],
        serde_json::to_vec(&page).unwrap(),
    )
        .into_response()
}

/// Spawns a mock backend that always answers with `page` and never delays.
pub async fn spawn_backend(page: serde_json::Value) -> MockBackend {
    spawn_backend_with(vec![page], Duration::ZERO).await
}

/// Spawns a mock backend serving `pages` in sequence, delaying `delay`
/// before every response (used to keep a job "running" long enough for
/// queue-admission tests to observe backpressure deterministically).
pub async fn spawn_backend_with(pages: Vec<serde_json::Value>, delay: Duration) -> MockBackend {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        pages: Arc::new(pages),
        received: received.clone(),
        cursor: Arc::new(AtomicUsize::new(0)),
        delay,
    };
    let app = Router::new().route("/sparql", post(mock_handler)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockBackend { url: format!("http://{addr}/sparql"), received }
}

/// A `Config` with every field set to a test-friendly default; override
/// individual fields with struct-update syntax at the call site.
pub fn base_config(backend_url: &str) -> Config {
    Config {
        port: 0,
        sparql_backend: backend_url.to_string(),
        max_concurrency: 4,
        max_waiting: 100,
        admin_user: "admin".to_string(),
        admin_password: "password".to_string(),
        admin_cookie_secret: "test-secret".to_string(),
        cache_store: CacheStoreKind::Memory,
        cache_store_path: PathBuf::new(),
        compressor: "raw".to_string(),
        job_timeout: Duration::from_secs(5),
        duration_to_keep_old_jobs: Duration::from_secs(300),
        enable_query_splitting: false,
        max_chunk_limit: 1000,
        max_limit: 10_000,
        trust_proxy: false,
        query_log_path: None,
    }
}

/// Builds the real proxy router over `config` and binds it to an ephemeral
/// port. Returns the base URL and a handle to the shared state for
/// assertions that need to reach behind the HTTP surface (e.g. cancelling a
/// job the way the live channel would).
pub async fn spawn_proxy(config: Config) -> (String, AppState) {
    let config = Arc::new(config);
    let cache = Arc::new(
        cache::build(config.cache_store.as_name(), &config.cache_store_path, &config.compressor).unwrap(),
    );
    let http_client = Client::new();
    let queue = Queue::new(config.max_waiting, config.max_concurrency, http_client.clone());
    spawn_sweeper(queue.clone(), config.duration_to_keep_old_jobs);

    let state = AppState {
        config,
        cache,
        queue,
        http_client,
        query_log: None,
    };

    let app = server::router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    });
    (format!("http://{addr}"), state)
}
