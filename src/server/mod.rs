// src/server/mod.rs

//! HTTP front-end and live channel assembly. Request routing, CORS/body
//! parsing, admin authentication, and the web UI itself are external
//! collaborators — this module is the thin adapter between that framing
//! and the core domain logic under `core::`.

mod admin_ui;
mod jobs;
mod live;
pub mod query_log;
pub mod sparql;
pub mod state;

use crate::config::Config;
use crate::core::tasks::spawn_sweeper;
use anyhow::Result;
use axum::Router;
use axum::http::header;
use axum::routing::get;
use reqwest::Client;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Builds the cache, queue, HTTP client, and router from `config`, then
/// serves forever on `config.port`.
pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let cache = crate::core::cache::build(
        config.cache_store.as_name(),
        &config.cache_store_path,
        &config.compressor,
    )?;
    let cache = Arc::new(cache);

    let http_client = Client::builder()
        .build()
        .expect("reqwest client configuration is static and always valid");

    let queue = crate::core::queue::Queue::new(config.max_waiting, config.max_concurrency, http_client.clone());
    spawn_sweeper(queue.clone(), config.duration_to_keep_old_jobs);

    let query_log = config.query_log_path.clone().map(query_log::spawn);

    let state = AppState {
        config: config.clone(),
        cache,
        queue,
        http_client,
        query_log,
    };

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "sparql-cache-proxy listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Assembles the router. Separated from [`run`] so integration tests can
/// build the same app over an in-process `AppState` without binding a port.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(admin_ui::index))
        .route("/admin", get(admin_ui::admin_page))
        .route("/admin/ws", get(live::handle_upgrade))
        .route("/metrics", get(metrics_handler))
        .route("/jobs/{token}", get(jobs::job_status))
        .route(
            "/sparql",
            get(sparql::handle_sparql)
                .post(sparql::handle_sparql)
                .options(sparql::handle_sparql),
        )
        .with_state(state)
}

async fn metrics_handler() -> impl axum::response::IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::core::metrics::gather_metrics(),
    )
}
