// src/main.rs

//! Entry point for the caching, rate-limiting SPARQL reverse proxy.

use sparql_cache_proxy::config::Config;
use sparql_cache_proxy::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .compact()
        .with_ansi(true)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(config).await {
        tracing::error!(error = %e, "server runtime error");
        std::process::exit(1);
    }
}
