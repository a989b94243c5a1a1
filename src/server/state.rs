// src/server/state.rs

//! Shared application state handed to every axum handler.

use crate::config::Config;
use crate::core::cache::Cache;
use crate::core::queue::Queue;
use crate::server::query_log::QueryLogHandle;
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<Cache>,
    pub queue: Arc<Queue>,
    pub http_client: Client,
    pub query_log: Option<QueryLogHandle>,
}
