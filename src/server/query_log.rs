// src/server/query_log.rs

//! Optional JSONL request log: one line per `/sparql` request,
//! written by a dedicated task so a slow disk never adds latency to the
//! request path. Decoupled from `tracing` — this is a structured audit
//! trail for operators, not a debugging log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct QueryLogLine {
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "endedAt")]
    pub ended_at: DateTime<Utc>,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: i64,
    #[serde(rename = "clientIp")]
    pub client_ip: String,
    pub query: String,
    #[serde(rename = "cacheHit")]
    pub cache_hit: bool,
    pub response: QueryLogResponse,
}

#[derive(Debug, Serialize)]
pub struct QueryLogResponse {
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub status: u16,
}

#[derive(Clone)]
pub struct QueryLogHandle {
    tx: mpsc::UnboundedSender<QueryLogLine>,
}

impl QueryLogHandle {
    /// Enqueues `line` for writing. Never blocks the caller; a full or
    /// closed channel silently drops the line rather than affecting the
    /// already-sent HTTP response.
    pub fn log(&self, line: QueryLogLine) {
        let _ = self.tx.send(line);
    }
}

/// Spawns the writer task and returns a cheap-to-clone handle to it.
pub fn spawn(path: PathBuf) -> QueryLogHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueryLogLine>();

    tokio::spawn(async move {
        let file = match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to open query log, disabling it");
                return;
            }
        };
        let mut file = file;
        while let Some(line) = rx.recv().await {
            let Ok(mut json) = serde_json::to_vec(&line) else {
                continue;
            };
            json.push(b'\n');
            if let Err(e) = file.write_all(&json).await {
                warn!(error = %e, "failed to write query log line");
            }
        }
    });

    QueryLogHandle { tx }
}
