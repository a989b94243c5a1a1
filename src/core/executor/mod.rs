// src/core/executor/mod.rs

//! Chunk executor: forwards a query to the SPARQL backend,
//! optionally splitting a `SELECT` into sequential `LIMIT`/`OFFSET` shards
//! so no single backend call is asked for more rows than configured.

use crate::core::errors::ProxyError;
use crate::core::job::{CancelToken, Job};
use crate::core::sparql::Operation;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Query-splitting configuration, fixed for the lifetime of a job.
#[derive(Debug, Clone, Copy)]
pub struct SplitPolicy {
    pub enabled: bool,
    pub max_chunk_limit: u64,
    pub max_limit: u64,
}

impl SplitPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_chunk_limit: u64::MAX,
            max_limit: u64::MAX,
        }
    }
}

const SPARQL_JSON: &str = "application/sparql-results+json";

#[derive(Debug, Deserialize, Serialize)]
struct SparqlResults {
    head: serde_json::Value,
    results: ResultsBody,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResultsBody {
    bindings: Vec<serde_json::Value>,
}

/// Runs `job` to completion against the backend, honouring `cancel` between
/// every suspension point. Returns `(contentType, body)` on success.
pub async fn execute(job: &Job, client: &Client, cancel: &mut CancelToken) -> Result<(String, Bytes), ProxyError> {
    let should_split = job.split.enabled && job.query.operation == Operation::Select;
    if !should_split {
        return forward_verbatim(job, client, cancel).await;
    }

    let select = job
        .query
        .select
        .clone()
        .expect("operation == Select implies select modifiers are present");

    let user_limit = select.limit.unwrap_or(u64::MAX);
    let effective_limit = user_limit.min(job.split.max_limit);
    let chunk = job.split.max_chunk_limit.min(effective_limit);

    let mut collected = 0u64;
    let mut offset = select.offset;
    let mut head: Option<serde_json::Value> = None;
    let mut bindings: Vec<serde_json::Value> = Vec::new();

    while collected < effective_limit {
        if cancel.is_cancelled() {
            return Err(ProxyError::Cancelled);
        }

        let shard_limit = chunk.min(effective_limit - collected);
        let shard_query = build_shard_query(&job.query.preamble, &select.stripped, shard_limit, offset);
        debug!(job_id = job.id, offset, shard_limit, "issuing shard");

        let (status, _content_type, body) =
            post_query(client, &job.backend, &shard_query, SPARQL_JSON, cancel).await?;
        if !status.is_success() {
            return Err(ProxyError::BackendError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: SparqlResults = serde_json::from_slice(&body)
            .map_err(|e| ProxyError::Internal(format!("backend returned unparsable JSON: {e}")))?;
        let page_len = parsed.results.bindings.len() as u64;

        if head.is_none() {
            head = Some(parsed.head);
        }
        bindings.extend(parsed.results.bindings);
        collected += page_len;
        offset += shard_limit;

        if page_len < shard_limit {
            break;
        }
    }

    let merged = SparqlResults {
        head: head.unwrap_or_else(|| serde_json::json!({ "vars": [] })),
        results: ResultsBody { bindings },
    };
    let body = serde_json::to_vec(&merged)
        .map_err(|e| ProxyError::Internal(format!("failed to serialize merged result: {e}")))?;
    Ok((SPARQL_JSON.to_string(), Bytes::from(body)))
}

/// Forwards the original query unchanged (non-`SELECT`, or splitting off).
async fn forward_verbatim(job: &Job, client: &Client, cancel: &mut CancelToken) -> Result<(String, Bytes), ProxyError> {
    let (status, content_type, body) =
        post_query(client, &job.backend, &job.raw_query, &job.accept, cancel).await?;
    if !status.is_success() {
        return Err(ProxyError::BackendError {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok((content_type, body))
}

/// Appends a rewritten `LIMIT`/`OFFSET` to `stripped_remainder` (which has
/// already had any prior `LIMIT`/`OFFSET` removed but keeps `ORDER BY`, so
/// shard order matches the client's request) and reattaches the preamble.
fn build_shard_query(preamble: &str, stripped_remainder: &str, limit: u64, offset: u64) -> String {
    let body = format!("{stripped_remainder} LIMIT {limit} OFFSET {offset}");
    if preamble.trim().is_empty() {
        body
    } else {
        format!("{preamble} {body}")
    }
}

/// POSTs `query` to the backend with the forced `Accept` header, aborting
/// the in-flight request the moment `cancel` fires.
async fn post_query(
    client: &Client,
    backend: &str,
    query: &str,
    accept: &str,
    cancel: &mut CancelToken,
) -> Result<(reqwest::StatusCode, String, Bytes), ProxyError> {
    let request = client
        .post(backend)
        .header(CONTENT_TYPE, "application/sparql-query")
        .header(ACCEPT, accept)
        .body(query.to_string())
        .send();

    let response = tokio::select! {
        result = request => result?,
        _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(accept)
        .to_string();

    let body = tokio::select! {
        result = response.bytes() => result?,
        _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
    };

    Ok((status, content_type, body))
}
