// src/server/sparql.rs

//! `ANY /sparql`: the proxied endpoint.

use crate::core::cache::CacheEntry;
use crate::core::errors::ProxyError;
use crate::core::executor::SplitPolicy;
use crate::core::job::{Job, JobOutcome};
use crate::core::sparql::NormalizedQuery;
use crate::server::query_log::{QueryLogLine, QueryLogResponse};
use crate::server::state::AppState;
use axum::body::Bytes as AxumBytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

const DEFAULT_ACCEPT: &str = "application/sparql-results+json";

/// Entry point for every HTTP method on `/sparql`; the router sends
/// GET/POST/OPTIONS here and rejects everything else with 405 before this
/// handler is even reached (see `server::router`).
pub async fn handle_sparql(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    Query(query_params): Query<HashMap<String, String>>,
    body: AxumBytes,
) -> Response {
    if method == Method::OPTIONS {
        return (StatusCode::OK, cors_headers(), ()).into_response();
    }

    let started_at = Utc::now();
    let client_ip = client_ip(&state, &headers, peer);

    let (raw_query, token) = match extract_query(&method, &headers, &query_params, &body) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && *s != "*/*")
        .unwrap_or(DEFAULT_ACCEPT)
        .to_string();

    let normalized = match NormalizedQuery::parse(&raw_query) {
        Ok(n) => n,
        Err(e) => return e.into_response(),
    };

    let compressor_id = state.cache.compressor_id();
    let cache_key = normalized.cache_key(&accept, compressor_id);

    if let Some(entry) = state.cache.get(&cache_key).await {
        log_request(&state, started_at, &client_ip, &raw_query, true, &entry.content_type, 200);
        return respond(entry.content_type, entry.body, true);
    }

    let split = SplitPolicy {
        enabled: state.config.enable_query_splitting,
        max_chunk_limit: state.config.max_chunk_limit,
        max_limit: state.config.max_limit,
    };
    let job = Arc::new(Job::new(
        token,
        normalized,
        raw_query.clone(),
        accept,
        state.config.sparql_backend.clone(),
        state.config.job_timeout,
        client_ip.clone(),
        split,
    ));

    // `jobTimeout` is enforced by the queue worker once the job starts
    // running; waiting time is bounded only by `maxWaiting`, so the
    // handler simply awaits the job's terminal outcome here.
    let outcome = match state.queue.enqueue(job.clone()).await {
        Ok(outcome) => outcome,
        Err(queue_err) => return queue_err.into_response(),
    };

    match outcome {
        JobOutcome::Success { content_type, body } => {
            log_request(&state, started_at, &client_ip, &raw_query, false, &content_type, 200);

            let cache = state.cache.clone();
            let key = cache_key;
            let entry = CacheEntry { content_type: content_type.clone(), body: body.clone() };
            tokio::spawn(async move {
                cache.put(&key, &entry).await;
            });

            respond(content_type, body, false)
        }
        JobOutcome::Error(e) => {
            log_request(&state, started_at, &client_ip, &raw_query, false, "", e.status_code().as_u16());
            e.into_response()
        }
        JobOutcome::Cancelled => {
            log_request(&state, started_at, &client_ip, &raw_query, false, "", 503);
            ProxyError::Cancelled.into_response()
        }
    }
}

fn respond(content_type: String, body: Bytes, cache_hit: bool) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(axum::http::header::CONTENT_TYPE, value);
    }
    if cache_hit {
        response.headers_mut().insert("X-Cache", "hit".parse().unwrap());
    } else {
        response.headers_mut().insert("X-Cache", "miss".parse().unwrap());
    }
    response
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
    headers.insert("Access-Control-Allow-Methods", "GET, POST, OPTIONS".parse().unwrap());
    headers.insert("Access-Control-Allow-Headers", "Content-Type, Authorization".parse().unwrap());
    headers
}

/// Extracts the raw query text and optional token from the request, per the
/// three accepted request shapes: GET query params, POST
/// `application/sparql-query`, and POST form-urlencoded.
fn extract_query(
    method: &Method,
    headers: &HeaderMap,
    query_params: &HashMap<String, String>,
    body: &AxumBytes,
) -> Result<(String, Option<String>), ProxyError> {
    match *method {
        Method::GET => {
            let query = query_params.get("query").cloned().ok_or(ProxyError::MissingQuery)?;
            Ok((query, query_params.get("token").cloned()))
        }
        Method::POST => {
            let content_type = headers
                .get(axum::http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if content_type.starts_with("application/sparql-query") {
                let query = String::from_utf8(body.to_vec())
                    .map_err(|_| ProxyError::ParseError("request body is not valid UTF-8".to_string()))?;
                Ok((query, query_params.get("token").cloned()))
            } else {
                let form: HashMap<String, String> = urlencoding_form_decode(body);
                let query = form.get("query").cloned().ok_or(ProxyError::MissingQuery)?;
                Ok((query, form.get("token").cloned()))
            }
        }
        _ => Err(ProxyError::MethodNotAllowed),
    }
}

fn urlencoding_form_decode(body: &[u8]) -> HashMap<String, String> {
    let body = String::from_utf8_lossy(body);
    body.split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (decode_form_component(k), decode_form_component(v)))
        .collect()
}

/// Decodes one `application/x-www-form-urlencoded` key or value:
/// `+` means a literal space here (unlike plain percent-encoding), so it
/// must be translated before percent-decoding the rest.
fn decode_form_component(component: &str) -> String {
    let with_spaces = component.replace('+', " ");
    urlencoding::decode(&with_spaces).map(|s| s.into_owned()).unwrap_or_default()
}

fn client_ip(state: &AppState, headers: &HeaderMap, peer: SocketAddr) -> String {
    if state.config.trust_proxy {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
        {
            return forwarded.trim().to_string();
        }
    }
    peer.ip().to_string()
}

fn log_request(
    state: &AppState,
    started_at: chrono::DateTime<Utc>,
    client_ip: &str,
    query: &str,
    cache_hit: bool,
    content_type: &str,
    status: u16,
) {
    let Some(handle) = &state.query_log else { return };
    let ended_at = Utc::now();
    handle.log(QueryLogLine {
        started_at,
        ended_at,
        elapsed_ms: (ended_at - started_at).num_milliseconds(),
        client_ip: client_ip.to_string(),
        query: query.to_string(),
        cache_hit,
        response: QueryLogResponse {
            content_type: content_type.to_string(),
            status,
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_decode_treats_plus_as_space() {
        let form = urlencoding_form_decode(b"query=SELECT+%3Fs+WHERE+%7B+%3Fs+%3Fp+%3Fo+%7D&token=abc");
        assert_eq!(form.get("query").unwrap(), "SELECT ?s WHERE { ?s ?p ?o }");
        assert_eq!(form.get("token").unwrap(), "abc");
    }

    #[test]
    fn form_decode_still_percent_decodes_literal_plus() {
        // A literal `+` in the original value must have been sent as `%2B`;
        // an unescaped `+` always means space in this content type.
        let form = urlencoding_form_decode(b"query=a%2Bb");
        assert_eq!(form.get("query").unwrap(), "a+b");
    }
}
