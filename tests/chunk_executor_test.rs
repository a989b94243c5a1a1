// tests/chunk_executor_test.rs

//! With `MAX_CHUNK_LIMIT=2` and `MAX_LIMIT=5` against a backend with 7
//! available rows, a `SELECT` with no explicit `LIMIT` must be split into
//! exactly three shards — `(LIMIT 2 OFFSET 0)`, `(LIMIT 2 OFFSET 2)`,
//! `(LIMIT 1 OFFSET 4)` — and the merged response must carry exactly 5
//! bindings.

mod common;

use common::{base_config, spawn_backend_with, spawn_proxy};
use serde_json::{Value, json};
use std::time::Duration;

fn page(values: &[&str]) -> Value {
    json!({
        "head": {"vars": ["s"]},
        "results": {
            "bindings": values.iter().map(|v| json!({"s": {"type": "uri", "value": v}})).collect::<Vec<_>>(),
        }
    })
}

#[tokio::test]
async fn select_without_limit_is_split_into_bounded_shards_and_merged() {
    let backend = spawn_backend_with(
        vec![
            page(&["http://example.org/1", "http://example.org/2"]),
            page(&["http://example.org/3", "http://example.org/4"]),
            page(&["http://example.org/5"]),
        ],
        Duration::ZERO,
    )
    .await;

    let config = base_config(&backend.url);
    let config = sparql_cache_proxy::config::Config {
        enable_query_splitting: true,
        max_chunk_limit: 2,
        max_limit: 5,
        ..config
    };
    let (base, _state) = spawn_proxy(config).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/sparql"))
        .query(&[("query", "SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?s")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/sparql-results+json"
    );
    let body: Value = response.json().await.unwrap();
    let bindings = body["results"]["bindings"].as_array().unwrap();
    assert_eq!(bindings.len(), 5);

    let received = backend.received.lock().clone();
    assert_eq!(received.len(), 3);
    assert!(received[0].contains("LIMIT 2 OFFSET 0"));
    assert!(received[1].contains("LIMIT 2 OFFSET 2"));
    assert!(received[2].contains("LIMIT 1 OFFSET 4"));
}

#[tokio::test]
async fn ask_query_is_never_split_even_with_splitting_enabled() {
    let backend = spawn_backend_with(vec![json!({"boolean": true})], Duration::ZERO).await;
    let config = base_config(&backend.url);
    let config = sparql_cache_proxy::config::Config {
        enable_query_splitting: true,
        max_chunk_limit: 2,
        max_limit: 5,
        ..config
    };
    let (base, _state) = spawn_proxy(config).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/sparql"))
        .query(&[("query", "ASK { ?s ?p ?o }")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(backend.received.lock().len(), 1, "ASK must be forwarded verbatim, never split");
}
