// tests/queue_test.rs

//! With `maxConcurrency=1, maxWaiting=1`, a third distinct concurrent query
//! is rejected with `QueueFull` while the first two complete in admission
//! order.

mod common;

use common::{base_config, spawn_backend_with, spawn_proxy};
use serde_json::json;
use sparql_cache_proxy::config::Config;
use std::time::Duration;

#[tokio::test]
async fn a_third_concurrent_query_is_rejected_once_the_queue_is_full() {
    // The backend sleeps long enough that the first request stays "running"
    // for the whole test, so the second occupies the only waiting slot and
    // a third finds no room.
    let backend = spawn_backend_with(
        vec![json!({"head": {"vars": []}, "results": {"bindings": []}})],
        Duration::from_millis(300),
    )
    .await;
    let config = Config {
        max_concurrency: 1,
        max_waiting: 1,
        ..base_config(&backend.url)
    };
    let (base, _state) = spawn_proxy(config).await;
    let client = reqwest::Client::new();

    let first = {
        let client = client.clone();
        let base = base.clone();
        tokio::spawn(async move {
            client
                .get(format!("{base}/sparql"))
                .query(&[("query", "SELECT ?s WHERE { ?s ?p ?o } LIMIT 1")])
                .send()
                .await
                .unwrap()
        })
    };
    // Give the dispatch loop a chance to admit and start the first job
    // before the second arrives and occupies the waiting slot.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = {
        let client = client.clone();
        let base = base.clone();
        tokio::spawn(async move {
            client
                .get(format!("{base}/sparql"))
                .query(&[("query", "SELECT ?s WHERE { ?s ?p ?o } LIMIT 2")])
                .send()
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let third = client
        .get(format!("{base}/sparql"))
        .query(&[("query", "SELECT ?s WHERE { ?s ?p ?o } LIMIT 3")])
        .send()
        .await
        .unwrap();
    assert_eq!(third.status(), 503);

    assert_eq!(first.await.unwrap().status(), 200);
    assert_eq!(second.await.unwrap().status(), 200);
}
