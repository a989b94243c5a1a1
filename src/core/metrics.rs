// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! Uses `lazy_static` so metrics are registered exactly once globally for
//! the process lifetime, in the same style as the rest of the ambient
//! stack (tracing, error handling).

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Gauge, Histogram, TextEncoder,
};

lazy_static! {
    /// Total `/sparql` requests received, labeled by result (`hit`, `miss`).
    pub static ref CACHE_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "sparql_proxy_cache_lookups_total",
        "Total cache lookups, labeled by outcome.",
        &["outcome"]
    )
    .unwrap();

    /// Total jobs admitted to the queue.
    pub static ref JOBS_ADMITTED_TOTAL: Counter = register_counter!(
        "sparql_proxy_jobs_admitted_total",
        "Total jobs admitted to the queue."
    )
    .unwrap();

    /// Total jobs rejected with `QueueFull`.
    pub static ref JOBS_REJECTED_TOTAL: Counter = register_counter!(
        "sparql_proxy_jobs_rejected_total",
        "Total jobs rejected because the waiting queue was full."
    )
    .unwrap();

    /// Total jobs that ended in each terminal state.
    pub static ref JOBS_FINISHED_TOTAL: CounterVec = register_counter_vec!(
        "sparql_proxy_jobs_finished_total",
        "Total jobs reaching a terminal state, labeled by outcome.",
        &["outcome"]
    )
    .unwrap();

    /// Number of jobs currently running against the backend.
    pub static ref JOBS_RUNNING: Gauge = register_gauge!(
        "sparql_proxy_jobs_running",
        "Number of jobs currently running."
    )
    .unwrap();

    /// Number of jobs currently waiting for a concurrency slot.
    pub static ref JOBS_WAITING: Gauge = register_gauge!(
        "sparql_proxy_jobs_waiting",
        "Number of jobs currently waiting to be admitted."
    )
    .unwrap();

    /// Backend call latency, end to end per job (covers every shard).
    pub static ref JOB_LATENCY_SECONDS: Histogram = register_histogram!(
        "sparql_proxy_job_latency_seconds",
        "Latency of a job from admission to its terminal state, in seconds."
    )
    .unwrap();

    /// Number of live-channel connections currently open.
    pub static ref LIVE_CHANNEL_CONNECTIONS: Gauge = register_gauge!(
        "sparql_proxy_live_channel_connections",
        "Number of open admin live-channel connections."
    )
    .unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
