// src/core/job.rs

//! Job: the state machine for a single proxied request.
//!
//! ```text
//!   waiting ──(admitted by worker)──▶ running
//!   waiting ──(cancel)──────────────▶ cancelled (terminal)
//!   running ──(result ready)────────▶ success   (terminal)
//!   running ──(backend/internal err)▶ error     (terminal)
//!   running ──(timeoutMs elapsed)───▶ error(Timeout) (terminal)
//!   running ──(cancel)──────────────▶ cancelled (terminal)
//! ```

use crate::core::errors::ProxyError;
use crate::core::executor::SplitPolicy;
use crate::core::sparql::NormalizedQuery;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// The externally observable phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Running,
    Success,
    Error,
    Cancelled,
}

/// The terminal outcome of a job, carried once `state` reaches a terminal
/// value, as a tagged variant rather than an error thrown across the await.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success { content_type: String, body: Bytes },
    Error(ProxyError),
    Cancelled,
}

/// A receiver half of a job's cancellation signal. Cheaply cloned; every
/// holder observes the same cancellation.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves as soon as the job is cancelled; never resolves otherwise.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Clone)]
struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    fn fire(&self) {
        let _ = self.tx.send(true);
    }

    fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

fn cancel_pair() -> CancelHandle {
    let (tx, _rx) = watch::channel(false);
    CancelHandle { tx }
}

struct Timestamps {
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    done_at: Option<DateTime<Utc>>,
}

struct Inner {
    state: JobState,
    outcome: Option<JobOutcome>,
    times: Timestamps,
}

/// A single proxied request, from admission through its terminal outcome.
pub struct Job {
    pub id: u64,
    pub token: Option<String>,
    pub query: NormalizedQuery,
    pub raw_query: String,
    pub accept: String,
    pub backend: String,
    pub timeout: std::time::Duration,
    pub ip: String,
    pub split: SplitPolicy,
    inner: Mutex<Inner>,
    cancel: CancelHandle,
    state_tx: watch::Sender<JobState>,
}

impl Job {
    pub fn new(
        token: Option<String>,
        query: NormalizedQuery,
        raw_query: String,
        accept: String,
        backend: String,
        timeout: std::time::Duration,
        ip: String,
        split: SplitPolicy,
    ) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            token,
            query,
            raw_query,
            accept,
            backend,
            timeout,
            ip,
            split,
            inner: Mutex::new(Inner {
                state: JobState::Waiting,
                outcome: None,
                times: Timestamps {
                    created_at: Utc::now(),
                    started_at: None,
                    done_at: None,
                },
            }),
            cancel: cancel_pair(),
            state_tx: watch::channel(JobState::Waiting).0,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.token()
    }

    /// Awaits the job's terminal outcome. Used by the queue to implement
    /// `enqueue`'s "blocks until the job reaches a terminal state" contract.
    pub async fn wait_terminal(&self) -> JobOutcome {
        let mut rx = self.state_tx.subscribe();
        loop {
            if is_terminal(*rx.borrow()) {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.outcome().unwrap_or(JobOutcome::Error(ProxyError::Internal(
            "job reached a terminal state with no recorded outcome".to_string(),
        )))
    }

    /// Marks the job cancelled. Idempotent: a job already in a terminal
    /// state is left alone. Returns whether a transition occurred.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        if is_terminal(inner.state) {
            return false;
        }
        inner.state = JobState::Cancelled;
        inner.outcome = Some(JobOutcome::Cancelled);
        inner.times.done_at = Some(Utc::now());
        drop(inner);
        self.cancel.fire();
        let _ = self.state_tx.send(JobState::Cancelled);
        true
    }

    /// Transitions `waiting -> running`. Returns `false` if the job was
    /// cancelled first.
    pub fn start(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != JobState::Waiting {
            return false;
        }
        inner.state = JobState::Running;
        inner.times.started_at = Some(Utc::now());
        drop(inner);
        let _ = self.state_tx.send(JobState::Running);
        true
    }

    /// Records the terminal outcome. No-op if the job was already
    /// cancelled by the time the result arrived (state must stay monotone).
    pub fn finish(&self, outcome: JobOutcome) {
        let mut inner = self.inner.lock();
        if is_terminal(inner.state) {
            return;
        }
        let new_state = match &outcome {
            JobOutcome::Success { .. } => JobState::Success,
            JobOutcome::Error(_) => JobState::Error,
            JobOutcome::Cancelled => JobState::Cancelled,
        };
        inner.state = new_state;
        inner.times.done_at = Some(Utc::now());
        inner.outcome = Some(outcome);
        drop(inner);
        let _ = self.state_tx.send(new_state);
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.inner.lock().outcome.clone()
    }

    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().times.done_at
    }

    /// A snapshot safe to hand to any observer (HTTP status poll, live
    /// channel push); never carries the result body.
    pub fn summary(&self) -> JobSummary {
        let inner = self.inner.lock();
        JobSummary {
            id: self.id,
            token: self.token.clone(),
            state: inner.state,
            created_at: inner.times.created_at,
            started_at: inner.times.started_at,
            done_at: inner.times.done_at,
            error: match &inner.outcome {
                Some(JobOutcome::Error(e)) => Some(e.to_string()),
                _ => None,
            },
        }
    }
}

impl std::fmt::Debug for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Success { content_type, body } => f
                .debug_struct("Success")
                .field("content_type", content_type)
                .field("body_len", &body.len())
                .finish(),
            JobOutcome::Error(e) => f.debug_tuple("Error").field(e).finish(),
            JobOutcome::Cancelled => write!(f, "Cancelled"),
        }
    }
}

fn is_terminal(state: JobState) -> bool {
    matches!(state, JobState::Success | JobState::Error | JobState::Cancelled)
}

/// A value copy of a job's status, used by `QueueState` and `/jobs/{token}`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: u64,
    pub token: Option<String>,
    pub state: JobState,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "startedAt", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "doneAt", skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sparql::NormalizedQuery;

    fn make_job() -> Job {
        let query = NormalizedQuery::parse("SELECT * WHERE { ?s ?p ?o }").unwrap();
        Job::new(
            Some("tok".to_string()),
            query,
            "SELECT * WHERE { ?s ?p ?o }".to_string(),
            "application/sparql-results+json".to_string(),
            "http://backend.example/sparql".to_string(),
            std::time::Duration::from_millis(300_000),
            "127.0.0.1".to_string(),
            SplitPolicy::disabled(),
        )
    }

    #[test]
    fn happy_path_transitions_waiting_running_success() {
        let job = make_job();
        assert_eq!(job.state(), JobState::Waiting);
        assert!(job.start());
        assert_eq!(job.state(), JobState::Running);
        job.finish(JobOutcome::Success {
            content_type: "application/sparql-results+json".to_string(),
            body: Bytes::from_static(b"{}"),
        });
        assert_eq!(job.state(), JobState::Success);
        assert!(job.done_at().is_some());
    }

    #[test]
    fn cancel_is_idempotent_and_terminal() {
        let job = make_job();
        assert!(job.cancel());
        assert_eq!(job.state(), JobState::Cancelled);
        assert!(!job.cancel(), "a second cancel must not report a transition");
        // A late-arriving finish must not retrograde a terminal state.
        job.finish(JobOutcome::Success {
            content_type: "x".to_string(),
            body: Bytes::new(),
        });
        assert_eq!(job.state(), JobState::Cancelled);
    }

    #[test]
    fn cancelling_a_waiting_job_never_transitions_through_running() {
        let job = make_job();
        assert!(job.cancel());
        assert!(!job.start(), "a cancelled job must never start running");
    }

    #[tokio::test]
    async fn cancel_token_observes_cancellation() {
        let job = make_job();
        let mut token = job.cancel_token();
        assert!(!token.is_cancelled());
        job.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}
