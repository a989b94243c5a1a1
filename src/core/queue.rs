// src/core/queue.rs

//! Queue: a bounded FIFO that admits jobs up to `maxWaiting`,
//! runs up to `maxConcurrency` of them in parallel, and broadcasts a state
//! snapshot to subscribers on every transition.

use crate::core::errors::ProxyError;
use crate::core::executor;
use crate::core::job::{Job, JobOutcome, JobSummary};
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify, Semaphore};
use tracing::{debug, info};

/// A value-copy snapshot of the queue, emitted to subscribers on every
/// transition (admitted, started, finished, cancelled, swept).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueState {
    pub waiting: Vec<JobSummary>,
    pub running: Vec<JobSummary>,
    pub recent: Vec<JobSummary>,
}

struct Inner {
    waiting: VecDeque<Arc<Job>>,
    running: Vec<Arc<Job>>,
    recent: Vec<Arc<Job>>,
    by_token: HashMap<String, u64>,
}

impl Inner {
    fn find(&self, id: u64) -> Option<Arc<Job>> {
        self.waiting
            .iter()
            .chain(self.running.iter())
            .chain(self.recent.iter())
            .find(|j| j.id == id)
            .cloned()
    }

    fn snapshot(&self) -> QueueState {
        QueueState {
            waiting: self.waiting.iter().map(|j| j.summary()).collect(),
            running: self.running.iter().map(|j| j.summary()).collect(),
            recent: self.recent.iter().map(|j| j.summary()).collect(),
        }
    }
}

pub struct Queue {
    max_waiting: u64,
    permits: Arc<Semaphore>,
    inner: Mutex<Inner>,
    new_arrival: Notify,
    tx: broadcast::Sender<QueueState>,
    client: Client,
}

impl Queue {
    pub fn new(max_waiting: u64, max_concurrency: u64, client: Client) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(64);
        let queue = Arc::new(Self {
            max_waiting,
            permits: Arc::new(Semaphore::new(max_concurrency as usize)),
            inner: Mutex::new(Inner {
                waiting: VecDeque::new(),
                running: Vec::new(),
                recent: Vec::new(),
                by_token: HashMap::new(),
            }),
            new_arrival: Notify::new(),
            tx,
            client,
        });
        tokio::spawn(dispatch_loop(queue.clone()));
        queue
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().snapshot()
    }

    fn publish(&self) {
        let snapshot = self.inner.lock().snapshot();
        crate::core::metrics::JOBS_WAITING.set(snapshot.waiting.len() as f64);
        crate::core::metrics::JOBS_RUNNING.set(snapshot.running.len() as f64);
        let _ = self.tx.send(snapshot);
    }

    /// Admits `job` and blocks until it reaches a terminal state.
    /// Fails immediately, without ever running the job, if the waiting
    /// queue is already at capacity.
    pub async fn enqueue(&self, job: Arc<Job>) -> Result<JobOutcome, ProxyError> {
        {
            let mut inner = self.inner.lock();
            if inner.waiting.len() as u64 >= self.max_waiting {
                crate::core::metrics::JOBS_REJECTED_TOTAL.inc();
                return Err(ProxyError::QueueFull);
            }
            if let Some(token) = &job.token {
                inner.by_token.insert(token.clone(), job.id);
            }
            inner.waiting.push_back(job.clone());
        }
        crate::core::metrics::JOBS_ADMITTED_TOTAL.inc();
        self.publish();
        self.new_arrival.notify_one();

        Ok(job.wait_terminal().await)
    }

    pub fn job_status(&self, token: &str) -> Option<JobSummary> {
        let inner = self.inner.lock();
        let id = *inner.by_token.get(token)?;
        inner.find(id).map(|j| j.summary())
    }

    /// Cancels the job with `id`, wherever it currently lives. Returns
    /// whether a transition actually occurred.
    pub fn cancel(&self, id: u64) -> bool {
        let job = {
            let mut inner = self.inner.lock();
            if let Some(pos) = inner.waiting.iter().position(|j| j.id == id) {
                let job = inner.waiting.remove(pos).unwrap();
                inner.recent.push(job.clone());
                Some(job)
            } else {
                inner.find(id)
            }
        };
        let Some(job) = job else { return false };
        let transitioned = job.cancel();
        if transitioned {
            self.publish();
        }
        transitioned
    }

    /// Drops terminal jobs from `recent` whose `doneAt` predates `threshold`
    /// ago. Runs periodically; must never block `enqueue`.
    pub fn sweep_old_items(&self, threshold: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());
        let swept;
        {
            let mut inner = self.inner.lock();
            let before = inner.recent.len();
            inner.recent.retain(|j| j.done_at().is_none_or(|done| done >= cutoff));
            swept = before - inner.recent.len();
        }
        if swept > 0 {
            debug!(swept, "swept terminal jobs from queue history");
            self.publish();
        }
    }
}

/// Background task: pops the oldest waiting job once both a waiting job and
/// a concurrency permit are available, and runs it to completion. FIFO
/// start order among admitted jobs is preserved because jobs are always
/// popped from the front of `waiting`.
async fn dispatch_loop(queue: Arc<Queue>) {
    loop {
        loop {
            if !queue.inner.lock().waiting.is_empty() {
                break;
            }
            queue.new_arrival.notified().await;
        }

        let permit = queue.permits.clone().acquire_owned().await.expect("semaphore never closed");

        let job = {
            let mut inner = queue.inner.lock();
            inner.waiting.pop_front()
        };
        let Some(job) = job else {
            // Spurious wakeup (e.g. job was cancelled out of the deque
            // between the non-empty check and the pop): release and retry.
            drop(permit);
            continue;
        };

        if !job.start() {
            // Cancelled while still waiting.
            let mut inner = queue.inner.lock();
            inner.recent.push(job);
            drop(inner);
            queue.publish();
            drop(permit);
            continue;
        }

        {
            let mut inner = queue.inner.lock();
            inner.running.push(job.clone());
        }
        queue.publish();

        let queue = queue.clone();
        tokio::spawn(async move {
            let mut cancel = job.cancel_token();
            let client = queue.client.clone();
            let outcome = if cancel.is_cancelled() {
                JobOutcome::Cancelled
            } else {
                // jobTimeout starts at `running`, not at enqueue.
                match tokio::time::timeout(job.timeout, executor::execute(&job, &client, &mut cancel)).await {
                    Ok(Ok((content_type, body))) => JobOutcome::Success { content_type, body },
                    Ok(Err(ProxyError::Cancelled)) => JobOutcome::Cancelled,
                    Ok(Err(e)) => JobOutcome::Error(e),
                    Err(_elapsed) => JobOutcome::Error(ProxyError::Timeout),
                }
            };
            job.finish(outcome);
            info!(job_id = job.id, state = ?job.state(), "job finished");
            let label = match job.state() {
                crate::core::job::JobState::Success => "success",
                crate::core::job::JobState::Error => "error",
                crate::core::job::JobState::Cancelled => "cancelled",
                _ => "unknown",
            };
            crate::core::metrics::JOBS_FINISHED_TOTAL.with_label_values(&[label]).inc();
            let summary = job.summary();
            if let Some(done_at) = summary.done_at {
                let elapsed = (done_at - summary.created_at).to_std().unwrap_or_default();
                crate::core::metrics::JOB_LATENCY_SECONDS.observe(elapsed.as_secs_f64());
            }

            {
                let mut inner = queue.inner.lock();
                inner.running.retain(|j| j.id != job.id);
                inner.recent.push(job);
            }
            queue.publish();
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::SplitPolicy;
    use crate::core::sparql::NormalizedQuery;

    fn make_job(token: &str) -> Arc<Job> {
        let query = NormalizedQuery::parse("ASK { ?s ?p ?o }").unwrap();
        Arc::new(Job::new(
            Some(token.to_string()),
            query,
            "ASK { ?s ?p ?o }".to_string(),
            "application/sparql-results+json".to_string(),
            "http://127.0.0.1:1/sparql".to_string(),
            Duration::from_millis(50),
            "127.0.0.1".to_string(),
            SplitPolicy::disabled(),
        ))
    }

    #[tokio::test]
    async fn queue_full_rejects_before_running_anything() {
        let queue = Queue::new(1, 1, Client::new());
        // Occupy the single waiting slot with a job that will never be
        // popped because nothing is driving the test's event loop forward
        // between the two enqueue calls; we assert on state directly
        // instead of depending on timing.
        {
            let mut inner = queue.inner.lock();
            inner.waiting.push_back(make_job("a"));
        }
        let result = queue.enqueue(make_job("b")).await;
        assert!(matches!(result, Err(ProxyError::QueueFull)));
    }

    #[tokio::test]
    async fn job_status_round_trips_by_token() {
        let queue = Queue::new(10, 1, Client::new());
        let job = make_job("abc");
        let id = job.id;
        {
            let mut inner = queue.inner.lock();
            inner.by_token.insert("abc".to_string(), id);
            inner.recent.push(job);
        }
        let status = queue.job_status("abc").unwrap();
        assert_eq!(status.id, id);
    }

    #[tokio::test]
    async fn cancelling_a_waiting_job_removes_it_and_marks_cancelled() {
        let queue = Queue::new(10, 0, Client::new());
        let job = make_job("x");
        let id = job.id;
        {
            let mut inner = queue.inner.lock();
            inner.waiting.push_back(job);
        }
        assert!(queue.cancel(id));
        let inner = queue.inner.lock();
        assert!(inner.waiting.is_empty());
        assert!(inner.recent.iter().any(|j| j.id == id));
    }

    #[tokio::test]
    async fn sweep_drops_old_terminal_jobs_only() {
        let queue = Queue::new(10, 1, Client::new());
        let job = make_job("old");
        job.cancel();
        {
            let mut inner = queue.inner.lock();
            inner.recent.push(job);
        }
        queue.sweep_old_items(Duration::from_secs(0));
        assert!(queue.inner.lock().recent.is_empty());
    }
}
