// src/core/tasks/sweeper.rs

//! Periodically drops terminal jobs older than `durationToKeepOldJobs` from
//! the queue's `recent` history without ever blocking `enqueue`.

use crate::core::queue::Queue;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns the sweeper loop and returns its join handle.
pub fn spawn_sweeper(queue: Arc<Queue>, retention: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            queue.sweep_old_items(retention);
        }
    })
}
