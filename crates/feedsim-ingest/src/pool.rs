//! Bounded worker pool
//!
//! One task per object, at most `workers` of them alive at once. A task
//! keeps its slot through the configured inter-object delay, so the delay
//! throttles how fast new objects are dispatched.

use crate::error::Result;
use crate::extract::ObjectOutcome;
use crate::store::ObjectHandle;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// Totals for one dispatched page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows_inserted: usize,
    pub lines_skipped: usize,
    pub bytes: u64,
}

impl PageSummary {
    fn record(&mut self, outcome: &ObjectOutcome) {
        self.succeeded += 1;
        self.rows_inserted += outcome.rows_inserted;
        self.lines_skipped += outcome.lines_skipped;
        self.bytes += outcome.bytes;
    }

    /// Fold another page into this one
    pub fn merge(&mut self, other: &PageSummary) {
        self.dispatched += other.dispatched;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.rows_inserted += other.rows_inserted;
        self.lines_skipped += other.lines_skipped;
        self.bytes += other.bytes;
    }
}

/// Semaphore-gated dispatcher shared by every page of a source
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    next_delay: Duration,
}

impl WorkerPool {
    pub fn new(workers: usize, next_delay: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            next_delay,
        }
    }

    /// Run `task` for every handle and wait for all of them
    ///
    /// Dispatch blocks while every slot is taken. A failed task is logged
    /// where it fails and only counted here; its siblings keep running.
    pub async fn run_page<F, Fut>(&self, handles: Vec<ObjectHandle>, task: F) -> PageSummary
    where
        F: Fn(ObjectHandle) -> Fut,
        Fut: Future<Output = Result<ObjectOutcome>> + Send + 'static,
    {
        let mut summary = PageSummary::default();
        let mut tasks = JoinSet::new();

        for handle in handles {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                warn!("Worker pool closed, not dispatching further objects");
                break;
            };

            let key = handle.key.clone();
            let work = task(handle);
            let delay = self.next_delay;
            summary.dispatched += 1;

            tasks.spawn(async move {
                let result = work.await;
                if let Err(e) = &result {
                    error!(key = %key, error = %e, "Failed to extract object");
                }

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                drop(permit);

                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => summary.record(&outcome),
                Ok(Err(_)) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Worker task panicked");
                    summary.failed += 1;
                },
            }
        }

        summary
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
