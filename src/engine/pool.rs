// src/engine/pool.rs
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ParallelGetError, ParallelGetResult};

/// Hard ceiling on concurrently running jobs
pub const MAX_WORKERS: usize = 16;

/// What a phase does when one of its jobs fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abort the phase on the first failure
    FailFast,
    /// Run every job and report each result
    KeepGoing,
}

/// Fixed-size pool of workers running one batch of jobs at a time
#[derive(Debug, Clone)]
pub struct WorkerPool {
    ceiling: usize,
    policy: FailurePolicy,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool; `ceiling` is clamped to 1..=MAX_WORKERS
    pub fn new(ceiling: usize, policy: FailurePolicy, cancel: CancellationToken) -> Self {
        Self {
            ceiling: ceiling.clamp(1, MAX_WORKERS),
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Number of workers used for a batch of `items` jobs
    pub fn workers_for(&self, items: usize) -> usize {
        items.min(self.ceiling)
    }

    /// Run `job` over every item and return the results in submission order.
    ///
    /// With `FailFast` the first failure cancels the rest of the batch and is
    /// returned as the error; with `KeepGoing` each item's result is returned.
    /// Cancellation of the pool's token always yields `Cancelled`.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, job: F) -> ParallelGetResult<Vec<ParallelGetResult<T>>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ParallelGetResult<T>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(ParallelGetError::Cancelled);
        }
        if items.is_empty() {
            info!("No jobs to run");
            return Ok(Vec::new());
        }

        let total = items.len();
        let workers = self.workers_for(total);
        info!("Running {} jobs on {} workers", total, workers);

        // Cancelled by the run token, or by the first failure under FailFast
        let phase = self.cancel.child_token();
        let queue: Arc<Mutex<VecDeque<(usize, I)>>> = Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
        let job = Arc::new(job);
        let (tx, mut rx) = mpsc::channel(workers);

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let queue = queue.clone();
            let job = job.clone();
            let tx = tx.clone();
            let phase = phase.clone();

            set.spawn(async move {
                loop {
                    if phase.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().pop_front();
                    let Some((index, item)) = next else {
                        break;
                    };
                    debug!("Worker {} picked job {}", worker, index);

                    let result = (*job)(item, phase.clone()).await;
                    if tx.send((index, result)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut results: Vec<Option<ParallelGetResult<T>>> = (0..total).map(|_| None).collect();
        let mut first_failure: Option<ParallelGetError> = None;

        while let Some((index, result)) = rx.recv().await {
            match result {
                Err(e) if self.policy == FailurePolicy::FailFast => {
                    if !e.is_cancelled() && first_failure.is_none() {
                        warn!("Job {} failed, aborting remaining jobs: {}", index, e);
                        phase.cancel();
                        first_failure = Some(e);
                    }
                }
                other => results[index] = Some(other),
            }
        }

        // Every worker has exited once the channel is closed
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("Worker panicked: {}", e);
                phase.cancel();
                first_failure.get_or_insert(ParallelGetError::UnexpectedError(format!("Worker failed: {}", e)));
            }
        }

        if self.cancel.is_cancelled() {
            warn!("Job batch cancelled");
            return Err(ParallelGetError::Cancelled);
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| ParallelGetError::UnexpectedError(format!("Job {} produced no result", index)))
            })
            .collect()
    }
}
