//! Bounded worker pool for paced fan-out against the dashboard
//!
//! Items are dealt round-robin to a fixed number of workers. Each worker
//! handles its share in order, sleeping a fixed pacing delay between calls
//! to stay below the dashboard rate limit. Results flow back over a channel
//! and the pool joins every worker before returning.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Worker ceiling for bulk operations against the dashboard
pub const MAX_WORKERS: usize = 4;

/// Delay between consecutive calls made by one worker
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Deals `items` round-robin into `workers` sublists
///
/// Item `i` lands in sublist `i % workers`, preserving relative order.
/// Always returns exactly `workers` sublists (some possibly empty).
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut shares: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        shares[i % workers].push(item);
    }
    shares
}

/// Results of one pool run
#[derive(Debug)]
pub struct PoolRun<R> {
    /// `(input index, result)` for every processed item, by input index
    pub results: Vec<(usize, R)>,
    /// Input indices whose worker stopped before producing a result
    pub aborted: Vec<usize>,
}

/// Fixed-size pool of paced workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    workers: usize,
    pacing: Duration,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(MAX_WORKERS, DEFAULT_PACING)
    }
}

impl WorkerPool {
    /// Creates a pool; the worker count is clamped to `1..=MAX_WORKERS`
    pub fn new(workers: usize, pacing: Duration) -> Self {
        Self {
            workers: workers.clamp(1, MAX_WORKERS),
            pacing,
        }
    }

    /// Returns the worker count
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the per-worker pacing delay
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Runs `job` over every item and waits for all workers
    ///
    /// One item's failure never stops its siblings; `job` is expected to
    /// turn failures into values. A worker that panics reports its
    /// unprocessed items in [`PoolRun::aborted`].
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, job: F) -> PoolRun<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let job = Arc::new(job);
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, R)>();

        let indexed: Vec<(usize, T)> = items.into_iter().enumerate().collect();
        let mut handles = Vec::with_capacity(self.workers);
        for (worker, share) in partition(indexed, self.workers).into_iter().enumerate() {
            if share.is_empty() {
                continue;
            }

            let tx = tx.clone();
            let job = Arc::clone(&job);
            let pacing = self.pacing;
            handles.push(tokio::spawn(async move {
                let count = share.len();
                for (n, (index, item)) in share.into_iter().enumerate() {
                    if n > 0 && !pacing.is_zero() {
                        tokio::time::sleep(pacing).await;
                    }
                    let result = job(item).await;
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
                debug!(worker, items = count, "Worker finished");
            }));
        }
        drop(tx);

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task aborted");
            }
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results.sort_by_key(|(index, _)| *index);

        let seen: HashSet<usize> = results.iter().map(|(index, _)| *index).collect();
        let aborted = (0..total).filter(|i| !seen.contains(i)).collect();

        PoolRun { results, aborted }
    }
}
