//! BulkDispatcher - concurrent fan-out of port changes

use tracing::{info, instrument, warn};

use vlanbulk_common::{EngineError, MutationTarget, OperationKind};

use crate::mutation::{ChangeMode, MutationEngine, MutationOutcome};
use crate::pool::WorkerPool;

/// Aggregate result of a bulk change
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Targets that were written
    pub succeeded: Vec<MutationOutcome>,
    /// Targets that failed, each with its error
    pub failed: Vec<MutationOutcome>,
}

impl BulkReport {
    /// Number of targets attempted
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Returns true if every target succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn push(&mut self, outcome: MutationOutcome) {
        if outcome.is_success() {
            self.succeeded.push(outcome);
        } else {
            self.failed.push(outcome);
        }
    }
}

/// Applies batches of targets over a paced worker pool
#[derive(Clone)]
pub struct BulkDispatcher {
    engine: MutationEngine,
    pool: WorkerPool,
}

impl BulkDispatcher {
    /// Creates a dispatcher
    pub fn new(engine: MutationEngine, pool: WorkerPool) -> Self {
        Self { engine, pool }
    }

    /// Applies every target, capturing each under `kind`
    ///
    /// Blocks until all workers finish. A failing target never aborts its
    /// siblings; every target appears exactly once in the report.
    #[instrument(skip(self, targets), fields(targets = targets.len(), workers = self.pool.workers()))]
    pub async fn dispatch(&self, targets: Vec<MutationTarget>, kind: OperationKind) -> BulkReport {
        let fallback = targets.clone();
        let engine = self.engine.clone();

        let run = self
            .pool
            .run(targets, move |target| {
                let engine = engine.clone();
                async move { engine.apply_change(target, ChangeMode::Capture(kind)).await }
            })
            .await;

        let mut report = BulkReport::default();
        for (_, outcome) in run.results {
            report.push(outcome);
        }
        for index in run.aborted {
            report.push(MutationOutcome::failed(
                fallback[index].clone(),
                None,
                EngineError::WorkerAborted {
                    message: "bulk change worker stopped".to_string(),
                },
            ));
        }

        if report.is_clean() {
            info!(succeeded = report.succeeded.len(), "Bulk change complete");
        } else {
            warn!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Bulk change completed with failures"
            );
        }
        report
    }
}
