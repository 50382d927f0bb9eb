//! RollbackEngine - replays captured ledger entries
//!
//! Replays never capture their own undo point. An entry is deleted only
//! once its replay has been written, so a failed rollback can be retried.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use vlanbulk_common::{AuditAction, EngineError, EngineResult, LedgerId, MutationTarget, PortState};

use crate::ledger::Ledger;
use crate::mutation::{ChangeMode, MutationEngine};
use crate::pool::WorkerPool;

/// Result of a single-entry rollback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The port was restored and the entry consumed
    Restored(PortState),
    /// No entry with that ID exists
    NotFound,
}

impl RollbackOutcome {
    /// Returns true if the port was restored
    pub fn is_restored(&self) -> bool {
        matches!(self, RollbackOutcome::Restored(_))
    }
}

/// Aggregate result of a bulk rollback
#[derive(Debug, Default)]
pub struct BulkRollbackReport {
    /// IDs whose state was restored and consumed
    pub restored: Vec<LedgerId>,
    /// IDs with no ledger entry
    pub not_found: Vec<LedgerId>,
    /// IDs whose replay failed; their entries remain
    pub failed: Vec<(LedgerId, EngineError)>,
}

impl BulkRollbackReport {
    /// Number of IDs attempted
    pub fn attempted(&self) -> usize {
        self.restored.len() + self.not_found.len() + self.failed.len()
    }
}

/// Undoes recorded mutations
#[derive(Clone)]
pub struct RollbackEngine {
    engine: MutationEngine,
    pool: WorkerPool,
}

impl RollbackEngine {
    /// Creates a rollback engine sharing the mutation engine's ledger
    pub fn new(engine: MutationEngine, pool: WorkerPool) -> Self {
        Self { engine, pool }
    }

    fn ledger(&self) -> &Arc<Ledger> {
        self.engine.ledger()
    }

    /// Restores the state captured under `id`
    ///
    /// A missing ID is reported as [`RollbackOutcome::NotFound`], not as an
    /// error. On replay failure the entry stays in the ledger.
    #[instrument(skip(self))]
    pub async fn rollback_by_id(&self, id: LedgerId) -> EngineResult<RollbackOutcome> {
        let entry = match self.ledger().get(id)? {
            Some(entry) => entry,
            None => {
                warn!("{}", EngineError::LedgerMiss { id });
                return Ok(RollbackOutcome::NotFound);
            }
        };

        let target = MutationTarget::restore(&entry.state());
        let outcome = self.engine.apply_change(target, ChangeMode::Restore).await;
        if let Some(e) = outcome.error {
            warn!(error = %e, "Rollback replay failed, entry kept for retry");
            return Err(e);
        }

        if !self.ledger().delete(id)? {
            // Another worker consumed the same ID between our read and delete
            warn!("Ledger entry already consumed");
            return Ok(RollbackOutcome::NotFound);
        }
        info!(
            switch = %entry.switch_serial,
            port = %entry.port_id,
            "Rolled back port VLAN change"
        );
        Ok(RollbackOutcome::Restored(entry.state()))
    }

    /// Restores both ports of a swap from their captured entries
    ///
    /// Each port is written back to its own pre-swap pair, `id1` first.
    /// Both entries are deleted only after both writes succeeded.
    #[instrument(skip(self))]
    pub async fn rollback_swap(&self, id1: LedgerId, id2: LedgerId) -> EngineResult<[PortState; 2]> {
        let first = self.ledger().get(id1)?;
        let second = self.ledger().get(id2)?;

        let (first, second) = match (first, second) {
            (Some(first), Some(second)) => (first, second),
            (first, second) => {
                let missing = [(id1, first.is_none()), (id2, second.is_none())]
                    .into_iter()
                    .filter_map(|(id, missing)| missing.then_some(id))
                    .collect();
                return Err(EngineError::InsufficientData { missing });
            }
        };

        let restore_first = first.state();
        let restore_second = second.state();
        let first_write = self
            .engine
            .write_state(&restore_first, AuditAction::RollbackSwap)
            .await;
        let second_write = self
            .engine
            .write_state(&restore_second, AuditAction::RollbackSwap)
            .await;
        first_write?;
        second_write?;

        self.ledger().delete(id1)?;
        self.ledger().delete(id2)?;
        info!(
            switch = %first.switch_serial,
            "Rolled back swap of ports {} and {}",
            first.port_id,
            second.port_id
        );
        Ok([restore_first, restore_second])
    }

    /// Rolls back many entries over the worker pool
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    pub async fn bulk_rollback(&self, ids: Vec<LedgerId>) -> BulkRollbackReport {
        let fallback = ids.clone();
        let this = self.clone();

        let run = self
            .pool
            .run(ids, move |id| {
                let this = this.clone();
                async move { (id, this.rollback_by_id(id).await) }
            })
            .await;

        let mut report = BulkRollbackReport::default();
        for (_, (id, result)) in run.results {
            match result {
                Ok(RollbackOutcome::Restored(_)) => report.restored.push(id),
                Ok(RollbackOutcome::NotFound) => report.not_found.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }
        for index in run.aborted {
            report.failed.push((
                fallback[index],
                EngineError::WorkerAborted {
                    message: "bulk rollback worker stopped".to_string(),
                },
            ));
        }

        info!(
            restored = report.restored.len(),
            not_found = report.not_found.len(),
            failed = report.failed.len(),
            "Bulk rollback finished"
        );
        report
    }
}
