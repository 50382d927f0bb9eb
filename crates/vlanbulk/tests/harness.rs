//! Shared setup for vlanbulk integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use vlanbulk::{BulkDispatcher, Ledger, MutationEngine, RollbackEngine, WorkerPool};
use vlanbulk_common::PortState;
use vlanbulk_test::{FakePortService, MemoryAuditLog};

/// Engine wired to an in-memory dashboard and a ledger in a temp dir
pub struct Harness {
    pub dir: TempDir,
    pub switch: Arc<FakePortService>,
    pub audit: Arc<MemoryAuditLog>,
    pub ledger: Arc<Ledger>,
    pub engine: MutationEngine,
}

impl Harness {
    pub fn new(ports: impl IntoIterator<Item = PortState>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger = Arc::new(Ledger::open(dir.path().join("rollback_data.csv")).expect("ledger"));
        let switch = Arc::new(FakePortService::with_ports(ports));
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = MutationEngine::new(switch.clone(), Arc::clone(&ledger), audit.clone());

        Self {
            dir,
            switch,
            audit,
            ledger,
            engine,
        }
    }

    /// Pool with no pacing, for tests that do not care about timing
    pub fn fast_pool(workers: usize) -> WorkerPool {
        WorkerPool::new(workers, Duration::ZERO)
    }

    pub fn dispatcher(&self) -> BulkDispatcher {
        BulkDispatcher::new(self.engine.clone(), Self::fast_pool(4))
    }

    pub fn rollback(&self) -> RollbackEngine {
        RollbackEngine::new(self.engine.clone(), Self::fast_pool(4))
    }

    /// Reopens the ledger file as a fresh process would
    pub fn reopen_ledger(&self) -> Ledger {
        Ledger::open(self.ledger.path()).expect("reopen ledger")
    }
}
