//! vlanbulk - bulk switch-port VLAN changes with rollback
//!
//! Applies VLAN/voice-VLAN changes to many dashboard-managed switch ports
//! over a paced worker pool, recording every port's prior state in a
//! durable rollback ledger so any change or swap can be undone later.

mod config;
mod dashboard;
mod dispatcher;
mod ledger;
mod mutation;
mod pool;
mod rollback;
mod select;

pub use config::*;
pub use dashboard::{DashboardClient, DEFAULT_BASE_URL};
pub use dispatcher::{BulkDispatcher, BulkReport};
pub use ledger::{Ledger, DEFAULT_LEDGER_FILE};
pub use mutation::{ChangeMode, MutationEngine, MutationOutcome, SwapOutcome};
pub use pool::{partition, PoolRun, WorkerPool, DEFAULT_PACING, MAX_WORKERS};
pub use rollback::{BulkRollbackReport, RollbackEngine, RollbackOutcome};
pub use select::{
    ports_on_vlan, resolve_switches, serial_by_name, targets_for, targets_on_vlan, Selection,
    SwitchScope, VlanField,
};
