//! Test infrastructure for vlanbulk
//!
//! Provides:
//! - An in-memory dashboard with failure injection
//! - An in-memory audit sink
//! - Port and target fixtures
//! - Port and ledger verification helpers

mod fake;
pub mod fixtures;
mod verification;

pub use fake::{Call, FakePortService, MemoryAuditLog};
pub use fixtures::*;
pub use verification::*;
