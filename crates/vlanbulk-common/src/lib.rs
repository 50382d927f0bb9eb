//! Common types for the bulk switch-port VLAN tool.
//!
//! This crate provides the vocabulary shared by the engine crate and the
//! test infrastructure:
//!
//! - [`types`]: port state, mutation targets and ledger entries
//! - [`PortService`]: the remote dashboard seam
//! - [`audit`]: the append-only audit log
//! - [`error`]: error types for remote, ledger and engine operations
//!
//! # Example
//!
//! ```ignore
//! use vlanbulk_common::{MutationTarget, PortService};
//!
//! async fn preview(svc: &dyn PortService) -> vlanbulk_common::RemoteResult<()> {
//!     let target = MutationTarget::new("Q2XX-AAAA-0001", "7", Some(30), None).unwrap();
//!     let current = svc.get_port(&target.switch_serial, &target.port_id).await?;
//!     println!("{:?} -> {:?}", current.vlans(), target.resolve(&current));
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod error;
pub mod service;
pub mod types;

// Re-export commonly used items at crate root
pub use audit::{AuditAction, AuditRecord, AuditSink, FileAuditLog};
pub use error::{
    ConfigError, EngineError, EngineResult, LedgerError, LedgerResult, RemoteError, RemoteResult,
};
pub use service::PortService;
pub use types::{
    display_vlan, LedgerEntry, LedgerId, MutationTarget, OperationKind, PortState, SwitchDevice,
    VlanId,
};
