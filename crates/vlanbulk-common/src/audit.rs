//! Append-only audit log of completed port actions.
//!
//! Each completed action produces exactly one timestamped line:
//!
//! ```text
//! 2026-10-19 14:02:11,391 - Changed port VLAN - Switch: Q2XX-AAAA-0001, Port: 7, VLAN: 30, Voice VLAN: none
//! ```

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{display_vlan, PortState, VlanId};

/// Action recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// A port's VLAN pair was changed
    PortChanged,
    /// One side of a swap was written
    PortsSwapped,
    /// A single-port rollback was replayed
    RollbackPortVlan,
    /// One side of a swap rollback was replayed
    RollbackSwap,
}

impl AuditAction {
    /// Returns the human-readable action label
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PortChanged => "Changed port VLAN",
            AuditAction::PortsSwapped => "Ports swapped",
            AuditAction::RollbackPortVlan => "Rollback port VLAN executed",
            AuditAction::RollbackSwap => "Rollback swap executed",
        }
    }
}

/// One audit line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// What happened
    pub action: AuditAction,
    /// Switch serial
    pub switch_serial: String,
    /// Port identifier
    pub port_id: String,
    /// Resulting data VLAN
    pub vlan: Option<VlanId>,
    /// Resulting voice VLAN
    pub voice_vlan: Option<VlanId>,
}

impl AuditRecord {
    /// Build a record from the state a port was left in
    pub fn new(action: AuditAction, state: &PortState) -> Self {
        Self {
            action,
            switch_serial: state.switch_serial.clone(),
            port_id: state.port_id.clone(),
            vlan: state.vlan,
            voice_vlan: state.voice_vlan,
        }
    }

    /// Renders the record body (without timestamp)
    pub fn message(&self) -> String {
        format!(
            "{} - Switch: {}, Port: {}, VLAN: {}, Voice VLAN: {}",
            self.action.as_str(),
            self.switch_serial,
            self.port_id,
            display_vlan(self.vlan),
            display_vlan(self.voice_vlan)
        )
    }
}

/// Destination for audit records
pub trait AuditSink: Send + Sync {
    /// Appends one record.
    fn record(&self, record: &AuditRecord) -> io::Result<()>;
}

/// File-backed audit log
///
/// Concurrent workers share one instance; each line is written under a
/// mutex so lines never interleave.
pub struct FileAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditLog {
    /// Creates an audit log writing to `path` (created on first record)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncates the log file
    pub fn clear(&self) -> io::Result<()> {
        let _guard = self.lock.lock();
        File::create(&self.path)?;
        info!(path = %self.path.display(), "Audit log cleared");
        Ok(())
    }

    fn timestamp() -> String {
        chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S,%3f")
            .to_string()
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, record: &AuditRecord) -> io::Result<()> {
        let line = format!("{} - {}\n", Self::timestamp(), record.message());

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        info!(target: "audit", "{}", record.message());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_message() {
        let state = PortState::new("Q2XX-AAAA-0001", "7", Some(30), None);
        let record = AuditRecord::new(AuditAction::PortChanged, &state);
        assert_eq!(
            record.message(),
            "Changed port VLAN - Switch: Q2XX-AAAA-0001, Port: 7, VLAN: 30, Voice VLAN: none"
        );
    }

    #[test]
    fn test_file_audit_log_appends_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path().join("vlanChanges.log"));

        let a = PortState::new("S", "1", Some(10), Some(20));
        let b = PortState::new("S", "2", Some(20), Some(10));
        log.record(&AuditRecord::new(AuditAction::PortsSwapped, &a))
            .unwrap();
        log.record(&AuditRecord::new(AuditAction::PortsSwapped, &b))
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Ports swapped - Switch: S, Port: 1, VLAN: 10, Voice VLAN: 20"));
        assert!(lines[1].contains("Port: 2"));

        log.clear().unwrap();
        assert!(std::fs::read_to_string(log.path()).unwrap().is_empty());
    }
}
