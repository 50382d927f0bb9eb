//! Error types for bulk VLAN operations.
//!
//! This module defines the error types used throughout the vlanbulk crates.
//! All errors implement `std::error::Error` via `thiserror`. None of them is
//! fatal: the engines convert every error into a per-target failure record.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::LedgerId;

/// Result type alias for remote port service calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by the remote port service.
///
/// The dashboard surfaces network, auth and lookup failures alike; callers
/// treat all of them as an opaque per-target failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Transport failure: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The dashboard answered with a non-success status.
    #[error("Dashboard API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Switch or port unknown to the dashboard.
    #[error("Switch '{switch_serial}' port '{port_id}' not found")]
    NotFound {
        /// The switch serial.
        switch_serial: String,
        /// The port identifier.
        port_id: String,
    },

    /// The dashboard rate limit was hit.
    #[error("Rate limited by dashboard (retry after {retry_after:?})")]
    RateLimited {
        /// Suggested wait from the `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The response body could not be decoded.
    #[error("Malformed dashboard response: {message}")]
    Decode {
        /// Error message.
        message: String,
    },
}

impl RemoteError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(switch_serial: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self::NotFound {
            switch_serial: switch_serial.into(),
            port_id: port_id.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { .. } | RemoteError::RateLimited { .. } => true,
            RemoteError::Api { status, .. } => *status >= 500,
            RemoteError::NotFound { .. } | RemoteError::Decode { .. } => false,
        }
    }
}

/// Errors raised by the rollback ledger storage.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing the backing file failed.
    #[error("Ledger I/O failed on {}: {source}", path.display())]
    Io {
        /// The ledger file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A stored record could not be decoded.
    #[error("Corrupt ledger record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A field cannot be represented in the record format.
    #[error("Invalid ledger field {field}: {value:?}")]
    InvalidField {
        /// The field name.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl LedgerError {
    /// Creates an I/O error bound to a ledger path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corrupt-record error.
    pub fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            line,
            reason: reason.into(),
        }
    }
}

/// Errors produced by the mutation and rollback engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading the port's current state failed.
    #[error("Failed to read {switch_serial} port {port_id}: {source}")]
    RemoteRead {
        /// The switch serial.
        switch_serial: String,
        /// The port identifier.
        port_id: String,
        /// The remote failure.
        #[source]
        source: RemoteError,
    },

    /// Read succeeded but the write was rejected.
    #[error("Failed to write {switch_serial} port {port_id}: {source}")]
    RemoteWrite {
        /// The switch serial.
        switch_serial: String,
        /// The port identifier.
        port_id: String,
        /// The remote failure.
        #[source]
        source: RemoteError,
    },

    /// A swap target does not exist on the switch.
    #[error("Port '{port_id}' not found on switch {switch_serial}")]
    PortNotFound {
        /// The switch serial.
        switch_serial: String,
        /// The port identifier.
        port_id: String,
    },

    /// Rollback requested for an unknown or consumed ID.
    #[error("No rollback data for ID {id}")]
    LedgerMiss {
        /// The requested ledger ID.
        id: LedgerId,
    },

    /// Swap rollback is missing one or both entries.
    #[error("Insufficient rollback data for swap: missing {missing:?}")]
    InsufficientData {
        /// The IDs that could not be found.
        missing: Vec<LedgerId>,
    },

    /// The first half of a swap was written but the second was not.
    #[error("Swap on {switch_serial} incomplete: port {applied_port} changed, port {failed_port} not: {source}")]
    PartialSwap {
        /// The switch serial.
        switch_serial: String,
        /// The port that already took the new values.
        applied_port: String,
        /// The port whose write failed.
        failed_port: String,
        /// The remote failure.
        #[source]
        source: RemoteError,
    },

    /// A target sets neither vlan nor voice vlan.
    #[error("Target {switch_serial} port {port_id} changes neither VLAN nor voice VLAN")]
    EmptyTarget {
        /// The switch serial.
        switch_serial: String,
        /// The port identifier.
        port_id: String,
    },

    /// The organization's switch inventory could not be read.
    #[error("Failed to list switches: {source}")]
    SwitchListing {
        /// The remote failure.
        #[source]
        source: RemoteError,
    },

    /// No switch name matches the requested name.
    #[error("No switch named '{name}'")]
    UnknownSwitch {
        /// The requested name (prefix).
        name: String,
    },

    /// The ledger could not record or consume an entry.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The worker carrying this item stopped before reaching it.
    #[error("Worker aborted before processing item: {message}")]
    WorkerAborted {
        /// Error message.
        message: String,
    },
}

impl EngineError {
    /// Creates a remote read error.
    pub fn remote_read(
        switch_serial: impl Into<String>,
        port_id: impl Into<String>,
        source: RemoteError,
    ) -> Self {
        Self::RemoteRead {
            switch_serial: switch_serial.into(),
            port_id: port_id.into(),
            source,
        }
    }

    /// Creates a remote write error.
    pub fn remote_write(
        switch_serial: impl Into<String>,
        port_id: impl Into<String>,
        source: RemoteError,
    ) -> Self {
        Self::RemoteWrite {
            switch_serial: switch_serial.into(),
            port_id: port_id.into(),
            source,
        }
    }

    /// Creates a port not found error.
    pub fn port_not_found(switch_serial: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self::PortNotFound {
            switch_serial: switch_serial.into(),
            port_id: port_id.into(),
        }
    }

    /// Returns true if repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RemoteRead { source, .. }
            | EngineError::RemoteWrite { source, .. }
            | EngineError::PartialSwap { source, .. }
            | EngineError::SwitchListing { source } => source.is_retryable(),
            EngineError::Ledger(LedgerError::Io { .. }) => true,
            EngineError::WorkerAborted { .. } => true,
            _ => false,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A value failed validation.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
