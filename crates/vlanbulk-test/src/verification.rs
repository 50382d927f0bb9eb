//! Verification helpers for port and ledger state

use thiserror::Error;

use vlanbulk_common::{display_vlan, LedgerEntry, OperationKind, PortState, VlanId};

use crate::FakePortService;

/// Verification error types
#[derive(Error, Debug, PartialEq)]
pub enum VerificationError {
    #[error("Port {switch_serial}/{port_id} not found on fake switch")]
    PortNotFound {
        switch_serial: String,
        port_id: String,
    },

    #[error("Port {switch_serial}/{port_id}: expected VLAN {expected}, got {actual}")]
    VlanMismatch {
        switch_serial: String,
        port_id: String,
        expected: String,
        actual: String,
    },

    #[error("Expected ledger IDs {expected:?}, found {actual:?}")]
    LedgerIdMismatch {
        expected: Vec<u64>,
        actual: Vec<u64>,
    },

    #[error("Ledger entry {id}: expected {expected}, got {actual}")]
    EntryMismatch {
        id: u64,
        expected: String,
        actual: String,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Port state verifier over a [`FakePortService`]
pub struct PortVerifier<'a> {
    service: &'a FakePortService,
}

impl<'a> PortVerifier<'a> {
    pub fn new(service: &'a FakePortService) -> Self {
        Self { service }
    }

    /// Verify a port's VLAN pair
    pub fn assert_vlans(
        &self,
        switch_serial: &str,
        port_id: &str,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    ) -> VerifyResult<()> {
        let port = self.service.port(switch_serial, port_id).ok_or_else(|| {
            VerificationError::PortNotFound {
                switch_serial: switch_serial.to_string(),
                port_id: port_id.to_string(),
            }
        })?;

        if port.vlans() != (vlan, voice_vlan) {
            return Err(VerificationError::VlanMismatch {
                switch_serial: switch_serial.to_string(),
                port_id: port_id.to_string(),
                expected: pair(vlan, voice_vlan),
                actual: pair(port.vlan, port.voice_vlan),
            });
        }
        Ok(())
    }

    /// Verify every given port is back in the given state
    pub fn assert_states(&self, states: &[PortState]) -> VerifyResult<()> {
        for state in states {
            self.assert_vlans(
                &state.switch_serial,
                &state.port_id,
                state.vlan,
                state.voice_vlan,
            )?;
        }
        Ok(())
    }
}

fn pair(vlan: Option<VlanId>, voice_vlan: Option<VlanId>) -> String {
    format!("{}/{}", display_vlan(vlan), display_vlan(voice_vlan))
}

/// Verify ledger entries carry exactly these IDs, in order
pub fn assert_ledger_ids(entries: &[LedgerEntry], expected: &[u64]) -> VerifyResult<()> {
    let actual: Vec<u64> = entries.iter().map(|e| e.id).collect();
    if actual != expected {
        return Err(VerificationError::LedgerIdMismatch {
            expected: expected.to_vec(),
            actual,
        });
    }
    Ok(())
}

/// Verify a ledger entry captured `state` for an operation of `kind`
pub fn assert_captured(
    entry: &LedgerEntry,
    kind: OperationKind,
    state: &PortState,
) -> VerifyResult<()> {
    if entry.kind != kind || entry.state() != *state {
        return Err(VerificationError::EntryMismatch {
            id: entry.id,
            expected: format!("{} {:?}", kind, state),
            actual: format!("{} {:?}", entry.kind, entry.state()),
        });
    }
    Ok(())
}
