//! Type definitions shared by the mutation and rollback engines

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

/// VLAN identifier as used by the dashboard (1-4094)
pub type VlanId = u16;

/// Rollback ledger entry identifier (1-based, strictly increasing)
pub type LedgerId = u64;

/// A port's VLAN assignment at a point in time
///
/// Fetched on demand and never cached beyond a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    /// Switch serial number
    pub switch_serial: String,
    /// Port identifier on the switch
    pub port_id: String,
    /// Data VLAN
    pub vlan: Option<VlanId>,
    /// Voice VLAN
    pub voice_vlan: Option<VlanId>,
}

impl PortState {
    /// Create a new PortState
    pub fn new(
        switch_serial: impl Into<String>,
        port_id: impl Into<String>,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    ) -> Self {
        Self {
            switch_serial: switch_serial.into(),
            port_id: port_id.into(),
            vlan,
            voice_vlan,
        }
    }

    /// Returns the (vlan, voice_vlan) pair
    pub fn vlans(&self) -> (Option<VlanId>, Option<VlanId>) {
        (self.vlan, self.voice_vlan)
    }
}

/// A switch in the dashboard organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchDevice {
    /// Serial number
    pub serial: String,
    /// Display name; may be empty
    pub name: String,
    /// Hardware model
    pub model: String,
}

impl SwitchDevice {
    /// Create a new SwitchDevice
    pub fn new(
        serial: impl Into<String>,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            name: name.into(),
            model: model.into(),
        }
    }
}

/// One desired port change
///
/// An unset field keeps the port's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTarget {
    /// Switch serial number
    pub switch_serial: String,
    /// Port identifier on the switch
    pub port_id: String,
    /// New data VLAN, if changing
    pub vlan: Option<VlanId>,
    /// New voice VLAN, if changing
    pub voice_vlan: Option<VlanId>,
}

impl MutationTarget {
    /// Create a new MutationTarget, rejecting targets that change nothing
    pub fn new(
        switch_serial: impl Into<String>,
        port_id: impl Into<String>,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    ) -> EngineResult<Self> {
        let target = Self {
            switch_serial: switch_serial.into(),
            port_id: port_id.into(),
            vlan,
            voice_vlan,
        };
        target.validate()?;
        Ok(target)
    }

    /// Build a restore target from a captured state
    ///
    /// Both values are carried as-is. An absent voice VLAN clears the port's
    /// voice VLAN; an absent data VLAN leaves the current one in place.
    pub fn restore(state: &PortState) -> Self {
        Self {
            switch_serial: state.switch_serial.clone(),
            port_id: state.port_id.clone(),
            vlan: state.vlan,
            voice_vlan: state.voice_vlan,
        }
    }

    /// Fails with `EmptyTarget` when neither vlan nor voice vlan is set
    pub fn validate(&self) -> EngineResult<()> {
        if self.vlan.is_none() && self.voice_vlan.is_none() {
            return Err(EngineError::EmptyTarget {
                switch_serial: self.switch_serial.clone(),
                port_id: self.port_id.clone(),
            });
        }
        Ok(())
    }

    /// Resolve the values to write against the port's current state
    pub fn resolve(&self, current: &PortState) -> (Option<VlanId>, Option<VlanId>) {
        (
            self.vlan.or(current.vlan),
            self.voice_vlan.or(current.voice_vlan),
        )
    }
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} port {}", self.switch_serial, self.port_id)
    }
}

/// Kind of mutation that produced a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Single port VLAN change
    SingleChange,
    /// Port VLAN change issued as part of a bulk batch
    BulkChange,
    /// One side of a two-port swap
    Swap,
}

impl OperationKind {
    /// Returns the storage tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SingleChange => "single",
            OperationKind::BulkChange => "bulk",
            OperationKind::Swap => "swap",
        }
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(OperationKind::SingleChange),
            "bulk" => Ok(OperationKind::BulkChange),
            "swap" => Ok(OperationKind::Swap),
            other => Err(format!("unknown operation kind '{}'", other)),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of a port's pre-mutation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Ledger ID
    pub id: LedgerId,
    /// Mutation that created the entry
    pub kind: OperationKind,
    /// Switch serial number
    pub switch_serial: String,
    /// Port identifier
    pub port_id: String,
    /// Data VLAN before the mutation
    pub vlan: Option<VlanId>,
    /// Voice VLAN before the mutation
    pub voice_vlan: Option<VlanId>,
}

impl LedgerEntry {
    /// The captured state this entry restores
    pub fn state(&self) -> PortState {
        PortState::new(
            self.switch_serial.clone(),
            self.port_id.clone(),
            self.vlan,
            self.voice_vlan,
        )
    }
}

/// Formats an optional VLAN for human-readable output
pub fn display_vlan(vlan: Option<VlanId>) -> String {
    vlan.map_or_else(|| "none".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_rejects_empty() {
        let err = MutationTarget::new("Q2XX-AAAA-0001", "1", None, None).unwrap_err();
        assert!(matches!(err, EngineError::EmptyTarget { .. }));

        assert!(MutationTarget::new("Q2XX-AAAA-0001", "1", Some(10), None).is_ok());
        assert!(MutationTarget::new("Q2XX-AAAA-0001", "1", None, Some(20)).is_ok());
    }

    #[test]
    fn test_target_resolve_keeps_unset_fields() {
        let current = PortState::new("S", "1", Some(10), Some(20));

        let vlan_only = MutationTarget::new("S", "1", Some(30), None).unwrap();
        assert_eq!(vlan_only.resolve(&current), (Some(30), Some(20)));

        let voice_only = MutationTarget::new("S", "1", None, Some(40)).unwrap();
        assert_eq!(voice_only.resolve(&current), (Some(10), Some(40)));
    }

    #[test]
    fn test_operation_kind_from_str() {
        assert_eq!(
            "single".parse::<OperationKind>().unwrap(),
            OperationKind::SingleChange
        );
        assert_eq!(
            "bulk".parse::<OperationKind>().unwrap(),
            OperationKind::BulkChange
        );
        assert_eq!("swap".parse::<OperationKind>().unwrap(), OperationKind::Swap);
        assert!("3".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_entry_state() {
        let entry = LedgerEntry {
            id: 4,
            kind: OperationKind::Swap,
            switch_serial: "S".to_string(),
            port_id: "2".to_string(),
            vlan: Some(10),
            voice_vlan: None,
        };
        assert_eq!(entry.state(), PortState::new("S", "2", Some(10), None));
        assert_eq!(display_vlan(entry.voice_vlan), "none");
    }
}
