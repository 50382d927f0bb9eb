//! Target selection helpers
//!
//! Builds `MutationTarget` lists from explicit switch/port lists or from
//! VLAN membership on each switch. Switches are named by serial, by name
//! prefix, or as every switch in the organization.

use std::sync::Arc;
use tracing::debug;

use vlanbulk_common::{
    EngineError, EngineResult, MutationTarget, PortService, PortState, RemoteError, RemoteResult,
    SwitchDevice, VlanId,
};

use crate::pool::WorkerPool;

/// Which VLAN field a membership query matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanField {
    /// Data VLAN
    Data,
    /// Voice VLAN
    Voice,
}

impl VlanField {
    fn matches(&self, port: &PortState, vlan: VlanId) -> bool {
        match self {
            VlanField::Data => port.vlan == Some(vlan),
            VlanField::Voice => port.voice_vlan == Some(vlan),
        }
    }
}

/// Which switches a bulk command covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchScope {
    /// Explicit serial numbers
    Serials(Vec<String>),
    /// Switches whose names start with these prefixes
    Names(Vec<String>),
    /// Every switch in the organization
    All,
}

/// Serial of the first switch whose name starts with `name`
pub fn serial_by_name<'a>(switches: &'a [SwitchDevice], name: &str) -> Option<&'a str> {
    switches
        .iter()
        .find(|s| s.name.starts_with(name))
        .map(|s| s.serial.as_str())
}

/// Resolves a scope into switch serials
///
/// Only name and all-switch scopes touch the dashboard.
pub async fn resolve_switches(
    service: &dyn PortService,
    scope: SwitchScope,
) -> EngineResult<Vec<String>> {
    let names = match scope {
        SwitchScope::Serials(serials) => return Ok(serials),
        SwitchScope::Names(names) => names,
        SwitchScope::All => Vec::new(),
    };

    let switches = service
        .list_switches()
        .await
        .map_err(|source| EngineError::SwitchListing { source })?;

    if names.is_empty() {
        debug!(count = switches.len(), "Selected every switch in the organization");
        return Ok(switches.into_iter().map(|s| s.serial).collect());
    }

    names
        .into_iter()
        .map(|name| match serial_by_name(&switches, &name) {
            Some(serial) => Ok(serial.to_string()),
            None => Err(EngineError::UnknownSwitch { name }),
        })
        .collect()
}

/// Returns the IDs of ports on `switch_serial` assigned to `vlan`
pub async fn ports_on_vlan(
    service: &dyn PortService,
    switch_serial: &str,
    vlan: VlanId,
    field: VlanField,
) -> RemoteResult<Vec<String>> {
    let ports = service.list_ports(switch_serial).await?;
    let matching: Vec<String> = ports
        .into_iter()
        .filter(|p| field.matches(p, vlan))
        .map(|p| p.port_id)
        .collect();
    debug!(
        switch = switch_serial,
        vlan,
        ?field,
        count = matching.len(),
        "Selected ports by VLAN membership"
    );
    Ok(matching)
}

/// Builds one target per (switch, port) pair
pub fn targets_for(
    switch_serials: &[String],
    port_ids: &[String],
    vlan: Option<VlanId>,
    voice_vlan: Option<VlanId>,
) -> EngineResult<Vec<MutationTarget>> {
    let mut targets = Vec::with_capacity(switch_serials.len() * port_ids.len());
    for serial in switch_serials {
        for port in port_ids {
            targets.push(MutationTarget::new(serial.as_str(), port.as_str(), vlan, voice_vlan)?);
        }
    }
    Ok(targets)
}

/// Targets selected across switches, plus switches that could not be listed
#[derive(Debug, Default)]
pub struct Selection {
    /// Targets for every matching port
    pub targets: Vec<MutationTarget>,
    /// Switches whose port list could not be read
    pub unreachable: Vec<(String, RemoteError)>,
}

/// Builds targets for every port on `vlan` across `switch_serials`
///
/// Port lists are fetched over the same paced pool as mutations.
pub async fn targets_on_vlan(
    service: Arc<dyn PortService>,
    pool: &WorkerPool,
    switch_serials: Vec<String>,
    vlan: VlanId,
    field: VlanField,
    new_vlan: Option<VlanId>,
    new_voice_vlan: Option<VlanId>,
) -> EngineResult<Selection> {
    if new_vlan.is_none() && new_voice_vlan.is_none() {
        return Err(EngineError::EmptyTarget {
            switch_serial: "*".to_string(),
            port_id: "*".to_string(),
        });
    }

    let run = pool
        .run(switch_serials, move |serial| {
            let service = Arc::clone(&service);
            async move {
                let result = ports_on_vlan(service.as_ref(), &serial, vlan, field).await;
                (serial, result)
            }
        })
        .await;

    let mut selection = Selection::default();
    for (_, (serial, result)) in run.results {
        match result {
            Ok(ports) => {
                for port in ports {
                    selection.targets.push(MutationTarget::new(
                        serial.as_str(),
                        port,
                        new_vlan,
                        new_voice_vlan,
                    )?);
                }
            }
            Err(e) => selection.unreachable.push((serial, e)),
        }
    }
    Ok(selection)
}
