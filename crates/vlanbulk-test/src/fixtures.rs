//! Test fixtures for common port layouts and targets

use vlanbulk_common::{MutationTarget, PortState, VlanId};

/// Serial of the primary test switch
pub const SWITCH_A: &str = "Q2XX-AAAA-0001";

/// Serial of the secondary test switch
pub const SWITCH_B: &str = "Q2XX-BBBB-0002";

/// Access VLAN most fixture ports start on
pub const DATA_VLAN: VlanId = 10;

/// Voice VLAN most fixture ports start on
pub const VOICE_VLAN: VlanId = 20;

/// `count` access ports numbered "1".."count", all on the same VLAN pair
pub fn access_ports(
    switch_serial: &str,
    count: usize,
    vlan: Option<VlanId>,
    voice_vlan: Option<VlanId>,
) -> Vec<PortState> {
    (1..=count)
        .map(|n| PortState::new(switch_serial, n.to_string(), vlan, voice_vlan))
        .collect()
}

/// Standard 8-port switch: ports on the data VLAN with the voice VLAN set
pub fn office_switch(switch_serial: &str) -> Vec<PortState> {
    access_ports(switch_serial, 8, Some(DATA_VLAN), Some(VOICE_VLAN))
}

/// Switch whose ports carry a mix of assignments
///
/// Ports 1-2 on the data VLAN with voice, 3-4 on the data VLAN only,
/// 5 on VLAN 99 with voice, 6 with no VLAN at all.
pub fn mixed_switch(switch_serial: &str) -> Vec<PortState> {
    vec![
        PortState::new(switch_serial, "1", Some(DATA_VLAN), Some(VOICE_VLAN)),
        PortState::new(switch_serial, "2", Some(DATA_VLAN), Some(VOICE_VLAN)),
        PortState::new(switch_serial, "3", Some(DATA_VLAN), None),
        PortState::new(switch_serial, "4", Some(DATA_VLAN), None),
        PortState::new(switch_serial, "5", Some(99), Some(VOICE_VLAN)),
        PortState::new(switch_serial, "6", None, None),
    ]
}

/// One target per port id on `switch_serial`
pub fn targets<'a>(
    switch_serial: &str,
    port_ids: impl IntoIterator<Item = &'a str>,
    vlan: Option<VlanId>,
    voice_vlan: Option<VlanId>,
) -> Vec<MutationTarget> {
    port_ids
        .into_iter()
        .map(|port| MutationTarget {
            switch_serial: switch_serial.to_string(),
            port_id: port.to_string(),
            vlan,
            voice_vlan,
        })
        .collect()
}

/// Targets for ports "1".."count"
pub fn numbered_targets(
    switch_serial: &str,
    count: usize,
    vlan: Option<VlanId>,
    voice_vlan: Option<VlanId>,
) -> Vec<MutationTarget> {
    let ids: Vec<String> = (1..=count).map(|n| n.to_string()).collect();
    targets(switch_serial, ids.iter().map(String::as_str), vlan, voice_vlan)
}
