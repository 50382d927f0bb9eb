//! Remote port service abstraction.
//!
//! The dashboard is treated as an opaque remote service. Engines only see
//! this trait, which lets tests substitute an in-memory switch fleet.

use async_trait::async_trait;

use crate::error::RemoteResult;
use crate::types::{PortState, SwitchDevice, VlanId};

/// Read/update access to switch port VLAN assignments.
///
/// Every call blocks its caller until the dashboard answers or fails. The
/// service is subject to an undocumented rate limit, so bulk callers pace
/// their requests.
///
/// # Example
///
/// ```ignore
/// use vlanbulk_common::{PortService, RemoteResult};
///
/// async fn move_to_vlan(svc: &dyn PortService, serial: &str, port: &str) -> RemoteResult<()> {
///     let current = svc.get_port(serial, port).await?;
///     svc.set_port(serial, port, Some(30), current.voice_vlan).await
/// }
/// ```
#[async_trait]
pub trait PortService: Send + Sync {
    /// Returns the current VLAN assignment of one port.
    async fn get_port(&self, switch_serial: &str, port_id: &str) -> RemoteResult<PortState>;

    /// Writes the VLAN pair of one port.
    ///
    /// A `None` voice VLAN clears the voice assignment. A `None` data VLAN
    /// is left out of the update, so the port keeps its current data VLAN.
    async fn set_port(
        &self,
        switch_serial: &str,
        port_id: &str,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    ) -> RemoteResult<()>;

    /// Returns every port on a switch.
    async fn list_ports(&self, switch_serial: &str) -> RemoteResult<Vec<PortState>>;

    /// Returns every switch in the organization.
    async fn list_switches(&self) -> RemoteResult<Vec<SwitchDevice>>;
}
