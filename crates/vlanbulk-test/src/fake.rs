//! In-memory dashboard double
//!
//! `FakePortService` holds port state per switch, records every call and
//! can be told to fail specific reads or writes. Like the dashboard, a
//! write without a data VLAN keeps the port's current one.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vlanbulk_common::{
    AuditRecord, AuditSink, PortService, PortState, RemoteError, RemoteResult, SwitchDevice,
    VlanId,
};

type PortKey = (String, String);
type WriteHook = Arc<dyn Fn() -> usize + Send + Sync>;

/// A call made against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get {
        switch_serial: String,
        port_id: String,
    },
    Set {
        switch_serial: String,
        port_id: String,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    },
    List {
        switch_serial: String,
    },
    ListSwitches,
}

/// Scriptable in-memory [`PortService`]
#[derive(Default)]
pub struct FakePortService {
    switches: Mutex<BTreeMap<String, BTreeMap<String, (Option<VlanId>, Option<VlanId>)>>>,
    names: Mutex<BTreeMap<String, String>>,
    failing_inventory: Mutex<bool>,
    failing_reads: Mutex<HashSet<PortKey>>,
    failing_writes: Mutex<HashSet<PortKey>>,
    failing_write_calls: Mutex<HashSet<usize>>,
    calls: Mutex<Vec<Call>>,
    write_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Mutex<Option<Duration>>,
    write_hook: Mutex<Option<WriteHook>>,
    hook_values: Mutex<Vec<usize>>,
}

impl FakePortService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the fake with the given port states
    pub fn with_ports(ports: impl IntoIterator<Item = PortState>) -> Self {
        let fake = Self::new();
        for port in ports {
            fake.insert(port);
        }
        fake
    }

    /// Adds or replaces one port
    pub fn insert(&self, port: PortState) {
        self.switches
            .lock()
            .entry(port.switch_serial)
            .or_default()
            .insert(port.port_id, (port.vlan, port.voice_vlan));
    }

    /// Gives a switch a display name
    pub fn name_switch(&self, switch_serial: &str, name: &str) {
        self.names
            .lock()
            .insert(switch_serial.to_string(), name.to_string());
    }

    /// Makes switch inventory listing fail
    pub fn fail_switch_listing(&self) {
        *self.failing_inventory.lock() = true;
    }

    /// Current state of a port, if it exists
    pub fn port(&self, switch_serial: &str, port_id: &str) -> Option<PortState> {
        self.switches
            .lock()
            .get(switch_serial)
            .and_then(|ports| ports.get(port_id))
            .map(|(v, vv)| PortState::new(switch_serial, port_id, *v, *vv))
    }

    /// Makes every read of this port fail
    pub fn fail_reads_on(&self, switch_serial: &str, port_id: &str) {
        self.failing_reads
            .lock()
            .insert((switch_serial.to_string(), port_id.to_string()));
    }

    /// Makes every write to this port fail
    pub fn fail_writes_on(&self, switch_serial: &str, port_id: &str) {
        self.failing_writes
            .lock()
            .insert((switch_serial.to_string(), port_id.to_string()));
    }

    /// Makes the n-th write call (1-based, counted across all ports) fail
    pub fn fail_nth_write(&self, n: usize) {
        self.failing_write_calls.lock().insert(n);
    }

    /// Clears all injected failures
    pub fn heal(&self) {
        self.failing_reads.lock().clear();
        self.failing_writes.lock().clear();
        self.failing_write_calls.lock().clear();
        *self.failing_inventory.lock() = false;
    }

    /// Simulated network latency applied to every call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Runs `hook` before every write and keeps its value
    ///
    /// Used to observe other state (e.g. ledger size) at the moment a
    /// write reaches the switch.
    pub fn set_write_hook(&self, hook: impl Fn() -> usize + Send + Sync + 'static) {
        *self.write_hook.lock() = Some(Arc::new(hook));
    }

    /// Values returned by the write hook, in write order
    pub fn hook_values(&self) -> Vec<usize> {
        self.hook_values.lock().clone()
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Write calls made so far, including failed ones
    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Set { .. }))
            .cloned()
            .collect()
    }

    /// Highest number of calls that were in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> InFlight<'_> {
        self.calls.lock().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PortService for FakePortService {
    async fn get_port(&self, switch_serial: &str, port_id: &str) -> RemoteResult<PortState> {
        let _guard = self
            .enter(Call::Get {
                switch_serial: switch_serial.to_string(),
                port_id: port_id.to_string(),
            })
            .await;

        if self
            .failing_reads
            .lock()
            .contains(&(switch_serial.to_string(), port_id.to_string()))
        {
            return Err(RemoteError::transport("read timed out"));
        }
        self.port(switch_serial, port_id)
            .ok_or_else(|| RemoteError::not_found(switch_serial, port_id))
    }

    async fn set_port(
        &self,
        switch_serial: &str,
        port_id: &str,
        vlan: Option<VlanId>,
        voice_vlan: Option<VlanId>,
    ) -> RemoteResult<()> {
        let _guard = self
            .enter(Call::Set {
                switch_serial: switch_serial.to_string(),
                port_id: port_id.to_string(),
                vlan,
                voice_vlan,
            })
            .await;

        let hook = self.write_hook.lock().clone();
        if let Some(hook) = hook {
            self.hook_values.lock().push(hook());
        }

        let n = self.write_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let key = (switch_serial.to_string(), port_id.to_string());
        if self.failing_write_calls.lock().contains(&n) || self.failing_writes.lock().contains(&key)
        {
            return Err(RemoteError::Api {
                status: 500,
                message: "internal error".to_string(),
            });
        }

        let mut switches = self.switches.lock();
        match switches.get_mut(switch_serial).and_then(|p| p.get_mut(port_id)) {
            Some(slot) => {
                *slot = (vlan.or(slot.0), voice_vlan);
                Ok(())
            }
            None => Err(RemoteError::not_found(switch_serial, port_id)),
        }
    }

    async fn list_ports(&self, switch_serial: &str) -> RemoteResult<Vec<PortState>> {
        let _guard = self
            .enter(Call::List {
                switch_serial: switch_serial.to_string(),
            })
            .await;

        let switches = self.switches.lock();
        let ports = switches
            .get(switch_serial)
            .ok_or_else(|| RemoteError::not_found(switch_serial, "*"))?;
        Ok(ports
            .iter()
            .map(|(id, (v, vv))| PortState::new(switch_serial, id.as_str(), *v, *vv))
            .collect())
    }

    async fn list_switches(&self) -> RemoteResult<Vec<SwitchDevice>> {
        let _guard = self.enter(Call::ListSwitches).await;

        if *self.failing_inventory.lock() {
            return Err(RemoteError::Api {
                status: 403,
                message: "organization access denied".to_string(),
            });
        }
        let names = self.names.lock();
        Ok(self
            .switches
            .lock()
            .keys()
            .map(|serial| {
                let name = names.get(serial).cloned().unwrap_or_default();
                SwitchDevice::new(serial.as_str(), name, "MS120-8")
            })
            .collect())
    }
}

/// Audit sink that keeps records in memory
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
    failing: Mutex<bool>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent record call fail
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Rendered record bodies
    pub fn messages(&self) -> Vec<String> {
        self.records.lock().iter().map(AuditRecord::message).collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, record: &AuditRecord) -> std::io::Result<()> {
        if *self.failing.lock() {
            return Err(std::io::Error::other("audit log unavailable"));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}
