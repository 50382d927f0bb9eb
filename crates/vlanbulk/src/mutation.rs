//! MutationEngine - single-port changes and two-port swaps
//!
//! Change flow:
//! 1. Read the port's current state from the dashboard
//! 2. Capture that state in the rollback ledger (capture mode only)
//! 3. Write the resolved VLAN pair
//! 4. Append an audit line
//!
//! A capture always lands on disk before the write it protects.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use vlanbulk_common::{
    AuditAction, AuditRecord, AuditSink, EngineError, EngineResult, LedgerId, MutationTarget,
    OperationKind, PortService, PortState,
};

use crate::ledger::Ledger;

/// How a change interacts with the rollback ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMode {
    /// Record the pre-change state under a new ledger ID first
    Capture(OperationKind),
    /// Replay a captured state; writes the captured pair and records nothing
    Restore,
}

/// Result of applying one target
#[derive(Debug)]
pub struct MutationOutcome {
    /// The requested change
    pub target: MutationTarget,
    /// Ledger entry captured for this change, if any
    pub ledger_id: Option<LedgerId>,
    /// State the port was left in, on success
    pub applied: Option<PortState>,
    /// Failure, if the change did not apply
    pub error: Option<EngineError>,
}

impl MutationOutcome {
    fn succeeded(target: MutationTarget, ledger_id: Option<LedgerId>, applied: PortState) -> Self {
        Self {
            target,
            ledger_id,
            applied: Some(applied),
            error: None,
        }
    }

    /// Builds a failed outcome
    pub fn failed(target: MutationTarget, ledger_id: Option<LedgerId>, error: EngineError) -> Self {
        Self {
            target,
            ledger_id,
            applied: None,
            error: Some(error),
        }
    }

    /// Returns true if the write went through
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a completed swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Port A after the swap
    pub port_a: PortState,
    /// Port B after the swap
    pub port_b: PortState,
    /// Ledger IDs capturing A and B, when captured
    pub ledger_ids: Option<(LedgerId, LedgerId)>,
}

/// Applies port mutations against the dashboard
///
/// Cheap to clone; every clone shares the same service, ledger and audit
/// sink.
#[derive(Clone)]
pub struct MutationEngine {
    service: Arc<dyn PortService>,
    ledger: Arc<Ledger>,
    audit: Arc<dyn AuditSink>,
}

impl MutationEngine {
    /// Creates a new engine
    pub fn new(service: Arc<dyn PortService>, ledger: Arc<Ledger>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            service,
            ledger,
            audit,
        }
    }

    /// Returns the shared ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Returns the remote service
    pub fn service(&self) -> &Arc<dyn PortService> {
        &self.service
    }

    /// Applies one target and reports the outcome
    ///
    /// Never returns an error: every failure is carried in the outcome.
    #[instrument(skip(self, target), fields(switch = %target.switch_serial, port = %target.port_id))]
    pub async fn apply_change(&self, target: MutationTarget, mode: ChangeMode) -> MutationOutcome {
        let mut ledger_id = None;
        match self.try_apply(&target, mode, &mut ledger_id).await {
            Ok(applied) => MutationOutcome::succeeded(target, ledger_id, applied),
            Err(e) => {
                warn!(error = %e, ledger_id = ?ledger_id, "Port change failed");
                MutationOutcome::failed(target, ledger_id, e)
            }
        }
    }

    async fn try_apply(
        &self,
        target: &MutationTarget,
        mode: ChangeMode,
        ledger_id: &mut Option<LedgerId>,
    ) -> EngineResult<PortState> {
        if let ChangeMode::Capture(_) = mode {
            target.validate()?;
        }

        let current = self
            .service
            .get_port(&target.switch_serial, &target.port_id)
            .await
            .map_err(|e| EngineError::remote_read(&target.switch_serial, &target.port_id, e))?;

        let (vlan, voice_vlan, action) = match mode {
            ChangeMode::Capture(kind) => {
                *ledger_id = Some(self.ledger.append(kind, &current)?);
                let (vlan, voice_vlan) = target.resolve(&current);
                (vlan, voice_vlan, AuditAction::PortChanged)
            }
            ChangeMode::Restore => (target.vlan, target.voice_vlan, AuditAction::RollbackPortVlan),
        };

        let new_state = PortState::new(
            target.switch_serial.clone(),
            target.port_id.clone(),
            vlan,
            voice_vlan,
        );
        self.write_state(&new_state, action).await?;

        debug!(
            before = ?current.vlans(),
            after = ?new_state.vlans(),
            "Port change applied"
        );
        Ok(new_state)
    }

    /// Writes an exact VLAN pair to a port and audits it
    ///
    /// No read and no capture; used by swaps and swap rollback.
    pub async fn write_state(&self, state: &PortState, action: AuditAction) -> EngineResult<()> {
        self.service
            .set_port(
                &state.switch_serial,
                &state.port_id,
                state.vlan,
                state.voice_vlan,
            )
            .await
            .map_err(|e| EngineError::remote_write(&state.switch_serial, &state.port_id, e))?;

        self.audit(action, state);
        Ok(())
    }

    /// Exchanges the VLAN pairs of two ports on one switch
    ///
    /// Port A is written first. If the write to port B fails, port A keeps
    /// its new values and `PartialSwap` is returned.
    #[instrument(skip(self))]
    pub async fn swap(
        &self,
        switch_serial: &str,
        port_a: &str,
        port_b: &str,
        capture: bool,
    ) -> EngineResult<SwapOutcome> {
        let ports = self
            .service
            .list_ports(switch_serial)
            .await
            .map_err(|e| EngineError::remote_read(switch_serial, format!("{}/{}", port_a, port_b), e))?;

        let find = |port_id: &str| {
            ports
                .iter()
                .find(|p| p.port_id == port_id)
                .cloned()
                .ok_or_else(|| EngineError::port_not_found(switch_serial, port_id))
        };
        let before_a = find(port_a)?;
        let before_b = find(port_b)?;

        let ledger_ids = if capture {
            let id_a = self.ledger.append(OperationKind::Swap, &before_a)?;
            let id_b = self.ledger.append(OperationKind::Swap, &before_b)?;
            Some((id_a, id_b))
        } else {
            None
        };

        let after_a = PortState::new(switch_serial, port_a, before_b.vlan, before_b.voice_vlan);
        let after_b = PortState::new(switch_serial, port_b, before_a.vlan, before_a.voice_vlan);

        self.write_state(&after_a, AuditAction::PortsSwapped).await?;
        if let Err(e) = self.write_state(&after_b, AuditAction::PortsSwapped).await {
            let source = match e {
                EngineError::RemoteWrite { source, .. } => source,
                other => return Err(other),
            };
            warn!(error = %source, "Swap left incomplete after first write");
            return Err(EngineError::PartialSwap {
                switch_serial: switch_serial.to_string(),
                applied_port: port_a.to_string(),
                failed_port: port_b.to_string(),
                source,
            });
        }

        info!(?ledger_ids, "Swapped ports {} and {}", port_a, port_b);
        Ok(SwapOutcome {
            port_a: after_a,
            port_b: after_b,
            ledger_ids,
        })
    }

    fn audit(&self, action: AuditAction, state: &PortState) {
        if let Err(e) = self.audit.record(&AuditRecord::new(action, state)) {
            warn!(error = %e, action = action.as_str(), "Failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlanbulk_common::{RemoteError, RemoteResult, SwitchDevice, VlanId};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Minimal in-memory switch for engine unit tests
    #[derive(Default)]
    struct TestSwitch {
        ports: Mutex<HashMap<String, (Option<VlanId>, Option<VlanId>)>>,
        fail_writes: Mutex<Vec<String>>,
        ledger_sizes_at_write: Mutex<Vec<usize>>,
        ledger: Mutex<Option<Arc<Ledger>>>,
    }

    #[async_trait]
    impl PortService for TestSwitch {
        async fn get_port(&self, serial: &str, port_id: &str) -> RemoteResult<PortState> {
            self.ports
                .lock()
                .get(port_id)
                .map(|(v, vv)| PortState::new(serial, port_id, *v, *vv))
                .ok_or_else(|| RemoteError::not_found(serial, port_id))
        }

        async fn set_port(
            &self,
            _serial: &str,
            port_id: &str,
            vlan: Option<VlanId>,
            voice_vlan: Option<VlanId>,
        ) -> RemoteResult<()> {
            if let Some(ledger) = self.ledger.lock().as_ref() {
                let size = ledger.list().unwrap().len();
                self.ledger_sizes_at_write.lock().push(size);
            }
            if self.fail_writes.lock().iter().any(|p| p == port_id) {
                return Err(RemoteError::transport("connection reset"));
            }
            self.ports
                .lock()
                .insert(port_id.to_string(), (vlan, voice_vlan));
            Ok(())
        }

        async fn list_ports(&self, serial: &str) -> RemoteResult<Vec<PortState>> {
            let ports = self.ports.lock();
            let mut list: Vec<PortState> = ports
                .iter()
                .map(|(id, (v, vv))| PortState::new(serial, id.as_str(), *v, *vv))
                .collect();
            list.sort_by(|a, b| a.port_id.cmp(&b.port_id));
            Ok(list)
        }

        async fn list_switches(&self) -> RemoteResult<Vec<SwitchDevice>> {
            Ok(Vec::new())
        }
    }

    struct NullAudit;

    impl AuditSink for NullAudit {
        fn record(&self, _record: &AuditRecord) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn setup(ports: &[(&str, Option<VlanId>, Option<VlanId>)]) -> (tempfile::TempDir, Arc<TestSwitch>, MutationEngine) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path().join("rollback_data.csv")).unwrap());
        let switch = Arc::new(TestSwitch::default());
        for (id, v, vv) in ports {
            switch.ports.lock().insert(id.to_string(), (*v, *vv));
        }
        *switch.ledger.lock() = Some(Arc::clone(&ledger));
        let engine = MutationEngine::new(switch.clone(), ledger, Arc::new(NullAudit));
        (dir, switch, engine)
    }

    #[tokio::test]
    async fn test_capture_holds_pre_change_state() {
        let (_dir, switch, engine) = setup(&[("1", Some(10), Some(20))]);

        let target = MutationTarget::new("S", "1", Some(30), None).unwrap();
        let outcome = engine
            .apply_change(target, ChangeMode::Capture(OperationKind::SingleChange))
            .await;

        assert!(outcome.is_success());
        let id = outcome.ledger_id.unwrap();
        let entry = engine.ledger().get(id).unwrap().unwrap();
        assert_eq!((entry.vlan, entry.voice_vlan), (Some(10), Some(20)));
        assert_eq!(entry.kind, OperationKind::SingleChange);

        // Voice VLAN untouched because the target left it unset
        assert_eq!(switch.ports.lock()["1"], (Some(30), Some(20)));
        // The capture was on disk before the write was issued
        assert_eq!(*switch.ledger_sizes_at_write.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_read_failure_skips_capture() {
        let (_dir, _switch, engine) = setup(&[]);

        let target = MutationTarget::new("S", "9", Some(30), None).unwrap();
        let outcome = engine
            .apply_change(target, ChangeMode::Capture(OperationKind::BulkChange))
            .await;

        assert!(!outcome.is_success());
        assert!(matches!(outcome.error, Some(EngineError::RemoteRead { .. })));
        assert!(outcome.ledger_id.is_none());
        assert!(engine.ledger().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_capture() {
        let (_dir, switch, engine) = setup(&[("1", Some(10), None)]);
        switch.fail_writes.lock().push("1".to_string());

        let target = MutationTarget::new("S", "1", Some(30), None).unwrap();
        let outcome = engine
            .apply_change(target, ChangeMode::Capture(OperationKind::SingleChange))
            .await;

        assert!(matches!(outcome.error, Some(EngineError::RemoteWrite { .. })));
        let id = outcome.ledger_id.unwrap();
        assert_eq!(engine.ledger().get(id).unwrap().unwrap().vlan, Some(10));
    }

    #[tokio::test]
    async fn test_restore_writes_exact_pair() {
        let (_dir, switch, engine) = setup(&[("1", Some(30), Some(40))]);

        let restore = MutationTarget::restore(&PortState::new("S", "1", Some(10), None));
        let outcome = engine.apply_change(restore, ChangeMode::Restore).await;

        assert!(outcome.is_success());
        assert!(outcome.ledger_id.is_none());
        assert_eq!(switch.ports.lock()["1"], (Some(10), None));
        assert!(engine.ledger().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_target_rejected_before_read() {
        let (_dir, _switch, engine) = setup(&[("1", Some(10), None)]);

        let target = MutationTarget {
            switch_serial: "S".to_string(),
            port_id: "1".to_string(),
            vlan: None,
            voice_vlan: None,
        };
        let outcome = engine
            .apply_change(target, ChangeMode::Capture(OperationKind::SingleChange))
            .await;
        assert!(matches!(outcome.error, Some(EngineError::EmptyTarget { .. })));
        assert!(engine.ledger().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_swap_exchanges_full_pair() {
        let (_dir, switch, engine) = setup(&[("1", Some(10), Some(11)), ("2", Some(20), None)]);

        let outcome = engine.swap("S", "1", "2", true).await.unwrap();

        assert_eq!(switch.ports.lock()["1"], (Some(20), None));
        assert_eq!(switch.ports.lock()["2"], (Some(10), Some(11)));

        let (id_a, id_b) = outcome.ledger_ids.unwrap();
        let a = engine.ledger().get(id_a).unwrap().unwrap();
        let b = engine.ledger().get(id_b).unwrap().unwrap();
        assert_eq!((a.port_id.as_str(), a.vlan, a.voice_vlan), ("1", Some(10), Some(11)));
        assert_eq!((b.port_id.as_str(), b.vlan, b.voice_vlan), ("2", Some(20), None));
        assert_eq!(a.kind, OperationKind::Swap);
    }

    #[tokio::test]
    async fn test_swap_missing_port() {
        let (_dir, _switch, engine) = setup(&[("1", Some(10), None)]);

        let err = engine.swap("S", "1", "5", true).await.unwrap_err();
        assert!(matches!(err, EngineError::PortNotFound { ref port_id, .. } if port_id == "5"));
        assert!(engine.ledger().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_swap_second_write_failure_is_partial() {
        let (_dir, switch, engine) = setup(&[("1", Some(10), None), ("2", Some(20), None)]);
        switch.fail_writes.lock().push("2".to_string());

        let err = engine.swap("S", "1", "2", true).await.unwrap_err();
        assert!(matches!(err, EngineError::PartialSwap { ref applied_port, .. } if applied_port == "1"));
        assert_eq!(switch.ports.lock()["1"], (Some(20), None));
        assert_eq!(switch.ports.lock()["2"], (Some(20), None));
        assert_eq!(engine.ledger().list().unwrap().len(), 2);
    }
}
