//! Rollback integration tests
//!
//! Covers single rollback, swap rollback and concurrent bulk rollback
//! against the in-memory dashboard.

mod harness;

use harness::Harness;
use pretty_assertions::assert_eq;
use std::time::Duration;

use vlanbulk::{ChangeMode, RollbackEngine, RollbackOutcome};
use vlanbulk_common::{AuditAction, EngineError, OperationKind, PortState};
use vlanbulk_test::{fixtures::*, Call, PortVerifier};

#[tokio::test]
async fn test_rollback_round_trip() {
    let h = Harness::new(mixed_switch(SWITCH_A));
    let before = h.switch.port(SWITCH_A, "3").unwrap();

    let outcome = h
        .engine
        .apply_change(
            targets(SWITCH_A, ["3"], Some(60), Some(61)).remove(0),
            ChangeMode::Capture(OperationKind::SingleChange),
        )
        .await;
    let id = outcome.ledger_id.unwrap();
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "3", Some(60), Some(61))
        .unwrap();

    let restored = h.rollback().rollback_by_id(id).await.unwrap();
    assert_eq!(restored, RollbackOutcome::Restored(before.clone()));

    // Voice VLAN was unset before the change and must be unset again
    PortVerifier::new(&h.switch)
        .assert_states(&[before])
        .unwrap();
    assert!(h.ledger.get(id).unwrap().is_none());

    let actions: Vec<AuditAction> = h.audit.records().iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::PortChanged, AuditAction::RollbackPortVlan]
    );
}

#[tokio::test]
async fn test_rollback_unknown_id_is_not_an_error() {
    let h = Harness::new(office_switch(SWITCH_A));

    let outcome = h.rollback().rollback_by_id(999).await.unwrap();
    assert_eq!(outcome, RollbackOutcome::NotFound);
    assert!(!outcome.is_restored());
    assert!(h.switch.calls().is_empty());
}

#[tokio::test]
async fn test_rollback_does_not_capture() {
    let h = Harness::new(office_switch(SWITCH_A));
    let outcome = h
        .engine
        .apply_change(
            targets(SWITCH_A, ["1"], Some(30), None).remove(0),
            ChangeMode::Capture(OperationKind::SingleChange),
        )
        .await;
    let id = outcome.ledger_id.unwrap();

    h.rollback().rollback_by_id(id).await.unwrap();
    assert!(h.ledger.list().unwrap().is_empty());
    assert_eq!(h.ledger.next_id().unwrap(), id + 1);
}

#[tokio::test]
async fn test_failed_rollback_keeps_entry_for_retry() {
    let h = Harness::new(office_switch(SWITCH_A));
    let id = h
        .engine
        .apply_change(
            targets(SWITCH_A, ["4"], Some(30), None).remove(0),
            ChangeMode::Capture(OperationKind::SingleChange),
        )
        .await
        .ledger_id
        .unwrap();

    h.switch.fail_writes_on(SWITCH_A, "4");
    let err = h.rollback().rollback_by_id(id).await.unwrap_err();
    assert!(matches!(err, EngineError::RemoteWrite { .. }));
    assert!(err.is_retryable());
    assert!(h.ledger.get(id).unwrap().is_some());

    h.switch.heal();
    assert!(h.rollback().rollback_by_id(id).await.unwrap().is_restored());
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "4", Some(DATA_VLAN), Some(VOICE_VLAN))
        .unwrap();
}

#[tokio::test]
async fn test_swap_then_rollback_swap() {
    let h = Harness::new(mixed_switch(SWITCH_A));
    let a = h.switch.port(SWITCH_A, "1").unwrap();
    let b = h.switch.port(SWITCH_A, "5").unwrap();

    let outcome = h.engine.swap(SWITCH_A, "1", "5", true).await.unwrap();
    assert_eq!(outcome.port_a, PortState::new(SWITCH_A, "1", b.vlan, b.voice_vlan));
    assert_eq!(outcome.port_b, PortState::new(SWITCH_A, "5", a.vlan, a.voice_vlan));

    let (id_a, id_b) = outcome.ledger_ids.unwrap();
    let entries = h.ledger.list().unwrap();
    assert!(entries.iter().all(|e| e.kind == OperationKind::Swap));

    let restored = h.rollback().rollback_swap(id_a, id_b).await.unwrap();
    assert_eq!(restored, [a.clone(), b.clone()]);
    PortVerifier::new(&h.switch).assert_states(&[a, b]).unwrap();
    assert!(h.ledger.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_swap_without_capture() {
    let h = Harness::new(mixed_switch(SWITCH_A));

    let outcome = h.engine.swap(SWITCH_A, "3", "5", false).await.unwrap();
    assert_eq!(outcome.ledger_ids, None);
    assert!(h.ledger.list().unwrap().is_empty());
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "3", Some(99), Some(VOICE_VLAN))
        .unwrap();
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "5", Some(DATA_VLAN), None)
        .unwrap();
}

#[tokio::test]
async fn test_partial_swap() {
    let h = Harness::new(mixed_switch(SWITCH_A));
    h.switch.fail_writes_on(SWITCH_A, "5");

    let err = h.engine.swap(SWITCH_A, "1", "5", true).await.unwrap_err();
    match err {
        EngineError::PartialSwap {
            applied_port,
            failed_port,
            ..
        } => {
            assert_eq!(applied_port, "1");
            assert_eq!(failed_port, "5");
        }
        other => panic!("Expected PartialSwap, got {:?}", other),
    }

    // Port 1 already took port 5's values; both captures remain for rollback
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "1", Some(99), Some(VOICE_VLAN))
        .unwrap();
    assert_eq!(h.ledger.list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_swap_missing_port() {
    let h = Harness::new(mixed_switch(SWITCH_A));

    let err = h.engine.swap(SWITCH_A, "1", "48", true).await.unwrap_err();
    assert!(matches!(err, EngineError::PortNotFound { .. }));
    assert!(h.ledger.list().unwrap().is_empty());
    assert!(h.switch.writes().is_empty());
}

#[tokio::test]
async fn test_rollback_swap_missing_entry() {
    let h = Harness::new(mixed_switch(SWITCH_A));
    let (id_a, _) = h
        .engine
        .swap(SWITCH_A, "1", "2", true)
        .await
        .unwrap()
        .ledger_ids
        .unwrap();

    let err = h.rollback().rollback_swap(id_a, 77).await.unwrap_err();
    match err {
        EngineError::InsufficientData { missing } => assert_eq!(missing, vec![77]),
        other => panic!("Expected InsufficientData, got {:?}", other),
    }
    assert!(h.ledger.get(id_a).unwrap().is_some());
}

#[tokio::test]
async fn test_bulk_rollback() {
    let h = Harness::new(office_switch(SWITCH_A));
    let report = h
        .dispatcher()
        .dispatch(
            numbered_targets(SWITCH_A, 6, Some(30), Some(31)),
            OperationKind::BulkChange,
        )
        .await;
    assert!(report.is_clean());

    // Duplicate and unknown IDs in the request
    let rollback = h.rollback().bulk_rollback(vec![1, 2, 3, 4, 5, 6, 3, 42]).await;

    let mut restored = rollback.restored.clone();
    restored.sort();
    assert_eq!(restored, vec![1, 2, 3, 4, 5, 6]);
    let mut not_found = rollback.not_found.clone();
    not_found.sort();
    assert_eq!(not_found, vec![3, 42]);
    assert!(rollback.failed.is_empty());
    assert_eq!(rollback.attempted(), 8);

    PortVerifier::new(&h.switch)
        .assert_states(&office_switch(SWITCH_A))
        .unwrap();
    assert!(h.ledger.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_rollback_partial_failure() {
    let h = Harness::new(office_switch(SWITCH_A));
    h.dispatcher()
        .dispatch(
            numbered_targets(SWITCH_A, 4, Some(30), None),
            OperationKind::BulkChange,
        )
        .await;
    let port_of = |id: u64| h.ledger.get(id).unwrap().unwrap().port_id;
    let failing_port = port_of(2);
    h.switch.fail_writes_on(SWITCH_A, &failing_port);

    let report = h.rollback().bulk_rollback(vec![1, 2, 3, 4]).await;

    assert_eq!(report.restored.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 2);
    assert_eq!(h.ledger.list().unwrap().len(), 1);
    assert_eq!(h.ledger.list().unwrap()[0].id, 2);
}

#[tokio::test]
async fn test_restore_without_data_vlan_keeps_current() {
    let h = Harness::new(mixed_switch(SWITCH_A));
    let id = h
        .engine
        .apply_change(
            targets(SWITCH_A, ["6"], Some(50), Some(51)).remove(0),
            ChangeMode::Capture(OperationKind::SingleChange),
        )
        .await
        .ledger_id
        .unwrap();

    assert!(h.rollback().rollback_by_id(id).await.unwrap().is_restored());

    // The replay sends the captured pair; the dashboard cannot unset a data
    // VLAN, so the port keeps 50 while the voice VLAN is cleared
    assert_eq!(
        h.switch.writes().last(),
        Some(&Call::Set {
            switch_serial: SWITCH_A.to_string(),
            port_id: "6".to_string(),
            vlan: None,
            voice_vlan: None,
        })
    );
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "6", Some(50), None)
        .unwrap();
}

#[tokio::test]
async fn test_failed_rollback_swap_keeps_both_entries() {
    let h = Harness::new(mixed_switch(SWITCH_A));
    let a = h.switch.port(SWITCH_A, "1").unwrap();
    let b = h.switch.port(SWITCH_A, "5").unwrap();
    let (id_a, id_b) = h
        .engine
        .swap(SWITCH_A, "1", "5", true)
        .await
        .unwrap()
        .ledger_ids
        .unwrap();

    h.switch.fail_writes_on(SWITCH_A, "5");
    let err = h.rollback().rollback_swap(id_a, id_b).await.unwrap_err();
    assert!(matches!(err, EngineError::RemoteWrite { .. }));

    // Port 1 was still written back; nothing was consumed
    PortVerifier::new(&h.switch).assert_states(&[a.clone()]).unwrap();
    assert!(h.ledger.get(id_a).unwrap().is_some());
    assert!(h.ledger.get(id_b).unwrap().is_some());

    h.switch.heal();
    h.rollback().rollback_swap(id_a, id_b).await.unwrap();
    PortVerifier::new(&h.switch).assert_states(&[a, b]).unwrap();
    assert!(h.ledger.list().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_id_across_workers_consumed_once() {
    let h = Harness::new(office_switch(SWITCH_A));
    let id = h
        .engine
        .apply_change(
            targets(SWITCH_A, ["2"], Some(30), None).remove(0),
            ChangeMode::Capture(OperationKind::SingleChange),
        )
        .await
        .ledger_id
        .unwrap();

    // Indices 0 and 1 go to different workers, and the latency makes both
    // read the entry before either deletes it
    h.switch.set_latency(Duration::from_millis(5));
    let rollback = RollbackEngine::new(h.engine.clone(), Harness::fast_pool(2));
    let report = rollback.bulk_rollback(vec![id, id]).await;

    assert_eq!(report.restored, vec![id]);
    assert_eq!(report.not_found, vec![id]);
    assert!(report.failed.is_empty());
    assert!(h.ledger.list().unwrap().is_empty());
    PortVerifier::new(&h.switch)
        .assert_vlans(SWITCH_A, "2", Some(DATA_VLAN), Some(VOICE_VLAN))
        .unwrap();
}
