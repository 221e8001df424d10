//! Scenario: Cancel Stops New Operations
//!
//! # Invariants under test
//! 1. Tripping the cancel signal mid-apply stops new operations; the ones
//!    already applied are still reported.
//! 2. A deadline behaves the same way, with `DeadlineExceeded` as the reason.
//! 3. An operation waiting to retry does not start another attempt once the
//!    control trips.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kvp_config::{ReconcilerSettings, RetrySettings};
use kvp_reconcile::{Operation, PathPrefix, SubkeyPath, SubkeyValue};
use kvp_runtime::{cancel_pair, ApplyControl, OpStatus, ReconcileTarget, Reconciler, StopReason};
use kvp_store::{StoreError, StoreScope};
use kvp_store_mem::{FaultRule, MemStore, StoreOp};

fn target() -> ReconcileTarget {
    ReconcileTarget::new(PathPrefix::parse("prefix_test/").unwrap(), StoreScope::new("dc1"))
}

fn five_puts() -> Vec<Operation> {
    ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|k| Operation::put(SubkeyPath::parse(k).unwrap(), &SubkeyValue::new(k, 0)))
        .collect()
}

fn sequential() -> ReconcilerSettings {
    let mut s = ReconcilerSettings::default();
    s.apply.max_in_flight = 1;
    s
}

/// Applied outcomes form a prefix; stopped ones the rest.
fn assert_stopped_suffix(statuses: &[OpStatus], reason: StopReason) {
    let applied = statuses
        .iter()
        .take_while(|s| matches!(s, OpStatus::Applied { .. }))
        .count();
    assert!(applied >= 1, "first op should have applied: {statuses:?}");
    assert!(applied < statuses.len(), "last op should not have run: {statuses:?}");
    for s in &statuses[applied..] {
        assert_eq!(*s, OpStatus::NotAttempted(reason));
    }
}

#[tokio::test]
async fn cancel_mid_apply_keeps_completed_results() {
    let store = Arc::new(MemStore::community().with_latency(Duration::from_millis(20)));
    let r = Reconciler::new(store.clone(), sequential());
    let (handle, signal) = cancel_pair();
    let control = ApplyControl::none().with_cancel(signal);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
    });

    let err = r.apply(&target(), &five_puts(), &control).await.unwrap_err();
    let statuses: Vec<OpStatus> = err.result.outcomes.iter().map(|o| o.status.clone()).collect();
    assert_stopped_suffix(&statuses, StopReason::Cancelled);
    assert!(err.failed_operations().is_empty());
    assert_eq!(
        store.call_count(StoreOp::Put).await,
        err.result.succeeded().count()
    );
}

#[tokio::test]
async fn deadline_mid_apply_keeps_completed_results() {
    let store = Arc::new(MemStore::community().with_latency(Duration::from_millis(20)));
    let r = Reconciler::new(store, sequential());
    let control = ApplyControl::none().with_timeout(Duration::from_millis(30));

    let err = r.apply(&target(), &five_puts(), &control).await.unwrap_err();
    let statuses: Vec<OpStatus> = err.result.outcomes.iter().map(|o| o.status.clone()).collect();
    assert_stopped_suffix(&statuses, StopReason::DeadlineExceeded);
}

#[tokio::test]
async fn tripped_control_abandons_pending_retry() {
    let store = Arc::new(MemStore::community());
    store
        .inject(FaultRule::on(StoreOp::Put, StoreError::Transport("timeout".into())))
        .await;
    let mut settings = sequential();
    settings.retry = RetrySettings {
        max_attempts: 10,
        initial_backoff: Duration::from_secs(5),
        max_backoff: Duration::from_secs(5),
        multiplier: 1.0,
    };
    let r = Reconciler::new(store.clone(), settings);
    let control = ApplyControl::none().with_timeout(Duration::from_millis(50));

    let started = Instant::now();
    let err = r.apply(&target(), &five_puts()[..1], &control).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        err.result.outcomes[0].status,
        OpStatus::Failed { attempts: 1, .. }
    ));
    assert_eq!(store.call_count(StoreOp::Put).await, 1);
}

#[tokio::test]
async fn already_cancelled_control_attempts_nothing() {
    let store = Arc::new(MemStore::community());
    let r = Reconciler::with_defaults(store.clone());
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let err = r
        .apply(&target(), &five_puts(), &ApplyControl::none().with_cancel(signal))
        .await
        .unwrap_err();
    assert_eq!(err.result.not_attempted().count(), 5);
    assert_eq!(store.call_count(StoreOp::Put).await, 0);
}
