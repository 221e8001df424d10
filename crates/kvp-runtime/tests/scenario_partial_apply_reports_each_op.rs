//! Scenario: Partial Apply Reports Each Op
//!
//! # Invariants under test
//! 1. With {A, B, C} planned and B failing, A and C still apply and are
//!    reported as succeeded; B is reported as failed.
//! 2. Nothing is rolled back.
//! 3. Re-running the same reconcile after the fault clears plans only B.
//! 4. Outcomes come back in plan order even with concurrent dispatch.

use std::sync::Arc;
use std::time::Duration;

use kvp_config::ReconcilerSettings;
use kvp_reconcile::{DesiredState, PathPrefix, SubkeyPath, SubkeyValue};
use kvp_runtime::{ApplyControl, ReconcileError, ReconcileTarget, Reconciler};
use kvp_store::{StoreError, StoreScope};
use kvp_store_mem::{FaultRule, MemStore, StoreOp};

fn target() -> ReconcileTarget {
    ReconcileTarget::new(PathPrefix::parse("prefix_test/").unwrap(), StoreScope::new("dc1"))
}

fn desired() -> DesiredState {
    [("a", "alpha"), ("b", "bravo"), ("c", "charlie")]
        .into_iter()
        .map(|(k, v)| (SubkeyPath::parse(k).unwrap(), SubkeyValue::new(v, 0)))
        .collect()
}

#[tokio::test]
async fn middle_failure_is_isolated_and_retry_converges() {
    let store = Arc::new(MemStore::community().with_latency(Duration::from_millis(2)));
    store
        .inject(
            FaultRule::on(StoreOp::Put, StoreError::PermissionDenied("write b".into()))
                .for_key("prefix_test/b"),
        )
        .await;
    let mut settings = ReconcilerSettings::default();
    settings.apply.max_in_flight = 3;
    let r = Reconciler::new(store.clone(), settings);

    let err = r
        .reconcile(&target(), &desired(), None, &ApplyControl::none())
        .await
        .unwrap_err();
    let partial = match err {
        ReconcileError::PartialApply(p) => p,
        other => panic!("expected PartialApply, got {other:?}"),
    };

    let order: Vec<&str> = partial
        .result
        .outcomes
        .iter()
        .map(|o| o.operation.path().as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    let ok: Vec<&str> = partial.result.succeeded().map(|op| op.path().as_str()).collect();
    assert_eq!(ok, vec!["a", "c"]);
    let failed: Vec<&str> = partial
        .failed_operations()
        .into_iter()
        .map(|op| op.path().as_str())
        .collect();
    assert_eq!(failed, vec!["b"]);

    // No rollback: a and c are in the store.
    let plan = r.plan(&target(), &desired(), None).await.unwrap();
    let pending: Vec<&str> = plan.operations.iter().map(|op| op.path().as_str()).collect();
    assert_eq!(pending, vec!["b"]);

    store.clear_faults().await;
    let outcome = r
        .reconcile(&target(), &desired(), None, &ApplyControl::none())
        .await
        .unwrap();
    assert_eq!(outcome.applied.len(), 1);
    assert!(outcome.verification.unwrap().is_converged());
}
