//! Scenario: Drift Reports Every Foreign Key
//!
//! # Invariants under test
//! 1. Rogue keys shaped like folders (`tmp/`) or carrying dot segments
//!    (`x/./y`) are drift like any other rogue key.
//! 2. Reconciling with those keys present plans no writes for them and leaves
//!    them in the store; teardown leaves them too.
//! 3. Under a prefix without a trailing `/`, a key no declaration could name
//!    (`/x` relative) still shows up as drift.
//! 4. Folder and dot-segment keys can be declared and managed.

use kvp_reconcile::{PathPrefix, SubkeyPath};
use kvp_runtime::{ApplyControl, ReconcileTarget};
use kvp_testkit::{
    add_rogue, assert_key_value, declaration, init_tracing, initial_declaration,
    keys_under_prefix, reconciler, scenario_store, scope, target,
};

#[tokio::test]
async fn folder_and_dot_segment_rogues_are_reported_and_kept() {
    init_tracing();
    let store = scenario_store();
    let scope = scope();
    let target = target().unwrap();
    let r = reconciler(store.clone());
    let control = ApplyControl::none();

    let initial = initial_declaration().unwrap();
    let desired = initial.desired_state().unwrap();
    r.reconcile_declaration(&initial, None, &control).await.unwrap();

    add_rogue(&store, &scope, "tmp/", "").await.unwrap();
    add_rogue(&store, &scope, "x/./y", "dot").await.unwrap();
    add_rogue(&store, &scope, "species", "gorilla").await.unwrap();

    let drift = r.compute_drift(&target, Some(&desired)).await.unwrap();
    let drifted: Vec<&str> = drift.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(drifted, vec!["species", "tmp/", "x/./y"]);

    let plan = r.plan(&target, &desired, Some(&desired)).await.unwrap();
    assert!(plan.is_converged());
    assert_eq!(plan.discrepancy_paths(), vec!["species", "tmp/", "x/./y"]);
    assert!(!plan.is_clean());

    r.reconcile_declaration(&initial, Some(&desired), &control)
        .await
        .unwrap();
    r.remove_all(&target, &desired, &control).await.unwrap();
    assert_eq!(
        keys_under_prefix(&store, &scope).await.unwrap(),
        vec!["species", "tmp/", "x/./y"]
    );
}

#[tokio::test]
async fn slashless_prefix_reports_keys_below_it() {
    init_tracing();
    let store = scenario_store();
    let scope = scope();
    let r = reconciler(store.clone());

    add_rogue(&store, &scope, "species", "gorilla").await.unwrap();

    let slashless = ReconcileTarget::new(PathPrefix::parse("prefix_test").unwrap(), scope);
    let drift = r.compute_drift(&slashless, None).await.unwrap();
    let drifted: Vec<&str> = drift.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(drifted, vec!["/species"]);

    let err = r.import(&slashless).await.unwrap_err();
    assert!(err.to_string().contains("/species"), "{err}");
}

#[tokio::test]
async fn folder_and_dot_segment_keys_can_be_managed() {
    init_tracing();
    let store = scenario_store();
    let scope = scope();
    let r = reconciler(store.clone());
    let control = ApplyControl::none();

    let decl = declaration(&[r#"
key_prefix:
  path_prefix: prefix_test/
  subkeys:
    "tmp/": ""
    "x/./y": dot
"#])
    .unwrap();
    let desired = decl.desired_state().unwrap();
    assert!(desired.contains(&SubkeyPath::parse("tmp/").unwrap()));

    let out = r.reconcile_declaration(&decl, None, &control).await.unwrap();
    assert_eq!(out.applied.len(), 2);
    assert_key_value(&store, &scope, "tmp/", "", 0).await.unwrap();
    assert_key_value(&store, &scope, "x/./y", "dot", 0).await.unwrap();

    let imported = r.import(&target().unwrap()).await.unwrap();
    assert_eq!(imported.desired_state().unwrap(), desired);
}
