//! Scenario: Config Drives Reconciler
//!
//! # Invariants under test
//! 1. One layered config carries both the reconciler settings and the prefix
//!    declaration; every leaf is consumed, so the strict lint passes.
//! 2. A misspelled settings section is caught by the strict lint before any
//!    store call.
//! 3. A reconciler built from the loaded settings applies the loaded
//!    declaration and, with verification off, reports no verification.

use kvp_config::{
    load_layered_yaml_from_strings, report_unused_keys, PrefixDeclaration, ReconcilerSettings,
    UnusedKeyPolicy,
};
use kvp_runtime::{ApplyControl, Reconciler};
use kvp_testkit::{assert_key_value, init_tracing, scenario_store, scope, INITIAL_YAML};

const SETTINGS_YAML: &str = r#"
reconciler:
  retry:
    max_attempts: 2
    initial_backoff_ms: 1
    max_backoff_ms: 4
  apply:
    max_in_flight: 1
    verify_after_apply: false
"#;

#[tokio::test]
async fn layered_config_builds_and_runs_reconciler() {
    init_tracing();
    let loaded = load_layered_yaml_from_strings(&[SETTINGS_YAML, INITIAL_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());

    let settings = ReconcilerSettings::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(settings.retry.max_attempts, 2);
    assert_eq!(settings.apply.max_in_flight, 1);
    assert!(!settings.apply.verify_after_apply);

    let decl = PrefixDeclaration::from_config_json(&loaded.config_json).unwrap();
    let store = scenario_store();
    let r = Reconciler::new(store.clone(), settings);
    let out = r
        .reconcile_declaration(&decl, None, &ApplyControl::none())
        .await
        .unwrap();
    assert_eq!(out.applied.len(), 4);
    assert!(out.verification.is_none());
    assert_key_value(&store, &scope(), "condiment/second", "salad", 4)
        .await
        .unwrap();
}

#[test]
fn misspelled_section_fails_strict_lint() {
    let typo = "reconciler:\n  aply:\n    max_in_flight: 9\n";
    let loaded = load_layered_yaml_from_strings(&[SETTINGS_YAML, INITIAL_YAML, typo]).unwrap();

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/reconciler/aply/max_in_flight"), "{msg}");

    let warned = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(warned.unused_leaf_pointers, vec!["/reconciler/aply/max_in_flight"]);
}
