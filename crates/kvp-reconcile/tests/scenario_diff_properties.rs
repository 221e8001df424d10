//! Scenario: Diff Properties
//!
//! # Invariants under test
//! 1. Idempotence: applying diff(D, S) and diffing again yields no operations.
//! 2. Convergence: after applying, the snapshot restricted to D's keys equals D.
//! 3. Non-destructive default: a key never declared in `previous` is never
//!    the target of a Delete.

use std::collections::BTreeMap;

use kvp_reconcile::*;
use proptest::prelude::*;

fn path_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "cheese",
        "bread",
        "meat",
        "species",
        "condiment/first",
        "condiment/second",
        "a/b/c",
    ])
    .prop_map(str::to_string)
}

fn state_strategy() -> impl Strategy<Value = BTreeMap<String, (String, u64)>> {
    prop::collection::btree_map(path_strategy(), ("[a-z]{0,6}", 0u64..4), 0..6)
}

fn to_desired(m: &BTreeMap<String, (String, u64)>) -> DesiredState {
    m.iter()
        .map(|(k, (v, f))| (SubkeyPath::parse(k).unwrap(), SubkeyValue::new(v.as_str(), *f)))
        .collect()
}

fn to_snapshot(m: &BTreeMap<String, (String, u64)>) -> PrefixSnapshot {
    let mut s = PrefixSnapshot::empty();
    for (i, (k, (v, f))) in m.iter().enumerate() {
        s.insert(SubkeyPath::parse(k).unwrap(), SubkeyValue::new(v.as_str(), *f), i as u64);
    }
    s
}

fn apply(snap: &PrefixSnapshot, ops: &[Operation]) -> PrefixSnapshot {
    let mut kept: BTreeMap<SubkeyPath, SubkeyValue> =
        snap.iter().map(|e| (e.path.clone(), e.value.clone())).collect();
    for op in ops {
        match op {
            Operation::Put { path, value, flags } => {
                kept.insert(path.clone(), SubkeyValue::new(value.clone(), *flags));
            }
            Operation::Delete { path } => {
                kept.remove(path);
            }
        }
    }
    let mut out = PrefixSnapshot::empty();
    for (i, (p, v)) in kept.into_iter().enumerate() {
        out.insert(p, v, i as u64);
    }
    out
}

proptest! {
    #[test]
    fn diff_is_idempotent_and_converges(
        d in state_strategy(),
        s in state_strategy(),
        prev in prop::option::of(state_strategy()),
    ) {
        let desired = to_desired(&d);
        let snap = to_snapshot(&s);
        let previous = prev.as_ref().map(to_desired);

        let first = diff(&desired, &snap, previous.as_ref());
        let after = apply(&snap, &first.operations);

        let second = diff(&desired, &after, previous.as_ref());
        prop_assert!(second.operations.is_empty());

        for (path, want) in desired.iter() {
            prop_assert_eq!(&after.get(path).unwrap().value, want);
        }
    }

    #[test]
    fn deletes_only_touch_previous_keys(
        d in state_strategy(),
        s in state_strategy(),
        prev in prop::option::of(state_strategy()),
    ) {
        let desired = to_desired(&d);
        let previous = prev.as_ref().map(to_desired);
        let r = diff(&desired, &to_snapshot(&s), previous.as_ref());
        for op in r.deletes() {
            let managed = previous.as_ref().is_some_and(|p| p.contains(op.path()));
            prop_assert!(managed);
            prop_assert!(!desired.contains(op.path()));
        }
        for disc in &r.discrepancies {
            prop_assert!(r.operations.iter().all(|op| op.path() != &disc.path));
        }
    }
}
