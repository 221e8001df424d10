use crate::{DesiredState, DiffReport, Discrepancy, Operation, PrefixSnapshot};

/// Deterministic diff of desired state against a prefix snapshot:
/// - Declared key absent, or value/flags differ => Put
/// - Observed key undeclared but in `previous` => Delete (user removed it)
/// - Observed key undeclared and never managed => Discrepancy (never touched)
///
/// Equality is exact byte and integer equality. Operations come back Puts
/// first, then Deletes, each ascending by path.
pub fn diff(
    desired: &DesiredState,
    snapshot: &PrefixSnapshot,
    previous: Option<&DesiredState>,
) -> DiffReport {
    let mut operations: Vec<Operation> = Vec::new();
    let mut discrepancies: Vec<Discrepancy> = Vec::new();

    // 1) Declared keys
    for (path, want) in desired.iter() {
        match snapshot.get(path) {
            Some(have) if have.value == *want => {}
            _ => operations.push(Operation::put(path.clone(), want)),
        }
    }

    // 2) Observed keys nobody declares now
    for have in snapshot.iter() {
        if desired.contains(&have.path) {
            continue;
        }
        let managed = previous.is_some_and(|p| p.contains(&have.path));
        if managed {
            operations.push(Operation::delete(have.path.clone()));
        } else {
            discrepancies.push(Discrepancy {
                path: have.path.clone(),
                observed: have.value.clone(),
                modify_index: have.modify_index,
            });
        }
    }

    // Stable ordering (Put sorts before Delete by variant order).
    operations.sort();
    discrepancies.sort();

    DiffReport {
        operations,
        discrepancies,
    }
}

/// Read-only drift mode: every observed key not declared by `known` (or every
/// key, when nothing is known) is a discrepancy. Never emits operations for
/// undeclared keys.
pub fn drift(snapshot: &PrefixSnapshot, known: Option<&DesiredState>) -> Vec<Discrepancy> {
    let empty = DesiredState::empty();
    let desired = known.unwrap_or(&empty);
    diff(desired, snapshot, None).discrepancies
}

/// Deletes for teardown: one per key in `previous`, ascending by path.
///
/// Keys are not checked against any snapshot; deleting an absent key is a
/// no-op at the store.
pub fn teardown_operations(previous: &DesiredState) -> Vec<Operation> {
    previous
        .paths()
        .map(|p| Operation::delete(p.clone()))
        .collect()
}
