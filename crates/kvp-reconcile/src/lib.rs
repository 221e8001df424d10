//! kvp-reconcile
//!
//! Reconciliation engine for the keys under one prefix.
//!
//! Architectural decisions:
//! - Desired state is merged from a bulk map and an explicit list; a path
//!   declared twice is a collision error, never last-write-wins
//! - Paths are validated before any store call
//! - Undeclared keys are deleted only if this reconciler managed them before;
//!   everything else is a discrepancy, reported and left alone
//! - Diff output is sorted (Puts, then Deletes, each by path)
//!
//! Deterministic, pure logic. No IO. No store calls.

mod desired;
mod engine;
mod gate;
mod import;
mod path;
mod snapshot;
mod types;

pub use desired::{CollisionError, CollisionSource, DesiredState, DesiredStateError};
pub use engine::{diff, drift, teardown_operations};
pub use gate::{check_convergence, ConvergenceCheck};
pub use import::{import_declaration, ImportError};
pub use path::{InvalidPathError, PathPrefix, PathRule, SubkeyPath};
pub use snapshot::{PrefixSnapshot, SnapshotError, SubkeyEntry};
pub use types::*;
