//! kvp-runtime
//!
//! Drives reconciliation against a live store.
//!
//! Responsibilities:
//! - Snapshot the prefix, diff, apply the plan with bounded concurrency
//! - Per-operation retry with backoff for transient store errors
//! - Deadline and cancellation that stop new operations but keep results
//! - Drift reports, teardown, import
//! - The managed-state ledger that carries "previously desired" between calls
//!
//! Logging goes through `tracing`; this crate never installs a subscriber.

mod apply;
mod error;
pub mod ledger;
mod reconciler;
mod retry;
mod target;
mod tracked;

pub use apply::{
    cancel_pair, managed_after, AppliedResult, ApplyControl, CancelHandle, CancelSignal, OpOutcome,
    OpStatus, PartialApplyError, StopReason,
};
pub use error::ReconcileError;
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use retry::RetryPolicy;
pub use target::ReconcileTarget;
