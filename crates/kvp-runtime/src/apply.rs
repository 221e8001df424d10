//! Apply bookkeeping: stop control, per-operation outcomes, partial failure.
//!
//! # Invariants
//! - One [`OpOutcome`] per submitted operation, in submission order.
//! - An operation not started when the control trips is `NotAttempted`;
//!   nothing is rolled back.
//! - [`managed_after`] is the ownership record after an apply, full or partial.

use kvp_reconcile::{DesiredState, Operation};
use kvp_store::StoreError;
use tokio::sync::watch;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Create a linked cancel handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Trips every [`CancelSignal`] cloned from the same pair.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Why an apply stopped issuing operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Deadline and cancellation for one apply call.
#[derive(Clone, Debug, Default)]
pub struct ApplyControl {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelSignal>,
}

impl ApplyControl {
    /// Unbounded, uncancellable.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Apply a default timeout only when no deadline was given.
    pub(crate) fn or_timeout(self, timeout: Option<std::time::Duration>) -> Self {
        match (self.deadline, timeout) {
            (None, Some(t)) => self.with_timeout(t),
            _ => self,
        }
    }

    /// `Some` once the control has tripped. Cancellation wins over deadline.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the control trips.
    pub async fn stopped(&self) -> StopReason {
        let cancel = async {
            match &self.cancel {
                Some(c) => c.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancel => StopReason::Cancelled,
            _ = deadline => StopReason::DeadlineExceeded,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpStatus {
    Applied { attempts: u32 },
    /// Permanent error, or transient error after retries ran out.
    Failed { attempts: u32, error: StoreError },
    NotAttempted(StopReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpOutcome {
    pub operation: Operation,
    pub status: OpStatus,
}

impl OpOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, OpStatus::Applied { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedResult {
    pub outcomes: Vec<OpOutcome>,
}

impl AppliedResult {
    pub fn succeeded(&self) -> impl Iterator<Item = &Operation> {
        self.outcomes
            .iter()
            .filter(|o| o.is_applied())
            .map(|o| &o.operation)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Operation, &StoreError)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OpStatus::Failed { error, .. } => Some((&o.operation, error)),
            _ => None,
        })
    }

    pub fn not_attempted(&self) -> impl Iterator<Item = &Operation> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OpStatus::NotAttempted(_)))
            .map(|o| &o.operation)
    }

    /// Every operation applied.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(OpOutcome::is_applied)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub(crate) fn into_result(self) -> Result<AppliedResult, PartialApplyError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(PartialApplyError { result: self })
        }
    }
}

/// One or more operations did not apply. `result` still reports the ones
/// that did; nothing was rolled back.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{} of {} operation(s) failed, {} not attempted{}", .result.failed().count(), .result.len(), .result.not_attempted().count(), first_failure(.result))]
pub struct PartialApplyError {
    pub result: AppliedResult,
}

impl PartialApplyError {
    pub fn failed_operations(&self) -> Vec<&Operation> {
        self.result.failed().map(|(op, _)| op).collect()
    }

    /// Failed plus not attempted.
    pub fn unapplied_operations(&self) -> Vec<&Operation> {
        self.result
            .outcomes
            .iter()
            .filter(|o| !o.is_applied())
            .map(|o| &o.operation)
            .collect()
    }
}

fn first_failure(result: &AppliedResult) -> String {
    match result.failed().next() {
        Some((op, err)) => format!("; first: {} {}: {}", op.kind(), op.path(), err),
        None => String::new(),
    }
}

/// Keys this reconciler owns after applying `result` for `desired`.
///
/// - A declared key is owned unless its Put did not apply; then it stays
///   owned only if `previous` owned it (with the previous value).
/// - A previously owned, now undeclared key is dropped unless its Delete did
///   not apply.
///
/// For a complete result this is exactly `desired`.
pub fn managed_after(
    desired: &DesiredState,
    previous: Option<&DesiredState>,
    result: &AppliedResult,
) -> DesiredState {
    let unapplied: std::collections::BTreeSet<_> = result
        .outcomes
        .iter()
        .filter(|o| !o.is_applied())
        .map(|o| o.operation.path())
        .collect();

    let mut out = DesiredState::empty();
    for (path, value) in desired.iter() {
        if !unapplied.contains(path) {
            out.insert(path.clone(), value.clone());
        } else if let Some(old) = previous.and_then(|prev| prev.get(path)) {
            out.insert(path.clone(), old.clone());
        }
    }
    if let Some(prev) = previous {
        for (path, value) in prev.iter() {
            if !desired.contains(path) && unapplied.contains(path) {
                out.insert(path.clone(), value.clone());
            }
        }
    }
    out
}
