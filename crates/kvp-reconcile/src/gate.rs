//! Convergence gate.
//!
//! One check surface used two ways:
//!
//! 1. **Expect-converged**: a caller that believes the prefix matches its
//!    declaration (right after an apply, or on a refresh cycle) asks whether a
//!    fresh snapshot still agrees. A non-empty plan means someone wrote to the
//!    prefix out of band.
//! 2. **Post-apply verification**: the reconciler re-snapshots after apply
//!    and records the result. Divergence here is data, not an error: a
//!    concurrent writer can legitimately win the race.
//!
//! Pure and deterministic.

use crate::{diff, DesiredState, DiffReport, PrefixSnapshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConvergenceCheck {
    /// Every declared key matches and nothing needs deleting.
    Converged,
    /// The store differs from the declaration. `report` carries the plan that
    /// would bring it back.
    Diverged { report: DiffReport },
}

impl ConvergenceCheck {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceCheck::Converged)
    }

    pub fn report(&self) -> Option<&DiffReport> {
        match self {
            ConvergenceCheck::Converged => None,
            ConvergenceCheck::Diverged { report } => Some(report),
        }
    }
}

/// Discrepancies alone do not count as divergence; they are reported by the
/// drift path instead.
pub fn check_convergence(
    desired: &DesiredState,
    snapshot: &PrefixSnapshot,
    previous: Option<&DesiredState>,
) -> ConvergenceCheck {
    let report = diff(desired, snapshot, previous);
    if report.is_converged() {
        ConvergenceCheck::Converged
    } else {
        ConvergenceCheck::Diverged { report }
    }
}
