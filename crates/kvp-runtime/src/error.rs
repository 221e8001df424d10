use kvp_reconcile::{DesiredStateError, ImportError};
use kvp_store::StoreError;

use crate::PartialApplyError;

/// Failure of a reconciler lifecycle call.
///
/// Discrepancies are never errors; they come back as data.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Declaration rejected before any store call.
    #[error("invalid desired state: {0}")]
    Invalid(#[from] DesiredStateError),
    /// Snapshot or read failed. Store-reported errors surface verbatim.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("partial apply: {0}")]
    PartialApply(#[from] PartialApplyError),
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    /// Managed-state ledger could not be read or written.
    #[error("ledger: {0:#}")]
    Ledger(anyhow::Error),
}

impl ReconcileError {
    /// The partial result, when some operations did apply.
    pub fn partial(&self) -> Option<&PartialApplyError> {
        match self {
            ReconcileError::PartialApply(e) => Some(e),
            _ => None,
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReconcileError::Store(e) => Some(e),
            _ => None,
        }
    }
}
