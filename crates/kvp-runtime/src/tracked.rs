//! Ledger-backed lifecycle calls.
//!
//! The plain [`Reconciler`] calls take `previous` as an argument. These
//! variants read it from the ledger and write the new ownership back, after
//! a full apply and after a partial one.

use std::path::Path;

use kvp_config::PrefixDeclaration;
use kvp_reconcile::DesiredState;
use kvp_store::StoreClient;
use tracing::info;
use uuid::Uuid;

use crate::ledger::{self, ManagedStateRecord};
use crate::{
    managed_after, AppliedResult, ApplyControl, ReconcileError, ReconcileOutcome, ReconcileTarget,
    Reconciler,
};

fn record(
    path: &Path,
    target: &ReconcileTarget,
    run_id: Uuid,
    managed: &DesiredState,
) -> Result<(), ReconcileError> {
    ManagedStateRecord::new(target, run_id, managed)
        .and_then(|rec| rec.save(path))
        .map_err(ReconcileError::Ledger)
}

impl<C: StoreClient> Reconciler<C> {
    /// [`reconcile_declaration`](Self::reconcile_declaration) with `previous`
    /// read from, and the new ownership written to, the ledger at `ledger_path`.
    pub async fn reconcile_tracked(
        &self,
        decl: &PrefixDeclaration,
        ledger_path: &Path,
        control: &ApplyControl,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let desired = decl.desired_state()?;
        let target = ReconcileTarget::from_declaration(decl);
        let previous =
            ledger::load_previous(ledger_path, &target).map_err(ReconcileError::Ledger)?;

        match self
            .reconcile(&target, &desired, previous.as_ref(), control)
            .await
        {
            Ok(outcome) => {
                record(ledger_path, &target, outcome.run_id, &desired)?;
                Ok(outcome)
            }
            Err(ReconcileError::PartialApply(e)) => {
                let managed = managed_after(&desired, previous.as_ref(), &e.result);
                record(ledger_path, &target, Uuid::new_v4(), &managed)?;
                info!(owned = managed.len(), "ledger updated after partial apply");
                Err(ReconcileError::PartialApply(e))
            }
            Err(other) => Err(other),
        }
    }

    /// Drift against what the ledger says this reconciler owns.
    pub async fn compute_drift_tracked(
        &self,
        target: &ReconcileTarget,
        ledger_path: &Path,
    ) -> Result<Vec<kvp_reconcile::Discrepancy>, ReconcileError> {
        let known = ledger::load_previous(ledger_path, target).map_err(ReconcileError::Ledger)?;
        Ok(self.compute_drift(target, known.as_ref()).await?)
    }

    /// Tear down every key the ledger records. The ledger is removed after a
    /// complete teardown and rewritten with the survivors after a partial one.
    pub async fn remove_all_tracked(
        &self,
        target: &ReconcileTarget,
        ledger_path: &Path,
        control: &ApplyControl,
    ) -> Result<AppliedResult, ReconcileError> {
        let Some(previous) =
            ledger::load_previous(ledger_path, target).map_err(ReconcileError::Ledger)?
        else {
            info!(prefix = %target.prefix, "nothing recorded, nothing to remove");
            return Ok(AppliedResult::default());
        };

        match self.remove_all(target, &previous, control).await {
            Ok(result) => {
                ledger::clear(ledger_path).map_err(ReconcileError::Ledger)?;
                Ok(result)
            }
            Err(e) => {
                let survivors = managed_after(&DesiredState::empty(), Some(&previous), &e.result);
                record(ledger_path, target, Uuid::new_v4(), &survivors)?;
                Err(e.into())
            }
        }
    }
}
