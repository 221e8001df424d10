//! Reconciler: snapshot, diff, apply against a [`StoreClient`].
//!
//! # Invariants
//! - Validation happens before the first store call.
//! - Apply never stops early on failure: every operation is attempted unless
//!   the control trips, and all failures are collected.
//! - Transient errors retry per operation with backoff; permanent errors do
//!   not retry.
//! - Teardown deletes key by key, only keys this reconciler owned.
//! - No in-process state is shared between calls.

use futures_util::stream::{self, StreamExt};
use kvp_config::{PrefixDeclaration, ReconcilerSettings};
use kvp_reconcile::{
    check_convergence, diff, drift, import_declaration, teardown_operations, ConvergenceCheck,
    DesiredState, DiffReport, Discrepancy, Operation, PrefixSnapshot,
};
use kvp_store::{StoreClient, StoreError};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    AppliedResult, ApplyControl, OpOutcome, OpStatus, PartialApplyError, ReconcileError,
    ReconcileTarget, RetryPolicy,
};

/// Result of a successful [`Reconciler::reconcile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub run_id: Uuid,
    /// The plan that was applied, with the discrepancies found alongside it.
    pub report: DiffReport,
    pub applied: AppliedResult,
    /// `None` when verification is off or the verifying read failed.
    pub verification: Option<ConvergenceCheck>,
}

pub struct Reconciler<C> {
    client: C,
    settings: ReconcilerSettings,
    policy: RetryPolicy,
}

impl<C: StoreClient> Reconciler<C> {
    pub fn new(client: C, settings: ReconcilerSettings) -> Self {
        let policy = RetryPolicy::from_settings(&settings.retry);
        Self {
            client,
            settings,
            policy,
        }
    }

    pub fn with_defaults(client: C) -> Self {
        Self::new(client, ReconcilerSettings::default())
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// One `list` call under the prefix. Only the bare prefix key and keys
    /// outside the prefix are skipped (and logged); every other key is kept.
    pub async fn snapshot(&self, target: &ReconcileTarget) -> Result<PrefixSnapshot, StoreError> {
        let raw = self
            .client
            .list(target.prefix.as_str(), &target.scope)
            .await?;
        let (snap, skipped) = PrefixSnapshot::from_entries_lenient(&target.prefix, raw);
        for e in &skipped {
            warn!(prefix = %target.prefix, scope = %target.scope, error = %e, "snapshot entry skipped");
        }
        debug!(prefix = %target.prefix, scope = %target.scope, keys = snap.len(), "snapshot");
        Ok(snap)
    }

    /// Dry run: the plan `reconcile` would apply right now.
    pub async fn plan(
        &self,
        target: &ReconcileTarget,
        desired: &DesiredState,
        previous: Option<&DesiredState>,
    ) -> Result<DiffReport, StoreError> {
        let snap = self.snapshot(target).await?;
        Ok(diff(desired, &snap, previous))
    }

    /// Read-only drift report: keys under the prefix that `known` does not
    /// declare (every key, when `known` is `None`). Never writes.
    pub async fn compute_drift(
        &self,
        target: &ReconcileTarget,
        known: Option<&DesiredState>,
    ) -> Result<Vec<Discrepancy>, StoreError> {
        let span = info_span!("compute_drift", run_id = %Uuid::new_v4(), prefix = %target.prefix, scope = %target.scope);
        async move {
            let snap = self.snapshot(target).await?;
            let found = drift(&snap, known);
            if found.is_empty() {
                info!("no drift");
            } else {
                info!(discrepancies = found.len(), "drift detected");
            }
            Ok::<_, StoreError>(found)
        }
        .instrument(span)
        .await
    }

    /// Expect-converged check against a fresh snapshot.
    pub async fn check(
        &self,
        target: &ReconcileTarget,
        desired: &DesiredState,
        previous: Option<&DesiredState>,
    ) -> Result<ConvergenceCheck, StoreError> {
        let snap = self.snapshot(target).await?;
        Ok(check_convergence(desired, &snap, previous))
    }

    /// Read the managed keys back into a declaration for `target`.
    pub async fn import(&self, target: &ReconcileTarget) -> Result<PrefixDeclaration, ReconcileError> {
        let span = info_span!("import", run_id = %Uuid::new_v4(), prefix = %target.prefix, scope = %target.scope);
        async move {
            let snap = self.snapshot(target).await?;
            let inputs = import_declaration(&snap)?;
            info!(
                subkeys = inputs.subkeys.len(),
                subkey = inputs.subkey.len(),
                "imported"
            );
            let mut decl = PrefixDeclaration::new(target.prefix.clone(), inputs);
            decl.datacenter = target.scope.datacenter.clone();
            decl.namespace = target.scope.namespace.clone();
            Ok::<_, ReconcileError>(decl)
        }
        .instrument(span)
        .await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Snapshot, diff against `desired`, apply the plan, and optionally
    /// verify.
    ///
    /// `previous` is what this reconciler owned before; undeclared keys in it
    /// are deleted, all other undeclared keys are reported and left alone.
    pub async fn reconcile(
        &self,
        target: &ReconcileTarget,
        desired: &DesiredState,
        previous: Option<&DesiredState>,
        control: &ApplyControl,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", run_id = %run_id, prefix = %target.prefix, scope = %target.scope);
        async move {
            let snap = self.snapshot(target).await?;
            let report = diff(desired, &snap, previous);
            info!(
                puts = report.puts().count(),
                deletes = report.deletes().count(),
                discrepancies = report.discrepancies.len(),
                "plan"
            );
            for d in &report.discrepancies {
                warn!(path = %d.path, modify_index = d.modify_index, "unmanaged key under prefix");
            }

            let applied = self.apply(target, &report.operations, control).await?;

            let verification = if self.settings.apply.verify_after_apply {
                self.verify(target, desired).await
            } else {
                None
            };

            Ok::<_, ReconcileError>(ReconcileOutcome {
                run_id,
                report,
                applied,
                verification,
            })
        }
        .instrument(span)
        .await
    }

    /// Build the desired state from a declaration, then [`reconcile`](Self::reconcile).
    pub async fn reconcile_declaration(
        &self,
        decl: &PrefixDeclaration,
        previous: Option<&DesiredState>,
        control: &ApplyControl,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let desired = decl.desired_state()?;
        let target = ReconcileTarget::from_declaration(decl);
        self.reconcile(&target, &desired, previous, control).await
    }

    /// Delete every key in `previous`, one Delete each. Keys under the prefix
    /// that `previous` does not name are never touched.
    pub async fn remove_all(
        &self,
        target: &ReconcileTarget,
        previous: &DesiredState,
        control: &ApplyControl,
    ) -> Result<AppliedResult, PartialApplyError> {
        let span = info_span!("remove_all", run_id = %Uuid::new_v4(), prefix = %target.prefix, scope = %target.scope);
        async move {
            let ops = teardown_operations(previous);
            info!(deletes = ops.len(), "teardown");
            self.apply(target, &ops, control).await
        }
        .instrument(span)
        .await
    }

    /// Apply `ops` independently, at most `max_in_flight` at a time.
    ///
    /// Outcomes are reported in `ops` order whatever order they finish in.
    /// Fails with [`PartialApplyError`] if any operation did not apply.
    pub async fn apply(
        &self,
        target: &ReconcileTarget,
        ops: &[Operation],
        control: &ApplyControl,
    ) -> Result<AppliedResult, PartialApplyError> {
        let control = control.clone().or_timeout(self.settings.apply.deadline);
        let width = self.settings.apply.max_in_flight.max(1);

        let outcomes: Vec<OpOutcome> = stream::iter(ops)
            .map(|op| self.apply_one(target, op, &control))
            .buffered(width)
            .collect()
            .await;

        let result = AppliedResult { outcomes };
        info!(
            applied = result.succeeded().count(),
            failed = result.failed().count(),
            not_attempted = result.not_attempted().count(),
            "apply finished"
        );
        result.into_result()
    }

    async fn apply_one(
        &self,
        target: &ReconcileTarget,
        op: &Operation,
        control: &ApplyControl,
    ) -> OpOutcome {
        let outcome = |status| OpOutcome {
            operation: op.clone(),
            status,
        };

        if let Some(reason) = control.stop_reason() {
            debug!(op = op.kind(), path = %op.path(), %reason, "not attempted");
            return outcome(OpStatus::NotAttempted(reason));
        }

        let key = target.prefix.key_for(op.path());
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let res = match op {
                Operation::Put { value, flags, .. } => {
                    self.client.put(&key, value, *flags, &target.scope).await
                }
                Operation::Delete { .. } => self.client.delete(&key, &target.scope).await,
            };

            let error = match res {
                Ok(()) => {
                    debug!(op = op.kind(), key = %key, attempts, "applied");
                    return outcome(OpStatus::Applied { attempts });
                }
                Err(e) => e,
            };

            if !error.is_transient() || !self.policy.allows_retry_after(attempts) {
                warn!(op = op.kind(), key = %key, attempts, error = %error, "operation failed");
                return outcome(OpStatus::Failed { attempts, error });
            }

            let delay = self.policy.delay_for(attempts);
            warn!(op = op.kind(), key = %key, attempts, error = %error, ?delay, "transient error, retrying");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                reason = control.stopped() => {
                    warn!(op = op.kind(), key = %key, attempts, %reason, "retry abandoned");
                    return outcome(OpStatus::Failed { attempts, error });
                }
            }
        }
    }

    async fn verify(&self, target: &ReconcileTarget, desired: &DesiredState) -> Option<ConvergenceCheck> {
        match self.snapshot(target).await {
            Ok(snap) => {
                let check = check_convergence(desired, &snap, None);
                if check.is_converged() {
                    info!("verified converged");
                } else {
                    warn!("prefix diverged after apply");
                }
                Some(check)
            }
            Err(e) => {
                warn!(error = %e, "verification read failed");
                None
            }
        }
    }
}
