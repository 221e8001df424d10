//! Managed-state ledger.
//!
//! Records which keys this reconciler owns for one target, so the next call
//! can tell "the user removed this key" (delete it) from "someone else wrote
//! this key" (report it). One pretty-printed JSON file per target.
//!
//! # Invariants
//! - Values are hex-encoded; flags are kept verbatim.
//! - `digest` is SHA-256 over the canonical JSON of (target, entries).
//!   [`ManagedStateRecord::load`] rejects a record whose digest does not
//!   match, or whose target differs from the one asked for.
//! - Writes go to a sibling temp file and are renamed into place.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use kvp_reconcile::{DesiredState, SubkeyPath, SubkeyValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::ReconcileTarget;

pub const LEDGER_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub path: SubkeyPath,
    pub value_hex: String,
    pub flags: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedStateRecord {
    pub schema_version: i32,
    pub prefix: String,
    pub datacenter: String,
    pub namespace: Option<String>,
    /// Run that last wrote this record.
    pub run_id: Uuid,
    pub updated_at_utc: DateTime<Utc>,
    /// Ascending by path.
    pub entries: Vec<LedgerEntry>,
    pub digest: String,
}

#[derive(Serialize)]
struct DigestInput<'a> {
    prefix: &'a str,
    datacenter: &'a str,
    namespace: Option<&'a str>,
    entries: &'a [LedgerEntry],
}

impl ManagedStateRecord {
    pub fn new(target: &ReconcileTarget, run_id: Uuid, managed: &DesiredState) -> Result<Self> {
        let entries: Vec<LedgerEntry> = managed
            .iter()
            .map(|(path, v)| LedgerEntry {
                path: path.clone(),
                value_hex: hex::encode(&v.value),
                flags: v.flags,
            })
            .collect();
        let mut rec = Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            prefix: target.prefix.as_str().to_string(),
            datacenter: target.scope.datacenter.clone(),
            namespace: target.scope.namespace.clone(),
            run_id,
            updated_at_utc: Utc::now(),
            entries,
            digest: String::new(),
        };
        rec.digest = rec.compute_digest()?;
        Ok(rec)
    }

    fn compute_digest(&self) -> Result<String> {
        let input = DigestInput {
            prefix: &self.prefix,
            datacenter: &self.datacenter,
            namespace: self.namespace.as_deref(),
            entries: &self.entries,
        };
        let canonical = serde_json::to_string(&input).context("serialize ledger digest input failed")?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    pub fn matches_target(&self, target: &ReconcileTarget) -> bool {
        self.prefix == target.prefix.as_str()
            && self.datacenter == target.scope.datacenter
            && self.namespace == target.scope.namespace
    }

    /// Decode back into the owned key set.
    pub fn desired_state(&self) -> Result<DesiredState> {
        let mut out = DesiredState::empty();
        for e in &self.entries {
            let value = hex::decode(&e.value_hex)
                .with_context(|| format!("ledger entry {} has bad hex value", e.path))?;
            if out.insert(e.path.clone(), SubkeyValue::new(value, e.flags)).is_some() {
                bail!("ledger entry {} listed twice", e.path);
            }
        }
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("create ledger dir failed: {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize ledger failed")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, format!("{json}\n"))
            .with_context(|| format!("write ledger failed: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replace ledger failed: {}", path.display()))?;
        Ok(())
    }

    /// `Ok(None)` when no ledger exists yet.
    pub fn load(path: &Path, target: &ReconcileTarget) -> Result<Option<Self>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read ledger failed: {}", path.display()))
            }
        };
        let rec: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse ledger failed: {}", path.display()))?;

        if rec.schema_version != LEDGER_SCHEMA_VERSION {
            bail!(
                "LEDGER_SCHEMA_MISMATCH: {} has schema_version {} (expected {})",
                path.display(),
                rec.schema_version,
                LEDGER_SCHEMA_VERSION
            );
        }
        let expected = rec.compute_digest()?;
        if rec.digest != expected {
            bail!("LEDGER_DIGEST_MISMATCH: {} was modified outside the reconciler", path.display());
        }
        if !rec.matches_target(target) {
            bail!(
                "LEDGER_TARGET_MISMATCH: {} records {}@{} but {} was requested",
                path.display(),
                rec.prefix,
                rec.datacenter,
                target
            );
        }
        Ok(Some(rec))
    }
}

/// Owned key set for `target`, or `None` when nothing was recorded.
pub fn load_previous(path: &Path, target: &ReconcileTarget) -> Result<Option<DesiredState>> {
    ManagedStateRecord::load(path, target)?
        .map(|rec| rec.desired_state())
        .transpose()
}

/// Remove the ledger after a complete teardown. Missing is fine.
pub fn clear(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove ledger failed: {}", path.display())),
    }
}
