//! Prefix snapshot: a point-in-time view of every key under one prefix.
//!
//! Built from the raw entries a single `list` call returned. Two flavours:
//! - [`PrefixSnapshot::from_entries`] rejects the whole listing on the first
//!   bad entry.
//! - [`PrefixSnapshot::from_entries_lenient`] keeps every key under the
//!   prefix, valid subkey or not, and hands back only the bare prefix key,
//!   keys outside the prefix and duplicates. The reconciler uses this one,
//!   since a foreign writer can put anything under the prefix and all of it
//!   must reach the drift report.

use std::collections::BTreeMap;

use kvp_store::KvEntry;

use crate::{InvalidPathError, PathPrefix, SubkeyPath, SubkeyValue};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// Outside the prefix, the bare prefix key itself, or (strict only) a
    /// relative path no declaration could name.
    #[error("snapshot entry skipped: {0}")]
    InvalidPath(#[from] InvalidPathError),
    /// Same relative path listed twice by the store.
    #[error("snapshot entry {key:?} listed more than once")]
    Duplicate { key: String },
}

/// One observed key, relative to the prefix.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubkeyEntry {
    pub path: SubkeyPath,
    pub value: SubkeyValue,
    /// Store-internal version marker. Opaque; used only for reporting.
    pub modify_index: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefixSnapshot {
    entries: BTreeMap<SubkeyPath, SubkeyEntry>,
}

impl PrefixSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Strict normalization: the first invalid entry fails the snapshot.
    pub fn from_entries(prefix: &PathPrefix, raw: Vec<KvEntry>) -> Result<Self, SnapshotError> {
        let mut entries = BTreeMap::new();
        for e in raw {
            let entry = normalize_entry(prefix, e)?;
            if entries.contains_key(&entry.path) {
                return Err(SnapshotError::Duplicate {
                    key: prefix.key_for(&entry.path),
                });
            }
            entries.insert(entry.path.clone(), entry);
        }
        Ok(Self { entries })
    }

    /// Lenient normalization: keys outside the prefix and the bare prefix key
    /// are skipped and returned; everything else under the prefix is kept
    /// as observed.
    ///
    /// For a duplicated path the first listed entry is kept.
    pub fn from_entries_lenient(
        prefix: &PathPrefix,
        raw: Vec<KvEntry>,
    ) -> (Self, Vec<SnapshotError>) {
        let mut entries = BTreeMap::new();
        let mut errors: Vec<SnapshotError> = Vec::new();
        for e in raw {
            match observe_entry(prefix, e) {
                Ok(entry) if entries.contains_key(&entry.path) => {
                    errors.push(SnapshotError::Duplicate {
                        key: prefix.key_for(&entry.path),
                    });
                }
                Ok(entry) => {
                    entries.insert(entry.path.clone(), entry);
                }
                Err(err) => errors.push(err),
            }
        }
        (Self { entries }, errors)
    }

    pub fn get(&self, path: &SubkeyPath) -> Option<&SubkeyEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &SubkeyPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Ascending by path.
    pub fn iter(&self) -> impl Iterator<Item = &SubkeyEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest version marker seen, 0 for an empty snapshot.
    pub fn max_modify_index(&self) -> u64 {
        self.entries
            .values()
            .map(|e| e.modify_index)
            .max()
            .unwrap_or(0)
    }

    /// Insert an entry directly. Intended for tests and fixtures.
    pub fn insert(&mut self, path: SubkeyPath, value: SubkeyValue, modify_index: u64) {
        self.entries.insert(
            path.clone(),
            SubkeyEntry {
                path,
                value,
                modify_index,
            },
        );
    }
}

fn normalize_entry(prefix: &PathPrefix, e: KvEntry) -> Result<SubkeyEntry, SnapshotError> {
    let path = prefix.relative(&e.key)?;
    Ok(to_entry(path, e))
}

fn observe_entry(prefix: &PathPrefix, e: KvEntry) -> Result<SubkeyEntry, SnapshotError> {
    let path = prefix.observed(&e.key)?;
    Ok(to_entry(path, e))
}

fn to_entry(path: SubkeyPath, e: KvEntry) -> SubkeyEntry {
    SubkeyEntry {
        path,
        value: SubkeyValue {
            value: e.value,
            flags: e.flags,
        },
        modify_index: e.modify_index,
    }
}
