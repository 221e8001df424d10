//! Desired state: the caller-declared target for one prefix.
//!
//! # Invariants
//! - Built from two inputs (bulk map, explicit list) merged without collision.
//!   A path declared twice fails with [`CollisionError`], even when the two
//!   declarations agree.
//! - Every path is validated as a [`SubkeyPath`] before any network call.
//! - Never persisted by this crate; rebuilt on every call.

use std::collections::BTreeMap;

use crate::{InvalidPathError, SubkeyInputs, SubkeyPath, SubkeyValue};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Where the second declaration of a colliding path came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionSource {
    /// Declared in the bulk map and again in the explicit list.
    BulkAndExplicitList,
    /// Listed twice in the explicit list.
    ExplicitListTwice,
}

impl std::fmt::Display for CollisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionSource::BulkAndExplicitList => {
                f.write_str("declared in both the subkeys map and the subkey list")
            }
            CollisionSource::ExplicitListTwice => {
                f.write_str("declared more than once in the subkey list")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("subkey {path:?} {origin}")]
pub struct CollisionError {
    pub path: String,
    pub origin: CollisionSource,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DesiredStateError {
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),
    #[error(transparent)]
    Collision(#[from] CollisionError),
}

// ---------------------------------------------------------------------------
// DesiredState
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredState {
    entries: BTreeMap<SubkeyPath, SubkeyValue>,
}

impl DesiredState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge the bulk map (flags 0) and the explicit list into one state.
    ///
    /// Paths are validated first, in input order (bulk map ascending, then
    /// the list in declaration order), so the reported error is deterministic.
    pub fn from_inputs(inputs: &SubkeyInputs) -> Result<Self, DesiredStateError> {
        let mut entries: BTreeMap<SubkeyPath, SubkeyValue> = BTreeMap::new();

        for (raw, value) in &inputs.subkeys {
            let path = SubkeyPath::parse(raw)?;
            entries.insert(path, SubkeyValue::new(value.as_bytes(), 0));
        }

        let mut listed: BTreeMap<SubkeyPath, ()> = BTreeMap::new();
        for decl in &inputs.subkey {
            let path = SubkeyPath::parse(&decl.path)?;
            if listed.insert(path.clone(), ()).is_some() {
                return Err(CollisionError {
                    path: decl.path.clone(),
                    origin: CollisionSource::ExplicitListTwice,
                }
                .into());
            }
            if entries.contains_key(&path) {
                return Err(CollisionError {
                    path: decl.path.clone(),
                    origin: CollisionSource::BulkAndExplicitList,
                }
                .into());
            }
            entries.insert(path, SubkeyValue::new(decl.value.as_bytes(), decl.flags));
        }

        Ok(Self { entries })
    }

    /// Insert or replace one entry. Returns the previous value, if any.
    pub fn insert(&mut self, path: SubkeyPath, value: SubkeyValue) -> Option<SubkeyValue> {
        self.entries.insert(path, value)
    }

    pub fn remove(&mut self, path: &SubkeyPath) -> Option<SubkeyValue> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &SubkeyPath) -> Option<&SubkeyValue> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &SubkeyPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ascending by path.
    pub fn iter(&self) -> impl Iterator<Item = (&SubkeyPath, &SubkeyValue)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &SubkeyPath> {
        self.entries.keys()
    }
}

impl FromIterator<(SubkeyPath, SubkeyValue)> for DesiredState {
    fn from_iter<I: IntoIterator<Item = (SubkeyPath, SubkeyValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DesiredState {
    type Item = (SubkeyPath, SubkeyValue);
    type IntoIter = std::collections::btree_map::IntoIter<SubkeyPath, SubkeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
