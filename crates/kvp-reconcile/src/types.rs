use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SubkeyPath;

/// Value + opaque flags for one subkey. Flags are never interpreted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubkeyValue {
    pub value: Vec<u8>,
    pub flags: u64,
}

impl SubkeyValue {
    pub fn new(value: impl Into<Vec<u8>>, flags: u64) -> Self {
        Self {
            value: value.into(),
            flags,
        }
    }
}

/// One explicit entry as declared by the front end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubkeyDecl {
    pub path: String,
    pub value: String,
    #[serde(default)]
    pub flags: u64,
}

impl SubkeyDecl {
    pub fn new(path: impl Into<String>, value: impl Into<String>, flags: u64) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            flags,
        }
    }
}

/// The two input forms a desired state is built from.
///
/// `subkeys` is the bulk map (flags implicitly 0); `subkey` is the explicit
/// entry list. Field names follow the declarative front end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubkeyInputs {
    #[serde(default)]
    pub subkeys: BTreeMap<String, String>,
    #[serde(default)]
    pub subkey: Vec<SubkeyDecl>,
}

/// One write or delete against a single subkey.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Put {
        path: SubkeyPath,
        value: Vec<u8>,
        flags: u64,
    },
    Delete {
        path: SubkeyPath,
    },
}

impl Operation {
    pub fn put(path: SubkeyPath, v: &SubkeyValue) -> Self {
        Operation::Put {
            path,
            value: v.value.clone(),
            flags: v.flags,
        }
    }

    pub fn delete(path: SubkeyPath) -> Self {
        Operation::Delete { path }
    }

    pub fn path(&self) -> &SubkeyPath {
        match self {
            Operation::Put { path, .. } | Operation::Delete { path } => path,
        }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, Operation::Put { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Operation::Delete { .. })
    }

    /// Short label for logs: `put` | `delete`.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Put { .. } => "put",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// A key under the prefix that desired state does not declare and that this
/// reconciler never managed. Reported, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Discrepancy {
    pub path: SubkeyPath,
    /// What the store holds, for the drift report.
    pub observed: SubkeyValue,
    pub modify_index: u64,
}

/// Output of the diff engine. Stable ordering enforced by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Puts first, then Deletes; each group ascending by path.
    pub operations: Vec<Operation>,
    /// Ascending by path.
    pub discrepancies: Vec<Discrepancy>,
}

impl DiffReport {
    /// No write is needed for the declared keys.
    pub fn is_converged(&self) -> bool {
        self.operations.is_empty()
    }

    /// Converged and no out-of-band keys either.
    pub fn is_clean(&self) -> bool {
        self.operations.is_empty() && self.discrepancies.is_empty()
    }

    pub fn puts(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_put())
    }

    pub fn deletes(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_delete())
    }

    pub fn discrepancy_paths(&self) -> Vec<&str> {
        self.discrepancies.iter().map(|d| d.path.as_str()).collect()
    }
}
