//! Import: read managed keys back into the declaration form that produced them.
//!
//! Flags-0 UTF-8 values go to the bulk map; anything carrying flags goes to
//! the explicit list. Merging the result with [`DesiredState::from_inputs`]
//! reproduces the snapshot's entry set, so a diff against the source
//! snapshot is empty.

use crate::{InvalidPathError, PrefixSnapshot, SubkeyDecl, SubkeyInputs, SubkeyPath};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// Declarations carry values as text; a binary value cannot round-trip.
    #[error("subkey {path:?} holds a value that is not valid UTF-8")]
    NonUtf8Value { path: String },
    /// Observed under the prefix but not nameable by a declaration.
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),
}

pub fn import_declaration(snapshot: &PrefixSnapshot) -> Result<SubkeyInputs, ImportError> {
    let mut out = SubkeyInputs::default();
    for entry in snapshot.iter() {
        SubkeyPath::parse(entry.path.as_str())?;
        let text = std::str::from_utf8(&entry.value.value).map_err(|_| ImportError::NonUtf8Value {
            path: entry.path.to_string(),
        })?;
        if entry.value.flags == 0 {
            out.subkeys.insert(entry.path.to_string(), text.to_string());
        } else {
            out.subkey.push(SubkeyDecl::new(
                entry.path.as_str(),
                text,
                entry.value.flags,
            ));
        }
    }
    Ok(out)
}
