//! Store-level key character rules.
//!
//! These are the rules the store itself enforces on any key. Subkey-specific
//! rules (relative to a prefix) live in `kvp-reconcile`.

/// Why a key was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KeyRuleViolation {
    #[error("key is empty")]
    Empty,
    #[error("key must not start with '/'")]
    LeadingSlash,
    #[error("key contains an empty segment ('//') at byte {position}")]
    EmptySegment { position: usize },
    #[error("key contains a control character at byte {position}")]
    ControlCharacter { position: usize },
}

/// Check `key` against the store's character rules.
///
/// Rules:
/// - non-empty
/// - no leading `/`
/// - no empty interior segment (`a//b`)
/// - no control characters (including NUL)
///
/// A single trailing `/` is allowed: stores use it for "folder" keys.
pub fn validate_key(key: &str) -> Result<(), KeyRuleViolation> {
    if key.is_empty() {
        return Err(KeyRuleViolation::Empty);
    }
    if key.starts_with('/') {
        return Err(KeyRuleViolation::LeadingSlash);
    }
    if let Some((position, _)) = key.char_indices().find(|(_, c)| c.is_control()) {
        return Err(KeyRuleViolation::ControlCharacter { position });
    }
    if let Some(position) = key.find("//") {
        return Err(KeyRuleViolation::EmptySegment { position });
    }
    Ok(())
}
