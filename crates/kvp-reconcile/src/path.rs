//! Prefix and subkey path types.
//!
//! A managed key is addressed as `prefix + subkey` by plain concatenation,
//! exactly as the store sees it: prefix `"app/"` and subkey `"db/host"` name
//! the store key `"app/db/host"`. A prefix without a trailing `/` is allowed
//! and concatenates the same way.
//!
//! Declared subkeys follow the store's own key rules and nothing stricter:
//! folder keys (`"tmp/"`) and literal dot segments (`"x/./y"`) are valid.

use std::fmt;

use kvp_store::{validate_key, KeyRuleViolation};
use serde::{Deserialize, Serialize};

/// Rule a path broke.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathRule {
    #[error("{0}")]
    Store(#[from] KeyRuleViolation),
    #[error("key is not under prefix {prefix:?}")]
    OutsidePrefix { prefix: String },
    #[error("key equals the prefix itself")]
    EqualsPrefix,
}

/// A malformed prefix or subkey path. Raised before any network call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid path {path:?}: {rule}")]
pub struct InvalidPathError {
    pub path: String,
    pub rule: PathRule,
}

impl InvalidPathError {
    fn new(path: &str, rule: impl Into<PathRule>) -> Self {
        Self {
            path: path.to_string(),
            rule: rule.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PathPrefix
// ---------------------------------------------------------------------------

/// The path segment under which every managed subkey lives.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPrefix(String);

impl PathPrefix {
    pub fn parse(raw: &str) -> Result<Self, InvalidPathError> {
        validate_key(raw).map_err(|v| InvalidPathError::new(raw, v))?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute store key for `subkey`.
    pub fn key_for(&self, subkey: &SubkeyPath) -> String {
        format!("{}{}", self.0, subkey.as_str())
    }

    /// Inverse of [`key_for`](Self::key_for): the subkey a store key names.
    pub fn relative(&self, key: &str) -> Result<SubkeyPath, InvalidPathError> {
        let observed = self.observed(key)?;
        SubkeyPath::parse(observed.as_str())
    }

    /// The subkey a listed store key sits at, without subkey validation.
    ///
    /// Only keys outside the prefix and the bare prefix key are refused. Under
    /// a prefix without a trailing `/`, `"app/x"` observed under `"app"` comes
    /// back as `"/x"`, a path no declaration can name.
    pub fn observed(&self, key: &str) -> Result<SubkeyPath, InvalidPathError> {
        match key.strip_prefix(self.0.as_str()) {
            None => Err(InvalidPathError::new(
                key,
                PathRule::OutsidePrefix {
                    prefix: self.0.clone(),
                },
            )),
            Some("") => Err(InvalidPathError::new(key, PathRule::EqualsPrefix)),
            Some(rest) => Ok(SubkeyPath(rest.to_string())),
        }
    }
}

impl TryFrom<String> for PathPrefix {
    type Error = InvalidPathError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<PathPrefix> for String {
    fn from(p: PathPrefix) -> Self {
        p.0
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SubkeyPath
// ---------------------------------------------------------------------------

/// One key, relative to its prefix.
///
/// [`SubkeyPath::parse`] enforces the store key rules: non-empty, no leading
/// `/`, no empty interior segment, no control characters. Paths taken from a
/// listing via [`PathPrefix::observed`] are not checked.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubkeyPath(String);

impl SubkeyPath {
    pub fn parse(raw: &str) -> Result<Self, InvalidPathError> {
        validate_key(raw).map_err(|v| InvalidPathError::new(raw, v))?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubkeyPath {
    type Error = InvalidPathError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<SubkeyPath> for String {
    fn from(p: SubkeyPath) -> Self {
        p.0
    }
}

impl fmt::Display for SubkeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subkey_accepts_nested_paths() {
        assert_eq!(
            SubkeyPath::parse("condiment/first").unwrap().as_str(),
            "condiment/first"
        );
    }

    #[test]
    fn subkey_rejects_empty_and_slashes() {
        assert!(matches!(
            SubkeyPath::parse(""),
            Err(InvalidPathError {
                rule: PathRule::Store(KeyRuleViolation::Empty),
                ..
            })
        ));
        assert!(matches!(
            SubkeyPath::parse("/cheese"),
            Err(InvalidPathError {
                rule: PathRule::Store(KeyRuleViolation::LeadingSlash),
                ..
            })
        ));
        assert!(SubkeyPath::parse("a//b").is_err());
    }

    #[test]
    fn subkey_accepts_folder_and_dot_segment_keys() {
        for ok in ["tmp/", "x/./y", "a/../b", ".", "a.b/c..d"] {
            assert_eq!(SubkeyPath::parse(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn prefix_concatenates_plainly() {
        let p = PathPrefix::parse("prefix_test/").unwrap();
        let s = SubkeyPath::parse("cheese").unwrap();
        assert_eq!(p.key_for(&s), "prefix_test/cheese");
    }

    #[test]
    fn prefix_relative_round_trips() {
        let p = PathPrefix::parse("prefix_test/").unwrap();
        assert_eq!(
            p.relative("prefix_test/condiment/second").unwrap().as_str(),
            "condiment/second"
        );
    }

    #[test]
    fn relative_rejects_foreign_and_bare_prefix_keys() {
        let p = PathPrefix::parse("prefix_test/").unwrap();
        assert!(matches!(
            p.relative("other/cheese").unwrap_err().rule,
            PathRule::OutsidePrefix { .. }
        ));
        assert_eq!(
            p.relative("prefix_test/").unwrap_err().rule,
            PathRule::EqualsPrefix
        );
    }

    #[test]
    fn observed_keeps_everything_under_the_prefix() {
        let p = PathPrefix::parse("prefix_test/").unwrap();
        assert_eq!(p.observed("prefix_test/tmp/").unwrap().as_str(), "tmp/");
        assert_eq!(p.observed("prefix_test/x/./y").unwrap().as_str(), "x/./y");
        assert_eq!(
            p.observed("prefix_test/").unwrap_err().rule,
            PathRule::EqualsPrefix
        );
        assert!(matches!(
            p.observed("other/cheese").unwrap_err().rule,
            PathRule::OutsidePrefix { .. }
        ));

        let bare = PathPrefix::parse("app").unwrap();
        assert_eq!(bare.observed("app/x").unwrap().as_str(), "/x");
        assert!(bare.relative("app/x").is_err());
    }

    #[test]
    fn prefix_rejects_leading_slash() {
        assert!(PathPrefix::parse("/prefix_test/").is_err());
        assert!(PathPrefix::parse("").is_err());
    }

    #[test]
    fn serde_enforces_path_rules() {
        let ok: SubkeyPath = serde_json::from_str("\"bread\"").unwrap();
        assert_eq!(ok.as_str(), "bread");
        assert!(serde_json::from_str::<SubkeyPath>("\"/bread\"").is_err());
    }
}
