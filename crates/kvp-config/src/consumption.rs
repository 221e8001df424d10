//! Registry of config pointers the workspace actually reads.
//!
//! A leaf is "consumed" if it sits under one of these JSON-pointer prefixes.
//! Keep this in step with the readers:
//! - `ReconcilerSettings::from_config_json` reads `/reconciler/retry/*` and
//!   `/reconciler/apply/*`
//! - `PrefixDeclaration::from_config_json` reads the whole `/key_prefix`
//!   subtree

pub static CONSUMED_POINTERS: &[&str] = &["/reconciler/retry", "/reconciler/apply", "/key_prefix"];

pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED_POINTERS
}
