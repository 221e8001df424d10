//! kvp-store
//!
//! Boundary of the remote hierarchical key-value store.
//!
//! This crate defines **only** the client contract the reconciler talks to:
//! scoping (datacenter + optional namespace), the entry shape, the error
//! taxonomy with its transient/permanent classification, and the store's
//! key character rules. No transport, no auth, no concrete store lives here.

mod client;
mod error;
mod key;

pub use client::{KvEntry, StoreClient, StoreScope};
pub use error::{ErrorClass, StoreError};
pub use key::{validate_key, KeyRuleViolation};
