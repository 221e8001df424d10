//! Store error taxonomy.
//!
//! The store decides what an error *is*; this module only records the
//! decision. Callers consult [`StoreError::class`] to choose between a bounded
//! retry and surfacing the error immediately.

/// Retry classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network blip, leader election, throttling: may succeed on retry.
    Transient,
    /// Permission, namespace, malformed request: retrying cannot help.
    Permanent,
}

/// Errors a [`crate::StoreClient`] implementation may return.
///
/// Response-code variants render as `Unexpected response code: <code> (<msg>)`
/// so store-reported failures reach the caller verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Connection refused, reset, timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// Store reachable but not serving (5xx, no leader).
    #[error("Unexpected response code: {code} ({message})")]
    Unavailable { code: u16, message: String },

    /// Store asked the client to back off (429).
    #[error("Unexpected response code: 429 ({0})")]
    RateLimited(String),

    /// ACL denied the call.
    #[error("Unexpected response code: 403 (Permission denied: {0})")]
    PermissionDenied(String),

    /// The requested namespace does not exist.
    #[error("Unexpected response code: 400 (Namespace {0:?} does not exist)")]
    NamespaceNotFound(String),

    /// A namespace was supplied to a store edition without namespace support.
    #[error("Unexpected response code: {code} ({message})")]
    NamespaceUnsupported { code: u16, message: String },

    /// Any other application-level rejection.
    #[error("Unexpected response code: {code} ({message})")]
    Api { code: u16, message: String },

    /// The store refused the key itself.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::Transport(_) | StoreError::Unavailable { .. } | StoreError::RateLimited(_) => {
                ErrorClass::Transient
            }
            StoreError::PermissionDenied(_)
            | StoreError::NamespaceNotFound(_)
            | StoreError::NamespaceUnsupported { .. }
            | StoreError::Api { .. }
            | StoreError::InvalidKey { .. } => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// HTTP-style response code, when the store reported one.
    pub fn response_code(&self) -> Option<u16> {
        match self {
            StoreError::Unavailable { code, .. }
            | StoreError::NamespaceUnsupported { code, .. }
            | StoreError::Api { code, .. } => Some(*code),
            StoreError::RateLimited(_) => Some(429),
            StoreError::PermissionDenied(_) => Some(403),
            StoreError::NamespaceNotFound(_) => Some(400),
            StoreError::Transport(_) | StoreError::InvalidKey { .. } => None,
        }
    }
}
