//! Store client contract.

use std::fmt;
use std::sync::Arc;

use crate::StoreError;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Where a call is routed: the datacenter and, optionally, a namespace.
///
/// `namespace == None` means "the store's default namespace". Whether a
/// namespace is accepted at all is decided by the store, never locally.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreScope {
    pub datacenter: String,
    pub namespace: Option<String>,
}

impl StoreScope {
    pub fn new(datacenter: impl Into<String>) -> Self {
        Self {
            datacenter: datacenter.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", self.datacenter, ns),
            None => write!(f, "{}", self.datacenter),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single key as returned verbatim by the store.
///
/// `key` is the full, absolute key (prefix included). `flags` is an opaque
/// tag that is round-tripped and never interpreted. `modify_index` is the
/// store-internal version marker of the last write to this key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub flags: u64,
    pub modify_index: u64,
}

impl KvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>, flags: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flags,
            modify_index: 0,
        }
    }

    pub fn with_modify_index(mut self, modify_index: u64) -> Self {
        self.modify_index = modify_index;
        self
    }
}

// ---------------------------------------------------------------------------
// StoreClient trait
// ---------------------------------------------------------------------------

/// Remote key-value store contract.
///
/// Implementations must be `Send + Sync` so a single handle can be shared by
/// concurrently dispatched operations. Every method is a suspension point.
///
/// There is deliberately no recursive delete: callers remove keys one by one.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Human-readable name identifying this store (e.g. `"memory"`).
    fn name(&self) -> &'static str;

    /// Read one key. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str, scope: &StoreScope) -> Result<Option<KvEntry>, StoreError>;

    /// Read every key starting with `prefix`, in ascending key order.
    async fn list(&self, prefix: &str, scope: &StoreScope) -> Result<Vec<KvEntry>, StoreError>;

    /// Create or overwrite one key.
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        flags: u64,
        scope: &StoreScope,
    ) -> Result<(), StoreError>;

    /// Remove one key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str, scope: &StoreScope) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<T: StoreClient + ?Sized> StoreClient for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn get(&self, key: &str, scope: &StoreScope) -> Result<Option<KvEntry>, StoreError> {
        (**self).get(key, scope).await
    }

    async fn list(&self, prefix: &str, scope: &StoreScope) -> Result<Vec<KvEntry>, StoreError> {
        (**self).list(prefix, scope).await
    }

    async fn put(
        &self,
        key: &str,
        value: &[u8],
        flags: u64,
        scope: &StoreScope,
    ) -> Result<(), StoreError> {
        (**self).put(key, value, flags, scope).await
    }

    async fn delete(&self, key: &str, scope: &StoreScope) -> Result<(), StoreError> {
        (**self).delete(key, scope).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
