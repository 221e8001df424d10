//! Deterministic in-memory key-value store.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - Keys are partitioned by `(datacenter, namespace)`. Unset namespace maps
//!   to `"default"`.
//! - A single store-wide `modify_index` counter is bumped on every write,
//!   including rewrites of an identical value.
//! - [`Edition::Community`] rejects any namespace with a 400-class
//!   `NamespaceUnsupported`; [`Edition::Enterprise`] accepts namespaces that
//!   were created first and answers `NamespaceNotFound` otherwise.
//! - Unknown datacenters are a permanent 500 ("No path to datacenter").
//! - No randomness. Optional fixed per-call latency for timing scenarios.
//!
//! This crate stands in for the remote store in tests; it satisfies the
//! [`StoreClient`] contract and nothing more.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use kvp_store::{validate_key, KvEntry, StoreClient, StoreError, StoreScope};
use tokio::sync::Mutex;

mod fault;

pub use fault::{FaultRule, StoreOp};

pub const DEFAULT_DATACENTER: &str = "dc1";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Store product edition; decides namespace support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edition {
    Community,
    Enterprise,
}

/// One served (or refused) call, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRecord {
    pub op: StoreOp,
    pub key: String,
    pub scope: StoreScope,
    pub ok: bool,
}

type Partition = (String, String);

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<Partition, BTreeMap<String, KvEntry>>,
    datacenters: BTreeSet<String>,
    namespaces: BTreeSet<String>,
    index: u64,
    faults: Vec<FaultRule>,
    calls: Vec<CallRecord>,
}

#[derive(Debug)]
pub struct MemStore {
    edition: Edition,
    latency: Option<Duration>,
    inner: Mutex<Inner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(Edition::Community)
    }
}

impl MemStore {
    /// New store with datacenter `dc1` and the `default` namespace.
    pub fn new(edition: Edition) -> Self {
        let mut inner = Inner::default();
        inner.datacenters.insert(DEFAULT_DATACENTER.to_string());
        inner.namespaces.insert(DEFAULT_NAMESPACE.to_string());
        Self {
            edition,
            latency: None,
            inner: Mutex::new(inner),
        }
    }

    pub fn community() -> Self {
        Self::new(Edition::Community)
    }

    pub fn enterprise() -> Self {
        Self::new(Edition::Enterprise)
    }

    /// Sleep this long at the start of every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub async fn add_datacenter(&self, name: impl Into<String>) {
        self.inner.lock().await.datacenters.insert(name.into());
    }

    /// Register a namespace. Community edition answers like the real store does.
    pub async fn create_namespace(&self, name: impl Into<String>) -> Result<(), StoreError> {
        if self.edition == Edition::Community {
            return Err(namespace_unsupported());
        }
        self.inner.lock().await.namespaces.insert(name.into());
        Ok(())
    }

    /// Script a failure. See [`FaultRule`].
    pub async fn inject(&self, rule: FaultRule) {
        self.inner.lock().await.faults.push(rule);
    }

    pub async fn clear_faults(&self) {
        self.inner.lock().await.faults.clear();
    }

    /// Every call seen so far, in arrival order.
    pub async fn call_log(&self) -> Vec<CallRecord> {
        self.inner.lock().await.calls.clone()
    }

    /// Number of calls of `op` that reached the store (served or refused).
    pub async fn call_count(&self, op: StoreOp) -> usize {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    /// Current value of the store-wide modify index.
    pub async fn index(&self) -> u64 {
        self.inner.lock().await.index
    }

    async fn pause(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }

    fn resolve(&self, inner: &Inner, scope: &StoreScope) -> Result<Partition, StoreError> {
        let namespace = match (self.edition, scope.namespace()) {
            (_, None) => DEFAULT_NAMESPACE.to_string(),
            (Edition::Community, Some(_)) => return Err(namespace_unsupported()),
            (Edition::Enterprise, Some(ns)) => {
                if !inner.namespaces.contains(ns) {
                    return Err(StoreError::NamespaceNotFound(ns.to_string()));
                }
                ns.to_string()
            }
        };
        if !inner.datacenters.contains(&scope.datacenter) {
            return Err(StoreError::Api {
                code: 500,
                message: format!("No path to datacenter {:?}", scope.datacenter),
            });
        }
        Ok((scope.datacenter.clone(), namespace))
    }

    /// Shared pre-flight for every call: faults, scope resolution, call
    /// logging. Returns the partition to operate on.
    fn admit(
        &self,
        inner: &mut Inner,
        op: StoreOp,
        key: &str,
        scope: &StoreScope,
    ) -> Result<Partition, StoreError> {
        let outcome = match fault::check(&mut inner.faults, op, key) {
            Some(err) => Err(err),
            None => self.resolve(inner, scope),
        };
        inner.calls.push(CallRecord {
            op,
            key: key.to_string(),
            scope: scope.clone(),
            ok: outcome.is_ok(),
        });
        outcome
    }
}

fn namespace_unsupported() -> StoreError {
    StoreError::NamespaceUnsupported {
        code: 400,
        message: "Bad request: Invalid query parameter: \"ns\" - Namespaces are a Consul Enterprise feature"
            .to_string(),
    }
}

fn check_key(key: &str) -> Result<(), StoreError> {
    validate_key(key).map_err(|v| StoreError::InvalidKey {
        key: key.to_string(),
        reason: v.to_string(),
    })
}

#[async_trait::async_trait]
impl StoreClient for MemStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str, scope: &StoreScope) -> Result<Option<KvEntry>, StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().await;
        let part = self.admit(&mut inner, StoreOp::Get, key, scope)?;
        Ok(inner.data.get(&part).and_then(|m| m.get(key)).cloned())
    }

    async fn list(&self, prefix: &str, scope: &StoreScope) -> Result<Vec<KvEntry>, StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().await;
        let part = self.admit(&mut inner, StoreOp::List, prefix, scope)?;
        // BTreeMap iteration gives ascending key order.
        Ok(inner
            .data
            .get(&part)
            .map(|m| {
                m.range(prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(_, e)| e.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(
        &self,
        key: &str,
        value: &[u8],
        flags: u64,
        scope: &StoreScope,
    ) -> Result<(), StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().await;
        let part = self.admit(&mut inner, StoreOp::Put, key, scope)?;
        check_key(key)?;
        inner.index += 1;
        let entry = KvEntry::new(key, value, flags).with_modify_index(inner.index);
        inner
            .data
            .entry(part)
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str, scope: &StoreScope) -> Result<(), StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().await;
        let part = self.admit(&mut inner, StoreOp::Delete, key, scope)?;
        check_key(key)?;
        let removed = inner
            .data
            .get_mut(&part)
            .and_then(|m| m.remove(key))
            .is_some();
        if removed {
            inner.index += 1;
        }
        Ok(())
    }
}
