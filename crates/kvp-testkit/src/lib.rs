//! Scenario helpers for end-to-end tests.
//!
//! The fixtures mirror the key-prefix acceptance suite: one prefix
//! (`prefix_test/`) in `dc1`, an initial declaration mixing the bulk map with
//! flagged explicit entries, and an update that drops some keys and adds
//! others. Check helpers read the store directly, bypassing the reconciler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use kvp_config::{load_layered_yaml_from_strings, PrefixDeclaration, ReconcilerSettings};
use kvp_reconcile::PathPrefix;
use kvp_runtime::{ReconcileTarget, Reconciler};
use kvp_store::{KvEntry, StoreClient, StoreScope};
use kvp_store_mem::MemStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const SCENARIO_PREFIX: &str = "prefix_test/";
pub const SCENARIO_DATACENTER: &str = "dc1";
pub const SCENARIO_NAMESPACE: &str = "test-key-prefix";

pub const INITIAL_YAML: &str = r#"
key_prefix:
  datacenter: dc1
  path_prefix: prefix_test/
  subkeys:
    cheese: chevre
    bread: baguette
  subkey:
    - path: condiment/first
      value: tomato
      flags: 2
    - path: condiment/second
      value: salad
      flags: 4
"#;

pub const UPDATED_YAML: &str = r#"
key_prefix:
  datacenter: dc1
  path_prefix: prefix_test/
  subkeys:
    bread: batard
    meat: ham
"#;

/// Layered on top of [`UPDATED_YAML`] to move the declaration into
/// [`SCENARIO_NAMESPACE`].
pub const NAMESPACE_LAYER_YAML: &str = r#"
key_prefix:
  namespace: test-key-prefix
"#;

/// Install a test-writer subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Community-edition store with only `dc1`.
pub fn scenario_store() -> Arc<MemStore> {
    Arc::new(MemStore::community())
}

/// Enterprise-edition store with [`SCENARIO_NAMESPACE`] already created.
pub async fn enterprise_store() -> Result<Arc<MemStore>> {
    let store = MemStore::enterprise();
    store
        .create_namespace(SCENARIO_NAMESPACE)
        .await
        .context("create scenario namespace")?;
    Ok(Arc::new(store))
}

/// Default settings with millisecond backoff so retry scenarios stay fast.
pub fn fast_settings() -> ReconcilerSettings {
    let mut settings = ReconcilerSettings::default();
    settings.retry.initial_backoff = Duration::from_millis(1);
    settings.retry.max_backoff = Duration::from_millis(5);
    settings
}

pub fn reconciler<C: StoreClient>(client: C) -> Reconciler<C> {
    Reconciler::new(client, fast_settings())
}

pub fn scope() -> StoreScope {
    StoreScope::new(SCENARIO_DATACENTER)
}

pub fn target() -> Result<ReconcileTarget> {
    let prefix = PathPrefix::parse(SCENARIO_PREFIX).context("scenario prefix")?;
    Ok(ReconcileTarget::new(prefix, scope()))
}

/// Merge `layers` in order and read the `key_prefix` declaration.
pub fn declaration(layers: &[&str]) -> Result<PrefixDeclaration> {
    let loaded = load_layered_yaml_from_strings(layers)?;
    PrefixDeclaration::from_config_json(&loaded.config_json)
}

pub fn initial_declaration() -> Result<PrefixDeclaration> {
    declaration(&[INITIAL_YAML])
}

pub fn updated_declaration() -> Result<PrefixDeclaration> {
    declaration(&[UPDATED_YAML])
}

// ---------------------------------------------------------------------------
// Direct store checks
// ---------------------------------------------------------------------------

fn full_key(name: &str) -> String {
    format!("{SCENARIO_PREFIX}{name}")
}

async fn fetch<C: StoreClient>(store: &C, scope: &StoreScope, name: &str) -> Result<Option<KvEntry>> {
    let key = full_key(name);
    store
        .get(&key, scope)
        .await
        .with_context(|| format!("get {key} in {scope}"))
}

/// Fails unless `prefix_test/<name>` holds exactly `value` with `flags`.
pub async fn assert_key_value<C: StoreClient>(
    store: &C,
    scope: &StoreScope,
    name: &str,
    value: &str,
    flags: u64,
) -> Result<()> {
    let key = full_key(name);
    let Some(entry) = fetch(store, scope, name).await? else {
        bail!("key {key} doesn't exist, but should");
    };
    if entry.value != value.as_bytes() {
        bail!(
            "key {key} has value {:?}; want {value:?}",
            String::from_utf8_lossy(&entry.value)
        );
    }
    if entry.flags != flags {
        bail!("key {key} has flags {}; want {flags}", entry.flags);
    }
    Ok(())
}

pub async fn assert_key_absent<C: StoreClient>(store: &C, scope: &StoreScope, name: &str) -> Result<()> {
    if fetch(store, scope, name).await?.is_some() {
        bail!("key '{}' exists, but shouldn't", full_key(name));
    }
    Ok(())
}

/// Every key currently under the scenario prefix, relative and sorted.
pub async fn keys_under_prefix<C: StoreClient>(store: &C, scope: &StoreScope) -> Result<Vec<String>> {
    let mut keys: Vec<String> = store
        .list(SCENARIO_PREFIX, scope)
        .await
        .with_context(|| format!("list {SCENARIO_PREFIX} in {scope}"))?
        .into_iter()
        .filter_map(|e| e.key.strip_prefix(SCENARIO_PREFIX).map(str::to_string))
        .collect();
    keys.sort();
    Ok(keys)
}

/// Out-of-band write straight into the store, as another operator would.
pub async fn add_rogue<C: StoreClient>(
    store: &C,
    scope: &StoreScope,
    name: &str,
    value: &str,
) -> Result<()> {
    let key = full_key(name);
    store
        .put(&key, value.as_bytes(), 0, scope)
        .await
        .with_context(|| format!("rogue put {key}"))?;
    info!(key = %key, "rogue key written");
    Ok(())
}
