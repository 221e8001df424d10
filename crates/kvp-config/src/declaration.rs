//! Prefix declaration: what the declarative front end hands the reconciler.
//!
//! ```yaml
//! key_prefix:
//!   path_prefix: "prefix_test/"
//!   datacenter: dc1          # optional, default dc1
//!   namespace: team-a        # optional
//!   subkeys:
//!     cheese: chevre
//!   subkey:
//!     - path: condiment/first
//!       value: tomato
//!       flags: 2
//! ```

use anyhow::{Context, Result};
use kvp_reconcile::{DesiredState, DesiredStateError, PathPrefix, SubkeyInputs};
use kvp_store::StoreScope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_DATACENTER: &str = "dc1";

fn default_datacenter() -> String {
    DEFAULT_DATACENTER.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixDeclaration {
    pub path_prefix: PathPrefix,
    #[serde(default = "default_datacenter")]
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub subkeys: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub subkey: Vec<kvp_reconcile::SubkeyDecl>,
}

impl PrefixDeclaration {
    pub fn new(path_prefix: PathPrefix, inputs: SubkeyInputs) -> Self {
        Self {
            path_prefix,
            datacenter: default_datacenter(),
            namespace: None,
            subkeys: inputs.subkeys,
            subkey: inputs.subkey,
        }
    }

    /// Read `/key_prefix` from canonical config JSON.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let raw = cfg
            .pointer("/key_prefix")
            .context("config missing key_prefix")?;
        serde_json::from_value(raw.clone()).context("invalid key_prefix declaration")
    }

    pub fn scope(&self) -> StoreScope {
        let scope = StoreScope::new(self.datacenter.clone());
        match &self.namespace {
            Some(ns) => scope.with_namespace(ns.clone()),
            None => scope,
        }
    }

    pub fn inputs(&self) -> SubkeyInputs {
        SubkeyInputs {
            subkeys: self.subkeys.clone(),
            subkey: self.subkey.clone(),
        }
    }

    /// Merge the two subkey inputs into the desired state.
    pub fn desired_state(&self) -> Result<DesiredState, DesiredStateError> {
        DesiredState::from_inputs(&self.inputs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn datacenter_defaults_and_namespace_is_optional() {
        let d = PrefixDeclaration::from_config_json(&json!({
            "key_prefix": {"path_prefix": "prefix_test/", "subkeys": {"cheese": "chevre"}}
        }))
        .unwrap();
        assert_eq!(d.datacenter, "dc1");
        assert_eq!(d.scope(), StoreScope::new("dc1"));
        assert_eq!(d.desired_state().unwrap().len(), 1);
    }

    #[test]
    fn namespace_flows_into_scope() {
        let d = PrefixDeclaration::from_config_json(&json!({
            "key_prefix": {"path_prefix": "p/", "datacenter": "dc2", "namespace": "team-a"}
        }))
        .unwrap();
        assert_eq!(d.scope().namespace(), Some("team-a"));
        assert_eq!(d.scope().datacenter, "dc2");
    }

    #[test]
    fn invalid_prefix_is_rejected_at_load() {
        let err = PrefixDeclaration::from_config_json(&json!({
            "key_prefix": {"path_prefix": "/abs/"}
        }))
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid path"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(PrefixDeclaration::from_config_json(&json!({
            "key_prefix": {"path_prefix": "p/", "sub_keys": {}}
        }))
        .is_err());
    }
}
