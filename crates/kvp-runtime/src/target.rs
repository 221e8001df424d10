use std::fmt;

use kvp_config::PrefixDeclaration;
use kvp_reconcile::PathPrefix;
use kvp_store::StoreScope;

/// Which prefix, in which datacenter and namespace, a call works on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReconcileTarget {
    pub prefix: PathPrefix,
    pub scope: StoreScope,
}

impl ReconcileTarget {
    pub fn new(prefix: PathPrefix, scope: StoreScope) -> Self {
        Self { prefix, scope }
    }

    pub fn from_declaration(decl: &PrefixDeclaration) -> Self {
        Self::new(decl.path_prefix.clone(), decl.scope())
    }
}

impl fmt::Display for ReconcileTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.prefix, self.scope)
    }
}
