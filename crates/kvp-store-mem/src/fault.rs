//! Scripted failures for the in-memory store.
//!
//! A [`FaultRule`] matches calls by operation and (optionally) key, and makes
//! the store return a fixed [`StoreError`] instead of serving the call. Rules
//! are consulted in insertion order; the first live match wins.

use kvp_store::StoreError;

/// Which store call a rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreOp {
    Get,
    List,
    Put,
    Delete,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Get => "get",
            StoreOp::List => "list",
            StoreOp::Put => "put",
            StoreOp::Delete => "delete",
        }
    }
}

/// One scripted failure.
#[derive(Clone, Debug)]
pub struct FaultRule {
    op: Option<StoreOp>,
    key: Option<String>,
    error: StoreError,
    /// `None` = fail forever.
    remaining: Option<u32>,
}

impl FaultRule {
    /// Fail every call of `op`.
    pub fn on(op: StoreOp, error: StoreError) -> Self {
        Self {
            op: Some(op),
            key: None,
            error,
            remaining: None,
        }
    }

    /// Fail every call regardless of operation.
    pub fn on_any(error: StoreError) -> Self {
        Self {
            op: None,
            key: None,
            error,
            remaining: None,
        }
    }

    /// Restrict to one exact key (for `list`, the exact prefix argument).
    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Fail only the next `n` matching calls, then serve normally.
    pub fn times(mut self, n: u32) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, op: StoreOp, key: &str) -> bool {
        if self.remaining == Some(0) {
            return false;
        }
        if let Some(rule_op) = self.op {
            if rule_op != op {
                return false;
            }
        }
        match &self.key {
            Some(k) => k == key,
            None => true,
        }
    }

    /// Consume one firing. Returns the error to hand back.
    fn fire(&mut self) -> StoreError {
        if let Some(n) = self.remaining.as_mut() {
            *n = n.saturating_sub(1);
        }
        self.error.clone()
    }
}

/// Evaluate `rules` for a call; returns the scripted error if any rule fires.
pub(crate) fn check(rules: &mut [FaultRule], op: StoreOp, key: &str) -> Option<StoreError> {
    rules
        .iter_mut()
        .find(|r| r.matches(op, key))
        .map(FaultRule::fire)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> StoreError {
        StoreError::Transport("connection reset".into())
    }

    #[test]
    fn rule_matches_op_and_key() {
        let mut rules = vec![FaultRule::on(StoreOp::Put, transient()).for_key("a/b")];
        assert!(check(&mut rules, StoreOp::Put, "a/c").is_none());
        assert!(check(&mut rules, StoreOp::Delete, "a/b").is_none());
        assert_eq!(check(&mut rules, StoreOp::Put, "a/b"), Some(transient()));
    }

    #[test]
    fn limited_rule_expires_after_n_firings() {
        let mut rules = vec![FaultRule::on_any(transient()).times(2)];
        assert!(check(&mut rules, StoreOp::Get, "k").is_some());
        assert!(check(&mut rules, StoreOp::Put, "k").is_some());
        assert!(check(&mut rules, StoreOp::Put, "k").is_none());
    }

    #[test]
    fn first_live_rule_wins() {
        let denied = StoreError::PermissionDenied("no".into());
        let mut rules = vec![
            FaultRule::on(StoreOp::Put, transient()).times(1),
            FaultRule::on(StoreOp::Put, denied.clone()),
        ];
        assert_eq!(check(&mut rules, StoreOp::Put, "k"), Some(transient()));
        assert_eq!(check(&mut rules, StoreOp::Put, "k"), Some(denied));
    }
}
