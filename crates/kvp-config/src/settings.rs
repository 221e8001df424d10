use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Per-operation retry tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrySettings {
    /// Total tries per operation, first attempt included. Always >= 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Backoff growth per retry. Always >= 1.0.
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplySettings {
    /// Operations dispatched concurrently. Always >= 1; 1 means sequential.
    pub max_in_flight: usize,
    /// Wall-clock limit for one apply call. `None` = unbounded.
    pub deadline: Option<Duration>,
    /// Re-snapshot after apply and record whether the prefix converged.
    pub verify_after_apply: bool,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            deadline: None,
            verify_after_apply: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcilerSettings {
    pub retry: RetrySettings,
    pub apply: ApplySettings,
}

impl ReconcilerSettings {
    /// Build from canonical config JSON (produced by [`crate::load_layered_yaml`]).
    ///
    /// Every field is optional; missing fields take the defaults.
    ///
    /// - reconciler.retry.max_attempts (>= 1)
    /// - reconciler.retry.initial_backoff_ms
    /// - reconciler.retry.max_backoff_ms (>= initial_backoff_ms)
    /// - reconciler.retry.multiplier (>= 1.0)
    /// - reconciler.apply.max_in_flight (>= 1)
    /// - reconciler.apply.deadline_ms
    /// - reconciler.apply.verify_after_apply
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let defaults = Self::default();

        let max_attempts = match read_u64(cfg, "/reconciler/retry/max_attempts")? {
            Some(n) => u32::try_from(n).context("reconciler.retry.max_attempts out of range")?,
            None => defaults.retry.max_attempts,
        };
        if max_attempts == 0 {
            bail!("reconciler.retry.max_attempts must be >= 1");
        }

        let initial_backoff = read_u64(cfg, "/reconciler/retry/initial_backoff_ms")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.initial_backoff);
        let max_backoff = read_u64(cfg, "/reconciler/retry/max_backoff_ms")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.max_backoff);
        if initial_backoff > max_backoff {
            bail!(
                "reconciler.retry.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                initial_backoff.as_millis(),
                max_backoff.as_millis()
            );
        }

        let multiplier = match cfg.pointer("/reconciler/retry/multiplier") {
            None | Some(Value::Null) => defaults.retry.multiplier,
            Some(v) => v
                .as_f64()
                .context("reconciler.retry.multiplier must be a number")?,
        };
        if !multiplier.is_finite() || multiplier < 1.0 {
            bail!("reconciler.retry.multiplier must be >= 1.0 (got {multiplier})");
        }

        let max_in_flight = match read_u64(cfg, "/reconciler/apply/max_in_flight")? {
            Some(n) => usize::try_from(n).context("reconciler.apply.max_in_flight out of range")?,
            None => defaults.apply.max_in_flight,
        };
        if max_in_flight == 0 {
            bail!("reconciler.apply.max_in_flight must be >= 1");
        }

        let deadline = read_u64(cfg, "/reconciler/apply/deadline_ms")?.map(Duration::from_millis);

        let verify_after_apply = match cfg.pointer("/reconciler/apply/verify_after_apply") {
            None | Some(Value::Null) => defaults.apply.verify_after_apply,
            Some(v) => v
                .as_bool()
                .context("reconciler.apply.verify_after_apply must be a boolean")?,
        };

        Ok(Self {
            retry: RetrySettings {
                max_attempts,
                initial_backoff,
                max_backoff,
                multiplier,
            },
            apply: ApplySettings {
                max_in_flight,
                deadline,
                verify_after_apply,
            },
        })
    }
}

fn read_u64(cfg: &Value, ptr: &str) -> Result<Option<u64>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .with_context(|| format!("{ptr} must be a non-negative integer")),
    }
}
