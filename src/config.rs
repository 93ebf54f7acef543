//! Configuration Module
//!
//! Per-cache configuration supplied by the embedder at construction time.
//! The engine does not parse configuration files itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sweep interval used when neither time-to-live nor max-age is configured.
const FALLBACK_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Lower bound for a derived sweep interval.
const MIN_SWEEP_INTERVAL_MS: u64 = 50;

/// Configuration for a single named cache.
///
/// A value of `0` disables the corresponding bound: `max_size = 0` means
/// unbounded, `time_to_live_ms = 0` disables idle expiry, `max_age_ms = 0`
/// disables absolute-age expiry.
///
/// The size and time bounds may be changed after creation through the
/// cache's setters; changes apply to subsequent evaluations only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Logical cache name (one cache per name in a registry)
    pub name: String,
    /// Human-readable label for diagnostics
    pub label: String,
    /// Maximum number of entries (0 = unbounded)
    pub max_size: usize,
    /// Idle expiry bound in milliseconds (0 = disabled)
    pub time_to_live_ms: u64,
    /// Absolute-age expiry bound in milliseconds (0 = disabled)
    pub max_age_ms: u64,
    /// Background sweep interval override; derived from the time bounds when None
    pub sweep_interval_ms: Option<u64>,
    /// Whether the cache participates in a distributed topology
    pub distributed: bool,
    /// Whether local mutations are propagated to other cluster members
    pub replicated: bool,
    /// Whether per-operation debug traces are emitted
    pub log_enabled: bool,
}

impl CacheConfig {
    /// Creates a configuration with the given name and all bounds disabled.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            max_size: 0,
            time_to_live_ms: 0,
            max_age_ms: 0,
            sweep_interval_ms: None,
            distributed: false,
            replicated: false,
            log_enabled: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_time_to_live_ms(mut self, millis: u64) -> Self {
        self.time_to_live_ms = millis;
        self
    }

    pub fn with_max_age_ms(mut self, millis: u64) -> Self {
        self.max_age_ms = millis;
        self
    }

    pub fn with_sweep_interval_ms(mut self, millis: u64) -> Self {
        self.sweep_interval_ms = Some(millis);
        self
    }

    pub fn with_distributed(mut self, distributed: bool) -> Self {
        self.distributed = distributed;
        self
    }

    pub fn with_replicated(mut self, replicated: bool) -> Self {
        self.replicated = replicated;
        self
    }

    pub fn with_log_enabled(mut self, log_enabled: bool) -> Self {
        self.log_enabled = log_enabled;
        self
    }

    // == Sweep Interval ==
    /// Returns the effective background sweep interval.
    ///
    /// Uses the explicit override when set; otherwise half the smaller
    /// configured time bound, floored at 50ms. Falls back to one second when
    /// neither time bound is configured.
    pub fn sweep_interval(&self) -> Duration {
        if let Some(ms) = self.sweep_interval_ms {
            return Duration::from_millis(ms.max(MIN_SWEEP_INTERVAL_MS));
        }
        let bounds = [self.time_to_live_ms, self.max_age_ms];
        let smallest = bounds.iter().copied().filter(|&ms| ms > 0).min();
        match smallest {
            Some(ms) => Duration::from_millis((ms / 2).max(MIN_SWEEP_INTERVAL_MS)),
            None => Duration::from_millis(FALLBACK_SWEEP_INTERVAL_MS),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
