//! Eviction Policy Module
//!
//! Decides which entries must be dropped; never removes anything itself.
//! Separating decision from mutation lets the insert path remove capacity
//! victims atomically with the insert and lets the sweeper batch its expire
//! notifications.
//!
//! Three independent triggers compose with OR semantics:
//! - capacity: past `max_size` after an insert, least-recently-used first
//! - idle: no access for `time_to_live_ms`
//! - age: inserted more than `max_age_ms` ago, regardless of access

use crate::cache::{CacheEntry, CacheKey, EntryStore};
use crate::config::CacheConfig;

// == Eviction Policy ==
/// Capacity and time bounds for one cache. A bound of `0` is disabled.
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Maximum entry count (0 = unbounded)
    pub max_size: usize,
    /// Idle expiry bound in milliseconds (0 = disabled)
    pub time_to_live_ms: u64,
    /// Absolute-age expiry bound in milliseconds (0 = disabled)
    pub max_age_ms: u64,
}

impl EvictionPolicy {
    // == Constructor ==
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_size: config.max_size,
            time_to_live_ms: config.time_to_live_ms,
            max_age_ms: config.max_age_ms,
        }
    }

    // == Capacity Victims ==
    /// Returns the keys that must be evicted to restore `len <= max_size`,
    /// least-recently-used first.
    ///
    /// Ordered by `last_accessed_at`, ties broken by earliest `inserted_at`,
    /// final tie by generation, so the decision is deterministic for a fixed
    /// clock and access history.
    pub fn capacity_victims<K: CacheKey, V>(&self, store: &EntryStore<K, V>) -> Vec<K> {
        if self.max_size == 0 || store.len() <= self.max_size {
            return Vec::new();
        }
        let excess = store.len() - self.max_size;

        let mut candidates: Vec<(u64, u64, u64, K)> = store
            .iter()
            .map(|(key, entry)| {
                (
                    entry.last_accessed_at,
                    entry.inserted_at,
                    entry.generation,
                    key.clone(),
                )
            })
            .collect();
        candidates.sort_unstable_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

        candidates
            .into_iter()
            .take(excess)
            .map(|(_, _, _, key)| key)
            .collect()
    }

    // == Sweep Victims ==
    /// Returns every key whose entry is idle- or age-expired at `now`.
    pub fn sweep_victims<K: CacheKey, V>(&self, store: &EntryStore<K, V>, now: u64) -> Vec<K> {
        if self.time_to_live_ms == 0 && self.max_age_ms == 0 {
            return Vec::new();
        }
        store
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Is Expired ==
    /// Checks the idle and age bounds for a single entry.
    ///
    /// Boundary condition: an entry is expired when the elapsed time is
    /// greater than or equal to the configured bound, so an entry is
    /// immediately expired once the full duration has elapsed.
    pub fn is_expired<V>(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        if self.time_to_live_ms > 0 && entry.idle_millis(now) >= self.time_to_live_ms {
            return true;
        }
        if self.max_age_ms > 0 && entry.age_millis(now) >= self.max_age_ms {
            return true;
        }
        false
    }
}
