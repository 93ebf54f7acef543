//! Selector Module
//!
//! Predicate + action pairs applied to all live entries, used for
//! pattern-based bulk invalidation ("remove every key with a given prefix").
//!
//! The scan is snapshot-then-apply: the live (key, info) set is materialized
//! once under the read lock, the lock is released, and the action runs
//! against the copy. The action may safely re-enter the cache and mutate it;
//! an entry it removes is never visited twice, and an entry added during the
//! scan is not visited at all.

use async_trait::async_trait;

use crate::cache::{CacheKey, CacheValue, ObjectCache};
use crate::error::{CacheError, Result};

// == Object Cache Info ==
/// Metadata snapshot for one entry as seen by a selector.
#[derive(Debug, Clone)]
pub struct ObjectCacheInfo<V> {
    value: V,
    inserted_at: u64,
    last_accessed_at: u64,
    expire_at: Option<u64>,
}

impl<V> ObjectCacheInfo<V> {
    pub(crate) fn new(
        value: V,
        inserted_at: u64,
        last_accessed_at: u64,
        expire_at: Option<u64>,
    ) -> Self {
        Self {
            value,
            inserted_at,
            last_accessed_at,
            expire_at,
        }
    }

    /// The cached value at snapshot time.
    pub fn get(&self) -> &V {
        &self.value
    }

    /// Insertion timestamp in milliseconds.
    pub fn inserted_at(&self) -> u64 {
        self.inserted_at
    }

    /// Last access timestamp in milliseconds.
    pub fn last_accessed_at(&self) -> u64 {
        self.last_accessed_at
    }

    /// Earliest timestamp at which the entry becomes expiry-eligible, or
    /// `None` when no time bound is configured.
    pub fn expire_time(&self) -> Option<u64> {
        self.expire_at
    }
}

// == Cached Object Selector Trait ==
/// Caller-supplied predicate and action over live entries.
///
/// `select` must be cheap and side-effect free; `on_select` runs only for
/// matches and may call back into the cache (removal being the primary use).
#[async_trait]
pub trait CachedObjectSelector<K: CacheKey, V: CacheValue>: Send + Sync {
    /// Decides whether the action should run for this entry.
    fn select(&self, key: &K, info: &ObjectCacheInfo<V>) -> bool;

    /// Action invoked for each matched entry.
    async fn on_select(
        &self,
        cache: &ObjectCache<K, V>,
        key: &K,
        info: &ObjectCacheInfo<V>,
    ) -> anyhow::Result<()>;
}

// == Selector Engine ==
/// Runs the selector over an already-materialized snapshot.
///
/// The first action error aborts the scan and surfaces to the caller.
pub(crate) async fn apply_selector<K: CacheKey, V: CacheValue>(
    cache: &ObjectCache<K, V>,
    selector: &dyn CachedObjectSelector<K, V>,
    snapshot: Vec<(K, ObjectCacheInfo<V>)>,
) -> Result<()> {
    for (key, info) in snapshot {
        if selector.select(&key, &info) {
            selector
                .on_select(cache, &key, &info)
                .await
                .map_err(CacheError::Selector)?;
        }
    }
    Ok(())
}

// == Expire Key Start With Selector ==
/// Removes every entry whose string key starts with the given prefix.
pub struct ExpireKeyStartWithSelector {
    prefix: String,
}

impl ExpireKeyStartWithSelector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl<K, V> CachedObjectSelector<K, V> for ExpireKeyStartWithSelector
where
    K: CacheKey + AsRef<str>,
    V: CacheValue,
{
    fn select(&self, key: &K, _info: &ObjectCacheInfo<V>) -> bool {
        key.as_ref().starts_with(&self.prefix)
    }

    async fn on_select(
        &self,
        cache: &ObjectCache<K, V>,
        key: &K,
        _info: &ObjectCacheInfo<V>,
    ) -> anyhow::Result<()> {
        cache.remove(key).await?;
        Ok(())
    }
}
