//! Object Cache Module
//!
//! The public cache facade composing the entry store, eviction policy,
//! listener registry and selector engine, with origin-tagged hooks for an
//! external replication collaborator.
//!
//! # Expiry strategy
//!
//! Idle/age enforcement is eventual and uses two explicit paths:
//! - the background sweep ([`ObjectCache::sweep_now`], driven by the task in
//!   `tasks::sweeper`) is the authoritative reconciler of
//!   [`ObjectCache::get_cache_size`];
//! - `get` additionally performs a lazy expiry check, so an expired entry
//!   observed before the next sweep is removed on the spot, counted as a
//!   miss, and notified as an expiration.
//!
//! # Locking
//!
//! All mutable state lives behind one `tokio::sync::RwLock`. Events are
//! collected while the lock is held and dispatched to listeners after it is
//! released, so a slow listener never blocks concurrent callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::{
    apply_selector, CacheEntry, CacheKey, CacheListener, CacheStats, CacheValue,
    CachedObjectSelector, EntryStore, EventOrigin, EvictionPolicy, ListenerContext,
    ListenerRegistry, ObjectCacheInfo,
};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::replication::{NoticePhase, RemoteNotice, ReplicationAgent};
use crate::tasks::{spawn_sweep_task, SweeperHandle};

// == Cache Core ==
/// The mutable heart of a cache: storage, policy and counters, guarded by
/// one lock so an insert and its capacity evictions form a single
/// observable transition.
#[derive(Debug)]
struct CacheCore<K, V> {
    store: EntryStore<K, V>,
    policy: EvictionPolicy,
    stats: CacheStats,
}

// == Object Cache ==
/// A named in-memory object cache.
///
/// `get`/`put`/`remove` complete in bounded time dominated by one lock
/// acquisition; capacity eviction runs synchronously inside `put`, so
/// `get_cache_size() <= max_size` holds on return from any successful put.
pub struct ObjectCache<K: CacheKey, V: CacheValue> {
    name: String,
    label: StdRwLock<String>,
    core: RwLock<CacheCore<K, V>>,
    listeners: ListenerRegistry<K, V>,
    replicator: RwLock<Option<Arc<dyn ReplicationAgent<K, V>>>>,
    clock: Arc<dyn Clock>,
    /// Monotonic insertion sequence; also the LRU tie-break of last resort.
    generation: AtomicU64,
    distributed: AtomicBool,
    replicated: AtomicBool,
    log_enabled: AtomicBool,
    closed: AtomicBool,
    sweep_interval: Duration,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl<K: CacheKey, V: CacheValue> ObjectCache<K, V> {
    // == Constructor ==
    /// Creates a cache from its configuration and an injected clock.
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            label: StdRwLock::new(config.label.clone()),
            core: RwLock::new(CacheCore {
                store: EntryStore::new(),
                policy: EvictionPolicy::from_config(&config),
                stats: CacheStats::new(),
            }),
            listeners: ListenerRegistry::new(),
            replicator: RwLock::new(None),
            clock,
            generation: AtomicU64::new(0),
            distributed: AtomicBool::new(config.distributed),
            replicated: AtomicBool::new(config.replicated),
            log_enabled: AtomicBool::new(config.log_enabled),
            closed: AtomicBool::new(false),
            sweep_interval: config.sweep_interval(),
            sweeper: Mutex::new(None),
            name: config.name,
        }
    }

    /// Creates a cache on the system wall clock.
    pub fn with_system_clock(config: CacheConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A hit refreshes the entry's access time, bumps the hit counter and
    /// fires `on_get`. An absent key bumps the miss counter. An entry found
    /// expired by the lazy check is removed, counted as a miss and notified
    /// as an expiration.
    ///
    /// `on_get` fires for hits only: a miss produces no value to hand to a
    /// listener, so no event is emitted for it.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();

        enum Outcome<V> {
            Hit(V, ListenerContext),
            LazyExpired(V, ListenerContext),
        }

        let outcome = {
            let mut core = self.core.write().await;
            let mut entry = match core.store.remove(key) {
                None => {
                    core.stats.record_miss();
                    return None;
                }
                Some(entry) => entry,
            };
            if core.policy.is_expired(&entry, now) {
                let size = core.store.len();
                core.stats.record_miss();
                core.stats.record_expiration();
                core.stats.set_total_entries(size);
                let ctx = self.make_context(&core, EventOrigin::Local);
                Outcome::LazyExpired(entry.value, ctx)
            } else {
                entry.touch(now);
                let value = entry.value.clone();
                core.store.put(key.clone(), entry);
                core.stats.record_hit();
                let ctx = self.make_context(&core, EventOrigin::Local);
                Outcome::Hit(value, ctx)
            }
        };

        match outcome {
            Outcome::Hit(value, ctx) => {
                self.trace_op("get hit", key);
                self.listeners.notify_get(&ctx, key, &value).await;
                Some(value)
            }
            Outcome::LazyExpired(value, ctx) => {
                self.trace_op("get expired", key);
                self.listeners.notify_expire(&ctx, key, &value).await;
                None
            }
        }
    }

    // == Put ==
    /// Inserts a value, returning the previous value for that key if any.
    ///
    /// Capacity eviction runs synchronously before this returns: the insert
    /// and its victims form one observable transition. `on_put` fires for
    /// the new entry, `on_expire` for each victim; victims are not
    /// replicated (every member enforces its own capacity bound).
    pub async fn put(&self, key: K, value: V) -> Result<Option<V>> {
        self.ensure_open()?;
        Self::validate_key(&key)?;
        let now = self.clock.now_millis();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);

        let (previous, victims, ctx) = {
            let mut core = self.core.write().await;
            let previous = core
                .store
                .put(key.clone(), CacheEntry::new(value.clone(), now, generation));

            let mut victims = Vec::new();
            for victim_key in core.policy.capacity_victims(&core.store) {
                if let Some(entry) = core.store.remove(&victim_key) {
                    core.stats.record_eviction();
                    victims.push((victim_key, entry.value));
                }
            }
            let size = core.store.len();
            core.stats.set_total_entries(size);
            let ctx = self.make_context(&core, EventOrigin::Local);
            (previous.map(|e| e.value), victims, ctx)
        };

        self.trace_op("put", &key);
        self.listeners.notify_put(&ctx, &key, &value).await;
        for (victim_key, victim_value) in &victims {
            self.listeners
                .notify_expire(&ctx, victim_key, victim_value)
                .await;
        }
        self.replicate_put(&key, &value, generation).await;

        Ok(previous)
    }

    // == Put All ==
    /// Inserts a batch of entries as a single atomic transition.
    ///
    /// Every key is validated before anything is stored; an invalid key
    /// rejects the whole batch with the store untouched. Inserts are
    /// journaled and rolled back on internal failure, so no partial batch is
    /// ever observable. `on_put` fires per entry only after the batch
    /// commits.
    pub async fn put_all(&self, entries: HashMap<K, V>) -> Result<()> {
        self.ensure_open()?;
        for key in entries.keys() {
            Self::validate_key(key)?;
        }
        let now = self.clock.now_millis();

        let (staged, victims, ctx) = {
            let mut core = self.core.write().await;
            let mut batch = core.store.begin_batch();
            let staged = stage_batch(&mut core.store, &mut batch, &entries, now, &self.generation);

            let staged = match staged {
                Ok(staged) => {
                    batch.commit();
                    staged
                }
                Err(err) => {
                    batch.rollback(&mut core.store);
                    warn!(cache = %self.name, error = %err, "Batch insert failed; rolled back");
                    return Err(CacheError::BatchFailure(err.to_string()));
                }
            };

            // The capacity bound still holds after a batch commit.
            let mut victims = Vec::new();
            for victim_key in core.policy.capacity_victims(&core.store) {
                if let Some(entry) = core.store.remove(&victim_key) {
                    core.stats.record_eviction();
                    victims.push((victim_key, entry.value));
                }
            }
            let size = core.store.len();
            core.stats.set_total_entries(size);
            let ctx = self.make_context(&core, EventOrigin::Local);
            (staged, victims, ctx)
        };

        for (key, value, generation) in &staged {
            self.listeners.notify_put(&ctx, key, value).await;
            self.replicate_put(key, value, *generation).await;
        }
        for (victim_key, victim_value) in &victims {
            self.listeners
                .notify_expire(&ctx, victim_key, victim_value)
                .await;
        }

        Ok(())
    }

    // == Remove ==
    /// Removes an entry, returning its value if one was present.
    ///
    /// `on_remove` fires only when an entry was actually removed.
    pub async fn remove(&self, key: &K) -> Result<Option<V>> {
        self.ensure_open()?;
        Self::validate_key(key)?;

        let removed = {
            let mut core = self.core.write().await;
            let removed = core.store.remove(key);
            let size = core.store.len();
            core.stats.set_total_entries(size);
            removed.map(|entry| (entry.value, self.make_context(&core, EventOrigin::Local)))
        };

        match removed {
            Some((value, ctx)) => {
                self.trace_op("remove", key);
                self.listeners.notify_remove(&ctx, key, &value).await;
                self.replicate_remove(key).await;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // == Clear ==
    /// Removes all entries, firing a single `on_clear` (no per-key events).
    pub async fn clear(&self) -> Result<()> {
        self.ensure_open()?;

        let ctx = {
            let mut core = self.core.write().await;
            core.store.clear();
            core.stats.set_total_entries(0);
            self.make_context(&core, EventOrigin::Local)
        };

        debug!(cache = %self.name, "Cache cleared");
        self.listeners.notify_clear(&ctx).await;
        self.replicate_clear().await;
        Ok(())
    }

    // == Select ==
    /// Applies a selector over the current live snapshot of entries.
    ///
    /// Snapshot-then-apply: the action may mutate the cache (its intended
    /// use is bulk removal) without invalidating the scan. The first action
    /// error aborts the scan and is surfaced.
    pub async fn select<S>(&self, selector: &S) -> Result<()>
    where
        S: CachedObjectSelector<K, V>,
    {
        let snapshot = {
            let core = self.core.read().await;
            core.store
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        ObjectCacheInfo::new(
                            entry.value.clone(),
                            entry.inserted_at,
                            entry.last_accessed_at,
                            expire_time(&core.policy, entry),
                        ),
                    )
                })
                .collect::<Vec<_>>()
        };

        apply_selector(self, selector, snapshot).await
    }

    // == Sweep ==
    /// Removes every idle/age-expired entry and fires `on_expire` for each.
    ///
    /// Decision and mutation are separated: the policy reports victims, the
    /// sweep removes them in one locked pass, then notifications fan out
    /// with the lock released. Returns the number of entries removed.
    pub async fn sweep_now(&self) -> usize {
        let now = self.clock.now_millis();

        let (victims, ctx) = {
            let mut core = self.core.write().await;
            let mut victims = Vec::new();
            for victim_key in core.policy.sweep_victims(&core.store, now) {
                if let Some(entry) = core.store.remove(&victim_key) {
                    core.stats.record_expiration();
                    victims.push((victim_key, entry.value));
                }
            }
            let size = core.store.len();
            core.stats.set_total_entries(size);
            let ctx = self.make_context(&core, EventOrigin::Local);
            (victims, ctx)
        };

        for (key, value) in &victims {
            self.listeners.notify_expire(&ctx, key, value).await;
        }
        victims.len()
    }

    // == Bulk Reads ==
    /// Returns a snapshot of all live values.
    pub async fn get_cached_objects(&self) -> Vec<V> {
        let core = self.core.read().await;
        core.store.iter().map(|(_, e)| e.value.clone()).collect()
    }

    /// Returns a snapshot of all live values, then clears the cache
    /// (firing the single `on_clear`).
    pub async fn remove_cached_objects(&self) -> Result<Vec<V>> {
        self.ensure_open()?;
        let objects = self.get_cached_objects().await;
        self.clear().await?;
        Ok(objects)
    }

    // == Counters ==
    /// Count of live entries. Always equals the number of non-evicted
    /// entries; reflects an expiration once the sweep or a lazy check has
    /// removed the entry.
    pub async fn get_cache_size(&self) -> usize {
        self.core.read().await.store.len()
    }

    /// Monotonic hit counter.
    pub async fn get_cache_hit(&self) -> u64 {
        self.core.read().await.stats.hits
    }

    /// Monotonic miss counter.
    pub async fn get_cache_miss(&self) -> u64 {
        self.core.read().await.stats.misses
    }

    /// Snapshot of all counters.
    pub async fn stats(&self) -> CacheStats {
        let core = self.core.read().await;
        let mut stats = core.stats.clone();
        stats.set_total_entries(core.store.len());
        stats
    }

    // == Listeners ==
    /// Registers a lifecycle listener; dispatch order is registration order.
    pub async fn add_listener(&self, listener: Arc<dyn CacheListener<K, V>>) {
        self.listeners.register(listener).await;
    }

    // == Replication ==
    /// Wires the outbound replication collaborator.
    pub async fn set_replication_agent(&self, agent: Arc<dyn ReplicationAgent<K, V>>) {
        *self.replicator.write().await = Some(agent);
    }

    /// Applies an inbound remote mutation notice.
    ///
    /// Remote application is idempotent and never re-triggers the eviction
    /// policy or outbound replication. Removals act at the `Pre` phase (the
    /// value is read for the notification before it goes away); puts and
    /// clears act at `Post`. Notices for a shut-down cache are dropped.
    pub async fn apply_remote(&self, notice: RemoteNotice<K, V>, phase: NoticePhase) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(cache = %self.name, "Dropping remote notice for shut-down cache");
            return;
        }
        let now = self.clock.now_millis();

        match (notice, phase) {
            (RemoteNotice::Put { key, value, generation }, NoticePhase::Post) => {
                let ctx = {
                    let mut core = self.core.write().await;
                    if let Some(existing) = core.store.get(&key) {
                        if existing.generation >= generation {
                            // Re-delivered or stale echo; already applied.
                            return;
                        }
                    }
                    self.generation.fetch_max(generation + 1, Ordering::SeqCst);
                    core.store
                        .put(key.clone(), CacheEntry::new(value.clone(), now, generation));
                    let size = core.store.len();
                    core.stats.set_total_entries(size);
                    self.make_context(&core, EventOrigin::Remote)
                };
                self.listeners.notify_put(&ctx, &key, &value).await;
            }
            (RemoteNotice::Remove { key }, NoticePhase::Pre) => {
                let removed = {
                    let mut core = self.core.write().await;
                    let removed = core.store.remove(&key);
                    let size = core.store.len();
                    core.stats.set_total_entries(size);
                    removed.map(|e| (e.value, self.make_context(&core, EventOrigin::Remote)))
                };
                if let Some((value, ctx)) = removed {
                    self.listeners.notify_remove(&ctx, &key, &value).await;
                }
            }
            (RemoteNotice::Clear, NoticePhase::Post) => {
                let ctx = {
                    let mut core = self.core.write().await;
                    core.store.clear();
                    core.stats.set_total_entries(0);
                    self.make_context(&core, EventOrigin::Remote)
                };
                self.listeners.notify_clear(&ctx).await;
            }
            // The other phase of each notice carries no work for this engine.
            _ => {}
        }
    }

    // == Sweeper Lifecycle ==
    /// Starts the background sweep task. Idempotent: a second call while a
    /// sweeper is running is a no-op.
    pub async fn start_sweeper(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }
        *sweeper = Some(spawn_sweep_task(
            Arc::downgrade(self),
            self.sweep_interval,
        ));
    }

    /// Stops the sweeper (joining it, so no expire notification fires after
    /// this returns) and closes the cache to further mutations. Read
    /// accessors keep working.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let handle = self.sweeper.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        debug!(cache = %self.name, "Cache shut down");
    }

    /// Whether `shutdown` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // == Introspection & Settings ==
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> String {
        self.label.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.label.write().unwrap_or_else(|e| e.into_inner()) = label.into();
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed.load(Ordering::SeqCst)
    }

    pub fn set_distributed(&self, distributed: bool) {
        self.distributed.store(distributed, Ordering::SeqCst);
    }

    pub fn is_replicated(&self) -> bool {
        self.replicated.load(Ordering::SeqCst)
    }

    pub fn set_replicated(&self, replicated: bool) {
        self.replicated.store(replicated, Ordering::SeqCst);
    }

    pub fn is_log_enabled(&self) -> bool {
        self.log_enabled.load(Ordering::SeqCst)
    }

    pub fn set_log_enabled(&self, log_enabled: bool) {
        self.log_enabled.store(log_enabled, Ordering::SeqCst);
    }

    /// Effective background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub async fn max_size(&self) -> usize {
        self.core.read().await.policy.max_size
    }

    /// Changes the capacity bound; applies to subsequent inserts only.
    pub async fn set_max_size(&self, max_size: usize) {
        self.core.write().await.policy.max_size = max_size;
    }

    pub async fn live_time_ms(&self) -> u64 {
        self.core.read().await.policy.time_to_live_ms
    }

    /// Changes the idle bound; applies to subsequent evaluations only.
    pub async fn set_time_to_live(&self, millis: u64) {
        self.core.write().await.policy.time_to_live_ms = millis;
    }

    pub async fn max_age_ms(&self) -> u64 {
        self.core.read().await.policy.max_age_ms
    }

    /// Changes the age bound; applies to subsequent evaluations only.
    pub async fn set_max_age(&self, millis: u64) {
        self.core.write().await.policy.max_age_ms = millis;
    }

    // == Internals ==
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed(self.name.clone()));
        }
        Ok(())
    }

    fn validate_key(key: &K) -> Result<()> {
        if !key.is_valid() {
            return Err(CacheError::InvalidArgument(format!(
                "Invalid cache key: {key:?}"
            )));
        }
        Ok(())
    }

    fn make_context(&self, core: &CacheCore<K, V>, origin: EventOrigin) -> ListenerContext {
        ListenerContext::new(
            self.name.clone(),
            core.store.len(),
            core.policy.max_size,
            core.policy.time_to_live_ms,
            origin,
        )
    }

    fn trace_op(&self, op: &str, key: &K) {
        if self.log_enabled.load(Ordering::Relaxed) {
            debug!(cache = %self.name, ?key, "{op}");
        }
    }

    async fn replication_agent(&self) -> Option<Arc<dyn ReplicationAgent<K, V>>> {
        if !(self.is_replicated() || self.is_distributed()) {
            return None;
        }
        self.replicator.read().await.clone()
    }

    async fn replicate_put(&self, key: &K, value: &V, generation: u64) {
        if let Some(agent) = self.replication_agent().await {
            if let Err(err) = agent.propagate_put(&self.name, key, value, generation).await {
                warn!(cache = %self.name, ?key, error = %err, "Replication of put failed");
            }
        }
    }

    async fn replicate_remove(&self, key: &K) {
        if let Some(agent) = self.replication_agent().await {
            if let Err(err) = agent.propagate_remove(&self.name, key).await {
                warn!(cache = %self.name, ?key, error = %err, "Replication of remove failed");
            }
        }
    }

    async fn replicate_clear(&self) {
        if let Some(agent) = self.replication_agent().await {
            if let Err(err) = agent.propagate_clear(&self.name).await {
                warn!(cache = %self.name, error = %err, "Replication of clear failed");
            }
        }
    }
}

/// Stages every batch entry through the journal, returning each staged
/// (key, value, generation) triple. Any error returned here must be answered
/// with a rollback before the lock is released.
fn stage_batch<K: CacheKey, V: CacheValue>(
    store: &mut EntryStore<K, V>,
    batch: &mut crate::cache::Batch<K, V>,
    entries: &HashMap<K, V>,
    now: u64,
    generation: &AtomicU64,
) -> Result<Vec<(K, V, u64)>> {
    let mut staged = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let generation = generation.fetch_add(1, Ordering::SeqCst);
        batch.put(
            store,
            key.clone(),
            CacheEntry::new(value.clone(), now, generation),
        );
        staged.push((key.clone(), value.clone(), generation));
    }
    Ok(staged)
}

/// Earliest expiry-eligibility timestamp for an entry under the current
/// policy bounds, or `None` when unbounded.
fn expire_time<V>(policy: &EvictionPolicy, entry: &CacheEntry<V>) -> Option<u64> {
    let mut candidates = Vec::with_capacity(2);
    if policy.time_to_live_ms > 0 {
        candidates.push(entry.last_accessed_at + policy.time_to_live_ms);
    }
    if policy.max_age_ms > 0 {
        candidates.push(entry.inserted_at + policy.max_age_ms);
    }
    candidates.into_iter().min()
}
