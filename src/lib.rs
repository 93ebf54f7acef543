//! obcache - A cluster-aware in-memory object cache engine
//!
//! Key/value caches with pluggable eviction bounds (capacity, idle
//! time-to-live, absolute max-age), origin-aware lifecycle listeners,
//! selector-driven bulk eviction, atomic batch insertion, and hooks for an
//! external replication collaborator. Purely in-memory; no persistence.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod replication;
pub mod tasks;

pub use cache::{
    CacheEntry, CacheKey, CacheListener, CacheStats, CacheValue, CachedObjectSelector, EntryStore,
    EventOrigin, EvictionPolicy, ExpireKeyStartWithSelector, ListenerContext, ListenerRegistry,
    ObjectCache, ObjectCacheInfo,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use registry::CacheRegistry;
pub use replication::{NoticePhase, RemoteNotice, ReplicationAgent};
pub use tasks::{spawn_sweep_task, SweeperHandle};
