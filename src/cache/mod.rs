//! Cache Module
//!
//! The object cache engine: storage primitive, eviction policy, listener
//! registry, selector engine and the [`ObjectCache`] facade composing them.

use std::fmt::Debug;
use std::hash::Hash;

mod entry;
mod listener;
mod object_cache;
mod policy;
mod selector;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use listener::{CacheListener, EventOrigin, ListenerContext, ListenerRegistry};
pub use object_cache::ObjectCache;
pub use policy::EvictionPolicy;
pub use selector::{CachedObjectSelector, ExpireKeyStartWithSelector, ObjectCacheInfo};
pub use stats::CacheStats;
pub use store::{Batch, EntryStore};

pub(crate) use selector::apply_selector;

// == Cache Key Trait ==
/// Requirements on cache keys, plus validity checking.
///
/// Keys have no null in Rust, so the engine rejects *invalid* keys instead:
/// an empty string key is the degenerate case callers must not store. Types
/// without a degenerate value keep the default and are always valid.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {
    /// Whether this key may be stored. Invalid keys are rejected with an
    /// invalid-argument error before any state changes.
    fn is_valid(&self) -> bool {
        true
    }
}

impl CacheKey for String {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

impl CacheKey for &'static str {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

impl CacheKey for u32 {}
impl CacheKey for u64 {}
impl CacheKey for i32 {}
impl CacheKey for i64 {}
impl CacheKey for usize {}

// == Cache Value Trait ==
/// Requirements on cached values; blanket-implemented.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> CacheValue for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_key_validity() {
        assert!("k".to_string().is_valid());
        assert!(!String::new().is_valid());
    }

    #[test]
    fn test_numeric_keys_always_valid() {
        assert!(0u64.is_valid());
        assert!(CacheKey::is_valid(&-1i64));
    }
}
