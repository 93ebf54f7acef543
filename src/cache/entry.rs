//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with insertion and
//! access metadata.

// == Cache Entry ==
/// A single cached value with the metadata the eviction policy decides on.
///
/// Entries are owned exclusively by the entry store and mutated only through
/// store operations: a read refreshes `last_accessed_at`, an overwrite
/// replaces the whole entry, a removal destroys it.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp (milliseconds, engine clock)
    pub inserted_at: u64,
    /// Last access timestamp (milliseconds, engine clock)
    pub last_accessed_at: u64,
    /// Monotonic insertion sequence number.
    ///
    /// Assigned from the cache's generation counter on local inserts and
    /// adopted from the remote notice on replicated inserts. Used as the
    /// final LRU tie-break and for idempotent remote re-delivery.
    pub generation: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry inserted at `now` with the given generation.
    pub fn new(value: V, now: u64, generation: u64) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
            generation,
        }
    }

    // == Touch ==
    /// Marks the entry as accessed at `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed_at = now;
    }

    // == Idle Time ==
    /// Milliseconds since the last access.
    pub fn idle_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_accessed_at)
    }

    // == Age ==
    /// Milliseconds since insertion, regardless of access activity.
    pub fn age_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at)
    }
}
