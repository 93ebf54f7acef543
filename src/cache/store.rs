//! Entry Store Module
//!
//! The storage primitive: a plain map from key to [`CacheEntry`]. The store
//! holds no policy and no listeners; it only mutates entries and reports what
//! changed. Callers serialize access through the cache's lock.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheKey};

// == Entry Store ==
/// Mapping from key to live entry for one cache.
///
/// Absence is always represented as `None`; no store operation fails for a
/// missing key.
#[derive(Debug)]
pub struct EntryStore<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: CacheKey, V> EntryStore<K, V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    // == Get ==
    /// Returns the entry for `key`, if present.
    pub fn get(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Returns a mutable reference to the entry for `key`, if present.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut CacheEntry<V>> {
        self.entries.get_mut(key)
    }

    // == Put ==
    /// Inserts an entry, returning the previous entry for that key if any.
    pub fn put(&mut self, key: K, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        self.entries.insert(key, entry)
    }

    // == Remove ==
    /// Removes the entry for `key`. No-op returning `None` if absent.
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        self.entries.remove(key)
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Keys ==
    /// Returns a snapshot of all live keys.
    pub fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    // == Iter ==
    /// Iterates over all live (key, entry) pairs. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &CacheEntry<V>)> {
        self.entries.iter()
    }

    // == Length ==
    /// Returns the count of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Batch ==
    /// Opens a journal for an all-or-nothing batch of inserts.
    pub fn begin_batch(&self) -> Batch<K, V> {
        Batch {
            journal: Vec::new(),
        }
    }
}

impl<K: CacheKey, V> Default for EntryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Batch Journal ==
/// Undo journal for a batch insert.
///
/// Every insert performed through the batch records the key's prior state;
/// `rollback` restores all of them so the whole batch becomes invisible.
/// Dropping a committed batch discards the journal.
#[derive(Debug)]
pub struct Batch<K, V> {
    journal: Vec<(K, Option<CacheEntry<V>>)>,
}

impl<K: CacheKey, V> Batch<K, V> {
    /// Inserts an entry through the batch, journaling the prior state.
    pub fn put(&mut self, store: &mut EntryStore<K, V>, key: K, entry: CacheEntry<V>) {
        let prior = store.put(key.clone(), entry);
        self.journal.push((key, prior));
    }

    /// Commits the batch, discarding the undo journal.
    pub fn commit(self) {
        // Entries are already live; nothing left to do.
    }

    /// Restores every touched key to its pre-batch state, newest first.
    pub fn rollback(mut self, store: &mut EntryStore<K, V>) {
        while let Some((key, prior)) = self.journal.pop() {
            match prior {
                Some(entry) => {
                    store.put(key, entry);
                }
                None => {
                    store.remove(&key);
                }
            }
        }
    }

    /// Number of inserts journaled so far.
    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }
}
