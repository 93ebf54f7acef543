//! Cache Registry Module
//!
//! Owned registry holding one cache per logical name. Explicit state with a
//! lifecycle (create, look up, shut down), not ambient globals.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheKey, CacheValue, ObjectCache};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Registry ==
/// Process-wide set of named caches sharing one clock.
///
/// Caches created through the registry have their background sweeper started
/// automatically and are stopped together by [`CacheRegistry::shutdown_all`].
pub struct CacheRegistry<K: CacheKey, V: CacheValue> {
    caches: RwLock<HashMap<String, Arc<ObjectCache<K, V>>>>,
    clock: Arc<dyn Clock>,
}

impl<K: CacheKey, V: CacheValue> CacheRegistry<K, V> {
    // == Constructor ==
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Registry on the system wall clock.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    // == Lookup Or Create ==
    /// Returns the cache for `config.name`, creating it on first use.
    ///
    /// An existing name returns the existing instance; the supplied
    /// configuration is ignored in that case. An empty name is rejected.
    pub async fn lookup_or_create(&self, config: CacheConfig) -> Result<Arc<ObjectCache<K, V>>> {
        if config.name.is_empty() {
            return Err(CacheError::InvalidArgument(
                "Cache name must not be empty".to_string(),
            ));
        }

        let mut caches = self.caches.write().await;
        if let Some(cache) = caches.get(&config.name) {
            return Ok(cache.clone());
        }

        let name = config.name.clone();
        let cache = Arc::new(ObjectCache::new(config, self.clock.clone()));
        cache.start_sweeper().await;
        caches.insert(name.clone(), cache.clone());
        info!(cache = %name, "Cache created");
        Ok(cache)
    }

    // == Get ==
    /// Returns the cache for `name` if it exists.
    pub async fn get(&self, name: &str) -> Option<Arc<ObjectCache<K, V>>> {
        self.caches.read().await.get(name).cloned()
    }

    // == Names ==
    /// Names of all live caches.
    pub async fn names(&self) -> Vec<String> {
        self.caches.read().await.keys().cloned().collect()
    }

    // == Shutdown ==
    /// Shuts down every cache: each sweeper is stopped with join semantics,
    /// then the registry drops its references.
    pub async fn shutdown_all(&self) {
        let caches: Vec<Arc<ObjectCache<K, V>>> = {
            let mut caches = self.caches.write().await;
            caches.drain().map(|(_, cache)| cache).collect()
        };
        for cache in caches {
            cache.shutdown().await;
        }
        info!("All caches shut down");
    }
}

impl<K: CacheKey, V: CacheValue> Default for CacheRegistry<K, V> {
    fn default() -> Self {
        Self::with_system_clock()
    }
}
