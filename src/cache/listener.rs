//! Cache Listener Module
//!
//! Observer interface for cache lifecycle events and the registry that fans
//! them out.
//!
//! Dispatch order across listeners is registration order. A listener that
//! fails must not prevent remaining listeners from receiving the event, nor
//! propagate the error to the caller that triggered the mutation: the
//! failure is logged and swallowed. Diagnostics carry keys only, never
//! values.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::cache::CacheKey;

// == Event Origin ==
/// Whether a mutation was initiated on this node or delivered by a
/// replication collaborator.
///
/// Remote-origin events must never re-trigger outbound replication; the tag
/// is threaded through every notify call rather than inferred from the call
/// site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// Mutation initiated by a caller on this node
    Local,
    /// Mutation delivered by the replication collaborator
    Remote,
}

// == Listener Context ==
/// Read-only view of the cache handed to listeners during a callback.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    cache_name: String,
    size: usize,
    max_size: usize,
    live_time_ms: u64,
    origin: EventOrigin,
}

impl ListenerContext {
    pub fn new(
        cache_name: String,
        size: usize,
        max_size: usize,
        live_time_ms: u64,
        origin: EventOrigin,
    ) -> Self {
        Self {
            cache_name,
            size,
            max_size,
            live_time_ms,
            origin,
        }
    }

    /// Name of the cache that fired the event.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Live entry count at the time the event was produced.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Configured capacity bound (0 = unbounded).
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Configured idle expiry bound in milliseconds (0 = disabled).
    pub fn live_time_ms(&self) -> u64 {
        self.live_time_ms
    }

    /// Whether the mutation was local or cluster-sourced.
    pub fn origin(&self) -> EventOrigin {
        self.origin
    }
}

// == Cache Listener Trait ==
/// Observer of cache lifecycle events. All methods default to no-ops so
/// implementors only override what they care about.
///
/// Listeners run synchronously on the thread of the triggering operation
/// (or the replication delivery task for remote events) and must therefore
/// be fast and non-blocking; queue anything heavier elsewhere.
pub trait CacheListener<K, V>: Send + Sync {
    fn on_put(&self, _ctx: &ListenerContext, _key: &K, _value: &V) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_get(&self, _ctx: &ListenerContext, _key: &K, _value: &V) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_remove(&self, _ctx: &ListenerContext, _key: &K, _value: &V) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_expire(&self, _ctx: &ListenerContext, _key: &K, _value: &V) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_clear(&self, _ctx: &ListenerContext) -> anyhow::Result<()> {
        Ok(())
    }
}

// == Listener Registry ==
/// Holds registered observers and dispatches events in registration order.
pub struct ListenerRegistry<K, V> {
    listeners: RwLock<Vec<Arc<dyn CacheListener<K, V>>>>,
}

impl<K: CacheKey, V> ListenerRegistry<K, V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    // == Register ==
    /// Appends a listener; it will receive all subsequent events.
    pub async fn register(&self, listener: Arc<dyn CacheListener<K, V>>) {
        self.listeners.write().await.push(listener);
    }

    /// Number of registered listeners.
    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }

    // == Dispatch ==
    pub async fn notify_put(&self, ctx: &ListenerContext, key: &K, value: &V) {
        for listener in self.listeners.read().await.iter() {
            if let Err(err) = listener.on_put(ctx, key, value) {
                report_failure(ctx, "on_put", Some(key), &err);
            }
        }
    }

    pub async fn notify_get(&self, ctx: &ListenerContext, key: &K, value: &V) {
        for listener in self.listeners.read().await.iter() {
            if let Err(err) = listener.on_get(ctx, key, value) {
                report_failure(ctx, "on_get", Some(key), &err);
            }
        }
    }

    pub async fn notify_remove(&self, ctx: &ListenerContext, key: &K, value: &V) {
        for listener in self.listeners.read().await.iter() {
            if let Err(err) = listener.on_remove(ctx, key, value) {
                report_failure(ctx, "on_remove", Some(key), &err);
            }
        }
    }

    pub async fn notify_expire(&self, ctx: &ListenerContext, key: &K, value: &V) {
        for listener in self.listeners.read().await.iter() {
            if let Err(err) = listener.on_expire(ctx, key, value) {
                report_failure(ctx, "on_expire", Some(key), &err);
            }
        }
    }

    pub async fn notify_clear(&self, ctx: &ListenerContext) {
        for listener in self.listeners.read().await.iter() {
            if let Err(err) = listener.on_clear(ctx) {
                report_failure::<K>(ctx, "on_clear", None, &err);
            }
        }
    }
}

impl<K: CacheKey, V> Default for ListenerRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs a swallowed listener failure. Keys appear for diagnostics; values
/// never do.
fn report_failure<K: CacheKey>(
    ctx: &ListenerContext,
    event: &str,
    key: Option<&K>,
    err: &anyhow::Error,
) {
    match key {
        Some(key) => warn!(
            cache = %ctx.cache_name(),
            event,
            ?key,
            error = %err,
            "Cache listener failed; continuing with remaining listeners"
        ),
        None => warn!(
            cache = %ctx.cache_name(),
            event,
            error = %err,
            "Cache listener failed; continuing with remaining listeners"
        ),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn ctx(origin: EventOrigin) -> ListenerContext {
        ListenerContext::new("test".to_string(), 1, 0, 0, origin)
    }

    struct Recording {
        events: Mutex<Vec<String>>,
        tag: &'static str,
    }

    impl CacheListener<String, String> for Recording {
        fn on_put(&self, _ctx: &ListenerContext, key: &String, _v: &String) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("{}:put:{}", self.tag, key));
            Ok(())
        }

        fn on_clear(&self, _ctx: &ListenerContext) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("{}:clear", self.tag));
            Ok(())
        }
    }

    struct Failing {
        calls: AtomicUsize,
    }

    impl CacheListener<String, String> for Failing {
        fn on_put(&self, _ctx: &ListenerContext, _k: &String, _v: &String) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("listener exploded")
        }
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let registry: ListenerRegistry<String, String> = ListenerRegistry::new();
        let first = Arc::new(Recording {
            events: Mutex::new(Vec::new()),
            tag: "first",
        });
        let second = Arc::new(Recording {
            events: Mutex::new(Vec::new()),
            tag: "second",
        });
        registry.register(first.clone()).await;
        registry.register(second.clone()).await;

        registry
            .notify_put(&ctx(EventOrigin::Local), &"k".to_string(), &"v".to_string())
            .await;

        assert_eq!(first.events.lock().unwrap().as_slice(), ["first:put:k"]);
        assert_eq!(second.events.lock().unwrap().as_slice(), ["second:put:k"]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let registry: ListenerRegistry<String, String> = ListenerRegistry::new();
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let recording = Arc::new(Recording {
            events: Mutex::new(Vec::new()),
            tag: "ok",
        });
        registry.register(failing.clone()).await;
        registry.register(recording.clone()).await;

        registry
            .notify_put(&ctx(EventOrigin::Local), &"k".to_string(), &"v".to_string())
            .await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recording.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_event_has_no_key() {
        let registry: ListenerRegistry<String, String> = ListenerRegistry::new();
        let recording = Arc::new(Recording {
            events: Mutex::new(Vec::new()),
            tag: "r",
        });
        registry.register(recording.clone()).await;

        registry.notify_clear(&ctx(EventOrigin::Remote)).await;

        assert_eq!(recording.events.lock().unwrap().as_slice(), ["r:clear"]);
    }

    #[test]
    fn test_context_exposes_origin() {
        let local = ctx(EventOrigin::Local);
        let remote = ctx(EventOrigin::Remote);
        assert_eq!(local.origin(), EventOrigin::Local);
        assert_eq!(remote.origin(), EventOrigin::Remote);
    }
}
