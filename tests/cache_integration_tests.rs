//! Integration Tests for the Cache Engine
//!
//! Exercises the full facade: eviction bounds, listener notifications,
//! selector-driven bulk removal, batch insertion and replication hooks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use obcache::{
    CacheConfig, CacheListener, CacheRegistry, EventOrigin, ListenerContext, ManualClock,
    NoticePhase, ObjectCache, RemoteNotice, ReplicationAgent,
};

// == Helper Functions ==

/// Initializes tracing output for a test run; safe to call repeatedly.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn manual_cache(config: CacheConfig) -> (Arc<ObjectCache<String, String>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    (Arc::new(ObjectCache::new(config, clock.clone())), clock)
}

/// Listener that records every event it sees, tagged with origin.
#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

fn origin_tag(ctx: &ListenerContext) -> &'static str {
    match ctx.origin() {
        EventOrigin::Local => "local",
        EventOrigin::Remote => "remote",
    }
}

impl CacheListener<String, String> for RecordingListener {
    fn on_put(&self, ctx: &ListenerContext, key: &String, _v: &String) -> anyhow::Result<()> {
        self.record(format!("put:{}:{}", origin_tag(ctx), key));
        Ok(())
    }

    fn on_get(&self, ctx: &ListenerContext, key: &String, _v: &String) -> anyhow::Result<()> {
        self.record(format!("get:{}:{}", origin_tag(ctx), key));
        Ok(())
    }

    fn on_remove(&self, ctx: &ListenerContext, key: &String, _v: &String) -> anyhow::Result<()> {
        self.record(format!("remove:{}:{}", origin_tag(ctx), key));
        Ok(())
    }

    fn on_expire(&self, ctx: &ListenerContext, key: &String, _v: &String) -> anyhow::Result<()> {
        self.record(format!("expire:{}:{}", origin_tag(ctx), key));
        Ok(())
    }

    fn on_clear(&self, ctx: &ListenerContext) -> anyhow::Result<()> {
        self.record(format!("clear:{}", origin_tag(ctx)));
        Ok(())
    }
}

/// Replication double that counts outbound propagations.
#[derive(Default)]
struct CountingAgent {
    puts: AtomicUsize,
    removes: AtomicUsize,
    clears: AtomicUsize,
}

#[async_trait]
impl ReplicationAgent<String, String> for CountingAgent {
    async fn propagate_put(
        &self,
        _cache: &str,
        _key: &String,
        _v: &String,
        _generation: u64,
    ) -> anyhow::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn propagate_remove(&self, _cache: &str, _key: &String) -> anyhow::Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn propagate_clear(&self, _cache: &str) -> anyhow::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Replication double that records outbound puts verbatim, the way a real
/// transport would carry them to other members.
#[derive(Default)]
struct CapturingAgent {
    puts: Mutex<Vec<(String, String, u64)>>,
}

#[async_trait]
impl ReplicationAgent<String, String> for CapturingAgent {
    async fn propagate_put(
        &self,
        _cache: &str,
        key: &String,
        value: &String,
        generation: u64,
    ) -> anyhow::Result<()> {
        self.puts
            .lock()
            .unwrap()
            .push((key.clone(), value.clone(), generation));
        Ok(())
    }

    async fn propagate_remove(&self, _cache: &str, _key: &String) -> anyhow::Result<()> {
        Ok(())
    }

    async fn propagate_clear(&self, _cache: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

// == Eviction Bounds ==

#[tokio::test]
async fn test_lru_tie_break_evicts_least_recently_accessed() {
    let (cache, clock) = manual_cache(CacheConfig::new("lru").with_max_size(3));

    for key in ["a", "b", "c", "d"] {
        cache.put(key.to_string(), "v".to_string()).await.unwrap();
        clock.advance(10);
    }

    assert_eq!(cache.get_cache_size().await, 3);
    assert!(cache.get(&"a".to_string()).await.is_none());
    assert!(cache.get(&"b".to_string()).await.is_some());
    assert!(cache.get(&"c".to_string()).await.is_some());
    assert!(cache.get(&"d".to_string()).await.is_some());
}

#[tokio::test]
async fn test_idle_expiry_via_background_sweeper() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let config = CacheConfig::new("idle")
        .with_time_to_live_ms(500)
        .with_sweep_interval_ms(50);
    let cache = Arc::new(ObjectCache::new(config, clock.clone()));

    cache.put("a".to_string(), "v".to_string()).await.unwrap();
    cache.start_sweeper().await;

    clock.advance(600);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.get_cache_size().await, 0);
    cache.shutdown().await;
}

#[tokio::test]
async fn test_age_expiry_dominates_repeated_access() {
    let (cache, clock) = manual_cache(CacheConfig::new("age").with_max_age_ms(1_000));

    cache.put("hot".to_string(), "v".to_string()).await.unwrap();
    for _ in 0..9 {
        clock.advance(100);
        assert!(cache.get(&"hot".to_string()).await.is_some());
    }
    clock.advance(100);

    assert_eq!(cache.sweep_now().await, 1);
    assert_eq!(cache.get_cache_size().await, 0);
}

/// The combined scenario: maxSize=3, timeToLive=500ms, maxAge=1000ms.
/// Six inserts stabilize at three entries (LRU evicted in order), and after
/// going idle the sweep drains the cache to zero.
#[tokio::test]
async fn test_combined_bounds_scenario() {
    let (cache, clock) = manual_cache(
        CacheConfig::new("combined")
            .with_max_size(3)
            .with_time_to_live_ms(500)
            .with_max_age_ms(1_000),
    );
    let listener = Arc::new(RecordingListener::default());
    cache.add_listener(listener.clone()).await;

    for key in ["a", "b", "c", "d", "e", "f"] {
        cache.put(key.to_string(), "v".to_string()).await.unwrap();
        clock.advance(10);
    }

    assert_eq!(cache.get_cache_size().await, 3);
    let evictions: Vec<String> = listener
        .events()
        .into_iter()
        .filter(|e| e.starts_with("expire:"))
        .collect();
    assert_eq!(
        evictions,
        vec!["expire:local:a", "expire:local:b", "expire:local:c"]
    );

    // 500ms idle drains the survivors.
    clock.advance(500);
    cache.sweep_now().await;
    assert_eq!(cache.get_cache_size().await, 0);
}

// == Batch Insertion ==

#[tokio::test]
async fn test_put_all_notifies_only_after_commit() {
    let (cache, _clock) = manual_cache(CacheConfig::new("batch"));
    let listener = Arc::new(RecordingListener::default());
    cache.add_listener(listener.clone()).await;

    let mut entries = HashMap::new();
    entries.insert("x".to_string(), "1".to_string());
    entries.insert("y".to_string(), "2".to_string());
    cache.put_all(entries).await.unwrap();

    let mut puts = listener.events();
    puts.sort();
    assert_eq!(puts, vec!["put:local:x", "put:local:y"]);
    assert_eq!(cache.get_cache_size().await, 2);
}

#[tokio::test]
async fn test_put_all_with_invalid_key_is_all_or_nothing() {
    let (cache, _clock) = manual_cache(CacheConfig::new("batch"));
    let listener = Arc::new(RecordingListener::default());
    cache.add_listener(listener.clone()).await;

    let mut entries = HashMap::new();
    for i in 0..9 {
        entries.insert(format!("k{i}"), "v".to_string());
    }
    entries.insert(String::new(), "v".to_string());

    assert!(cache.put_all(entries).await.is_err());
    assert_eq!(cache.get_cache_size().await, 0);
    assert!(listener.events().is_empty());
}

// == Selector ==

#[tokio::test]
async fn test_prefix_selector_removes_matching_keys_only() {
    let (cache, _clock) = manual_cache(CacheConfig::new("select"));

    for key in ["session:1", "session:2", "user:1"] {
        cache.put(key.to_string(), "v".to_string()).await.unwrap();
    }

    let selector = obcache::ExpireKeyStartWithSelector::new("session:");
    cache.select(&selector).await.unwrap();

    assert_eq!(cache.get_cache_size().await, 1);
    assert!(cache.get(&"user:1".to_string()).await.is_some());
    assert!(cache.get(&"session:1".to_string()).await.is_none());
    assert!(cache.get(&"session:2".to_string()).await.is_none());
}

// == Listeners & Replication ==

#[tokio::test]
async fn test_local_mutations_propagate_outbound_once() {
    let (cache, _clock) = manual_cache(CacheConfig::new("repl").with_replicated(true));
    let agent = Arc::new(CountingAgent::default());
    cache.set_replication_agent(agent.clone()).await;

    cache.put("a".to_string(), "v".to_string()).await.unwrap();
    cache.remove(&"a".to_string()).await.unwrap();
    cache.clear().await.unwrap();

    assert_eq!(agent.puts.load(Ordering::SeqCst), 1);
    assert_eq!(agent.removes.load(Ordering::SeqCst), 1);
    assert_eq!(agent.clears.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_events_never_echo_outbound() {
    let (cache, _clock) = manual_cache(CacheConfig::new("repl").with_replicated(true));
    let agent = Arc::new(CountingAgent::default());
    let listener = Arc::new(RecordingListener::default());
    cache.set_replication_agent(agent.clone()).await;
    cache.add_listener(listener.clone()).await;

    cache
        .apply_remote(
            RemoteNotice::Put {
                key: "a".to_string(),
                value: "v".to_string(),
                generation: 1,
            },
            NoticePhase::Post,
        )
        .await;
    cache
        .apply_remote(
            RemoteNotice::Remove {
                key: "a".to_string(),
            },
            NoticePhase::Pre,
        )
        .await;

    // Listeners saw both events, tagged remote; nothing went back out.
    assert_eq!(listener.events(), vec!["put:remote:a", "remove:remote:a"]);
    assert_eq!(agent.puts.load(Ordering::SeqCst), 0);
    assert_eq!(agent.removes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_echo_of_local_put_is_suppressed() {
    let (cache, _clock) = manual_cache(CacheConfig::new("repl").with_replicated(true));
    let agent = Arc::new(CapturingAgent::default());
    let listener = Arc::new(RecordingListener::default());
    cache.set_replication_agent(agent.clone()).await;
    cache.add_listener(listener.clone()).await;

    cache.put("a".to_string(), "v".to_string()).await.unwrap();
    let (key, value, generation) = agent.puts.lock().unwrap()[0].clone();

    // The echo carries exactly what went out; it must not re-apply.
    cache
        .apply_remote(
            RemoteNotice::Put {
                key,
                value,
                generation,
            },
            NoticePhase::Post,
        )
        .await;

    assert_eq!(listener.events(), vec!["put:local:a"]);
    assert_eq!(cache.get_cache_size().await, 1);
}

#[tokio::test]
async fn test_remote_redelivery_is_idempotent() {
    let (cache, _clock) = manual_cache(CacheConfig::new("repl"));
    let listener = Arc::new(RecordingListener::default());
    cache.add_listener(listener.clone()).await;

    let notice = RemoteNotice::Put {
        key: "a".to_string(),
        value: "v".to_string(),
        generation: 7,
    };
    cache.apply_remote(notice.clone(), NoticePhase::Post).await;
    cache.apply_remote(notice, NoticePhase::Post).await;

    // A single notification for the duplicate delivery.
    assert_eq!(listener.events(), vec!["put:remote:a"]);
    assert_eq!(cache.get_cache_size().await, 1);
}

#[tokio::test]
async fn test_remove_of_absent_key_fires_no_event() {
    let (cache, _clock) = manual_cache(CacheConfig::new("quiet"));
    let listener = Arc::new(RecordingListener::default());
    cache.add_listener(listener.clone()).await;

    assert_eq!(cache.remove(&"ghost".to_string()).await.unwrap(), None);
    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn test_clear_fires_single_event_not_per_key() {
    let (cache, _clock) = manual_cache(CacheConfig::new("clear"));
    let listener = Arc::new(RecordingListener::default());

    cache.put("a".to_string(), "v".to_string()).await.unwrap();
    cache.put("b".to_string(), "v".to_string()).await.unwrap();
    cache.add_listener(listener.clone()).await;
    cache.clear().await.unwrap();

    assert_eq!(listener.events(), vec!["clear:local"]);
}

// == Registry ==

#[tokio::test]
async fn test_registry_lifecycle_end_to_end() {
    init_tracing();
    let registry: CacheRegistry<String, String> = CacheRegistry::with_system_clock();

    let sessions = registry
        .lookup_or_create(
            CacheConfig::new("sessions")
                .with_time_to_live_ms(200)
                .with_sweep_interval_ms(50),
        )
        .await
        .unwrap();
    sessions
        .put("s1".to_string(), "v".to_string())
        .await
        .unwrap();

    // Entry expires and the registry-started sweeper reaps it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(sessions.get_cache_size().await, 0);

    registry.shutdown_all().await;
    assert!(sessions.is_closed());
}
