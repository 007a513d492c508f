//! Knowledge Cache Facade
//!
//! Public API composing the entry store, expiry policy, compressor,
//! single-flight registry and stats collector.
//!
//! # Locking
//! The entry store sits behind one `parking_lot::Mutex` held only for
//! metadata updates. Serialization, compression and the loader itself
//! always run outside it.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::compress::{Compressor, Payload};
use crate::cache::entry::current_timestamp_ms;
use crate::cache::expiry::ExpiryPolicy;
use crate::cache::single_flight::{Role, SingleFlight};
use crate::cache::stats::{StatsCollector, StatsSnapshot};
use crate::cache::store::{EntryStore, Lookup};
use crate::cache::EntryMetadata;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Serialized value shared with every waiter of a load.
type LoadOutcome = Result<Arc<Vec<u8>>>;

// == Warm Entry ==
/// Seed value for [`KnowledgeCache::warm`].
#[derive(Debug, Clone)]
pub struct WarmEntry<V> {
    pub key: String,
    pub value: V,
    /// Falls back to the default TTL when `None`
    pub ttl: Option<Duration>,
}

impl<V> WarmEntry<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

struct CacheInner {
    store: Mutex<EntryStore>,
    flights: SingleFlight<LoadOutcome>,
    stats: StatsCollector,
    compressor: Compressor,
    expiry: ExpiryPolicy,
    top_hit_keys: usize,
}

// == Knowledge Cache ==
/// In-process cache for knowledge-broker responses.
///
/// Cloning is cheap and every clone shares the same storage, so one
/// instance is built at startup and handed to whoever needs it.
#[derive(Clone)]
pub struct KnowledgeCache {
    inner: Arc<CacheInner>,
}

impl KnowledgeCache {
    // == Constructor ==
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store: Mutex::new(EntryStore::new(
                    config.max_cache_size,
                    config.enable_hit_tracking,
                )),
                flights: SingleFlight::new(),
                stats: StatsCollector::new(),
                compressor: Compressor::new(
                    config.enable_compression,
                    config.compression_threshold,
                ),
                expiry: ExpiryPolicy::from_hours(config.default_expiry_hours),
                top_hit_keys: config.top_hit_keys,
            }),
        }
    }

    // == Get Or Load ==
    /// Returns the cached value for `key`, running `loader` on a miss.
    ///
    /// Concurrent misses on the same key share one `loader` invocation. A
    /// failed load is not cached; every waiter receives the same
    /// [`CacheError::LoadFailed`] and the next call retries.
    ///
    /// The load runs as its own tokio task, so it completes and publishes
    /// even if every waiter stops waiting. Must be called from within a
    /// tokio runtime.
    ///
    /// A `set` or `invalidate` of `key` made while its load is in flight is
    /// overwritten when the load publishes: the last writer wins.
    pub async fn get_or_load<V, F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.get_or_load_with_ttl(key, None, loader).await
    }

    /// [`KnowledgeCache::get_or_load`] with a per-entry TTL override.
    pub async fn get_or_load_with_ttl<V, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let started = Instant::now();
        let result = self.load_through(key, ttl, loader).await;
        self.inner.stats.record_response_time(started.elapsed());
        result
    }

    async fn load_through<V, F, Fut>(&self, key: &str, ttl: Option<Duration>, loader: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        if let Some(raw) = self.inner.lookup(key, true) {
            return Ok(serde_json::from_slice(&raw)?);
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let (flight, role) = self.inner.flights.join_or_start(key, move || {
            let task = tokio::spawn(inner.run_load(owned_key.clone(), ttl, loader));
            async move {
                task.await.unwrap_or_else(|err| {
                    if err.is_panic() {
                        error!("Loader panicked for '{}'", owned_key);
                        Err(CacheError::Internal(format!("loader for '{}' panicked", owned_key)))
                    } else {
                        Err(CacheError::Internal(format!("load for '{}' was cancelled", owned_key)))
                    }
                })
            }
            .boxed()
        });
        if role == Role::Follower {
            debug!("Joining in-flight load for '{}'", key);
        }

        let raw = flight.await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    // == Get ==
    /// Reads `key` without a loader. Counts a hit or a miss.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        let started = Instant::now();
        let raw = self.inner.lookup(key, true);
        self.inner.stats.record_response_time(started.elapsed());
        match raw {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set<V>(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let raw = serde_json::to_vec(value)?;
        self.inner.store_raw(key, raw, ttl);
        Ok(())
    }

    // == Invalidate ==
    /// Removes `key`. Returns whether an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.store.lock().remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry and returns how many there were. Counters are
    /// kept; see [`KnowledgeCache::reset_stats`].
    pub fn clear(&self) -> usize {
        let removed = {
            let mut store = self.inner.store.lock();
            let removed = store.len();
            store.clear();
            removed
        };
        info!("Cache cleared ({} entries)", removed);
        removed
    }

    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    // == Warm ==
    /// Bulk-populates the cache, bypassing single-flight and stats.
    ///
    /// When the seed holds more distinct keys than the cache can keep, only
    /// the most recently supplied ones are retained; a repeated key keeps its
    /// last value. Returns the number of entries written.
    pub fn warm<V, I>(&self, seed: I) -> Result<usize>
    where
        V: Serialize,
        I: IntoIterator<Item = WarmEntry<V>>,
    {
        let capacity = self.capacity();
        let seed: Vec<WarmEntry<V>> = seed.into_iter().collect();
        let supplied = seed.len();

        let mut seen = HashSet::new();
        let mut newest_first = Vec::with_capacity(capacity.min(supplied));
        for entry in seed.into_iter().rev() {
            if newest_first.len() == capacity {
                break;
            }
            if seen.insert(entry.key.clone()) {
                newest_first.push(entry);
            }
        }

        // Oldest first, so the newest seed ends up most recently used.
        let encoded = newest_first
            .into_iter()
            .rev()
            .map(|entry| -> Result<(String, Payload, Duration)> {
                let raw = serde_json::to_vec(&entry.value)?;
                Ok((
                    entry.key,
                    self.inner.compressor.encode(raw),
                    self.inner.expiry.ttl_for(entry.ttl),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let written = encoded.len();
        let now = current_timestamp_ms();
        {
            let mut store = self.inner.store.lock();
            for (key, payload, ttl) in encoded {
                store.insert(key, payload, ttl, now);
            }
        }

        info!("Warmed cache with {} of {} seed entries", written, supplied);
        Ok(written)
    }

    // == Stats ==
    pub fn stats(&self) -> StatsSnapshot {
        let (total_entries, memory_usage, top_hit_keys, compressed_entries, max_cache_size) = {
            let store = self.inner.store.lock();
            let now = current_timestamp_ms();
            (
                store.live_len(now),
                store.memory_usage(),
                store.top_hit_keys(self.inner.top_hit_keys, now),
                store.compressed_count(),
                store.capacity(),
            )
        };
        let stats = &self.inner.stats;

        StatsSnapshot {
            total_entries,
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            average_response_time: stats.average_response_ms(),
            memory_usage,
            top_hit_keys,
            hits: stats.hits(),
            misses: stats.misses(),
            evictions: stats.evictions(),
            max_cache_size,
            compressed_entries,
        }
    }

    // == Sweep ==
    /// Eagerly removes expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.store.lock().purge_expired(current_timestamp_ms())
    }

    // == Inspection ==
    /// Metadata for `key` without touching recency or stats.
    pub fn peek(&self, key: &str) -> Option<EntryMetadata> {
        self.inner.store.lock().peek(key).map(|entry| entry.metadata())
    }

    /// Stored keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.inner.store.lock().keys_by_recency()
    }

    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.store.lock().capacity()
    }

    /// Number of keys currently being loaded.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.len()
    }
}

impl std::fmt::Debug for KnowledgeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeCache")
            .field("entries", &self.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl CacheInner {
    /// Decoded bytes of a live entry, if any.
    fn lookup(&self, key: &str, record: bool) -> Option<Vec<u8>> {
        let now = current_timestamp_ms();
        let found = match self.store.lock().get(key, now) {
            Lookup::Hit(entry) => Some((entry.payload.clone(), entry.compressed)),
            Lookup::Expired => {
                debug!("Entry '{}' expired", key);
                None
            }
            Lookup::Missing => None,
        };

        let raw = found.and_then(|(bytes, compressed)| {
            match Compressor::decode(&bytes, compressed) {
                Ok(raw) => Some(raw),
                Err(err) => {
                    warn!("Dropping unreadable entry '{}': {}", key, err);
                    self.store.lock().remove(key);
                    None
                }
            }
        });

        if record {
            match raw {
                Some(_) => self.stats.record_hit(),
                None => self.stats.record_miss(),
            }
        }
        raw
    }

    fn store_raw(&self, key: &str, raw: Vec<u8>, ttl: Option<Duration>) {
        let payload = self.compressor.encode(raw);
        let ttl = self.expiry.ttl_for(ttl);
        let evicted = self
            .store
            .lock()
            .insert(key.to_string(), payload, ttl, current_timestamp_ms());

        if !evicted.is_empty() {
            debug!("Evicted {} entries: {:?}", evicted.len(), evicted);
            self.stats.record_evictions(evicted.len());
        }
    }

    /// Body of a single-flight load, run as a spawned task. Publishes the
    /// value before the flight registration is cleared.
    async fn run_load<V, F, Fut>(
        self: Arc<Self>,
        key: String,
        ttl: Option<Duration>,
        loader: F,
    ) -> LoadOutcome
    where
        V: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let _registration = FlightRegistration {
            flights: &self.flights,
            key: &key,
        };

        // A caller that missed just before the previous flight published
        // starts a new flight; serve it the published value.
        if let Some(raw) = self.lookup(&key, false) {
            return Ok(Arc::new(raw));
        }

        debug!("Loading '{}'", key);
        match loader().await {
            Ok(value) => {
                let raw = serde_json::to_vec(&value)?;
                self.store_raw(&key, raw.clone(), ttl);
                Ok(Arc::new(raw))
            }
            Err(err) => {
                warn!("Loader failed for '{}': {:#}", key, err);
                Err(CacheError::load_failed(key.as_str(), err))
            }
        }
    }
}

/// Clears a flight registration when the load finishes, fails or panics.
struct FlightRegistration<'a> {
    flights: &'a SingleFlight<LoadOutcome>,
    key: &'a str,
}

impl Drop for FlightRegistration<'_> {
    fn drop(&mut self) {
        self.flights.finish(self.key);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(max_cache_size: usize) -> CacheConfig {
        CacheConfig {
            max_cache_size,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_set_evicts_least_recently_used() {
        let cache = KnowledgeCache::new(&config(2));
        cache.set("a", &1, None).unwrap();
        cache.set("b", &2, None).unwrap();
        cache.set("c", &3, None).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.peek("a").is_none());
        assert_eq!(cache.get::<i32>("b").unwrap(), Some(2));
        assert_eq!(cache.get::<i32>("c").unwrap(), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_read_refreshes_recency() {
        let cache = KnowledgeCache::new(&config(3));
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            cache.set(key, &i, None).unwrap();
        }
        assert_eq!(cache.get::<usize>("a").unwrap(), Some(0));

        cache.set("d", &3, None).unwrap();
        assert!(cache.peek("a").is_some());
        assert!(cache.peek("b").is_none());
        assert_eq!(cache.keys(), vec!["d", "a", "c"]);
    }

    #[test]
    fn test_zero_expiry_hours_expires_immediately() {
        let cache = KnowledgeCache::new(&CacheConfig {
            default_expiry_hours: 0,
            ..CacheConfig::default()
        });
        cache.set("x", &1, None).unwrap();
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(cache.get::<i32>("x").unwrap(), None);
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_counts_as_miss() {
        let cache = KnowledgeCache::new(&config(10));
        cache.set("x", &"docs", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let before = cache.stats().misses;
        assert_eq!(cache.get::<String>("x").unwrap(), None);
        assert_eq!(cache.stats().misses, before + 1);
        assert!(cache.peek("x").is_none());
    }

    #[test]
    fn test_hit_rate_accounting() {
        let cache = KnowledgeCache::new(&config(10));
        cache.set("a", &1, None).unwrap();
        for _ in 0..3 {
            assert_eq!(cache.get::<i32>("a").unwrap(), Some(1));
        }
        assert_eq!(cache.get::<i32>("missing").unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.hit_rate, 0.75);
        assert_eq!(stats.miss_rate, 0.25);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_large_value_is_compressed() {
        let cache = KnowledgeCache::new(&config(10));
        let doc = "async fn handler() {}\n".repeat(500);
        cache.set("doc", &doc, None).unwrap();

        let meta = cache.peek("doc").unwrap();
        assert!(meta.compressed);
        assert!(meta.size_bytes < doc.len());
        assert_eq!(cache.get::<String>("doc").unwrap(), Some(doc));
        assert_eq!(cache.stats().compressed_entries, 1);
    }

    #[test]
    fn test_compression_disabled_stores_raw() {
        let cache = KnowledgeCache::new(&CacheConfig {
            enable_compression: false,
            ..CacheConfig::default()
        });
        let doc = "x".repeat(10 * 1024);
        cache.set("doc", &doc, None).unwrap();

        let meta = cache.peek("doc").unwrap();
        assert!(!meta.compressed);
        assert_eq!(meta.size_bytes, doc.len() + 2);
    }

    #[test]
    fn test_memory_usage_tracks_stored_bytes() {
        let cache = KnowledgeCache::new(&config(10));
        cache.set("a", &"abc", None).unwrap();
        cache.set("b", &12345, None).unwrap();
        // "\"abc\"" is 5 bytes, "12345" is 5 bytes
        assert_eq!(cache.stats().memory_usage, 10);

        cache.invalidate("a");
        assert_eq!(cache.stats().memory_usage, 5);
    }

    #[test]
    fn test_top_hit_keys() {
        let cache = KnowledgeCache::new(&CacheConfig {
            top_hit_keys: 2,
            ..config(10)
        });
        for key in ["a", "b", "c"] {
            cache.set(key, &0, None).unwrap();
        }
        for _ in 0..3 {
            cache.get::<i32>("c").unwrap();
        }
        cache.get::<i32>("a").unwrap();
        cache.get::<i32>("b").unwrap();

        assert_eq!(cache.stats().top_hit_keys, vec!["c", "b"]);
    }

    #[test]
    fn test_hit_tracking_disabled_keeps_aggregate_stats() {
        let cache = KnowledgeCache::new(&CacheConfig {
            enable_hit_tracking: false,
            ..config(10)
        });
        cache.set("a", &0, None).unwrap();
        cache.get::<i32>("a").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert!(stats.top_hit_keys.is_empty());
        assert_eq!(cache.peek("a").unwrap().hit_count, 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = KnowledgeCache::new(&config(10));
        cache.set("a", &1, None).unwrap();
        cache.set("b", &2, None).unwrap();

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().memory_usage, 0);
    }

    #[test]
    fn test_warm_keeps_most_recent_seed_entries() {
        let cache = KnowledgeCache::new(&config(100));
        let seed = (1..=200).map(|i| WarmEntry::new(format!("k{}", i), i));

        assert_eq!(cache.warm(seed).unwrap(), 100);
        assert_eq!(cache.len(), 100);
        assert!(cache.peek("k100").is_none());
        assert!(cache.peek("k101").is_some());
        assert!(cache.peek("k200").is_some());
        assert_eq!(cache.keys().first().map(String::as_str), Some("k200"));
    }

    #[test]
    fn test_warm_bypasses_stats() {
        let cache = KnowledgeCache::new(&config(2));
        cache.set("old", &0, None).unwrap();
        let seed = vec![WarmEntry::new("a", 1), WarmEntry::new("b", 2)];
        cache.warm(seed).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses + stats.evictions, 0);
        assert_eq!(stats.total_entries, 2);
        assert!(cache.peek("old").is_none());
    }

    #[test]
    fn test_warm_repeated_key_keeps_last_value() {
        let cache = KnowledgeCache::new(&config(2));
        let seed = vec![
            WarmEntry::new("a", 1),
            WarmEntry::new("b", 2),
            WarmEntry::new("a", 3),
        ];
        assert_eq!(cache.warm(seed).unwrap(), 2);
        assert_eq!(cache.get::<i32>("a").unwrap(), Some(3));
        assert_eq!(cache.get::<i32>("b").unwrap(), Some(2));
    }

    #[test]
    fn test_warm_honours_ttl_override() {
        let cache = KnowledgeCache::new(&config(10));
        cache
            .warm(vec![WarmEntry::new("short", 1).with_ttl(Duration::from_millis(1))])
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_type_mismatch_is_serialization_error() {
        let cache = KnowledgeCache::new(&config(10));
        cache.set("a", &"text", None).unwrap();
        let result = cache.get::<u64>("a");
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_get_or_load_caches_value() {
        let cache = KnowledgeCache::new(&config(10));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value: String = cache
                .get_or_load("docs:axum", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Router::new()".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "Router::new()");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loads_run_once() {
        let cache = KnowledgeCache::new(&config(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_load("k", move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(42u32)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_is_shared_and_not_cached() {
        let cache = KnowledgeCache::new(&config(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<u32, _>(anyhow::anyhow!("broker timed out"))
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_load("k", failing(calls.clone())),
            cache.get_or_load("k", failing(calls.clone())),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in [a, b] {
            match result {
                Err(CacheError::LoadFailed { key, cause }) => {
                    assert_eq!(key, "k");
                    assert_eq!(cause.to_string(), "broker timed out");
                }
                other => panic!("expected LoadFailed, got {:?}", other),
            }
        }
        assert!(cache.peek("k").is_none());
        assert_eq!(cache.in_flight(), 0);

        // The next call retries from scratch
        let value = cache.get_or_load("k", || async { Ok(7u32) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_panicking_loader_becomes_error() {
        let cache = KnowledgeCache::new(&config(10));

        let result = cache
            .get_or_load("k", || async {
                let missing: Option<u32> = None;
                Ok(missing.expect("loader bug"))
            })
            .await;
        assert!(matches!(result, Err(CacheError::Internal(_))));
        assert_eq!(cache.in_flight(), 0);

        let value = cache.get_or_load("k", || async { Ok(3u32) }).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_abandoned_load_still_publishes() {
        let cache = KnowledgeCache::new(&config(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = calls.clone();
        let waited = tokio::time::timeout(
            Duration::from_millis(5),
            cache.get_or_load("k", move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(11u32)
            }),
        )
        .await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.peek("k").is_some());

        let value = cache
            .get_or_load("k", || async { Ok(99u32) })
            .await
            .unwrap();
        assert_eq!(value, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_during_load_is_overwritten_by_load() {
        let cache = KnowledgeCache::new(&config(10));

        let loading = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("k", || async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(1u32)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.set("k", &2u32, None).unwrap();

        assert_eq!(loading.await.unwrap().unwrap(), 1);
        assert_eq!(cache.get::<u32>("k").unwrap(), Some(1));
    }

    #[test]
    fn test_expired_entries_make_room_without_evicting() {
        let cache = KnowledgeCache::new(&config(2));
        cache.set("live", &1, None).unwrap();
        cache
            .set("dead", &2, Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        cache.set("new", &3, None).unwrap();

        assert_eq!(cache.keys(), vec!["new", "live"]);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get::<i32>("live").unwrap(), Some(1));
    }

    #[test]
    fn test_stats_skip_expired_entries() {
        let cache = KnowledgeCache::new(&config(10));
        cache.set("live", &1, None).unwrap();
        cache
            .set("dead", &2, Some(Duration::from_millis(30)))
            .unwrap();
        cache.get::<i32>("dead").unwrap();
        cache.get::<i32>("live").unwrap();
        std::thread::sleep(Duration::from_millis(60));

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.top_hit_keys, vec!["live"]);
        // Not yet swept, so its bytes are still held
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_different_keys_load_in_parallel() {
        let cache = KnowledgeCache::new(&config(10));
        let started = Instant::now();

        let slow = |v: u32| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(v)
            }
        };
        let (a, b) = tokio::join!(cache.get_or_load("a", slow(1)), cache.get_or_load("b", slow(2)));

        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert!(started.elapsed() < Duration::from_millis(95));
    }

    #[tokio::test]
    async fn test_get_or_load_with_ttl_expires() {
        let cache = KnowledgeCache::new(&config(10));
        let value: u32 = cache
            .get_or_load_with_ttl("k", Some(Duration::from_millis(1)), || async { Ok(1u32) })
            .await
            .unwrap();
        assert_eq!(value, 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let value: u32 = cache
            .get_or_load("k", || async { Ok(2u32) })
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_average_response_time_recorded() {
        let cache = KnowledgeCache::new(&config(10));
        let _: u32 = cache
            .get_or_load("k", || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(1u32)
            })
            .await
            .unwrap();

        assert!(cache.stats().average_response_time >= 20.0);
    }
}
