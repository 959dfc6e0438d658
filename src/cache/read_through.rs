//! # Read-Through Cache
//!
//! Generic keyed cache with TTL expiry, least-recently-accessed eviction and
//! single-flight loading: concurrent misses on one key wait on a per-key lock
//! and re-check the cache, so only the first caller reaches the loader.
//!
//! Failed loads (including "not found") are never cached.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    cached_at: Instant,
    last_accessed: Instant,
    access_count: u64,
}

/// Point-in-time counters for a cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    /// Misses that were satisfied by another caller's in-flight load
    pub coalesced: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

pub struct ReadThroughCache<K, V> {
    name: &'static str,
    entries: RwLock<HashMap<K, CachedEntry<V>>>,
    inflight: DashMap<K, Arc<tokio::sync::Mutex<()>>>,
    ttl: Duration,
    max_entries: usize,
    single_flight: bool,
    /// Bumped on every invalidation so loads that started earlier do not
    /// repopulate the cache with stale data.
    epoch: AtomicU64,
    counters: Counters,
}

impl<K, V> std::fmt::Debug for ReadThroughCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("single_flight", &self.single_flight)
            .finish()
    }
}

impl<K, V> ReadThroughCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            inflight: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            single_flight: true,
            epoch: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fresh cached value, recording a hit or a miss
    pub fn get(&self, key: &K) -> Option<V> {
        match self.lookup(key) {
            Some(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Return the cached value for `key`, or run `loader` and cache its result.
    ///
    /// Loader errors are returned unchanged and leave the cache untouched.
    pub async fn get_or_load<F, Fut, E>(&self, key: &K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        if !self.single_flight {
            return self.load(key, loader).await;
        }

        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        let result = {
            let _guard = gate.lock().await;
            match self.lookup(key) {
                Some(value) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, key = ?key, "Coalesced with in-flight load");
                    Ok(value)
                }
                None => self.load(key, loader).await,
            }
        };

        // The map holds one reference and this call holds another
        self.inflight
            .remove_if(key, |_, gate| Arc::strong_count(gate) <= 2);

        result
    }

    async fn load<F, Fut, E>(&self, key: &K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let epoch = self.epoch.load(Ordering::Acquire);
        self.counters.loads.fetch_add(1, Ordering::Relaxed);

        match loader().await {
            Ok(value) => {
                if self.epoch.load(Ordering::Acquire) == epoch {
                    self.insert(key.clone(), value.clone());
                } else {
                    debug!(cache = self.name, key = ?key, "Discarding load raced by invalidation");
                }
                Ok(value)
            }
            Err(error) => {
                self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    /// Fresh cached value without recording stats or access
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| now.duration_since(entry.cached_at) <= self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.insert(
            key,
            CachedEntry {
                value,
                cached_at: now,
                last_accessed: now,
                access_count: 0,
            },
        );

        while entries.len() > self.max_entries {
            let Some(lru_key) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&lru_key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, key = ?lru_key, "Evicted least recently used entry");
        }
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.write().remove(key).is_some()
    }

    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.write().clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.cached_at) <= self.ttl);
        let removed = before - entries.len();
        self.counters
            .expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Access count of a cached entry, if present
    pub fn access_count(&self, key: &K) -> Option<u64> {
        self.entries.read().get(key).map(|entry| entry.access_count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            load_failures: self.counters.load_failures.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let expired = match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.cached_at) <= self.ttl => {
                entry.access_count += 1;
                entry.last_accessed = now;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn cache(ttl_secs: u64, max: usize) -> ReadThroughCache<String, u32> {
        ReadThroughCache::new("test", Duration::from_secs(ttl_secs), max)
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = cache(60, 10);
        let calls = AtomicUsize::new(0);
        let key = "a".to_string();

        for _ in 0..3 {
            let value = cache
                .get_or_load(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.access_count(&key), Some(2));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = cache(60, 10);
        let key = "missing".to_string();

        let first = cache
            .get_or_load(&key, || async { Err::<u32, _>("not found") })
            .await;
        assert_eq!(first, Err("not found"));
        assert!(cache.is_empty());

        let second = cache
            .get_or_load(&key, || async { Ok::<_, &str>(1) })
            .await;
        assert_eq!(second, Ok(1));
        assert_eq!(cache.stats().load_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_reloaded() {
        let cache = cache(5, 10);
        let key = "a".to_string();
        cache.insert(key.clone(), 1);
        assert_eq!(cache.get(&key), Some(1));

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.get(&key), None);
        let value = cache
            .get_or_load(&key, || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recently_accessed() {
        let cache = cache(60, 2);
        cache.insert("a".to_string(), 1);
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.insert("b".to_string(), 2);
        tokio::time::advance(Duration::from_millis(10)).await;
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        tokio::time::advance(Duration::from_millis(10)).await;

        cache.insert("c".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_single_flight() {
        let cache = Arc::new(cache(60, 10));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(&"hot".to_string(), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, ()>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = cache(60, 10);
        let key = "a".to_string();
        cache.insert(key.clone(), 1);

        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));

        let value = cache
            .get_or_load(&key, || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }
}
