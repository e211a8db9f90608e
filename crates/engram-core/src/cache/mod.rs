//! LRU front cache
//!
//! Thin concurrency-and-statistics layer over `lru::LruCache`: one mutex
//! serializes the map, while hit/miss/eviction counters are atomics that
//! can be read without taking the map lock. Eviction order is strict LRU
//! by access time, ties resolved by insertion order.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// ============================================================================
// STATS
// ============================================================================

/// Point-in-time cache statistics
///
/// Each field is individually consistent; the snapshot as a whole is not
/// taken under one lock.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LruStats {
    /// Entries currently cached
    pub size: usize,
    /// Maximum entries
    pub capacity: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries pushed out by capacity pressure
    pub evictions: u64,
    /// hits / (hits + misses), 0 when idle
    pub hit_rate: f32,
    /// size / capacity
    pub utilization: f32,
}

// ============================================================================
// CACHE
// ============================================================================

/// Mutex-guarded LRU cache with atomic statistics
pub struct LruCache<K, V> {
    inner: Mutex<lru::LruCache<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("clamped to >= 1");
        Self {
            inner: Mutex::new(lru::LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a key, promoting it to most-recently-used on a hit
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache lock");
        match inner.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or update a key, evicting the least-recently-used entry on
    /// overflow
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock().expect("cache lock");
        if let Some((old_key, _)) = inner.push(key.clone(), value) {
            // push returns the displaced entry; same key means an update,
            // a different key means a capacity eviction
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove a key. Returns true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.lock().expect("cache lock").pop(key).is_some()
    }

    /// Whether a key is present, without promoting it
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().expect("cache lock").contains(key)
    }

    /// Drop every entry and reset the statistics
    pub fn clear(&self) {
        self.inner.lock().expect("cache lock").clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Entries currently cached
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock").len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum entries
    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("cache lock").cap().get()
    }

    /// Replace the capacity (clamped to one), dropping current contents
    pub fn set_capacity(&self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("clamped to >= 1");
        let mut inner = self.inner.lock().expect("cache lock");
        inner.clear();
        inner.resize(capacity);
    }

    /// Lookups that found an entry
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Entries pushed out by capacity pressure
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit, 0 when idle
    pub fn hit_rate(&self) -> f32 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        }
    }

    /// Full statistics snapshot
    pub fn stats(&self) -> LruStats {
        let (size, capacity) = {
            let inner = self.inner.lock().expect("cache lock");
            (inner.len(), inner.cap().get())
        };
        LruStats {
            size,
            capacity,
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            hit_rate: self.hit_rate(),
            utilization: size as f32 / capacity as f32,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
