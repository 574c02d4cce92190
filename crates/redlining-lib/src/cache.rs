//! Query result cache
//!
//! A bounded least-recently-used map from [`CacheKey`] to the serialized payload of a
//! box query. Storing the payload string (not the structured result) makes a hit a
//! plain copy of an `Arc<str>`.
//!
//! # Thread Safety
//!
//! All state, including the hit/miss counters, sits behind one `Mutex`, so every
//! operation is atomic with respect to every other. Entries never go stale because
//! the dataset they were computed from is immutable.

use crate::CacheKey;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of cached box queries
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// `get` calls that returned a payload
    pub hits: u64,
    /// `get` calls that returned nothing
    pub misses: u64,
    /// Entries currently stored
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<CacheKey, Arc<str>>,
    hits: u64,
    misses: u64,
}

/// Thread-safe LRU cache of serialized box-query payloads
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<CacheState>,
}

impl QueryCache {
    /// Create a new cache holding at most `capacity` entries (zero is raised to one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Create a cache with default capacity (20 entries)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }

    // A panic cannot leave the LRU list half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if a key is cached, without refreshing its position
    pub fn has(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains(key)
    }

    /// Get a cached payload
    ///
    /// A hit promotes the entry to most-recently-used. Hits and misses are counted.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        let mut state = self.lock();
        let payload = state.entries.get(key).cloned();
        match payload {
            Some(_) => state.hits += 1,
            None => state.misses += 1,
        }
        payload
    }

    /// Insert or refresh a payload
    ///
    /// When the cache is full, exactly one entry (the least recently used) is evicted.
    pub fn put(&self, key: CacheKey, payload: impl Into<Arc<str>>) {
        let mut state = self.lock();
        // `push` also hands back the old pair when the key was already present
        if let Some((displaced, _)) = state.entries.push(key, payload.into())
            && !state.entries.contains(&displaced)
        {
            tracing::debug!("Evicted cache entry {displaced}");
        }
    }

    /// Remove all entries (counters are kept)
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of entries currently stored
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    /// Snapshot of counters and occupancy
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
