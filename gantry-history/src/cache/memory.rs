//! In-memory cache store
//!
//! A process-wide `LruCache` guarded by a mutex, with optional time-to-live
//! and a bound on the number of entries. Reads do not refresh an entry's
//! position, so the oldest inserted entry is evicted first.

use gantry_core::domain::instance::PipelineInstanceModel;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::CacheStore;

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Live entries; expired ones are not counted
    pub entry_count: u64,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CachedModel {
    value: PipelineInstanceModel,
    inserted_at: Instant,
}

/// Thread-safe in-memory implementation of [`CacheStore`]
pub struct InMemoryCache {
    entries: Mutex<LruCache<String, CachedModel>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCache {
    /// Creates a cache holding at most `max_entries` models, without expiry
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Expires entries `ttl` after they were stored
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.lock()
            .iter()
            .filter(|(_, cached)| !self.is_expired(cached))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock()
            .peek(key)
            .is_some_and(|cached| !self.is_expired(cached))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CachedModel>> {
        // Entries are plain data; a panicked writer cannot leave them half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, cached: &CachedModel) -> bool {
        self.ttl
            .is_some_and(|ttl| cached.inserted_at.elapsed() >= ttl)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl CacheStore for InMemoryCache {
    fn get(&self, key: &str) -> Option<PipelineInstanceModel> {
        let mut entries = self.lock();

        let expired = match entries.peek(key) {
            Some(cached) if !self.is_expired(cached) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(cached.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn put(&self, key: &str, value: PipelineInstanceModel) {
        let cached = CachedModel {
            value,
            inserted_at: Instant::now(),
        };

        // `push` hands back either the replaced entry or the evicted oldest one
        if let Some((evicted, _)) = self.lock().push(key.to_string(), cached) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Evicted cache entry: {}", evicted);
            }
        }
    }

    fn remove(&self, key: &str) {
        self.lock().pop(key);
    }
}
