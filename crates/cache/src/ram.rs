//! In-memory image cache with LRU eviction
//!
//! Holds decoded bitmaps keyed by [`ImageKey`]. Bounded by both an entry
//! count and a total byte cost; inserting past either limit evicts least
//! recently used entries until both hold again.

use std::mem;
use std::sync::Arc;

use imgview_decode::Bitmap;
use lru::LruCache;
use parking_lot::Mutex;

use crate::key::ImageKey;

/// Default byte-cost limit (256 MB)
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Default entry-count limit
pub const DEFAULT_ENTRY_LIMIT: usize = 512;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of bitmaps currently in cache
    pub entry_count: usize,

    /// Total byte cost of cached bitmaps
    pub memory_used: usize,

    /// Maximum byte cost allowed
    pub memory_limit: usize,

    /// Maximum number of entries allowed
    pub entry_limit: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of bitmaps evicted to stay within limits
    pub evictions: u64,

    /// Number of times the whole cache was dropped
    pub clears: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate memory utilization (0.0 to 1.0)
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_limit as f64
        }
    }
}

/// Internal cache state
struct CacheState {
    /// Bitmaps in recency order
    entries: LruCache<ImageKey, Arc<Bitmap>>,

    /// Sum of `byte_cost()` over all entries
    memory_used: usize,

    memory_limit: usize,
    entry_limit: usize,

    stats: CacheStats,
}

impl CacheState {
    fn new(memory_limit: usize, entry_limit: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            memory_used: 0,
            memory_limit,
            entry_limit: entry_limit.max(1),
            stats: CacheStats::default(),
        }
    }

    fn over_limit(&self) -> bool {
        self.memory_used > self.memory_limit || self.entries.len() > self.entry_limit
    }

    /// Evict the least recently used bitmap
    fn evict_lru(&mut self) -> Option<Arc<Bitmap>> {
        let (_, bitmap) = self.entries.pop_lru()?;
        self.memory_used = self.memory_used.saturating_sub(bitmap.byte_cost());
        self.stats.evictions += 1;
        Some(bitmap)
    }

    /// Evict until both limits hold; evicted bitmaps are returned so they
    /// can be dropped after the lock is released
    fn evict_to_limits(&mut self) -> Vec<Arc<Bitmap>> {
        let mut evicted = Vec::new();
        while self.over_limit() {
            match self.evict_lru() {
                Some(bitmap) => evicted.push(bitmap),
                None => break,
            }
        }
        evicted
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            memory_used: self.memory_used,
            memory_limit: self.memory_limit,
            entry_limit: self.entry_limit,
            ..self.stats
        }
    }
}

/// Process-wide cache of decoded bitmaps
///
/// Thread-safe; clones share the same storage. Bitmaps are handed out as
/// `Arc<Bitmap>`, so an evicted bitmap stays alive for callers still using it.
#[derive(Clone)]
pub struct MemoryImageCache {
    state: Arc<Mutex<CacheState>>,
}

impl MemoryImageCache {
    /// Create a cache with the given byte-cost and entry-count limits
    ///
    /// # Arguments
    /// * `memory_limit` - Maximum total `byte_cost()` of cached bitmaps
    /// * `entry_limit` - Maximum number of cached bitmaps (at least 1)
    pub fn new(memory_limit: usize, entry_limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::new(memory_limit, entry_limit))),
        }
    }

    /// Create a cache with the byte limit in megabytes and the default entry limit
    pub fn with_mb_limit(megabytes: usize) -> Self {
        Self::new(megabytes * 1024 * 1024, DEFAULT_ENTRY_LIMIT)
    }

    /// Look up a bitmap, marking it most recently used
    pub fn get(&self, key: &ImageKey) -> Option<Arc<Bitmap>> {
        let mut state = self.state.lock();
        match state.entries.get(key).cloned() {
            Some(bitmap) => {
                state.stats.hits += 1;
                Some(bitmap)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Look up a bitmap without touching recency or statistics
    pub fn peek(&self, key: &ImageKey) -> Option<Arc<Bitmap>> {
        self.state.lock().entries.peek(key).cloned()
    }

    /// Check for a bitmap without touching recency or statistics
    pub fn contains(&self, key: &ImageKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Insert a bitmap, replacing any previous entry for `key`
    ///
    /// Evicts least recently used entries until both limits hold. A bitmap
    /// whose cost alone exceeds the byte limit is not retained.
    pub fn put(&self, key: ImageKey, bitmap: Arc<Bitmap>) {
        let cost = bitmap.byte_cost();
        let evicted = {
            let mut state = self.state.lock();

            if let Some(previous) = state.entries.pop(&key) {
                state.memory_used = state.memory_used.saturating_sub(previous.byte_cost());
            }

            if cost > state.memory_limit {
                tracing::debug!(key = %key, cost, limit = state.memory_limit, "bitmap exceeds memory cache limit");
                return;
            }

            state.memory_used += cost;
            state.entries.put(key, bitmap);
            state.evict_to_limits()
        };

        if !evicted.is_empty() {
            tracing::trace!(count = evicted.len(), "evicted bitmaps from memory cache");
        }
    }

    /// Remove one entry
    pub fn remove(&self, key: &ImageKey) -> Option<Arc<Bitmap>> {
        let mut state = self.state.lock();
        let bitmap = state.entries.pop(key)?;
        state.memory_used = state.memory_used.saturating_sub(bitmap.byte_cost());
        Some(bitmap)
    }

    /// Drop every entry
    ///
    /// The table is swapped out under the lock and released afterwards, so
    /// other callers are not blocked while bitmaps are freed.
    pub fn clear(&self) {
        let old = {
            let mut state = self.state.lock();
            state.memory_used = 0;
            state.stats.clears += 1;
            mem::replace(&mut state.entries, LruCache::unbounded())
        };
        tracing::debug!(entries = old.len(), "cleared memory cache");
        drop(old);
    }

    /// Update both limits, evicting if the cache is now over either
    pub fn set_limits(&self, memory_limit: usize, entry_limit: usize) {
        let _evicted = {
            let mut state = self.state.lock();
            state.memory_limit = memory_limit;
            state.entry_limit = entry_limit.max(1);
            state.evict_to_limits()
        };
    }

    /// Number of cached bitmaps
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total byte cost currently held
    pub fn memory_used(&self) -> usize {
        self.state.lock().memory_used
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        self.state.lock().snapshot()
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LIMIT, DEFAULT_ENTRY_LIMIT)
    }
}
