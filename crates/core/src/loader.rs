//! Image loading with two-tier caching and request coalescing
//!
//! [`ImageLoader`] is the entry point the UI talks to. A request walks the
//! tiers in order:
//!
//! 1. memory cache hit: returned immediately
//! 2. a load for the same key already running: the caller awaits it
//! 3. otherwise a new load is registered, waits for a decode slot, then
//!    tries the persistent cache (thumbnails only) before decoding
//!
//! Every load runs as its own Tokio task, so it completes and populates the
//! caches even if every caller stops waiting. Failures never reach callers
//! as errors: a request either yields a bitmap or `None`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use imgview_cache::{
    modification_timestamp, CacheConfig, CacheStats, DiskCacheStats, ImageKey, MemoryImageCache,
    MetadataCacheRecord, PersistentMetadataCache, Variant,
};
use imgview_decode::{Bitmap, DecodeFailure, DecodePipeline, FormatFamily, Thumbnail};
use imgview_scheduler::{ConcurrencyLimiter, LimiterStats};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::pressure::{MemoryPressureMonitor, MemorySignal};

/// A load shared by every caller waiting on the same key
type InFlight = Shared<BoxFuture<'static, Option<Arc<Bitmap>>>>;

/// Snapshot of loader statistics
#[derive(Debug, Clone)]
pub struct LoaderStats {
    /// Memory cache statistics
    pub memory: CacheStats,
    /// Persistent cache statistics, if the persistent cache is available
    pub disk: Option<DiskCacheStats>,
    /// Decode limiter statistics
    pub limiter: LimiterStats,
    /// Loads currently running
    pub in_flight: usize,
}

struct LoaderInner {
    memory: MemoryImageCache,
    disk: Option<PersistentMetadataCache>,
    limiter: ConcurrencyLimiter,
    pipeline: DecodePipeline,
    in_flight: Mutex<HashMap<ImageKey, InFlight>>,
    thumbnail_size: u32,
    optimized_max_size: u32,
}

/// Cached, coalescing image loader
///
/// Cloning is cheap; clones share caches, limiter and in-flight loads.
/// Loading requires a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use imgview_cache::CacheConfig;
/// use imgview_core::ImageLoader;
///
/// # async fn show() {
/// let loader = ImageLoader::new(&CacheConfig::default());
///
/// if let Some(thumbnail) = loader.load_thumbnail("/photos/beach.jpg").await {
///     println!("{}x{}", thumbnail.width(), thumbnail.height());
/// }
/// loader.prefetch(["/photos/dunes.jpg", "/photos/pier.png"]);
/// # }
/// ```
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl ImageLoader {
    /// Create a loader with the built-in decoders
    ///
    /// If the persistent cache directory cannot be opened, the loader runs
    /// with the memory cache only.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_pipeline(config, DecodePipeline::new())
    }

    /// Create a loader that decodes through `pipeline`
    pub fn with_pipeline(config: &CacheConfig, pipeline: DecodePipeline) -> Self {
        let disk = match PersistentMetadataCache::open(&config.disk_cache_dir, config.disk_cache_bytes)
        {
            Ok(disk) => Some(disk.with_trim_threshold(config.disk_trim_threshold)),
            Err(e) => {
                tracing::warn!(
                    dir = %config.disk_cache_dir.display(),
                    error = %e,
                    "persistent cache unavailable, continuing with memory cache only"
                );
                None
            }
        };

        Self {
            inner: Arc::new(LoaderInner {
                memory: MemoryImageCache::new(config.memory_cache_bytes, config.memory_cache_entries),
                disk,
                limiter: ConcurrencyLimiter::new(config.max_concurrent_decodes),
                pipeline,
                in_flight: Mutex::new(HashMap::new()),
                thumbnail_size: config.thumbnail_size.max(1),
                optimized_max_size: config.optimized_max_size.max(1),
            }),
        }
    }

    /// Load the thumbnail of `path`
    ///
    /// Served from memory, then from the persistent cache, then by decoding.
    /// A freshly decoded thumbnail is persisted for later runs.
    pub async fn load_thumbnail<P: AsRef<Path>>(&self, path: P) -> Option<Arc<Bitmap>> {
        self.load(ImageKey::thumbnail(path)).await
    }

    /// Load `path` at full resolution
    ///
    /// Full images are cached in memory only.
    pub async fn load_full_image<P: AsRef<Path>>(&self, path: P) -> Option<Arc<Bitmap>> {
        self.load(ImageKey::full(path)).await
    }

    /// Load `path` sized for a target long side in pixels
    ///
    /// Vector and animated sources resolve to the full image. Targets up to
    /// the thumbnail size resolve to the thumbnail. Larger targets get their
    /// own downsampled bitmap, capped at the configured maximum, unless the
    /// decoded bytes turn out animated or vector despite the extension; then
    /// the full image is returned and shared with [`load_full_image`].
    ///
    /// [`load_full_image`]: Self::load_full_image
    pub async fn load_optimized<P: AsRef<Path>>(
        &self,
        path: P,
        target_long_side: u32,
    ) -> Option<Arc<Bitmap>> {
        let path = path.as_ref();
        if FormatFamily::from_path(path).prefers_full_decode() {
            return self.load_full_image(path).await;
        }
        if target_long_side <= self.inner.thumbnail_size {
            return self.load_thumbnail(path).await;
        }

        let long_side = target_long_side.min(self.inner.optimized_max_size);
        self.load(ImageKey::optimized(path, long_side)).await
    }

    /// Load the slot named by `key`
    pub async fn load(&self, key: ImageKey) -> Option<Arc<Bitmap>> {
        if let Some(bitmap) = self.inner.memory.get(&key) {
            tracing::trace!(key = %key, "memory cache hit");
            return Some(bitmap);
        }

        let request = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(request) = in_flight.get(&key) {
                tracing::trace!(key = %key, "joining in-flight load");
                request.clone()
            } else if let Some(bitmap) = self.inner.memory.peek(&key) {
                // Finished between the first lookup and taking the lock
                return Some(bitmap);
            } else {
                let request = self.start(key.clone());
                in_flight.insert(key, request.clone());
                request
            }
        };

        request.await
    }

    /// Warm the thumbnail cache for `paths` in the background
    ///
    /// Fire-and-forget: results and failures are discarded. Does nothing
    /// outside a Tokio runtime.
    pub fn prefetch<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!("prefetch requested outside a runtime, skipping");
            return;
        };

        for path in paths {
            let key = ImageKey::thumbnail(path);
            if self.inner.memory.contains(&key) {
                continue;
            }
            let loader = self.clone();
            handle.spawn(async move {
                loader.load(key).await;
            });
        }
    }

    /// Drop every decoded bitmap held in memory
    ///
    /// The persistent cache is left alone; see
    /// [`clear_persistent_cache`](Self::clear_persistent_cache).
    pub fn clear_all_caches(&self) {
        self.inner.memory.clear();
    }

    /// Delete every persisted thumbnail record
    pub async fn clear_persistent_cache(&self) {
        let Some(disk) = self.inner.disk.clone() else {
            return;
        };
        match tokio::task::spawn_blocking(move || disk.clear_all()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to clear persistent cache"),
            Err(e) => tracing::warn!(error = %e, "persistent cache clear task failed"),
        }
    }

    /// Bytes used by the persistent cache
    pub fn cache_size_bytes(&self) -> u64 {
        self.inner
            .disk
            .as_ref()
            .map(PersistentMetadataCache::cache_size_bytes)
            .unwrap_or(0)
    }

    /// Update the persistent cache budget, trimming if needed
    pub async fn set_byte_limit(&self, byte_limit: u64) {
        let Some(disk) = self.inner.disk.clone() else {
            return;
        };
        if let Err(e) = tokio::task::spawn_blocking(move || disk.set_byte_limit(byte_limit)).await {
            tracing::warn!(error = %e, "persistent cache trim task failed");
        }
    }

    /// Clear the memory cache whenever `signal` reports high or critical pressure
    ///
    /// Monitoring stops when the returned monitor is dropped.
    pub fn watch_memory_pressure(&self, signal: &MemorySignal) -> MemoryPressureMonitor {
        MemoryPressureMonitor::spawn(self.inner.memory.clone(), signal)
    }

    /// Get a snapshot of loader statistics
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            memory: self.inner.memory.stats(),
            disk: self.inner.disk.as_ref().map(PersistentMetadataCache::stats),
            limiter: self.inner.limiter.stats(),
            in_flight: self.inner.in_flight.lock().len(),
        }
    }

    /// The memory cache tier
    pub fn memory_cache(&self) -> &MemoryImageCache {
        &self.inner.memory
    }

    /// The persistent cache tier, if it could be opened
    pub fn disk_cache(&self) -> Option<&PersistentMetadataCache> {
        self.inner.disk.as_ref()
    }

    /// Spawn the load for `key` and wrap it for sharing
    ///
    /// Must be called with the in-flight table locked; the task removes its
    /// own entry once the result is in the memory cache.
    fn start(&self, key: ImageKey) -> InFlight {
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = inner.run(&task_key).await;
            if let Some(bitmap) = &result {
                inner.memory.put(task_key.clone(), Arc::clone(bitmap));
            }
            inner.in_flight.lock().remove(&task_key);
            result
        });

        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "load task failed");
                    inner.in_flight.lock().remove(&key);
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl LoaderInner {
    /// Produce the bitmap for `key` while holding a decode slot
    async fn run(self: &Arc<Self>, key: &ImageKey) -> Option<Arc<Bitmap>> {
        let permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "decode slot unavailable");
                return None;
            }
        };

        let inner = Arc::clone(self);
        let blocking_key = key.clone();
        let result = tokio::task::spawn_blocking(move || inner.produce(&blocking_key)).await;
        self.limiter.release(permit);

        match result {
            Ok(bitmap) => bitmap,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "decode task failed");
                None
            }
        }
    }

    fn produce(&self, key: &ImageKey) -> Option<Arc<Bitmap>> {
        let path = key.path();
        let result = match key.variant() {
            Variant::Thumbnail => self.produce_thumbnail(path).map(Arc::new),
            Variant::Full => self.pipeline.decode_full(path).map(Arc::new),
            Variant::Optimized(long_side) => self.produce_optimized(key, long_side),
        };

        match result {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "decode failed");
                None
            }
        }
    }

    /// Sources that turn out to be animated or vector stay at full resolution
    /// and share one bitmap with the `Full` slot of the same path.
    fn produce_optimized(
        &self,
        key: &ImageKey,
        long_side: u32,
    ) -> Result<Arc<Bitmap>, DecodeFailure> {
        let optimized = self.pipeline.decode_optimized(key.path(), long_side)?;
        if !optimized.is_full {
            return Ok(Arc::new(optimized.bitmap));
        }

        let full_key = key.with_variant(Variant::Full);
        if let Some(existing) = self.memory.peek(&full_key) {
            return Ok(existing);
        }
        tracing::trace!(key = %key, "source needs full resolution, sharing full slot");
        let bitmap = Arc::new(optimized.bitmap);
        self.memory.put(full_key, Arc::clone(&bitmap));
        Ok(bitmap)
    }

    fn produce_thumbnail(&self, path: &Path) -> Result<Bitmap, DecodeFailure> {
        if let Some(bitmap) = self.thumbnail_from_disk(path) {
            return Ok(bitmap);
        }

        // Taken before decoding so a concurrent edit makes the record stale
        let source_timestamp = fs::metadata(path)
            .ok()
            .as_ref()
            .and_then(modification_timestamp);

        let thumbnail = self.pipeline.decode_thumbnail(path, self.thumbnail_size)?;
        if let Some(timestamp) = source_timestamp {
            self.persist(path, timestamp, &thumbnail);
        }
        Ok(thumbnail.bitmap)
    }

    fn thumbnail_from_disk(&self, path: &Path) -> Option<Bitmap> {
        let disk = self.disk.as_ref()?;
        let record = disk.retrieve(path)?;

        match DecodePipeline::decode_encoded(path, &record.thumbnail) {
            Ok(bitmap) => {
                tracing::trace!(path = %path.display(), "persistent cache hit");
                Some(bitmap)
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "purging undecodable record");
                if let Err(e) = disk.remove(path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove record");
                }
                None
            }
        }
    }

    fn persist(&self, path: &Path, timestamp: f64, thumbnail: &Thumbnail) {
        let Some(disk) = &self.disk else {
            return;
        };

        let stored = MetadataCacheRecord::new(
            timestamp,
            thumbnail.encoded.bytes.clone(),
            &thumbnail.properties,
        )
        .map_err(Into::into)
        .and_then(|record| disk.store(path, &record));

        if let Err(e) = stored {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist thumbnail");
        }
    }
}
