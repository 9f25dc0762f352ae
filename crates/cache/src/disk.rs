//! Persistent thumbnail cache with staleness detection and LRU eviction.
//!
//! Each source path maps to one record file named by the lowercase hex
//! SHA-256 of the normalized path. Records are written atomically through a
//! temporary file in the same directory, so readers never see a partial
//! record. Recency is carried by the files' modification times: a write or
//! a valid read sets it to now, and trimming deletes the oldest first.
//!
//! Trimming is delayed: it only starts once usage exceeds the budget times
//! a threshold factor, then deletes until usage is back within the budget.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::key::normalize_path;
use crate::record::{modification_timestamp, MetadataCacheRecord, RecordError};

/// Usage factor over the budget that starts a trim pass
pub const DEFAULT_TRIM_THRESHOLD: f64 = 1.2;

/// Errors from the persistent cache's fallible paths
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Statistics for monitoring disk cache performance
#[derive(Debug, Clone, Default)]
pub struct DiskCacheStats {
    /// Number of valid records returned
    pub hits: u64,
    /// Number of lookups that returned nothing
    pub misses: u64,
    /// Number of records deleted by trimming
    pub evictions: u64,
    /// Number of stale or corrupt records deleted on read
    pub invalidations: u64,
    /// Number of records on disk
    pub record_count: usize,
    /// Total disk space used in bytes
    pub disk_used: u64,
    /// Configured budget in bytes
    pub disk_limit: u64,
}

impl DiskCacheStats {
    /// Calculate cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate disk utilization (0.0 to 1.0, may exceed 1.0 before a trim)
    pub fn disk_utilization(&self) -> f64 {
        if self.disk_limit == 0 {
            0.0
        } else {
            self.disk_used as f64 / self.disk_limit as f64
        }
    }
}

/// A record file found while scanning the cache directory
struct RecordFile {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

/// Internal cache state
struct DiskState {
    cache_dir: PathBuf,
    byte_limit: u64,
    trim_threshold: f64,
    /// Written only with the state locked; read without it
    bytes_used: Arc<AtomicU64>,
    stats: DiskCacheStats,
}

impl DiskState {
    fn used(&self) -> u64 {
        self.bytes_used.load(Ordering::Acquire)
    }

    fn set_used(&self, bytes: u64) {
        self.bytes_used.store(bytes, Ordering::Release);
    }

    fn should_trim(&self) -> bool {
        self.used() as f64 > self.byte_limit as f64 * self.trim_threshold
    }

    /// List every record file in the cache directory
    fn scan(&self) -> io::Result<Vec<RecordFile>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let is_record = entry
                .file_name()
                .to_str()
                .map(is_record_name)
                .unwrap_or(false);
            if !is_record {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            records.push(RecordFile {
                path: entry.path(),
                len: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(records)
    }

    /// Re-read usage from the directory
    fn rescan(&mut self) -> io::Result<Vec<RecordFile>> {
        let records = self.scan()?;
        self.set_used(records.iter().map(|r| r.len).sum());
        self.stats.record_count = records.len();
        Ok(records)
    }

    /// Delete a record file and stop tracking its size
    fn delete(&mut self, path: &Path, len: u64) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.set_used(self.used().saturating_sub(len));
        self.stats.record_count = self.stats.record_count.saturating_sub(1);
        Ok(())
    }

    /// Drop a record that failed validation
    fn invalidate(&mut self, path: &Path, len: u64) {
        self.stats.invalidations += 1;
        if let Err(e) = self.delete(path, len) {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete invalid record");
        }
    }

    /// Delete least recently used records until usage is within the budget
    ///
    /// Records that cannot be deleted are skipped; usage may stay over
    /// budget until a later trim succeeds.
    fn trim(&mut self) {
        let mut records = match self.rescan() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(dir = %self.cache_dir.display(), error = %e, "failed to scan cache directory");
                return;
            }
        };
        records.sort_by_key(|r| r.modified);

        let before = self.used();
        for record in records {
            if self.used() <= self.byte_limit {
                break;
            }
            match self.delete(&record.path, record.len) {
                Ok(()) => self.stats.evictions += 1,
                Err(e) => {
                    tracing::warn!(path = %record.path.display(), error = %e, "failed to evict record");
                }
            }
        }

        tracing::debug!(
            before,
            after = self.used(),
            limit = self.byte_limit,
            "trimmed persistent cache"
        );
    }

    fn snapshot(&self) -> DiskCacheStats {
        DiskCacheStats {
            disk_used: self.used(),
            disk_limit: self.byte_limit,
            ..self.stats.clone()
        }
    }
}

/// Returns true for names of the form produced by [`PersistentMetadataCache::key_for`]
fn is_record_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// On-disk store of thumbnail records
///
/// Thread-safe; clones share the same state. All operations on one instance
/// are serialized, except [`cache_size_bytes`](Self::cache_size_bytes),
/// which never waits on file I/O.
#[derive(Clone)]
pub struct PersistentMetadataCache {
    state: Arc<Mutex<DiskState>>,
    bytes_used: Arc<AtomicU64>,
}

impl PersistentMetadataCache {
    /// Open (or create) a cache directory with a budget in bytes
    ///
    /// Existing records are scanned so that usage left by a previous run is
    /// counted against the budget immediately.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or read.
    pub fn open<P: AsRef<Path>>(cache_dir: P, byte_limit: u64) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        let bytes_used = Arc::new(AtomicU64::new(0));
        let mut state = DiskState {
            cache_dir,
            byte_limit,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            bytes_used: Arc::clone(&bytes_used),
            stats: DiskCacheStats::default(),
        };
        state.rescan()?;

        tracing::debug!(
            dir = %state.cache_dir.display(),
            records = state.stats.record_count,
            bytes = state.used(),
            "opened persistent cache"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            bytes_used,
        })
    }

    /// Open a cache with the budget in megabytes
    pub fn with_mb_limit<P: AsRef<Path>>(cache_dir: P, megabytes: u64) -> Result<Self, CacheError> {
        Self::open(cache_dir, megabytes * 1024 * 1024)
    }

    /// Set the usage factor over the budget that starts a trim pass
    ///
    /// Values below 1.0 are raised to 1.0.
    pub fn with_trim_threshold(self, threshold: f64) -> Self {
        self.state.lock().trim_threshold = threshold.max(1.0);
        self
    }

    /// File name for a source: lowercase hex SHA-256 of its normalized path
    pub fn key_for(source: &Path) -> String {
        let normalized = normalize_path(source);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_os_str().as_encoded_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Full path of the record file for a source
    pub fn record_path(&self, source: &Path) -> PathBuf {
        self.state.lock().cache_dir.join(Self::key_for(source))
    }

    /// Write the record for `source`, replacing any previous one
    ///
    /// The record becomes the most recently used entry. If usage now exceeds
    /// the trim threshold, least recently used records are deleted.
    ///
    /// # Errors
    /// Returns an error if the record could not be written.
    pub fn store(&self, source: &Path, record: &MetadataCacheRecord) -> Result<(), CacheError> {
        let bytes = record.encode();
        let mut state = self.state.lock();
        let path = state.cache_dir.join(Self::key_for(source));

        let previous = fs::metadata(&path).ok().map(|m| m.len());

        let mut file = NamedTempFile::new_in(&state.cache_dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| CacheError::Io(e.error))?;

        let mut used = state.used();
        match previous {
            Some(len) => used = used.saturating_sub(len),
            None => state.stats.record_count += 1,
        }
        state.set_used(used + bytes.len() as u64);

        tracing::trace!(source = %source.display(), bytes = bytes.len(), "stored record");

        if state.should_trim() {
            state.trim();
        }
        Ok(())
    }

    /// Read the record for `source`
    ///
    /// Returns `None` if there is no record, or if the record is corrupt,
    /// from another schema, or older than the source's current modification
    /// time. Invalid records are deleted. A valid record is marked most
    /// recently used.
    pub fn retrieve(&self, source: &Path) -> Option<MetadataCacheRecord> {
        let mut state = self.state.lock();
        let path = state.cache_dir.join(Self::key_for(source));

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read record");
                }
                state.stats.misses += 1;
                return None;
            }
        };
        let len = bytes.len() as u64;

        let record = match MetadataCacheRecord::decode(&bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(source = %source.display(), error = %e, "purging corrupt record");
                state.invalidate(&path, len);
                state.stats.misses += 1;
                return None;
            }
        };

        let source_timestamp = fs::metadata(source)
            .ok()
            .and_then(|m| modification_timestamp(&m));
        let fresh = source_timestamp
            .map(|ts| record.is_fresh(ts))
            .unwrap_or(false);
        if !fresh {
            tracing::debug!(source = %source.display(), "purging stale record");
            state.invalidate(&path, len);
            state.stats.misses += 1;
            return None;
        }

        if let Err(e) = touch(&path) {
            tracing::trace!(path = %path.display(), error = %e, "failed to refresh record recency");
        }
        state.stats.hits += 1;
        Some(record)
    }

    /// Delete the record for `source`, if any
    ///
    /// Returns true if a record was removed.
    pub fn remove(&self, source: &Path) -> Result<bool, CacheError> {
        let mut state = self.state.lock();
        let path = state.cache_dir.join(Self::key_for(source));
        let len = match fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        state.delete(&path, len)?;
        Ok(true)
    }

    /// Delete every record
    ///
    /// Files that cannot be deleted are logged and left in place.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        for record in state.rescan()? {
            if let Err(e) = state.delete(&record.path, record.len) {
                tracing::warn!(path = %record.path.display(), error = %e, "failed to delete record");
            }
        }
        tracing::debug!(remaining = state.used(), "cleared persistent cache");
        Ok(())
    }

    /// Bytes currently used by records
    ///
    /// Lock-free, so it can be polled from a UI thread while a store or
    /// trim is running.
    pub fn cache_size_bytes(&self) -> u64 {
        self.bytes_used.load(Ordering::Acquire)
    }

    /// Get the budget in bytes
    pub fn byte_limit(&self) -> u64 {
        self.state.lock().byte_limit
    }

    /// Update the budget
    ///
    /// If usage exceeds the new budget times the trim threshold, records are
    /// trimmed right away.
    pub fn set_byte_limit(&self, byte_limit: u64) {
        let mut state = self.state.lock();
        state.byte_limit = byte_limit;
        if state.should_trim() {
            state.trim();
        }
    }

    /// Directory holding the record files
    pub fn cache_dir(&self) -> PathBuf {
        self.state.lock().cache_dir.clone()
    }

    /// Get current cache statistics
    pub fn stats(&self) -> DiskCacheStats {
        self.state.lock().snapshot()
    }
}

/// Mark a record most recently used
fn touch(path: &Path) -> io::Result<()> {
    File::options()
        .write(true)
        .open(path)?
        .set_modified(SystemTime::now())
}
