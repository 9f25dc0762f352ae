//! Image Viewer Cache Library
//!
//! Two tiers of image caching with LRU eviction:
//!
//! - [`MemoryImageCache`]: decoded bitmaps held in process memory, bounded by
//!   entry count and byte cost, cleared wholesale under memory pressure.
//! - [`PersistentMetadataCache`]: encoded thumbnails plus a property table,
//!   stored one file per source under a byte-budgeted directory and
//!   validated against the source's modification time on every read.
//!
//! Both tiers are addressed by an [`ImageKey`] (normalized path plus variant).

pub mod config;
pub mod disk;
pub mod key;
pub mod pressure;
pub mod ram;
pub mod record;

pub use config::{CacheConfig, ConfigError};
pub use disk::{CacheError, DiskCacheStats, PersistentMetadataCache, DEFAULT_TRIM_THRESHOLD};
pub use key::{normalize_path, ImageKey, Variant};
pub use pressure::MemoryPressure;
pub use ram::{CacheStats, MemoryImageCache};
pub use record::{modification_timestamp, MetadataCacheRecord, RecordError, MAGIC, SCHEMA_VERSION};
