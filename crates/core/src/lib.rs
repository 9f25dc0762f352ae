//! Image Viewer Core Library
//!
//! Ties the decode pipeline, the two cache tiers and the decode limiter
//! together behind [`ImageLoader`], and clears the memory tier on
//! low-memory events through [`MemoryPressureMonitor`].

pub mod loader;
pub mod pressure;

pub use imgview_cache::{CacheConfig, ImageKey, MemoryPressure, Variant};
pub use imgview_decode::Bitmap;
pub use loader::{ImageLoader, LoaderStats};
pub use pressure::{MemoryPressureMonitor, MemorySignal};
