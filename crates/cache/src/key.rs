//! Cache keys
//!
//! An [`ImageKey`] names one cache slot: the normalized absolute path of the
//! source plus the [`Variant`] being cached for it.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Which rendition of a source a cache slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Small preview, persisted on disk
    Thumbnail,
    /// Full-resolution decode, memory only
    Full,
    /// Downsampled to the given long side in pixels, memory only
    Optimized(u32),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Thumbnail => write!(f, "thumbnail"),
            Variant::Full => write!(f, "full"),
            Variant::Optimized(size) => write!(f, "optimized:{}", size),
        }
    }
}

/// Identifies one cache slot
///
/// Keys that differ only by variant are independent entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    path: PathBuf,
    variant: Variant,
}

impl ImageKey {
    /// Create a key, normalizing `path`
    pub fn new<P: AsRef<Path>>(path: P, variant: Variant) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            variant,
        }
    }

    /// Key for the thumbnail of `path`
    pub fn thumbnail<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Variant::Thumbnail)
    }

    /// Key for the full-resolution image at `path`
    pub fn full<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, Variant::Full)
    }

    /// Key for `path` downsampled to `long_side` pixels
    pub fn optimized<P: AsRef<Path>>(path: P, long_side: u32) -> Self {
        Self::new(path, Variant::Optimized(long_side))
    }

    /// Normalized source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Same source, different variant
    pub fn with_variant(&self, variant: Variant) -> Self {
        Self {
            path: self.path.clone(),
            variant,
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.variant)
    }
}

/// Make `path` absolute and fold `.` and `..` components lexically
///
/// Symlinks are not resolved, so the result does not depend on the file
/// existing.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
