//! Decode failure taxonomy

use std::io;
use std::path::{Path, PathBuf};

use crate::{MAX_IMAGE_DIMENSION, MAX_PIXEL_COUNT};

/// Reasons a source could not be turned into a bitmap.
///
/// There are no retries at the decode layer; callers decide whether to
/// re-request.
#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    /// The source file is missing or could not be read
    #[error("cannot read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The decoder produced no frame for the source
    #[error("unsupported or corrupt image {}: {reason}", path.display())]
    UnsupportedOrCorrupt { path: PathBuf, reason: String },
}

impl DecodeFailure {
    pub(crate) fn unreadable(path: &Path, source: io::Error) -> Self {
        DecodeFailure::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl ToString) -> Self {
        DecodeFailure::UnsupportedOrCorrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the source itself could not be read
    pub fn is_unreadable(&self) -> bool {
        matches!(self, DecodeFailure::SourceUnreadable { .. })
    }
}

/// Reject empty or oversized sources before allocating pixel buffers
pub(crate) fn validate_dimensions(path: &Path, width: u32, height: u32) -> Result<(), DecodeFailure> {
    if width == 0 || height == 0 {
        return Err(DecodeFailure::corrupt(path, "image has zero width or height"));
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(DecodeFailure::corrupt(
            path,
            format!(
                "image is {}x{}, larger than {} per side",
                width, height, MAX_IMAGE_DIMENSION
            ),
        ));
    }
    let pixel_count = width as u64 * height as u64;
    if pixel_count > MAX_PIXEL_COUNT {
        return Err(DecodeFailure::corrupt(
            path,
            format!("image has {} pixels (max {})", pixel_count, MAX_PIXEL_COUNT),
        ));
    }
    Ok(())
}
