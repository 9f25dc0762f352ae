//! Thumbnail encoding

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::{Bitmap, DecodeFailure};

/// JPEG quality used for opaque thumbnails
pub const JPEG_QUALITY: u8 = 70;

/// Container format of an encoded thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    /// Lossless, keeps transparency
    Png,
    /// Lossy, smaller for opaque sources
    Jpeg,
}

/// A thumbnail re-encoded for persistence
#[derive(Debug, Clone)]
pub struct EncodedThumbnail {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Container format of `bytes`
    pub format: ThumbnailFormat,
}

/// Encode the first frame of `bitmap`
///
/// Sources with an alpha channel are written as PNG to keep transparency;
/// opaque sources are written as JPEG at [`JPEG_QUALITY`].
pub(crate) fn encode(path: &Path, bitmap: &Bitmap) -> Result<EncodedThumbnail, DecodeFailure> {
    let frame = DynamicImage::ImageRgba8(bitmap.first_frame().clone());
    let mut bytes = Vec::new();

    let format = if bitmap.has_alpha() {
        frame
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| DecodeFailure::corrupt(path, format!("thumbnail encode failed: {}", e)))?;
        ThumbnailFormat::Png
    } else {
        let rgb = frame.into_rgb8();
        JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| DecodeFailure::corrupt(path, format!("thumbnail encode failed: {}", e)))?;
        ThumbnailFormat::Jpeg
    };

    Ok(EncodedThumbnail { bytes, format })
}
