//! Static raster decoding with orientation correction

use std::path::Path;

use crate::error::validate_dimensions;
use crate::{Bitmap, DecodeFailure, Decoder, Orientation};

/// Decodes a single frame and applies its EXIF orientation
///
/// The returned bitmap is display-ready regardless of how the pixels were
/// stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl Decoder for RasterDecoder {
    fn decode(&self, path: &Path, data: &[u8]) -> Result<Bitmap, DecodeFailure> {
        let image = image::load_from_memory(data).map_err(|e| DecodeFailure::corrupt(path, e))?;
        validate_dimensions(path, image.width(), image.height())?;

        let has_alpha = image.color().has_alpha();
        let orientation = Orientation::read(data);
        if orientation != Orientation::Identity {
            tracing::trace!(path = %path.display(), ?orientation, "applying orientation");
        }

        Ok(Bitmap::from_image(
            orientation.apply(image).into_rgba8(),
            has_alpha,
        ))
    }
}
