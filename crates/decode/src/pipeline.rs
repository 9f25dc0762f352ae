//! Format-dispatching decode pipeline

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::properties::{read_properties, PropertyTable};
use crate::thumbnail::{self, EncodedThumbnail};
use crate::{Bitmap, DecodeFailure, DecoderRegistry, FormatFamily};

/// Output of a thumbnail decode
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Downsampled still bitmap, ready for display
    pub bitmap: Bitmap,
    /// The same thumbnail re-encoded for persistence
    pub encoded: EncodedThumbnail,
    /// EXIF properties of the source (empty for non-raster sources)
    pub properties: PropertyTable,
}

/// Output of a decode bounded by a target long side
#[derive(Debug, Clone)]
pub struct Optimized {
    /// The decoded bitmap
    pub bitmap: Bitmap,
    /// True if the source was kept at full resolution instead of downsampled
    pub is_full: bool,
}

/// Stateless decode pipeline
///
/// Reads a source file, classifies it into a [`FormatFamily`] and hands
/// the bytes to the decoder registered for that family. The pipeline holds
/// no caches and performs no retries.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone, Default)]
pub struct DecodePipeline {
    registry: Arc<DecoderRegistry>,
}

impl DecodePipeline {
    /// Create a pipeline with the built-in decoders
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline with a custom decoder registry
    pub fn with_registry(registry: DecoderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Decode `path` at full resolution
    ///
    /// Animated sources keep all frames; static rasters are oriented.
    pub fn decode_full(&self, path: &Path) -> Result<Bitmap, DecodeFailure> {
        let data = read_source(path)?;
        self.decode_bytes(path, &data)
    }

    /// Decode `path` into a thumbnail whose long side is at most `max_pixel_size`
    pub fn decode_thumbnail(
        &self,
        path: &Path,
        max_pixel_size: u32,
    ) -> Result<Thumbnail, DecodeFailure> {
        let data = read_source(path)?;
        let family = FormatFamily::detect(path, &data);
        let full = self.decode_family(path, &data, family)?;

        let bitmap = full.downsample(max_pixel_size);
        let encoded = thumbnail::encode(path, &bitmap)?;
        let properties = match family {
            FormatFamily::StaticRaster => read_properties(&data),
            FormatFamily::Vector | FormatFamily::Animated => PropertyTable::new(),
        };

        Ok(Thumbnail {
            bitmap,
            encoded,
            properties,
        })
    }

    /// Decode `path` and downsample it so the long side is at most `max_long_side`
    pub fn decode_downsampled(
        &self,
        path: &Path,
        max_long_side: u32,
    ) -> Result<Bitmap, DecodeFailure> {
        Ok(self.decode_full(path)?.downsample(max_long_side))
    }

    /// Decode `path` for display at a target long side of `max_long_side`
    ///
    /// The family is sniffed from the source bytes. Vector and animated
    /// sources come back at full resolution with every frame, even when
    /// their extension suggests a static raster.
    pub fn decode_optimized(
        &self,
        path: &Path,
        max_long_side: u32,
    ) -> Result<Optimized, DecodeFailure> {
        let data = read_source(path)?;
        let family = FormatFamily::detect(path, &data);
        let full = self.decode_family(path, &data, family)?;

        if family.prefers_full_decode() || full.is_animated() {
            return Ok(Optimized {
                bitmap: full,
                is_full: true,
            });
        }
        Ok(Optimized {
            bitmap: full.downsample(max_long_side),
            is_full: false,
        })
    }

    /// Decode a previously encoded thumbnail read back from `path`'s cache record
    pub fn decode_encoded(path: &Path, bytes: &[u8]) -> Result<Bitmap, DecodeFailure> {
        let image = image::load_from_memory(bytes).map_err(|e| DecodeFailure::corrupt(path, e))?;
        let has_alpha = image.color().has_alpha();
        Ok(Bitmap::from_image(image.into_rgba8(), has_alpha))
    }

    fn decode_bytes(&self, path: &Path, data: &[u8]) -> Result<Bitmap, DecodeFailure> {
        let family = FormatFamily::detect(path, data);
        self.decode_family(path, data, family)
    }

    fn decode_family(
        &self,
        path: &Path,
        data: &[u8],
        family: FormatFamily,
    ) -> Result<Bitmap, DecodeFailure> {
        let decoder = self.registry.get(family).ok_or_else(|| {
            DecodeFailure::corrupt(path, format!("no decoder registered for {:?}", family))
        })?;

        tracing::trace!(path = %path.display(), ?family, bytes = data.len(), "decoding");
        decoder.decode(path, data)
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>, DecodeFailure> {
    fs::read(path).map_err(|e| DecodeFailure::unreadable(path, e))
}
