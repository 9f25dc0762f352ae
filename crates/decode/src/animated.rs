//! Multi-frame decoding for animated sources

use std::io::Cursor;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, ImageResult};

use crate::error::validate_dimensions;
use crate::{Bitmap, DecodeFailure, Decoder, Frame};

/// Decodes GIF, APNG and WebP sources frame by frame
///
/// Frames are composited onto the full canvas by the codec, so every frame
/// of the resulting bitmap has the same dimensions. Sources that turn out
/// to hold a single frame decode to a still bitmap.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimatedDecoder;

impl AnimatedDecoder {
    fn frames(data: &[u8], format: ImageFormat) -> ImageResult<Option<Vec<image::Frame>>> {
        let frames = match format {
            ImageFormat::Gif => GifDecoder::new(Cursor::new(data))?
                .into_frames()
                .collect_frames()?,
            ImageFormat::Png => {
                let decoder = PngDecoder::new(Cursor::new(data))?;
                if !decoder.is_apng()? {
                    return Ok(None);
                }
                decoder.apng()?.into_frames().collect_frames()?
            }
            ImageFormat::WebP => {
                let decoder = WebPDecoder::new(Cursor::new(data))?;
                if !decoder.has_animation() {
                    return Ok(None);
                }
                decoder.into_frames().collect_frames()?
            }
            _ => return Ok(None),
        };
        Ok(Some(frames))
    }
}

impl Decoder for AnimatedDecoder {
    fn decode(&self, path: &Path, data: &[u8]) -> Result<Bitmap, DecodeFailure> {
        let format = image::guess_format(data).map_err(|e| DecodeFailure::corrupt(path, e))?;

        let Some(frames) = Self::frames(data, format).map_err(|e| DecodeFailure::corrupt(path, e))?
        else {
            // Not actually animated; decode the single frame as-is
            let image = image::load_from_memory_with_format(data, format)
                .map_err(|e| DecodeFailure::corrupt(path, e))?;
            validate_dimensions(path, image.width(), image.height())?;
            let has_alpha = image.color().has_alpha();
            return Ok(Bitmap::from_image(image.into_rgba8(), has_alpha));
        };

        let frames = frames
            .into_iter()
            .map(|frame| Frame {
                delay: frame.delay().into(),
                image: frame.into_buffer(),
            })
            .collect::<Vec<_>>();

        let first = frames
            .first()
            .ok_or_else(|| DecodeFailure::corrupt(path, "animation has no frames"))?;
        validate_dimensions(path, first.image.width(), first.image.height())?;
        let has_alpha = first.image.pixels().any(|pixel| pixel.0[3] < u8::MAX);

        Bitmap::from_frames(frames, has_alpha)
            .ok_or_else(|| DecodeFailure::corrupt(path, "animation has no frames"))
    }
}
