//! Vector (SVG) rasterization

use std::path::Path;

use image::RgbaImage;
use resvg::usvg::roxmltree;
use resvg::{tiny_skia, usvg};

use crate::error::validate_dimensions;
use crate::{Bitmap, DecodeFailure, Decoder};

/// Canvas edge used when a vector source declares no intrinsic size
pub const DEFAULT_VECTOR_CANVAS: u32 = 512;

/// Rasterizes SVG and SVGZ sources at their intrinsic size
///
/// Vector sources often omit `width`/`height` and `viewBox`; those are
/// rendered onto a square default canvas instead of failing.
#[derive(Debug, Clone, Copy)]
pub struct VectorDecoder {
    default_canvas: u32,
}

impl VectorDecoder {
    /// Create a decoder with a custom default canvas edge
    pub fn with_default_canvas(default_canvas: u32) -> Self {
        Self {
            default_canvas: default_canvas.max(1),
        }
    }
}

impl Default for VectorDecoder {
    fn default() -> Self {
        Self::with_default_canvas(DEFAULT_VECTOR_CANVAS)
    }
}

impl Decoder for VectorDecoder {
    fn decode(&self, path: &Path, data: &[u8]) -> Result<Bitmap, DecodeFailure> {
        let canvas = self.default_canvas as f32;

        let mut options = usvg::Options::default();
        if let Some(size) = usvg::Size::from_wh(canvas, canvas) {
            options.default_size = size;
        }
        options.resources_dir = path.parent().map(Path::to_path_buf);

        let tree = usvg::Tree::from_data(data, &options)
            .map_err(|e| DecodeFailure::corrupt(path, format!("failed to parse SVG: {}", e)))?;

        // usvg sizes an undeclared root from its content, so check the markup
        let size = tree.size();
        let (width, height, transform) = if declares_size(data) {
            let width = size.width().ceil().max(1.0) as u32;
            let height = size.height().ceil().max(1.0) as u32;
            let transform = tiny_skia::Transform::from_scale(
                width as f32 / size.width(),
                height as f32 / size.height(),
            );
            (width, height, transform)
        } else {
            (
                self.default_canvas,
                self.default_canvas,
                tiny_skia::Transform::identity(),
            )
        };
        validate_dimensions(path, width, height)?;

        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| DecodeFailure::corrupt(path, "cannot allocate SVG canvas"))?;

        resvg::render(&tree, transform, &mut pixmap.as_mut());

        // tiny-skia stores premultiplied pixels
        let pixels = pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect::<Vec<u8>>();

        let image = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| DecodeFailure::corrupt(path, "SVG canvas size mismatch"))?;

        Ok(Bitmap::from_image(image, true))
    }
}

/// Returns true if the root `<svg>` element carries `width`, `height` or `viewBox`
fn declares_size(data: &[u8]) -> bool {
    let inflated;
    let data = if data.starts_with(&[0x1f, 0x8b]) {
        match usvg::decompress_svgz(data) {
            Ok(bytes) => {
                inflated = bytes;
                inflated.as_slice()
            }
            Err(_) => return false,
        }
    } else {
        data
    };

    let Ok(text) = std::str::from_utf8(data) else {
        return false;
    };
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let text = text.trim_start_matches('\u{feff}');
    let Ok(doc) = roxmltree::Document::parse_with_options(text, options) else {
        return false;
    };

    let root = doc.root_element();
    root.tag_name().name() == "svg"
        && ["width", "height", "viewBox"]
            .iter()
            .any(|name| root.attribute(*name).is_some())
}
