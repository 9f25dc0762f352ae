//! Decoded pixel buffers

use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// One frame of a decoded image
#[derive(Debug, Clone)]
pub struct Frame {
    /// Straight (non-premultiplied) RGBA pixels
    pub image: RgbaImage,

    /// How long this frame is shown; zero for still images
    pub delay: Duration,
}

impl Frame {
    /// Create a still frame
    pub fn still(image: RgbaImage) -> Self {
        Self {
            image,
            delay: Duration::ZERO,
        }
    }
}

/// A decoded, display-ready image
///
/// Holds one frame for still images and every frame for animations. All
/// frames share the canvas size of the first one.
#[derive(Debug, Clone)]
pub struct Bitmap {
    frames: Vec<Frame>,
    has_alpha: bool,
}

impl Bitmap {
    /// Create a still bitmap from a single RGBA image
    pub fn from_image(image: RgbaImage, has_alpha: bool) -> Self {
        Self {
            frames: vec![Frame::still(image)],
            has_alpha,
        }
    }

    /// Create a bitmap from decoded frames
    ///
    /// Returns `None` if `frames` is empty.
    pub fn from_frames(frames: Vec<Frame>, has_alpha: bool) -> Option<Self> {
        if frames.is_empty() {
            return None;
        }
        Some(Self { frames, has_alpha })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.first_frame().width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.first_frame().height()
    }

    /// (width, height) in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        self.first_frame().dimensions()
    }

    /// The longer of width and height
    pub fn long_side(&self) -> u32 {
        self.width().max(self.height())
    }

    /// The first (or only) frame's pixels
    pub fn first_frame(&self) -> &RgbaImage {
        &self.frames[0].image
    }

    /// All frames in display order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the bitmap carries more than one frame
    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Returns true if the source had an alpha channel
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Estimated memory cost in bytes (`width * height * 4` per frame)
    pub fn byte_cost(&self) -> usize {
        let (width, height) = self.dimensions();
        width as usize * height as usize * 4 * self.frames.len()
    }

    /// Produce a still bitmap whose long side is at most `max_long_side`
    ///
    /// Only the first frame is kept. Images already within the bound are
    /// copied without resampling, never upscaled.
    pub fn downsample(&self, max_long_side: u32) -> Bitmap {
        let (width, height) = self.dimensions();
        let (target_width, target_height) = fit_within(width, height, max_long_side);

        let image = if (target_width, target_height) == (width, height) {
            self.first_frame().clone()
        } else {
            imageops::resize(
                self.first_frame(),
                target_width,
                target_height,
                FilterType::Triangle,
            )
        };

        Bitmap::from_image(image, self.has_alpha)
    }
}

/// Scale (width, height) down so the long side fits `max_long_side`
///
/// A bound of 0 is treated as 1 so every dimension stays non-empty.
pub(crate) fn fit_within(width: u32, height: u32, max_long_side: u32) -> (u32, u32) {
    let max_long_side = max_long_side.max(1);
    let long_side = width.max(height);
    if long_side <= max_long_side || long_side == 0 {
        return (width, height);
    }

    let scale = max_long_side as f64 / long_side as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_long_side);
    (scaled(width), scaled(height))
}
