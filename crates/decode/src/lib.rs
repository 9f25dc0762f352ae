//! Image decode pipeline
//!
//! Turns a source file into a display-ready [`Bitmap`] or an encoded
//! thumbnail. Decoding is dispatched by [`FormatFamily`]:
//!
//! - **Vector** sources (SVG) are rasterized with `resvg`
//! - **Animated** sources (GIF, APNG, animated WebP) keep every frame
//! - **Static raster** sources are decoded to one frame and EXIF-oriented
//!
//! Every function here is synchronous and CPU bound. Callers running inside
//! an async runtime should move the work onto a blocking thread.
//!
//! # Example
//!
//! ```no_run
//! use imgview_decode::DecodePipeline;
//!
//! let pipeline = DecodePipeline::new();
//! let thumbnail = pipeline.decode_thumbnail("photo.jpg".as_ref(), 256)?;
//! println!(
//!     "{}x{} thumbnail, {} encoded bytes",
//!     thumbnail.bitmap.width(),
//!     thumbnail.bitmap.height(),
//!     thumbnail.encoded.bytes.len()
//! );
//! # Ok::<(), imgview_decode::DecodeFailure>(())
//! ```

mod animated;
mod bitmap;
mod error;
mod format;
mod orientation;
mod pipeline;
mod properties;
mod raster;
mod registry;
mod thumbnail;
mod vector;

pub use animated::AnimatedDecoder;
pub use bitmap::{Bitmap, Frame};
pub use error::DecodeFailure;
pub use format::FormatFamily;
pub use orientation::Orientation;
pub use pipeline::{DecodePipeline, Optimized, Thumbnail};
pub use properties::PropertyTable;
pub use raster::RasterDecoder;
pub use registry::{Decoder, DecoderRegistry};
pub use thumbnail::{EncodedThumbnail, ThumbnailFormat, JPEG_QUALITY};
pub use vector::{VectorDecoder, DEFAULT_VECTOR_CANVAS};

/// Largest accepted width or height of a decoded source
pub const MAX_IMAGE_DIMENSION: u32 = 65_535;

/// Largest accepted pixel count of a decoded source (100 megapixels)
pub const MAX_PIXEL_COUNT: u64 = 100_000_000;
