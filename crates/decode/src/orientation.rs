//! EXIF orientation handling

use std::io::Cursor;

use image::DynamicImage;

/// Stored orientation of a raster source, as recorded in EXIF tag 0x0112
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// 1: pixels are stored upright
    #[default]
    Identity,
    /// 2: mirrored left to right
    FlipHorizontal,
    /// 3: upside down
    Rotate180,
    /// 4: mirrored top to bottom
    FlipVertical,
    /// 5: mirrored along the top-left/bottom-right diagonal
    Transpose,
    /// 6: needs a 90° clockwise turn to display
    Rotate90,
    /// 7: mirrored along the top-right/bottom-left diagonal
    Transverse,
    /// 8: needs a 270° clockwise turn to display
    Rotate270,
}

impl Orientation {
    /// Map an EXIF orientation value; unknown values are treated as upright
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Identity,
        }
    }

    /// Read the orientation tag from an encoded source
    ///
    /// Sources without EXIF data, or with an unreadable EXIF block, are
    /// treated as upright.
    pub fn read(data: &[u8]) -> Self {
        let mut cursor = Cursor::new(data);
        let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
            return Orientation::Identity;
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Self::from_exif)
            .unwrap_or_default()
    }

    /// Returns true if applying this orientation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90
                | Orientation::Transverse
                | Orientation::Rotate270
        )
    }

    /// Rotate and flip `image` so it is display-ready
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Identity => image,
            Orientation::FlipHorizontal => image.fliph(),
            Orientation::Rotate180 => image.rotate180(),
            Orientation::FlipVertical => image.flipv(),
            Orientation::Transpose => image.rotate90().fliph(),
            Orientation::Rotate90 => image.rotate90(),
            Orientation::Transverse => image.rotate270().fliph(),
            Orientation::Rotate270 => image.rotate270(),
        }
    }
}
