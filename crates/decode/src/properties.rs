//! EXIF property extraction

use std::collections::BTreeMap;
use std::io::Cursor;

/// EXIF-like key/value pairs describing a source, ordered by key
pub type PropertyTable = BTreeMap<String, String>;

/// Collect the primary-image EXIF fields of an encoded source
///
/// Returns an empty table for sources without EXIF data.
pub(crate) fn read_properties(data: &[u8]) -> PropertyTable {
    let mut cursor = Cursor::new(data);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return PropertyTable::new();
    };

    exif.fields()
        .filter(|field| field.ifd_num == exif::In::PRIMARY)
        .map(|field| {
            (
                field.tag.to_string(),
                field.display_value().with_unit(&exif).to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::tests::with_exif;

    #[test]
    fn test_no_exif_yields_empty_table() {
        assert!(read_properties(b"\x89PNG\r\n\x1a\n").is_empty());
        assert!(read_properties(&[]).is_empty());
    }

    #[test]
    fn test_reads_primary_fields() {
        let image = image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let properties = read_properties(&with_exif(&jpeg, 6, "Acme Optics"));
        assert!(properties["Make"].contains("Acme Optics"));
        assert!(properties.contains_key("Orientation"));
    }
}
