//! Format family detection

use std::path::Path;

use image::ImageFormat;

/// Broad decoding strategy for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatFamily {
    /// Resolution-independent sources rasterized on demand (SVG)
    Vector,
    /// Multi-frame sources whose frames must survive decoding (GIF, APNG, WebP)
    Animated,
    /// Everything else: decoded to one frame and oriented
    StaticRaster,
}

impl FormatFamily {
    /// Classify a source by its file extension alone
    ///
    /// This never touches the file system, which makes it cheap enough for
    /// request routing.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "svg" | "svgz" => FormatFamily::Vector,
            "gif" | "apng" | "webp" => FormatFamily::Animated,
            _ => FormatFamily::StaticRaster,
        }
    }

    /// Classify a source from its extension, refined by sniffing its bytes
    ///
    /// Sniffing catches animated PNGs saved with a `.png` extension and
    /// sources whose extension is missing or wrong.
    pub fn detect(path: &Path, data: &[u8]) -> Self {
        match Self::from_path(path) {
            FormatFamily::Vector => return FormatFamily::Vector,
            FormatFamily::Animated => return FormatFamily::Animated,
            FormatFamily::StaticRaster => {}
        }

        match image::guess_format(data) {
            Ok(ImageFormat::Gif) => FormatFamily::Animated,
            Ok(ImageFormat::Png) if is_apng(data) => FormatFamily::Animated,
            Ok(_) => FormatFamily::StaticRaster,
            Err(_) if looks_like_svg(data) => FormatFamily::Vector,
            Err(_) => FormatFamily::StaticRaster,
        }
    }

    /// Returns true if downsampling gives no benefit for this family
    pub fn prefers_full_decode(&self) -> bool {
        matches!(self, FormatFamily::Vector | FormatFamily::Animated)
    }
}

/// An APNG carries an `acTL` chunk ahead of its first `IDAT`
fn is_apng(data: &[u8]) -> bool {
    let idat = find(data, b"IDAT").unwrap_or(data.len());
    find(&data[..idat], b"acTL").is_some()
}

fn looks_like_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
