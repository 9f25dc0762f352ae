#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::GifEncoder;
use image::{Delay, DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use imgview_cache::CacheConfig;
use imgview_core::ImageLoader;
use imgview_decode::{
    Bitmap, DecodeFailure, DecodePipeline, Decoder, DecoderRegistry, FormatFamily, RasterDecoder,
};
use tempfile::TempDir;

/// Static raster decoder that counts invocations and takes a while
pub struct CountingDecoder {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingDecoder {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for CountingDecoder {
    fn decode(&self, path: &Path, data: &[u8]) -> Result<Bitmap, DecodeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        RasterDecoder.decode(path, data)
    }
}

/// A loader over a scratch directory whose static raster decodes are counted
pub struct Harness {
    pub dir: TempDir,
    pub counter: Arc<CountingDecoder>,
    pub loader: ImageLoader,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(50))
    }

    pub fn with_delay(delay: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let counter = CountingDecoder::new(delay);
        let loader = loader_for(dir.path(), &counter);
        Self {
            dir,
            counter,
            loader,
        }
    }

    /// A second loader sharing this harness's cache directory, as after a restart
    pub fn restarted(&self) -> (Arc<CountingDecoder>, ImageLoader) {
        let counter = CountingDecoder::new(Duration::ZERO);
        let loader = loader_for(self.dir.path(), &counter);
        (counter, loader)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn config_for(dir: &Path) -> CacheConfig {
    CacheConfig::default()
        .with_disk_dir(dir.join("cache"))
        .with_disk_mb(16)
        .with_memory_mb(64)
}

fn loader_for(dir: &Path, counter: &Arc<CountingDecoder>) -> ImageLoader {
    let registry = DecoderRegistry::default()
        .with(FormatFamily::StaticRaster, Arc::clone(counter) as Arc<dyn Decoder>);
    ImageLoader::with_pipeline(&config_for(dir), DecodePipeline::with_registry(registry))
}

pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    DynamicImage::ImageRgb8(image)
        .save_with_format(&path, ImageFormat::Jpeg)
        .unwrap();
    path
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let image = RgbaImage::from_pixel(width, height, Rgba([20, 40, 200, 128]));
    DynamicImage::ImageRgba8(image)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

pub fn write_gif(dir: &Path, name: &str, frames: u8) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GifEncoder::new(file);
    for i in 0..frames {
        let image = RgbaImage::from_pixel(16, 16, Rgba([i * 60, 0, 0, 255]));
        encoder
            .encode_frame(Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(100, 1)))
            .unwrap();
    }
    path
}

pub fn write_svg(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(
        &path,
        r#"<svg xmlns="http://www.w3.org/2000/svg"><circle cx="50" cy="50" r="40" fill="red"/></svg>"#,
    )
    .unwrap();
    path
}

/// Write an APNG of `frames` solid frames under `name`, typically `*.png`
pub fn write_apng(dir: &Path, name: &str, width: u32, height: u32, frames: u8) -> PathBuf {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // 8-bit RGBA, default compression, filter and interlace
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

    let mut actl = Vec::new();
    actl.extend_from_slice(&u32::from(frames).to_be_bytes());
    actl.extend_from_slice(&0u32.to_be_bytes());

    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    push_chunk(&mut data, b"IHDR", &ihdr);
    push_chunk(&mut data, b"acTL", &actl);

    let mut sequence = 0u32;
    for i in 0..frames {
        let mut fctl = sequence.to_be_bytes().to_vec();
        fctl.extend_from_slice(&width.to_be_bytes());
        fctl.extend_from_slice(&height.to_be_bytes());
        fctl.extend_from_slice(&[0; 8]);
        // 100 ms delay, no disposal, source blending
        fctl.extend_from_slice(&[0, 1, 0, 10, 0, 0]);
        push_chunk(&mut data, b"fcTL", &fctl);
        sequence += 1;

        let mut scanlines = Vec::new();
        for _ in 0..height {
            scanlines.push(0);
            for _ in 0..width {
                scanlines.extend_from_slice(&[i.wrapping_mul(80), 40, 200, 255]);
            }
        }
        let compressed = zlib_stored(&scanlines);

        if i == 0 {
            push_chunk(&mut data, b"IDAT", &compressed);
        } else {
            let mut fdat = sequence.to_be_bytes().to_vec();
            fdat.extend_from_slice(&compressed);
            push_chunk(&mut data, b"fdAT", &fdat);
            sequence += 1;
        }
    }
    push_chunk(&mut data, b"IEND", &[]);

    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    let crc = crc32(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}

/// zlib stream made of uncompressed deflate blocks
fn zlib_stored(raw: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];
    let mut blocks = raw.chunks(u16::MAX as usize).peekable();
    if blocks.peek().is_none() {
        out.extend_from_slice(&[1, 0, 0, 0xFF, 0xFF]);
    }
    while let Some(block) = blocks.next() {
        out.push(u8::from(blocks.peek().is_none()));
        let len = block.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(block);
    }

    let (mut a, mut b) = (1u32, 0u32);
    for &byte in raw {
        a = (a + u32::from(byte)) % 65_521;
        b = (b + a) % 65_521;
    }
    out.extend_from_slice(&((b << 16) | a).to_be_bytes());
    out
}

/// Write a JPEG whose EXIF block carries `orientation` and a `Make` of `make`
pub fn write_exif_jpeg(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    orientation: u16,
    make: &str,
) -> PathBuf {
    let path = write_jpeg(dir, name, width, height);
    let jpeg = std::fs::read(&path).unwrap();
    let make = format!("{}\0", make);

    let mut tiff = b"MM\0\x2a".to_vec();
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    // Make, stored after the IFD
    tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&(make.len() as u32).to_be_bytes());
    tiff.extend_from_slice(&38u32.to_be_bytes());
    // Orientation, inline
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(make.as_bytes());

    let mut segment = b"Exif\0\0".to_vec();
    segment.extend_from_slice(&tiff);

    let mut data = jpeg[..2].to_vec();
    data.extend_from_slice(&[0xFF, 0xE1]);
    data.extend_from_slice(&((segment.len() + 2) as u16).to_be_bytes());
    data.extend_from_slice(&segment);
    data.extend_from_slice(&jpeg[2..]);
    std::fs::write(&path, data).unwrap();
    path
}
