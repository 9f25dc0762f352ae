mod common;

use std::fs::{self, File};
use std::time::{Duration, SystemTime};

use common::{write_exif_jpeg, write_jpeg, write_png, Harness};
use imgview_cache::{MetadataCacheRecord, PersistentMetadataCache};

fn record_for(h: &Harness, source: &std::path::Path) -> MetadataCacheRecord {
    let bytes = fs::read(h.loader.disk_cache().unwrap().record_path(source)).unwrap();
    MetadataCacheRecord::decode(&bytes).unwrap()
}

#[tokio::test]
async fn test_thumbnail_survives_restart() {
    let h = Harness::with_delay(Duration::ZERO);
    let source = write_jpeg(h.dir.path(), "a.jpg", 640, 480);

    let first = h.loader.load_thumbnail(&source).await.unwrap();
    assert_eq!(h.counter.calls(), 1);
    assert!(h.loader.cache_size_bytes() > 0);

    let (counter, restarted) = h.restarted();
    assert_eq!(restarted.cache_size_bytes(), h.loader.cache_size_bytes());

    let second = restarted.load_thumbnail(&source).await.unwrap();
    assert_eq!(second.dimensions(), first.dimensions());
    assert_eq!(counter.calls(), 0);
}

#[tokio::test]
async fn test_record_file_is_named_by_path_hash() {
    let h = Harness::with_delay(Duration::ZERO);
    let source = write_jpeg(h.dir.path(), "a.jpg", 64, 64);
    h.loader.load_thumbnail(&source).await.unwrap();

    let disk = h.loader.disk_cache().unwrap();
    let expected = disk.cache_dir().join(PersistentMetadataCache::key_for(&source));
    assert!(expected.is_file());
    assert_eq!(disk.record_path(&source), expected);
}

#[tokio::test]
async fn test_thumbnail_encoding_follows_alpha() {
    let h = Harness::with_delay(Duration::ZERO);
    let opaque = write_jpeg(h.dir.path(), "opaque.jpg", 300, 200);
    let translucent = write_png(h.dir.path(), "translucent.png", 300, 200);

    h.loader.load_thumbnail(&opaque).await.unwrap();
    h.loader.load_thumbnail(&translucent).await.unwrap();

    let jpeg = record_for(&h, &opaque);
    assert_eq!(&jpeg.thumbnail[..2], &[0xFF, 0xD8]);
    assert!(jpeg.properties().unwrap().is_empty());

    let png = record_for(&h, &translucent);
    assert_eq!(&png.thumbnail[..8], b"\x89PNG\r\n\x1a\n");

    let (_, restarted) = h.restarted();
    let reloaded = restarted.load_thumbnail(&translucent).await.unwrap();
    assert!(reloaded.has_alpha());
}

#[tokio::test]
async fn test_exif_source_is_oriented_and_described() {
    let h = Harness::with_delay(Duration::ZERO);
    let source = write_exif_jpeg(h.dir.path(), "portrait.jpg", 400, 200, 6, "Acme Optics");

    let thumbnail = h.loader.load_thumbnail(&source).await.unwrap();
    assert_eq!(thumbnail.dimensions(), (128, 256));

    let properties = record_for(&h, &source).properties().unwrap();
    assert!(properties["Make"].contains("Acme Optics"));

    let (counter, restarted) = h.restarted();
    let reloaded = restarted.load_thumbnail(&source).await.unwrap();
    assert_eq!(reloaded.dimensions(), (128, 256));
    assert_eq!(counter.calls(), 0);
}

#[tokio::test]
async fn test_record_timestamp_matches_source() {
    let h = Harness::with_delay(Duration::ZERO);
    let source = write_jpeg(h.dir.path(), "a.jpg", 64, 64);
    h.loader.load_thumbnail(&source).await.unwrap();

    let modified = fs::metadata(&source)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    assert!(record_for(&h, &source).is_fresh(modified));
}

#[tokio::test]
async fn test_edited_source_is_redecoded() {
    let h = Harness::with_delay(Duration::ZERO);
    let source = write_jpeg(h.dir.path(), "a.jpg", 400, 400);
    h.loader.load_thumbnail(&source).await.unwrap();

    // Replace the source and move its mtime well past the record's
    write_jpeg(h.dir.path(), "a.jpg", 400, 200);
    File::options()
        .write(true)
        .open(&source)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(30))
        .unwrap();

    let (counter, restarted) = h.restarted();
    let thumbnail = restarted.load_thumbnail(&source).await.unwrap();

    assert_eq!(thumbnail.dimensions(), (256, 128));
    assert_eq!(counter.calls(), 1);
    assert_eq!(restarted.disk_cache().unwrap().stats().invalidations, 1);
}

#[tokio::test]
async fn test_corrupt_record_is_regenerated() {
    let h = Harness::with_delay(Duration::ZERO);
    let source = write_jpeg(h.dir.path(), "a.jpg", 300, 150);
    let record_path = h.loader.disk_cache().unwrap().record_path(&source);
    fs::write(&record_path, b"IVTC but not really").unwrap();

    let thumbnail = h.loader.load_thumbnail(&source).await.unwrap();

    assert_eq!(thumbnail.dimensions(), (256, 128));
    assert_eq!(h.counter.calls(), 1);
    assert!(record_for(&h, &source).thumbnail.starts_with(&[0xFF, 0xD8]));
}

#[tokio::test]
async fn test_clear_persistent_cache() {
    let h = Harness::with_delay(Duration::ZERO);
    for name in ["a.jpg", "b.jpg"] {
        let source = write_jpeg(h.dir.path(), name, 128, 128);
        h.loader.load_thumbnail(&source).await.unwrap();
    }
    assert!(h.loader.cache_size_bytes() > 0);

    h.loader.clear_persistent_cache().await;

    assert_eq!(h.loader.cache_size_bytes(), 0);
    // Memory is a separate tier
    assert_eq!(h.loader.memory_cache().len(), 2);
}

#[tokio::test]
async fn test_set_byte_limit_trims_oldest() {
    let h = Harness::with_delay(Duration::ZERO);
    let mut sources = Vec::new();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let source = write_jpeg(h.dir.path(), name, 300, 300);
        h.loader.load_thumbnail(&source).await.unwrap();
        sources.push(source);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let disk = h.loader.disk_cache().unwrap();
    let newest = fs::metadata(disk.record_path(&sources[2])).unwrap().len();

    h.loader.set_byte_limit(newest).await;

    assert!(h.loader.cache_size_bytes() <= newest);
    assert!(!disk.record_path(&sources[0]).exists());
    assert!(disk.record_path(&sources[2]).exists());
}

#[tokio::test]
async fn test_unusable_cache_dir_falls_back_to_memory() {
    let dir = tempfile::TempDir::new().unwrap();
    let blocker = dir.path().join("cache");
    fs::write(&blocker, b"a file where the cache directory should be").unwrap();

    let loader = imgview_core::ImageLoader::new(&common::config_for(dir.path()));
    let source = write_jpeg(dir.path(), "a.jpg", 300, 300);

    assert!(loader.disk_cache().is_none());
    assert!(loader.load_thumbnail(&source).await.is_some());
    assert_eq!(loader.cache_size_bytes(), 0);
    loader.set_byte_limit(10).await;
    loader.clear_persistent_cache().await;
}
