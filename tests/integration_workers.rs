//! Integration tests for background enrichment.
//!
//! These tests verify end-to-end worker behavior including:
//! - Info enrichment of sequences
//! - Thumbnail generation and cache reuse
//! - Results discarded after a rescan
//! - Failures reported without aborting the pool

use assert_fs::prelude::*;
use assert_fs::TempDir;
use catalog_indexer::core::persistence::{InMemoryStore, PersistenceStore};
use catalog_indexer::core::store::{BucketKey, Granularity, ItemKind};
use catalog_indexer::core::thumbnails::{DiskThumbnailCache, ThumbnailCache};
use catalog_indexer::core::{Catalog, Role};
use catalog_indexer::events::{BucketEvent, Event, EventChannel, WorkerEvent};
use image::{ImageBuffer, Rgb};
use predicates::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(20);

fn write_png(path: &Path) {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(64, 32, |x, y| Rgb([x as u8 * 4, y as u8 * 8, 128]));
    img.save(path).unwrap();
}

fn plates(temp: &TempDir) -> std::path::PathBuf {
    let plates = temp.child("plates");
    plates.create_dir_all().unwrap();
    for frame in 1..=3 {
        write_png(plates.child(format!("bg.{:04}.png", frame)).path());
    }
    plates.child("readme.txt").write_str("plate notes").unwrap();
    plates.path().to_path_buf()
}

fn catalog(temp: &TempDir, persistence: Arc<dyn PersistenceStore>) -> Catalog {
    Catalog::builder()
        .persistence(persistence)
        .thumbnails(Arc::new(DiskThumbnailCache::new(temp.child("thumbs").path())))
        .thumbnail_size(16)
        .enrich_on_scan(false)
        .build()
}

#[test]
fn info_pass_fills_sequence_details() {
    let temp = TempDir::new().unwrap();
    let root = plates(&temp);
    let persistence: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
    let (sender, receiver) = EventChannel::new();
    let mut catalog = Catalog::builder()
        .persistence(Arc::clone(&persistence))
        .thumbnails(Arc::new(DiskThumbnailCache::new(temp.child("thumbs").path())))
        .generate_thumbnails(false)
        .enrich_on_scan(false)
        .events(sender)
        .build();

    catalog.scan("plates", &root).unwrap();
    let key = BucketKey::new("plates", Granularity::Sequence);
    let row = catalog
        .bucket(&key)
        .unwrap()
        .iter()
        .position(|record| record.kind == ItemKind::Sequence)
        .unwrap();
    let proxy = catalog.bucket(&key).unwrap().get(row).unwrap().proxy_key();
    persistence.set_description(&proxy, "clean plate").unwrap();
    receiver.drain();

    assert_eq!(catalog.enqueue_visible(&key, [row], Role::Info), 1);
    assert!(catalog.wait_idle(WAIT));

    let record = catalog.bucket(&key).unwrap().get(row).unwrap().clone();
    assert!(record.enriched.info_loaded());
    let expected: u64 = record
        .entries
        .iter()
        .map(|entry| std::fs::metadata(entry).unwrap().len())
        .sum();
    let fields = record.enriched.fields();
    assert_eq!(fields.size, expected);
    assert_eq!(fields.description, "clean plate");
    assert!(predicate::str::starts_with("3f;").eval(&fields.detail));
    drop(fields);

    let events = receiver.drain();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::Bucket(BucketEvent::RowChanged { row: changed, .. }) if *changed == row
    )));

    // Loaded items are not queued again.
    assert_eq!(catalog.enqueue_visible(&key, [row], Role::Info), 0);
    catalog.shutdown();
}

#[test]
fn thumbnails_are_generated_then_reused() {
    let temp = TempDir::new().unwrap();
    let root = plates(&temp);
    let key = BucketKey::new("plates", Granularity::Sequence);

    let mut first = catalog(&temp, Arc::new(InMemoryStore::new()));
    first.scan("plates", &root).unwrap();
    assert!(first.enqueue_all_visible(&key) > 0);
    assert!(first.wait_idle(WAIT));

    let bucket = first.bucket(&key).unwrap();
    let sequence = bucket
        .iter()
        .find(|record| record.kind == ItemKind::Sequence)
        .unwrap();
    let thumbnail = sequence.enriched.fields().thumbnail.clone().unwrap();
    assert!(predicate::path::is_file().eval(&thumbnail));
    assert!(predicate::str::ends_with(".png").eval(&thumbnail.to_string_lossy()));

    let text = bucket
        .iter()
        .find(|record| record.kind == ItemKind::File)
        .unwrap();
    assert!(text.enriched.fields().thumbnail.is_none());
    first.shutdown();

    // A lookup-only catalog finds the cached image without decoding.
    let mut second = Catalog::builder()
        .thumbnails(Arc::new(DiskThumbnailCache::new(temp.child("thumbs").path())))
        .thumbnail_size(16)
        .generate_thumbnails(false)
        .enrich_on_scan(false)
        .build();
    second.scan("plates", &root).unwrap();
    let rows = second.bucket(&key).unwrap().len();
    second.enqueue_visible(&key, 0..rows, Role::Thumbnail);
    assert!(second.wait_idle(WAIT));

    let bucket = second.bucket(&key).unwrap();
    let sequence = bucket
        .iter()
        .find(|record| record.kind == ItemKind::Sequence)
        .unwrap();
    assert!(sequence.enriched.thumbnail_loaded());
    assert_eq!(sequence.enriched.fields().thumbnail.clone(), Some(thumbnail));
    second.shutdown();
}

#[test]
fn rescan_discards_outstanding_work() {
    let temp = TempDir::new().unwrap();
    let root = plates(&temp);
    let mut catalog = catalog(&temp, Arc::new(InMemoryStore::new()));
    let key = BucketKey::new("plates", Granularity::File);

    catalog.scan("plates", &root).unwrap();
    let old = catalog.bucket(&key).unwrap().handle(0).unwrap();
    let rows = catalog.bucket(&key).unwrap().len();
    catalog.enqueue_visible(&key, 0..rows, Role::Info);

    catalog.scan("plates", &root).unwrap();
    assert!(catalog.wait_idle(WAIT));

    assert!(!old.is_valid());
    let bucket = catalog.bucket(&key).unwrap();
    assert_eq!(bucket.len(), rows);
    assert!(bucket.iter().all(|record| !record.enriched.info_loaded()));
    catalog.shutdown();
}

#[test]
fn undecodable_image_fails_without_stopping_the_pool() {
    let temp = TempDir::new().unwrap();
    let root = plates(&temp);
    temp.child("plates")
        .child("broken.png")
        .write_binary(b"not an image")
        .unwrap();
    let (sender, receiver) = EventChannel::new();
    let mut catalog = Catalog::builder()
        .thumbnails(Arc::new(DiskThumbnailCache::new(temp.child("thumbs").path())))
        .thumbnail_size(16)
        .events(sender)
        .build();
    let key = BucketKey::new("plates", Granularity::File);

    catalog.scan("plates", &root).unwrap();
    let rows = catalog.bucket(&key).unwrap().len();
    catalog.enqueue_visible(&key, 0..rows, Role::ThumbnailGenerate);
    assert!(catalog.wait_idle(WAIT));

    let bucket = catalog.bucket(&key).unwrap();
    let broken = bucket
        .iter()
        .find(|record| record.display_name == "broken.png")
        .unwrap();
    assert!(broken.enriched.has_failed(Role::ThumbnailGenerate));
    assert!(broken.enriched.fields().thumbnail.is_none());

    let generated = bucket
        .iter()
        .filter(|record| record.enriched.fields().thumbnail.is_some())
        .count();
    assert_eq!(generated, 3);

    assert!(receiver.drain().iter().any(|event| matches!(
        event,
        Event::Worker(WorkerEvent::Failed { role: Role::ThumbnailGenerate, path, .. })
            if path.ends_with("broken.png")
    )));

    // Failed items are not retried within the same generation.
    assert_eq!(
        catalog.enqueue_visible(&key, 0..rows, Role::ThumbnailGenerate),
        0
    );
    catalog.shutdown();
}
