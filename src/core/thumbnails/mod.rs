//! # Thumbnails Module
//!
//! Disk cache of item thumbnails.
//!
//! Thumbnails are PNG files named after the xxh3 hash of the item's
//! persistence key, so a sequence keeps its thumbnail when its frame range
//! changes. Probing never decodes anything; only [`ThumbnailCache::generate`]
//! touches the source image.

use crate::error::ThumbnailError;
use image::imageops::FilterType;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Sources at or above this size are never decoded
pub const MAX_SOURCE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Default edge length of generated thumbnails, in pixels
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Thumbnail {
    /// A cached image exists at this path
    Cached(PathBuf),
    /// Nothing cached yet; show a placeholder of this size
    Placeholder { size: u32 },
}

/// Trait for thumbnail stores
pub trait ThumbnailCache: Send + Sync {
    /// Where the thumbnail for `key` lives, whether or not it exists
    fn thumbnail_path(&self, key: &str) -> PathBuf;

    fn contains(&self, key: &str) -> bool {
        self.thumbnail_path(key).is_file()
    }

    fn get_or_placeholder(&self, key: &str, size: u32) -> Thumbnail {
        let path = self.thumbnail_path(key);
        if path.is_file() {
            Thumbnail::Cached(path)
        } else {
            Thumbnail::Placeholder { size }
        }
    }

    /// Decode `source`, scale it to fit `size` and store it under `key`
    fn generate(&self, source: &Path, key: &str, size: u32) -> Result<PathBuf, ThumbnailError>;
}

/// Thumbnails stored as PNG files in one directory
#[derive(Debug, Clone)]
pub struct DiskThumbnailCache {
    root: PathBuf,
}

impl DiskThumbnailCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The platform cache directory, e.g. `~/.cache/catalog-indexer/thumbnails`
    pub fn default_location() -> Option<Self> {
        dirs::cache_dir().map(|dir| Self::new(dir.join("catalog-indexer").join("thumbnails")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ThumbnailCache for DiskThumbnailCache {
    fn thumbnail_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{:016x}.png", xxh3_64(key.as_bytes())))
    }

    fn generate(&self, source: &Path, key: &str, size: u32) -> Result<PathBuf, ThumbnailError> {
        let bytes = std::fs::metadata(source)
            .map(|meta| meta.len())
            .map_err(|e| ThumbnailError::DecodeError {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
        if bytes >= MAX_SOURCE_BYTES {
            return Err(ThumbnailError::TooLarge {
                path: source.to_path_buf(),
                size: bytes,
            });
        }

        let image = image::open(source).map_err(|e| ThumbnailError::DecodeError {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let scaled = image.resize(size, size, FilterType::Triangle);

        let dest = self.thumbnail_path(key);
        let write_failed = |reason: String| ThumbnailError::WriteFailed {
            path: dest.clone(),
            reason,
        };
        std::fs::create_dir_all(&self.root).map_err(|e| write_failed(e.to_string()))?;

        // Readers only ever see a complete file.
        let partial = dest.with_extension("part");
        scaled
            .save_with_format(&partial, ImageFormat::Png)
            .map_err(|e| write_failed(e.to_string()))?;
        std::fs::rename(&partial, &dest).map_err(|e| write_failed(e.to_string()))?;

        debug!(source = %source.display(), thumbnail = %dest.display(), "thumbnail written");
        Ok(dest)
    }
}

/// Whether the image crate can decode files with this path's extension
pub fn is_decodable(path: &Path) -> bool {
    ImageFormat::from_path(path)
        .map(|format| format.reading_enabled())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 90]));
        img.save(path).unwrap();
    }

    #[test]
    fn lookup_misses_until_generated() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("plate.png");
        write_png(&source, 64, 32);
        let cache = DiskThumbnailCache::new(temp_dir.path().join("thumbs"));

        assert!(!cache.contains("/p/plate.png"));
        assert_eq!(
            cache.get_or_placeholder("/p/plate.png", 128),
            Thumbnail::Placeholder { size: 128 }
        );

        let written = cache.generate(&source, "/p/plate.png", 16).unwrap();

        assert!(cache.contains("/p/plate.png"));
        assert_eq!(
            cache.get_or_placeholder("/p/plate.png", 128),
            Thumbnail::Cached(written.clone())
        );
        let thumb = image::open(&written).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (16, 8));
    }

    #[test]
    fn keys_map_to_distinct_files() {
        let cache = DiskThumbnailCache::new("/cache");
        assert_ne!(cache.thumbnail_path("/a.png"), cache.thumbnail_path("/b.png"));
        assert_eq!(cache.thumbnail_path("/a.png"), cache.thumbnail_path("/a.png"));
    }

    #[test]
    fn undecodable_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.png");
        std::fs::write(&source, b"not an image").unwrap();
        let cache = DiskThumbnailCache::new(temp_dir.path().join("thumbs"));

        let result = cache.generate(&source, "/broken.png", 16);

        assert!(matches!(result, Err(ThumbnailError::DecodeError { .. })));
        assert!(!cache.contains("/broken.png"));
    }

    #[test]
    fn decodable_extensions() {
        assert!(is_decodable(Path::new("/p/plate.png")));
        assert!(is_decodable(Path::new("/p/plate.JPG")));
        assert!(!is_decodable(Path::new("/p/scene.ma")));
    }
}
