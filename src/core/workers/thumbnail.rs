//! Thumbnail enrichment: cache probing and generation.

use super::{Enricher, Role};
use crate::core::store::Record;
use crate::core::thumbnails::{is_decodable, Thumbnail, ThumbnailCache, MAX_SOURCE_BYTES};
use crate::error::{EnrichError, ThumbnailError};
use std::path::PathBuf;
use std::sync::Arc;

/// Looks a record's thumbnail up in the cache without decoding anything.
///
/// A miss still marks the record loaded; it shows a placeholder until a
/// [`ThumbnailGenerator`] fills the cache.
pub struct ThumbnailEnricher {
    cache: Arc<dyn ThumbnailCache>,
    size: u32,
}

impl ThumbnailEnricher {
    pub fn new(cache: Arc<dyn ThumbnailCache>, size: u32) -> Self {
        Self { cache, size }
    }
}

impl Enricher for ThumbnailEnricher {
    type Output = Thumbnail;

    fn role(&self) -> Role {
        Role::Thumbnail
    }

    fn is_loaded(&self, record: &Record) -> bool {
        record.enriched.thumbnail_loaded()
    }

    fn wants(&self, record: &Record) -> bool {
        !record.enriched.is_archived()
    }

    fn compute(&self, record: &Record) -> Result<Thumbnail, EnrichError> {
        Ok(self.cache.get_or_placeholder(&record.proxy_key(), self.size))
    }

    fn publish(&self, record: &Record, output: Thumbnail) {
        if let Thumbnail::Cached(path) = output {
            record.enriched.update(|fields| fields.thumbnail = Some(path));
        }
        record.enriched.set_thumbnail_loaded();
    }
}

/// Decodes a record's source image and writes its thumbnail.
///
/// Sequences use their first frame.
pub struct ThumbnailGenerator {
    cache: Arc<dyn ThumbnailCache>,
    size: u32,
    max_source_bytes: u64,
}

impl ThumbnailGenerator {
    pub fn new(cache: Arc<dyn ThumbnailCache>, size: u32) -> Self {
        Self {
            cache,
            size,
            max_source_bytes: MAX_SOURCE_BYTES,
        }
    }

    pub fn with_max_source_bytes(mut self, bytes: u64) -> Self {
        self.max_source_bytes = bytes;
        self
    }
}

impl Enricher for ThumbnailGenerator {
    type Output = PathBuf;

    fn role(&self) -> Role {
        Role::ThumbnailGenerate
    }

    fn is_loaded(&self, record: &Record) -> bool {
        record.enriched.fields().thumbnail.is_some()
    }

    fn wants(&self, record: &Record) -> bool {
        !record.enriched.is_archived()
            && record.entries.first().is_some_and(|source| is_decodable(source))
    }

    fn compute(&self, record: &Record) -> Result<PathBuf, EnrichError> {
        let source = record
            .entries
            .first()
            .ok_or_else(|| EnrichError::NoEntries {
                path: record.status_path.clone(),
            })?;

        let size = std::fs::metadata(source)
            .map_err(|e| EnrichError::Io {
                path: source.clone(),
                source: e,
            })?
            .len();
        if size >= self.max_source_bytes {
            return Err(ThumbnailError::TooLarge {
                path: source.clone(),
                size,
            }
            .into());
        }

        Ok(self.cache.generate(source, &record.proxy_key(), self.size)?)
    }

    fn publish(&self, record: &Record, output: PathBuf) {
        record.enriched.update(|fields| fields.thumbnail = Some(output));
        record.enriched.set_thumbnail_loaded();
    }
}
