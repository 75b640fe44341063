//! Owner-side facade tying the engine together.
//!
//! A [`Catalog`] owns the data store, the scanner, one worker pool per role
//! and the filter. Every method runs on the caller's thread and returns
//! without waiting on workers; progress arrives through the event channel.

use crate::core::filter::{FilterFlag, FilterView};
use crate::core::persistence::{InMemoryStore, PersistenceStore};
use crate::core::scanner::{
    persistence_key, CancellationToken, Collection, FilesystemWalker, ScanConfig, ScanSummary,
    Scanner,
};
use crate::core::store::{
    Bucket, BucketKey, DataStore, Granularity, Record, SortKey, SortPreference,
};
use crate::core::thumbnails::{DiskThumbnailCache, ThumbnailCache, DEFAULT_THUMBNAIL_SIZE};
use crate::core::workers::{
    InfoEnricher, PoolConfig, Role, ThumbnailEnricher, ThumbnailGenerator, WorkerPool,
};
use crate::error::{CatalogError, Result, StoreError};
use crate::events::{null_sender, BucketEvent, Event, EventSender};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// User-toggled, persisted item flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemFlag {
    Archived,
    Favourite,
}

/// Builder for a [`Catalog`]
pub struct CatalogBuilder {
    scan_config: ScanConfig,
    pools: PoolConfig,
    persistence: Option<Arc<dyn PersistenceStore>>,
    thumbnails: Option<Arc<dyn ThumbnailCache>>,
    walker: Option<Box<dyn FilesystemWalker>>,
    thumbnail_size: u32,
    generate_thumbnails: bool,
    enrich_on_scan: bool,
    events: EventSender,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            scan_config: ScanConfig::default(),
            pools: PoolConfig::default(),
            persistence: None,
            thumbnails: None,
            walker: None,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            generate_thumbnails: true,
            enrich_on_scan: true,
            events: null_sender(),
        }
    }

    /// Set scanner configuration
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.scan_config = config;
        self
    }

    /// Set thread counts per role
    pub fn pools(mut self, pools: PoolConfig) -> Self {
        self.pools = pools;
        self
    }

    /// Set the persistence backend
    pub fn persistence(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.persistence = Some(store);
        self
    }

    /// Set the thumbnail cache
    pub fn thumbnails(mut self, cache: Arc<dyn ThumbnailCache>) -> Self {
        self.thumbnails = Some(cache);
        self
    }

    /// Replace the filesystem walker
    pub fn walker(mut self, walker: Box<dyn FilesystemWalker>) -> Self {
        self.walker = Some(walker);
        self
    }

    pub fn thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }

    /// Start a pool that creates missing thumbnails
    pub fn generate_thumbnails(mut self, generate: bool) -> Self {
        self.generate_thumbnails = generate;
        self
    }

    /// Queue every row for enrichment as soon as a scan publishes it.
    /// When off, callers queue rows themselves (e.g. only the viewport).
    pub fn enrich_on_scan(mut self, enrich: bool) -> Self {
        self.enrich_on_scan = enrich;
        self
    }

    pub fn events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Catalog {
        let persistence = self
            .persistence
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let thumbnails = self.thumbnails.unwrap_or_else(|| {
            let cache = DiskThumbnailCache::default_location().unwrap_or_else(|| {
                DiskThumbnailCache::new(std::env::temp_dir().join("catalog-indexer-thumbnails"))
            });
            Arc::new(cache)
        });

        let mut scanner = Scanner::new(self.scan_config, Arc::clone(&persistence))
            .with_events(self.events.clone());
        if let Some(walker) = self.walker {
            scanner = scanner.with_walker(walker);
        }

        let info = WorkerPool::new(
            InfoEnricher::new(Arc::clone(&persistence)),
            self.pools.threads_for(Role::Info),
            self.events.clone(),
        );
        let thumbnail = WorkerPool::new(
            ThumbnailEnricher::new(Arc::clone(&thumbnails), self.thumbnail_size),
            self.pools.threads_for(Role::Thumbnail),
            self.events.clone(),
        );
        let generator = self.generate_thumbnails.then(|| {
            WorkerPool::new(
                ThumbnailGenerator::new(thumbnails, self.thumbnail_size),
                self.pools.threads_for(Role::ThumbnailGenerate),
                self.events.clone(),
            )
        });

        Catalog {
            store: DataStore::new(),
            scanner,
            persistence,
            info,
            thumbnail,
            generator,
            filter: FilterView::new(),
            enrich_on_scan: self.enrich_on_scan,
            events: self.events,
        }
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The catalog engine as seen from the owner thread
pub struct Catalog {
    store: DataStore,
    scanner: Scanner,
    persistence: Arc<dyn PersistenceStore>,
    info: WorkerPool<InfoEnricher>,
    thumbnail: WorkerPool<ThumbnailEnricher>,
    generator: Option<WorkerPool<ThumbnailGenerator>>,
    filter: FilterView,
    enrich_on_scan: bool,
    events: EventSender,
}

impl Catalog {
    /// Create a new catalog builder
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn bucket(&self, key: &BucketKey) -> Option<&Bucket> {
        self.store.bucket(key)
    }

    pub fn persistence(&self) -> &Arc<dyn PersistenceStore> {
        &self.persistence
    }

    /// Scan `root` as `collection`, replacing both of its buckets
    pub fn scan(&mut self, collection: &str, root: &Path) -> Result<ScanSummary> {
        self.scan_collection(&Collection::new(collection, root), &CancellationToken::new())
    }

    pub fn scan_collection(
        &mut self,
        collection: &Collection,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary> {
        for granularity in Granularity::ALL {
            self.cancel_bucket(&collection.key(granularity));
        }
        let summary = self.scanner.scan(&mut self.store, collection, cancel)?;

        if self.enrich_on_scan {
            let mut queued = 0;
            for role in Role::ALL {
                for granularity in Granularity::ALL {
                    let key = collection.key(granularity);
                    let rows = self.store.bucket(&key).map_or(0, Bucket::len);
                    queued += self.enqueue_visible(&key, 0..rows, role);
                }
            }
            debug!(collection = %collection.name, queued, "scan results queued for enrichment");
        }
        Ok(summary)
    }

    fn cancel_bucket(&self, key: &BucketKey) {
        self.info.cancel_bucket(key);
        self.thumbnail.cancel_bucket(key);
        if let Some(generator) = &self.generator {
            generator.cancel_bucket(key);
        }
    }

    /// Queue `rows` of a bucket for one role. Returns how many were queued.
    pub fn enqueue_visible<I>(&self, key: &BucketKey, rows: I, role: Role) -> usize
    where
        I: IntoIterator<Item = usize>,
    {
        let Some(bucket) = self.store.bucket(key) else {
            return 0;
        };
        let handles = rows.into_iter().filter_map(|row| bucket.handle(row));

        match role {
            Role::Info => self.info.enqueue_all(handles),
            Role::Thumbnail => self.thumbnail.enqueue_all(handles),
            Role::ThumbnailGenerate => match &self.generator {
                Some(generator) => generator.enqueue_all(handles),
                None => 0,
            },
        }
    }

    /// Queue every currently visible row of a bucket for every role
    pub fn enqueue_all_visible(&self, key: &BucketKey) -> usize {
        let rows = self.visible_rows(key);
        Role::ALL
            .iter()
            .map(|role| self.enqueue_visible(key, rows.iter().copied(), *role))
            .sum()
    }

    /// Persist a sort order and apply it to the collection's buckets
    pub fn set_sort_preference(
        &mut self,
        collection: &str,
        sort_key: SortKey,
        descending: bool,
    ) -> Result<()> {
        let preference = SortPreference {
            key: sort_key,
            descending,
        };
        self.persistence.set_sort_preference(collection, preference)?;

        for granularity in Granularity::ALL {
            let key = BucketKey::new(collection, granularity);
            if self.store.bucket(&key).is_none() {
                self.store.set_sort_preference(&key, preference);
                continue;
            }
            self.store.sort(&key, sort_key, descending)?;
            self.events
                .send(Event::Bucket(BucketEvent::RowsReordered { key }));
        }
        debug!(collection, sort_key = sort_key.as_str(), descending, "sort preference applied");
        Ok(())
    }

    pub fn filter(&self) -> &FilterView {
        &self.filter
    }

    pub fn set_filter_text(&mut self, text: &str) {
        self.filter.set_text(text);
    }

    pub fn set_filter_flag(&mut self, flag: FilterFlag, enabled: bool) {
        self.filter.set_flag(flag, enabled);
    }

    /// Visible rows of a bucket under the current filter
    pub fn visible_rows(&self, key: &BucketKey) -> Vec<usize> {
        self.store
            .bucket(key)
            .map(|bucket| self.filter.visible_rows(bucket))
            .unwrap_or_default()
    }

    /// Make `row` the bucket's Active item and persist the choice
    pub fn set_active(&mut self, key: &BucketKey, row: usize) -> Result<()> {
        let previous = self.store.set_active(key, row)?;
        let record = self
            .store
            .bucket(key)
            .and_then(|bucket| bucket.get(row))
            .cloned()
            .ok_or(StoreError::RowOutOfRange { row, len: 0 })?;

        self.persistence
            .set_active_item(&key.collection, Some(&persistence_key(&record)))?;

        if let Some(previous) = previous.filter(|previous| *previous != row) {
            self.row_changed(key, previous);
        }
        self.row_changed(key, row);
        info!(bucket = %key, path = %record.status_path, "active item set");
        Ok(())
    }

    /// Clear the bucket's Active item
    pub fn clear_active(&mut self, key: &BucketKey) -> Result<()> {
        self.persistence.set_active_item(&key.collection, None)?;
        if let Some(previous) = self.store.clear_active(key) {
            self.row_changed(key, previous);
        }
        Ok(())
    }

    /// Flip a persisted flag on one row. Returns the new value.
    pub fn toggle_flag(&mut self, key: &BucketKey, row: usize, flag: ItemFlag) -> Result<bool> {
        let record = self.record(key, row)?;
        let storage_key = record.proxy_key();

        let enabled = match flag {
            ItemFlag::Archived => {
                let enabled = !record.enriched.is_archived();
                self.persistence.set_archived(&storage_key, enabled)?;
                record.enriched.edit(|_| record.enriched.set_archived(enabled));
                enabled
            }
            ItemFlag::Favourite => {
                let enabled = !record.enriched.is_favourite();
                self.persistence.set_favourite(&storage_key, enabled)?;
                record.enriched.edit(|_| record.enriched.set_favourite(enabled));
                enabled
            }
        };

        self.row_changed(key, row);
        Ok(enabled)
    }

    /// Store a description for one row
    pub fn set_description(&mut self, key: &BucketKey, row: usize, description: &str) -> Result<()> {
        let record = self.record(key, row)?;
        self.persistence
            .set_description(&record.proxy_key(), description)?;
        record
            .enriched
            .edit(|fields| fields.description = description.to_string());
        self.row_changed(key, row);
        Ok(())
    }

    fn record(&self, key: &BucketKey, row: usize) -> Result<Arc<Record>> {
        let bucket = self.store.bucket(key);
        let len = bucket.map(Bucket::len).unwrap_or(0);
        bucket
            .and_then(|bucket| bucket.get(row))
            .cloned()
            .ok_or_else(|| CatalogError::Store(StoreError::RowOutOfRange { row, len }))
    }

    fn row_changed(&self, key: &BucketKey, row: usize) {
        let Some(record) = self.store.bucket(key).and_then(|bucket| bucket.get(row)) else {
            return;
        };
        self.events.send(Event::Bucket(BucketEvent::RowChanged {
            key: key.clone(),
            row,
            path: record.status_path.clone(),
        }));
    }

    /// Drop a collection's buckets and any work queued for them
    pub fn discard(&mut self, collection: &str) {
        for granularity in Granularity::ALL {
            let key = BucketKey::new(collection, granularity);
            self.cancel_bucket(&key);
            if self.store.bucket(&key).is_some() {
                self.events
                    .send(Event::Bucket(BucketEvent::AboutToReset { key: key.clone() }));
                self.events
                    .send(Event::Bucket(BucketEvent::ResetComplete { key, rows: 0 }));
            }
        }
        self.store.discard(collection);
    }

    /// Jobs queued or in flight for a role
    pub fn pending(&self, role: Role) -> usize {
        match role {
            Role::Info => self.info.pending(),
            Role::Thumbnail => self.thumbnail.pending(),
            Role::ThumbnailGenerate => self.generator.as_ref().map_or(0, |pool| pool.pending()),
        }
    }

    pub fn is_idle(&self) -> bool {
        Role::ALL.iter().all(|role| self.pending(*role) == 0)
    }

    /// Poll until every pool drains. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }

    /// Stop every worker thread
    pub fn shutdown(&mut self) {
        self.info.shutdown();
        self.thumbnail.shutdown();
        if let Some(generator) = &mut self.generator {
            generator.shutdown();
        }
        self.store.clear();
        info!("catalog shut down");
    }
}
