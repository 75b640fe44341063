//! # Store Module
//!
//! The flat per-collection data store.
//!
//! Records are grouped into buckets keyed by `(collection, granularity)`.
//! Each bucket holds its rows densely (`0..N-1`), a generation counter that
//! is bumped whenever the rows are replaced or discarded, the remembered
//! sort preference and a small lifecycle state machine.
//!
//! Only the owner thread holds a `&mut DataStore`. Workers reach records
//! through [`Handle`]s, which stay valid only for the generation they were
//! created in.

mod record;
mod sort;

pub use record::{
    byte_to_string, detail_string, EnrichedFields, EnrichedState, ItemFlags, ItemKind, Record,
    RecordSnapshot, UserState,
};
pub use sort::NameKey;

use crate::error::StoreError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Buckets at least this large are sorted on the rayon pool
const PARALLEL_SORT_THRESHOLD: usize = 4096;

/// File lists every concrete file; Sequence collapses frame runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    File,
    Sequence,
}

impl Granularity {
    pub const ALL: [Granularity; 2] = [Granularity::File, Granularity::Sequence];
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::File => write!(f, "file"),
            Granularity::Sequence => write!(f, "sequence"),
        }
    }
}

/// Identifies one bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub collection: String,
    pub granularity: Granularity,
}

impl BucketKey {
    pub fn new(collection: impl Into<String>, granularity: Granularity) -> Self {
        Self {
            collection: collection.into(),
            granularity,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.granularity)
    }
}

/// Field a bucket is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Modified,
}

impl SortKey {
    /// Parse a stored or user-supplied key. Unknown keys fall back to Name.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "size" => SortKey::Size,
            "modified" | "mtime" | "last_modified" => SortKey::Modified,
            "name" => SortKey::Name,
            other => {
                debug!(sort_key = other, "unsupported sort key, using name");
                SortKey::Name
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::Modified => "modified",
        }
    }
}

/// A remembered sort order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortPreference {
    pub key: SortKey,
    pub descending: bool,
}

/// Bucket lifecycle. Scanning and Sorting never overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketState {
    #[default]
    Idle,
    Scanning,
    Sorting,
    Ready,
}

impl fmt::Display for BucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketState::Idle => write!(f, "idle"),
            BucketState::Scanning => write!(f, "scanning"),
            BucketState::Sorting => write!(f, "sorting"),
            BucketState::Ready => write!(f, "ready"),
        }
    }
}

/// A generation-checked reference to one record
#[derive(Debug, Clone)]
pub struct Handle {
    key: BucketKey,
    path: String,
    generation: u64,
    record: Weak<Record>,
    current: Arc<AtomicU64>,
}

impl Handle {
    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Status path of the record when the handle was taken
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the bucket has not been replaced or discarded
    pub fn is_valid(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation && self.record.strong_count() > 0
    }

    /// The record, if the handle is still valid
    pub fn upgrade(&self) -> Option<Arc<Record>> {
        if !self.is_valid() {
            return None;
        }
        self.record.upgrade()
    }
}

/// One ordered record set
#[derive(Debug)]
pub struct Bucket {
    key: BucketKey,
    rows: Vec<Arc<Record>>,
    generation: Arc<AtomicU64>,
    state: BucketState,
    sort: SortPreference,
}

impl Bucket {
    fn new(key: BucketKey) -> Self {
        Self {
            key,
            rows: Vec::new(),
            generation: Arc::new(AtomicU64::new(0)),
            state: BucketState::Idle,
            sort: SortPreference::default(),
        }
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Arc<Record>> {
        self.rows.get(row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.rows.iter()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BucketState {
        self.state
    }

    pub fn sort_preference(&self) -> SortPreference {
        self.sort
    }

    /// Row currently holding `path`
    pub fn find(&self, path: &str) -> Option<usize> {
        self.rows.iter().position(|record| record.status_path == path)
    }

    pub fn handle(&self, row: usize) -> Option<Handle> {
        let record = self.rows.get(row)?;
        Some(Handle {
            key: self.key.clone(),
            path: record.status_path.clone(),
            generation: self.generation(),
            record: Arc::downgrade(record),
            current: Arc::clone(&self.generation),
        })
    }

    pub fn active_row(&self) -> Option<usize> {
        self.rows.iter().position(|record| record.user.is_active())
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn reindex(&self) {
        for (row, record) in self.rows.iter().enumerate() {
            record.user.set_row(row);
        }
    }

    fn sort_rows(&mut self, preference: SortPreference) {
        let rows = std::mem::take(&mut self.rows);
        let mut keyed: Vec<(u64, Arc<Record>)> = rows
            .into_iter()
            .map(|record| (sort_value(&record, preference.key), record))
            .collect();

        let descending = preference.descending;
        let compare = move |a: &(u64, Arc<Record>), b: &(u64, Arc<Record>)| {
            let ordering = a.0.cmp(&b.0).then_with(|| a.1.sort_name().cmp(b.1.sort_name()));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        };

        if keyed.len() >= PARALLEL_SORT_THRESHOLD {
            keyed.par_sort_by(compare);
        } else {
            keyed.sort_by(compare);
        }

        self.rows = keyed.into_iter().map(|(_, record)| record).collect();
        self.reindex();
    }
}

fn sort_value(record: &Record, key: SortKey) -> u64 {
    match key {
        SortKey::Name => 0,
        SortKey::Size => record.enriched.fields().size,
        SortKey::Modified => record
            .enriched
            .fields()
            .modified
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs())
            .unwrap_or(0),
    }
}

/// All buckets of a catalog
#[derive(Debug, Default)]
pub struct DataStore {
    buckets: HashMap<BucketKey, Bucket>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the bucket, creating it empty on first access
    pub fn get(&mut self, key: &BucketKey) -> &Bucket {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket::new(key.clone()))
    }

    fn get_mut(&mut self, key: &BucketKey) -> &mut Bucket {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket::new(key.clone()))
    }

    /// The bucket, without creating it
    pub fn bucket(&self, key: &BucketKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    /// Mark a bucket as being rescanned
    pub fn begin_scan(&mut self, key: &BucketKey) -> Result<(), StoreError> {
        let bucket = self.get_mut(key);
        if bucket.state == BucketState::Sorting {
            return Err(busy(bucket));
        }
        bucket.state = BucketState::Scanning;
        Ok(())
    }

    /// Leave the Scanning state without publishing anything
    pub fn abort_scan(&mut self, key: &BucketKey) {
        let bucket = self.get_mut(key);
        if bucket.state == BucketState::Scanning {
            bucket.state = if bucket.rows.is_empty() {
                BucketState::Idle
            } else {
                BucketState::Ready
            };
        }
    }

    /// Swap in a freshly scanned record set.
    ///
    /// Bumps the generation so handles into the previous rows go stale,
    /// drops records whose path repeats an earlier one and re-keys rows
    /// `0..N-1`. Returns the number of published rows.
    pub fn replace_bucket(&mut self, key: &BucketKey, records: Vec<Record>) -> usize {
        let bucket = self.get_mut(key);
        let mut seen = HashSet::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.status_path.clone()) {
                warn!(bucket = %key, path = %record.status_path, "duplicate path dropped");
                continue;
            }
            rows.push(Arc::new(record));
        }

        let mut active_seen = false;
        for record in &rows {
            if record.user.is_active() {
                if active_seen {
                    record.user.set_active(false);
                }
                active_seen = true;
            }
        }

        let generation = bucket.bump_generation();
        bucket.rows = rows;
        bucket.reindex();
        bucket.state = BucketState::Ready;

        debug!(bucket = %key, rows = bucket.rows.len(), generation, "bucket replaced");
        bucket.rows.len()
    }

    /// Reorder the bucket and rewrite every row index.
    ///
    /// Only the index-to-record mapping changes, so this may run while
    /// workers are writing enriched fields.
    pub fn sort(
        &mut self,
        key: &BucketKey,
        sort_key: SortKey,
        descending: bool,
    ) -> Result<(), StoreError> {
        let bucket = self.get_mut(key);
        if bucket.state == BucketState::Scanning {
            return Err(busy(bucket));
        }

        let previous = bucket.state;
        bucket.state = BucketState::Sorting;
        let preference = SortPreference {
            key: sort_key,
            descending,
        };
        bucket.sort = preference;
        bucket.sort_rows(preference);
        bucket.state = if previous == BucketState::Idle && bucket.rows.is_empty() {
            BucketState::Idle
        } else {
            BucketState::Ready
        };
        Ok(())
    }

    /// Remember a sort order without applying it
    pub fn set_sort_preference(&mut self, key: &BucketKey, preference: SortPreference) {
        self.get_mut(key).sort = preference;
    }

    /// The record flagged Active, if any
    pub fn active_record(&self, key: &BucketKey) -> Option<Arc<Record>> {
        let bucket = self.buckets.get(key)?;
        bucket.active_row().and_then(|row| bucket.get(row).cloned())
    }

    /// Make `row` the bucket's only Active record.
    ///
    /// Returns the row that held the flag before.
    pub fn set_active(&mut self, key: &BucketKey, row: usize) -> Result<Option<usize>, StoreError> {
        let bucket = self.get_mut(key);
        let len = bucket.rows.len();
        let record = bucket
            .rows
            .get(row)
            .cloned()
            .ok_or(StoreError::RowOutOfRange { row, len })?;

        let previous = bucket.active_row();
        if let Some(previous) = previous {
            bucket.rows[previous].user.set_active(false);
        }
        record.user.set_active(true);
        Ok(previous)
    }

    /// Clear the Active flag. Returns the row that held it.
    pub fn clear_active(&mut self, key: &BucketKey) -> Option<usize> {
        let bucket = self.buckets.get(key)?;
        let previous = bucket.active_row()?;
        bucket.rows[previous].user.set_active(false);
        Some(previous)
    }

    /// Drop every bucket of a collection, invalidating outstanding handles
    pub fn discard(&mut self, collection: &str) {
        self.buckets.retain(|key, bucket| {
            if key.collection == collection {
                bucket.bump_generation();
                false
            } else {
                true
            }
        });
    }

    /// Drop every bucket
    pub fn clear(&mut self) {
        for bucket in self.buckets.values() {
            bucket.bump_generation();
        }
        self.buckets.clear();
    }
}

fn busy(bucket: &Bucket) -> StoreError {
    StoreError::Busy {
        collection: bucket.key.collection.clone(),
        granularity: bucket.key.granularity.to_string(),
        state: bucket.state.to_string(),
    }
}
