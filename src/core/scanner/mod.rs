//! # Scanner Module
//!
//! Builds skeleton records for one collection and publishes them.
//!
//! A scan walks the collection root once and fills two buckets:
//! - **File** lists every concrete file.
//! - **Sequence** lists files without a frame number plus one collapsed
//!   record per frame sequence (`shot.[0001-0003].exr`). A "sequence" that
//!   turned out to have a single frame is listed as a plain file.
//!
//! The published buckets are left untouched until the walk is complete, so
//! views never see an empty bucket mid-scan. Records carry scan-time stat
//! values and persisted flags; everything else is filled in by the workers.
//!
//! ## Example
//! ```rust,ignore
//! let scanner = Scanner::new(ScanConfig::default(), persistence);
//! let summary = scanner.scan(&mut store, &Collection::new("renders", root), &token)?;
//! println!("{} files, {} sequences", summary.files, summary.sequences);
//! ```

mod filter;
mod walker;

pub use filter::EntryFilter;
pub use walker::{FileStat, FilesystemWalker, WalkDirWalker, WalkEntry};

use crate::core::persistence::PersistenceStore;
use crate::core::sequence::{self, FrameSet, SequenceMatch};
use crate::core::store::{BucketKey, DataStore, Granularity, ItemFlags, ItemKind, Record};
use crate::error::{CatalogError, ScanError};
use crate::events::{null_sender, BucketEvent, Event, EventSender, ScanEvent, ScanProgress};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// A progress event is sent after this many accepted files
pub const DEFAULT_PROGRESS_INTERVAL: usize = 987;

/// Upper bound on the files listed per bucket
pub const DEFAULT_MAX_ITEMS: usize = 999_999;

/// Configuration for collection scans
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Extension allow-lists keyed by collection name
    pub extensions: HashMap<String, Vec<String>>,
    /// Ignore the allow-lists and list every file
    pub disable_filter: bool,
    pub max_items: usize,
    pub progress_interval: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            max_depth: None,
            extensions: HashMap::new(),
            disable_filter: false,
            max_items: DEFAULT_MAX_ITEMS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ScanConfig {
    /// Restrict `collection` to the given extensions
    pub fn with_extensions<I, S>(mut self, collection: &str, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.insert(
            collection.to_string(),
            extensions.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_disable_filter(mut self, disable: bool) -> Self {
        self.disable_filter = disable;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// The entry filter a collection is scanned with
    pub fn filter_for(&self, collection: &str) -> EntryFilter {
        let filter = EntryFilter::new().with_hidden(self.include_hidden);
        match self.extensions.get(collection) {
            Some(extensions) if !self.disable_filter => filter.with_extensions(extensions),
            _ => filter,
        }
    }

    /// A walkdir walker honouring this configuration
    pub fn walker(&self) -> WalkDirWalker {
        WalkDirWalker::new()
            .follow_symlinks(self.follow_symlinks)
            .include_hidden(self.include_hidden)
            .max_depth(self.max_depth)
    }
}

/// Cooperative cancellation flag checked between entries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A named root directory to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub root: PathBuf,
    /// Leading components of every record's parent chain
    pub parent_chain: Vec<String>,
}

impl Collection {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            parent_chain: vec![name.clone()],
            name,
            root: root.into(),
        }
    }

    pub fn with_parent_chain(mut self, chain: Vec<String>) -> Self {
        self.parent_chain = chain;
        self
    }

    pub fn key(&self, granularity: Granularity) -> BucketKey {
        BucketKey::new(self.name.clone(), granularity)
    }
}

/// Result of a scan
#[derive(Debug)]
pub struct ScanSummary {
    pub collection: String,
    /// Rows published in the File bucket
    pub files: usize,
    /// Collapsed sequences published in the Sequence bucket
    pub sequences: usize,
    /// Rows published in the Sequence bucket
    pub sequence_rows: usize,
    /// Entries that could not be read (non-fatal)
    pub errors: Vec<ScanError>,
    /// The walk stopped at `max_items`
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Frames collected for one proxy path during the walk
struct SequenceGroup {
    first: SequenceMatch,
    parent_chain: Vec<String>,
    /// Frame number, token width, path and stat of every matching file
    entries: Vec<(u64, usize, PathBuf, FileStat)>,
}

impl SequenceGroup {
    /// One collapsed record, plus a plain file for every entry that could
    /// not join it. Two tokens naming the same frame (`shot.1.exr`,
    /// `shot.01.exr`) keep the first path in sort order; a group left with
    /// a single frame is listed entirely as plain files.
    fn into_records(mut self) -> Vec<Record> {
        self.entries.sort_by(|(a, _, a_path, _), (b, _, b_path, _)| {
            a.cmp(b).then_with(|| a_path.cmp(b_path))
        });

        let mut distinct: Vec<u64> = self.entries.iter().map(|(frame, ..)| *frame).collect();
        distinct.dedup();
        if distinct.len() < 2 {
            let chain = self.parent_chain;
            return self
                .entries
                .into_iter()
                .map(|(_, _, path, stat)| file_record(&path, chain.clone(), stat))
                .collect();
        }

        let mut records = Vec::new();
        let mut frames = FrameSet::new();
        let mut entries = Vec::with_capacity(distinct.len());
        let mut size = 0u64;
        let mut modified: Option<SystemTime> = None;
        let mut last_frame = None;
        for (frame, pad, path, stat) in self.entries {
            if last_frame == Some(frame) {
                records.push(file_record(&path, self.parent_chain.clone(), stat));
                continue;
            }
            last_frame = Some(frame);
            frames.insert(frame, pad);
            size += stat.size;
            modified = match (modified, stat.modified) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            entries.push(path);
        }

        let collapsed = self.first.collapsed_path(&frames);
        records.push(
            Record::new(ItemKind::Sequence, collapsed, self.parent_chain)
                .with_frames(frames)
                .with_entries(entries)
                .with_stat(size, modified),
        );
        records
    }
}

/// Records gathered by one walk, not yet published
struct Collected {
    files: Vec<Record>,
    singles: Vec<Record>,
    groups: Vec<SequenceGroup>,
    errors: Vec<ScanError>,
    truncated: bool,
}

/// Scans collections into a [`DataStore`]
pub struct Scanner {
    config: ScanConfig,
    walker: Box<dyn FilesystemWalker>,
    persistence: Arc<dyn PersistenceStore>,
    events: EventSender,
}

impl Scanner {
    pub fn new(config: ScanConfig, persistence: Arc<dyn PersistenceStore>) -> Self {
        let walker = Box::new(config.walker());
        Self {
            config,
            walker,
            persistence,
            events: null_sender(),
        }
    }

    pub fn with_walker(mut self, walker: Box<dyn FilesystemWalker>) -> Self {
        self.walker = walker;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Walk `collection`, then replace and sort both of its buckets.
    pub fn scan(
        &self,
        store: &mut DataStore,
        collection: &Collection,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary, CatalogError> {
        let start = Instant::now();
        let root = &collection.root;
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound { path: root.clone() }.into());
        }

        let file_key = collection.key(Granularity::File);
        let sequence_key = collection.key(Granularity::Sequence);
        store.begin_scan(&file_key)?;
        if let Err(e) = store.begin_scan(&sequence_key) {
            store.abort_scan(&file_key);
            return Err(e.into());
        }

        info!(collection = %collection.name, root = %root.display(), "scan started");
        self.events.send(Event::Scan(ScanEvent::Started {
            collection: collection.name.clone(),
            root: root.clone(),
        }));

        let collected = match self.collect(collection, cancel) {
            Ok(collected) => collected,
            Err(e) => {
                store.abort_scan(&file_key);
                store.abort_scan(&sequence_key);
                info!(collection = %collection.name, "scan cancelled");
                return Err(e.into());
            }
        };

        let mut sequence_rows = collected.singles;
        let mut sequences = 0;
        for group in collected.groups {
            for record in group.into_records() {
                if record.is_sequence() {
                    sequences += 1;
                }
                sequence_rows.push(record);
            }
        }
        let mut file_rows = collected.files;

        self.apply_flags(&collection.name, &mut file_rows);
        self.apply_flags(&collection.name, &mut sequence_rows);

        let files = self.publish(store, &file_key, file_rows);
        let sequence_rows = self.publish(store, &sequence_key, sequence_rows);

        let elapsed = start.elapsed();
        info!(
            collection = %collection.name,
            files,
            sequences,
            errors = collected.errors.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );
        self.events.send(Event::Scan(ScanEvent::Completed {
            collection: collection.name.clone(),
            files,
            sequences,
            duration_ms: elapsed.as_millis() as u64,
        }));

        Ok(ScanSummary {
            collection: collection.name.clone(),
            files,
            sequences,
            sequence_rows,
            errors: collected.errors,
            truncated: collected.truncated,
            elapsed,
        })
    }

    fn collect(
        &self,
        collection: &Collection,
        cancel: &CancellationToken,
    ) -> Result<Collected, ScanError> {
        let filter = self.config.filter_for(&collection.name);
        let interval = self.config.progress_interval.max(1);
        let mut collected = Collected {
            files: Vec::new(),
            singles: Vec::new(),
            groups: Vec::new(),
            errors: Vec::new(),
            truncated: false,
        };
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for result in self.walker.walk(&collection.root) {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "entry skipped");
                    self.events.send(Event::Scan(ScanEvent::Error {
                        path: error_path(&e),
                        message: e.to_string(),
                    }));
                    collected.errors.push(e);
                    continue;
                }
            };
            if entry.is_dir || !filter.should_include(&entry.path) {
                continue;
            }

            if collected.files.len() >= self.config.max_items {
                warn!(
                    collection = %collection.name,
                    max_items = self.config.max_items,
                    "item limit reached, listing truncated"
                );
                collected.truncated = true;
                break;
            }

            let chain = parent_chain(collection, &entry.path);
            let stat = entry.stat.unwrap_or(FileStat {
                size: 0,
                modified: None,
            });
            let path = entry.path.to_string_lossy().to_string();

            collected
                .files
                .push(file_record(&entry.path, chain.clone(), stat));
            if collected.files.len() % interval == 0 {
                self.events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    files_found: collected.files.len(),
                    current_path: entry.path.clone(),
                })));
            }

            let matched = sequence::match_sequence(&path)
                .and_then(|m| m.frame_number().map(|frame| (m, frame)));
            let Some((matched, frame)) = matched else {
                collected
                    .singles
                    .push(file_record(&entry.path, chain, stat));
                continue;
            };

            let index = *group_index
                .entry(matched.proxy_path())
                .or_insert_with(|| {
                    collected.groups.push(SequenceGroup {
                        first: matched.clone(),
                        parent_chain: chain,
                        entries: Vec::new(),
                    });
                    collected.groups.len() - 1
                });
            collected.groups[index]
                .entries
                .push((frame, matched.pad(), entry.path, stat));
        }

        Ok(collected)
    }

    fn apply_flags(&self, collection: &str, records: &mut Vec<Record>) {
        let active = match self.persistence.active_item(collection) {
            Ok(active) => active,
            Err(e) => {
                warn!(collection, error = %e, "could not read the active item");
                None
            }
        };

        let rows = std::mem::take(records);
        for record in rows {
            let state = match self.persistence.merged(&record.status_path, &record.proxy_key()) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %record.status_path, error = %e, "could not read stored flags");
                    Default::default()
                }
            };
            let is_active = active
                .as_deref()
                .is_some_and(|key| persistence_key(&record) == key);
            let flags = ItemFlags {
                active: is_active,
                archived: state.archived,
                favourite: state.favourite,
            };
            records.push(record.with_flags(flags));
        }
    }

    fn publish(&self, store: &mut DataStore, key: &BucketKey, records: Vec<Record>) -> usize {
        self.events
            .send(Event::Bucket(BucketEvent::AboutToReset { key: key.clone() }));

        let rows = store.replace_bucket(key, records);
        let preference = match self.persistence.sort_preference(&key.collection) {
            Ok(Some(preference)) => preference,
            Ok(None) => store.get(key).sort_preference(),
            Err(e) => {
                warn!(bucket = %key, error = %e, "could not read the sort preference");
                store.get(key).sort_preference()
            }
        };
        if let Err(e) = store.sort(key, preference.key, preference.descending) {
            warn!(bucket = %key, error = %e, "sort after scan failed");
        }

        self.events.send(Event::Bucket(BucketEvent::ResetComplete {
            key: key.clone(),
            rows,
        }));
        rows
    }
}

/// A plain file record. The entry keeps the on-disk path even when the
/// displayed path had to be converted lossily.
fn file_record(path: &Path, chain: Vec<String>, stat: FileStat) -> Record {
    Record::file(path.to_string_lossy().to_string(), chain)
        .with_entries(vec![path.to_path_buf()])
        .with_stat(stat.size, stat.modified)
}

/// Key under which an item's Active state is stored.
///
/// Sequences use their proxy path so activity survives frame changes.
pub fn persistence_key(record: &Record) -> String {
    if record.is_sequence() {
        record.proxy_key()
    } else {
        record.status_path.clone()
    }
}

fn parent_chain(collection: &Collection, path: &Path) -> Vec<String> {
    let mut chain = collection.parent_chain.clone();
    if let Some(folder) = path
        .parent()
        .and_then(|parent| parent.strip_prefix(&collection.root).ok())
    {
        chain.extend(
            folder
                .components()
                .map(|component| component.as_os_str().to_string_lossy().to_string()),
        );
    }
    chain
}

fn error_path(error: &ScanError) -> PathBuf {
    match error {
        ScanError::DirectoryNotFound { path }
        | ScanError::PermissionDenied { path }
        | ScanError::ReadEntry { path, .. } => path.clone(),
        ScanError::Cancelled => PathBuf::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::InMemoryStore;
    use crate::core::store::{SortKey, SortPreference};
    use crate::events::EventChannel;
    use std::sync::Mutex;

    /// Walker over a fixed list of entries
    struct FakeWalker {
        entries: Mutex<Vec<Result<WalkEntry, ScanError>>>,
    }

    impl FakeWalker {
        fn files(root: &str, names: &[&str]) -> Self {
            let entries = names
                .iter()
                .map(|name| Ok(WalkEntry::file(format!("{}/{}", root, name), 100, None)))
                .collect();
            Self {
                entries: Mutex::new(entries),
            }
        }
    }

    impl FilesystemWalker for FakeWalker {
        fn walk<'a>(
            &'a self,
            _root: &Path,
        ) -> Box<dyn Iterator<Item = Result<WalkEntry, ScanError>> + 'a> {
            let entries = std::mem::take(&mut *self.entries.lock().unwrap());
            Box::new(entries.into_iter())
        }
    }

    fn scan_names(names: &[&str]) -> (DataStore, ScanSummary) {
        let root = std::env::temp_dir();
        let root_str = root.to_string_lossy().to_string();
        let scanner = Scanner::new(ScanConfig::default(), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(FakeWalker::files(&root_str, names)));
        let mut store = DataStore::new();
        let summary = scanner
            .scan(&mut store, &Collection::new("renders", &root), &CancellationToken::new())
            .unwrap();
        (store, summary)
    }

    fn display_names(store: &mut DataStore, granularity: Granularity) -> Vec<String> {
        store
            .get(&BucketKey::new("renders", granularity))
            .iter()
            .map(|record| record.display_name.clone())
            .collect()
    }

    #[test]
    fn frames_collapse_in_sequence_bucket_only() {
        let (mut store, summary) =
            scan_names(&["shot.0001.exr", "shot.0002.exr", "shot.0003.exr", "notes.txt"]);

        assert_eq!(summary.files, 4);
        assert_eq!(summary.sequences, 1);
        assert_eq!(
            display_names(&mut store, Granularity::File),
            vec!["notes.txt", "shot.0001.exr", "shot.0002.exr", "shot.0003.exr"]
        );
        assert_eq!(
            display_names(&mut store, Granularity::Sequence),
            vec!["notes.txt", "shot.[0001-0003].exr"]
        );
    }

    #[test]
    fn single_frame_is_demoted_to_file() {
        let (mut store, summary) = scan_names(&["shot.0001.exr", "plate_v002.dpx", "plate_v003.dpx"]);

        assert_eq!(summary.sequences, 1);
        let key = BucketKey::new("renders", Granularity::Sequence);
        let bucket = store.get(&key);
        let single = bucket.get(bucket.find(&format!(
            "{}/shot.0001.exr",
            std::env::temp_dir().to_string_lossy()
        )).unwrap()).unwrap();
        assert_eq!(single.kind, ItemKind::File);
        assert!(single.frames.is_none());
        assert!(bucket.iter().any(|r| r.display_name == "plate_v[002-003].dpx"));
    }

    #[test]
    fn sequence_aggregates_entries_and_detail() {
        let (mut store, _) = scan_names(&["shot.0003.exr", "shot.0001.exr", "shot.0002.exr"]);
        let key = BucketKey::new("renders", Granularity::Sequence);
        let record = store.get(&key).get(0).unwrap().clone();

        assert!(record.is_sequence());
        assert_eq!(record.frames.as_ref().unwrap().len(), 3);
        assert!(record.entries[0].ends_with("shot.0001.exr"));
        assert!(record.entries[2].ends_with("shot.0003.exr"));
        assert_eq!(record.enriched.fields().size, 300);
        assert!(record.enriched.fields().detail.starts_with("3f;"));
    }

    #[test]
    fn same_frame_with_two_paddings_lists_both_files() {
        let (mut store, summary) = scan_names(&["shot.1.exr", "shot.01.exr"]);

        assert_eq!(summary.sequences, 0);
        assert_eq!(
            display_names(&mut store, Granularity::Sequence),
            vec!["shot.1.exr", "shot.01.exr"]
        );
    }

    #[test]
    fn colliding_frame_is_split_out_of_the_sequence() {
        let (mut store, summary) = scan_names(&["shot.1.exr", "shot.01.exr", "shot.02.exr"]);

        assert_eq!(summary.sequences, 1);
        assert_eq!(summary.sequence_rows, 2);
        assert_eq!(
            display_names(&mut store, Granularity::Sequence),
            vec!["shot.1.exr", "shot.[01-02].exr"]
        );
        let key = BucketKey::new("renders", Granularity::Sequence);
        let sequence = store.get(&key).get(1).unwrap().clone();
        assert_eq!(sequence.entries.len(), 2);
        assert_eq!(sequence.enriched.fields().size, 200);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_file_keeps_its_disk_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = std::env::temp_dir();
        let disk_path = root.join(OsStr::from_bytes(b"plate_\xff.exr"));
        let walker = FakeWalker {
            entries: Mutex::new(vec![Ok(WalkEntry::file(disk_path.clone(), 5, None))]),
        };
        let scanner = Scanner::new(ScanConfig::default(), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(walker));
        let mut store = DataStore::new();
        let summary = scanner
            .scan(&mut store, &Collection::new("renders", &root), &CancellationToken::new())
            .unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.sequence_rows, 1);
        let record = store
            .get(&BucketKey::new("renders", Granularity::File))
            .get(0)
            .unwrap()
            .clone();
        assert_eq!(record.entries, vec![disk_path]);
        assert!(record.display_name.starts_with("plate_"));
    }

    #[test]
    fn bracketed_parent_folder_still_groups_frames() {
        let (mut store, summary) =
            scan_names(&["ep[01]/shot.0001.exr", "ep[01]/shot.0002.exr", "ep[01]/shot.0003.exr"]);

        assert_eq!(summary.sequences, 1);
        assert_eq!(
            display_names(&mut store, Granularity::Sequence),
            vec!["shot.[0001-0003].exr"]
        );
        let key = BucketKey::new("renders", Granularity::Sequence);
        let sequence = store.get(&key).get(0).unwrap().clone();
        assert!(sequence.proxy_key().ends_with("ep[01]/shot.[0].exr"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let scanner = Scanner::new(ScanConfig::default(), Arc::new(InMemoryStore::new()));
        let mut store = DataStore::new();
        let result = scanner.scan(
            &mut store,
            &Collection::new("renders", "/definitely/not/a/real/root"),
            &CancellationToken::new(),
        );
        assert!(matches!(
            result,
            Err(CatalogError::Scan(ScanError::DirectoryNotFound { .. }))
        ));
    }

    #[test]
    fn cancelled_scan_keeps_published_rows() {
        let root = std::env::temp_dir();
        let root_str = root.to_string_lossy().to_string();
        let mut store = DataStore::new();
        let collection = Collection::new("renders", &root);

        let first = Scanner::new(ScanConfig::default(), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(FakeWalker::files(&root_str, &["a.ma"])));
        first
            .scan(&mut store, &collection, &CancellationToken::new())
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let second = Scanner::new(ScanConfig::default(), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(FakeWalker::files(&root_str, &["b.ma"])));
        let result = second.scan(&mut store, &collection, &token);

        assert!(matches!(result, Err(CatalogError::Scan(ScanError::Cancelled))));
        let bucket = store.get(&collection.key(Granularity::File));
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.state(), crate::core::store::BucketState::Ready);
    }

    #[test]
    fn entry_errors_are_recorded_and_skipped() {
        let root = std::env::temp_dir();
        let walker = FakeWalker {
            entries: Mutex::new(vec![
                Err(ScanError::PermissionDenied {
                    path: root.join("locked"),
                }),
                Ok(WalkEntry::file(root.join("a.ma"), 1, None)),
            ]),
        };
        let (sender, receiver) = EventChannel::new();
        let scanner = Scanner::new(ScanConfig::default(), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(walker))
            .with_events(sender);
        let mut store = DataStore::new();

        let summary = scanner
            .scan(&mut store, &Collection::new("scenes", &root), &CancellationToken::new())
            .unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(receiver
            .drain()
            .iter()
            .any(|event| matches!(event, Event::Scan(ScanEvent::Error { .. }))));
    }

    #[test]
    fn extension_allow_list_is_per_collection() {
        let root = std::env::temp_dir();
        let root_str = root.to_string_lossy().to_string();
        let config = ScanConfig::default().with_extensions("renders", ["exr"]);
        let scanner = Scanner::new(config.clone(), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(FakeWalker::files(&root_str, &["a.exr", "b.txt"])));
        let mut store = DataStore::new();

        let summary = scanner
            .scan(&mut store, &Collection::new("renders", &root), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.files, 1);

        let unfiltered = Scanner::new(config.with_disable_filter(true), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(FakeWalker::files(&root_str, &["a.exr", "b.txt"])));
        let summary = unfiltered
            .scan(&mut store, &Collection::new("renders", &root), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.files, 2);
    }

    #[test]
    fn max_items_truncates() {
        let root = std::env::temp_dir();
        let root_str = root.to_string_lossy().to_string();
        let scanner = Scanner::new(ScanConfig::default().with_max_items(2), Arc::new(InMemoryStore::new()))
            .with_walker(Box::new(FakeWalker::files(&root_str, &["a.ma", "b.ma", "c.ma"])));
        let mut store = DataStore::new();

        let summary = scanner
            .scan(&mut store, &Collection::new("scenes", &root), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.files, 2);
        assert!(summary.truncated);
    }

    #[test]
    fn persisted_flags_and_sort_preference_are_applied() {
        let root = std::env::temp_dir();
        let root_str = root.to_string_lossy().to_string();
        let persistence = Arc::new(InMemoryStore::new());
        persistence
            .set_archived(&format!("{}/shot.[0].exr", root_str), true)
            .unwrap();
        persistence
            .set_active_item("renders", Some(&format!("{}/b.ma", root_str)))
            .unwrap();
        persistence
            .set_sort_preference(
                "renders",
                SortPreference {
                    key: SortKey::Name,
                    descending: true,
                },
            )
            .unwrap();

        let scanner = Scanner::new(ScanConfig::default(), persistence).with_walker(Box::new(
            FakeWalker::files(&root_str, &["a.ma", "b.ma", "shot.0001.exr", "shot.0002.exr"]),
        ));
        let mut store = DataStore::new();
        scanner
            .scan(&mut store, &Collection::new("renders", &root), &CancellationToken::new())
            .unwrap();

        let names = display_names(&mut store, Granularity::Sequence);
        assert_eq!(names, vec!["shot.[0001-0002].exr", "b.ma", "a.ma"]);
        let bucket = store.get(&BucketKey::new("renders", Granularity::Sequence));
        assert!(bucket.get(0).unwrap().enriched.is_archived());
        assert_eq!(bucket.active_row(), Some(1));
    }

    #[test]
    fn parent_chain_includes_sub_folders() {
        let collection = Collection::new("scenes", "/jobs/show/scenes")
            .with_parent_chain(vec!["show".into(), "scenes".into()]);
        let chain = parent_chain(&collection, Path::new("/jobs/show/scenes/layout/v001/a.ma"));
        assert_eq!(chain, vec!["show", "scenes", "layout", "v001"]);
    }
}
