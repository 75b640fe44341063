//! Event type definitions for bucket lifecycle and progress reporting.

use crate::core::store::BucketKey;
use crate::core::workers::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the catalog engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scanner events
    Scan(ScanEvent),
    /// Bucket lifecycle notifications for views
    Bucket(BucketEvent),
    /// Background worker events
    Worker(WorkerEvent),
}

/// Events during a collection scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { collection: String, root: PathBuf },
    /// Periodic progress update
    Progress(ScanProgress),
    /// An entry could not be read but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed and the buckets were published
    Completed {
        collection: String,
        files: usize,
        sequences: usize,
        duration_ms: u64,
    },
}

/// Progress information during scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of accepted files so far
    pub files_found: usize,
    /// File being looked at when the update was sent
    pub current_path: PathBuf,
}

/// Notifications a view needs to stay in sync with a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketEvent {
    /// The bucket's rows are about to be replaced
    AboutToReset { key: BucketKey },
    /// The bucket was replaced and holds `rows` records
    ResetComplete { key: BucketKey, rows: usize },
    /// A single row's fields changed
    RowChanged {
        key: BucketKey,
        row: usize,
        path: String,
    },
    /// Row indices were rewritten by a sort
    RowsReordered { key: BucketKey },
}

/// Events from the worker pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerEvent {
    /// Enriching an item failed; it keeps placeholder data
    Failed {
        role: Role,
        path: String,
        message: String,
    },
    /// The role's queue is empty and no item is in flight
    Idle { role: Role },
}
