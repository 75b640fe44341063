//! # Error Module
//!
//! Error types for the catalog indexer.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths and what went wrong
//! - **Degrade, don't abort** - per-entry and per-item failures are recorded
//!   and the affected item keeps showing placeholder data

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Data store error: {0}")]
    Store(#[from] StoreError),

    #[error("Enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while walking a collection
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read entry {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors raised by the data store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Bucket {collection}/{granularity} is busy ({state})")]
    Busy {
        collection: String,
        granularity: String,
        state: String,
    },

    #[error("Row {row} is out of range (bucket holds {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
}

/// Errors raised while enriching a single record
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Failed to stat {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence lookup failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Thumbnail failed: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Record has no underlying files: {path}")]
    NoEntries { path: String },
}

/// Errors from the persistence store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to open store at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Store corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },
}

/// Errors from the thumbnail cache
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Source is too large to thumbnail: {path} ({size} bytes)")]
    TooLarge { path: PathBuf, size: u64 },

    #[error("Failed to write thumbnail {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;
