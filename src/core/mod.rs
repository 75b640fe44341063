//! # Core Module
//!
//! The GUI-agnostic catalog engine.
//!
//! ## Modules
//! - `sequence` - Frame-sequence detection and range notation
//! - `store` - Buckets of records, sorting and generation-checked handles
//! - `scanner` - Walks a collection and publishes skeleton records
//! - `workers` - Background enrichment pools (info, thumbnails)
//! - `filter` - Row visibility over a bucket
//! - `persistence` - Descriptions, flags and preferences that outlive a scan
//! - `thumbnails` - Disk thumbnail cache
//! - `catalog` - Owner-side facade tying the above together

pub mod catalog;
pub mod filter;
pub mod persistence;
pub mod scanner;
pub mod sequence;
pub mod store;
pub mod thumbnails;
pub mod workers;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogBuilder, ItemFlag};
pub use filter::{FilterFlag, FilterView};
pub use scanner::{CancellationToken, Collection, ScanConfig, ScanSummary, Scanner};
pub use store::{BucketKey, DataStore, Granularity, Record, SortKey, SortPreference};
pub use workers::{PoolConfig, Role};
