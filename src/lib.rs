//! # Catalog Indexer
//!
//! Concurrent indexing and enrichment engine for filesystem-backed asset
//! catalogs (bookmark → asset → task folder → file).
//!
//! ## Core Philosophy
//! - **Never block the owner** - scans publish skeleton rows, workers fill
//!   in the expensive details afterwards
//! - **Never show stale data** - a rescan invalidates every outstanding
//!   work item through generation-checked handles
//! - **Degrade, don't fail** - an unreadable file keeps its placeholder
//!
//! ## Architecture
//! The library is split into a core engine (GUI-agnostic) and presentation layers:
//! - `core` - Sequence parsing, data store, scanner, workers, filtering
//! - `events` - Event-driven bucket notifications and progress (GUI-ready)
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CatalogError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
/// Calling it twice leaves the first subscriber in place.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}
