//! # Persistence Module
//!
//! Per-item and per-collection state that outlives a scan.
//!
//! Keys are status paths. Sequences are keyed by their proxy path
//! (`shot.[0].exr`) so the stored state survives frames being added or
//! removed.
//!
//! ## Backends
//! - `SqliteStore` - Persistent storage using SQLite
//! - `InMemoryStore` - For testing and throwaway catalogs

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::PersistenceStore;

use serde::{Deserialize, Serialize};

/// Stored state of a single item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub description: Option<String>,
    pub archived: bool,
    pub favourite: bool,
}
