//! # Workers Module
//!
//! Background enrichment of skeleton records.
//!
//! Each role (Info, Thumbnail, ThumbnailGenerate) gets its own
//! [`WorkerPool`]: a deduplicating [`WorkQueue`], a fixed set of threads
//! and an in-progress set. A pool is generic over an [`Enricher`], the only
//! part that differs between roles.
//!
//! Workers reach records through generation-checked
//! [`Handle`](crate::core::store::Handle)s. A handle is validated before the
//! work starts and again before results are published, so a record that was
//! replaced by a rescan while it was being enriched is never written.
//!
//! ## Example
//! ```rust,ignore
//! let pool = WorkerPool::new(InfoEnricher::new(store), 2, events.clone());
//! for row in visible_rows {
//!     if let Some(handle) = bucket.handle(row) {
//!         pool.enqueue(handle);
//!     }
//! }
//! ```

mod info;
mod pool;
mod queue;
mod thumbnail;

pub use info::{InfoEnricher, InfoUpdate};
pub use pool::{PoolConfig, WorkerPool};
pub use queue::{Enqueued, JobKey, WorkQueue};
pub use thumbnail::{ThumbnailEnricher, ThumbnailGenerator};

use crate::core::store::Record;
use crate::error::EnrichError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of enrichment a pool performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Stat aggregation, detail string, description and disk flags
    Info,
    /// Look up the thumbnail cache
    Thumbnail,
    /// Create missing thumbnails
    ThumbnailGenerate,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Info, Role::Thumbnail, Role::ThumbnailGenerate];

    pub(crate) fn bit(self) -> u8 {
        match self {
            Role::Info => 0b001,
            Role::Thumbnail => 0b010,
            Role::ThumbnailGenerate => 0b100,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Info => write!(f, "info"),
            Role::Thumbnail => write!(f, "thumbnail"),
            Role::ThumbnailGenerate => write!(f, "thumbnail-generate"),
        }
    }
}

/// What `process_item` did with a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Results were published and a row-changed event sent
    Updated,
    /// The record was already enriched; nothing was read
    AlreadyLoaded,
    /// The enricher does not apply to this record
    Skipped,
    /// The handle went stale; any computed result was discarded
    Stale,
}

/// Per-role enrichment logic run by a [`WorkerPool`].
///
/// `compute` does the expensive reads and must not touch the record's
/// fields; `publish` writes the result and sets the role's loaded flag.
pub trait Enricher: Send + Sync + 'static {
    type Output: Send;

    fn role(&self) -> Role;

    /// True once the record holds this role's results
    fn is_loaded(&self, record: &Record) -> bool;

    /// Whether the record needs this role at all
    fn wants(&self, _record: &Record) -> bool {
        true
    }

    fn compute(&self, record: &Record) -> Result<Self::Output, EnrichError>;

    fn publish(&self, record: &Record, output: Self::Output);
}
