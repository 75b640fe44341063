//! Info enrichment: stat aggregation, detail line and stored item state.

use super::{Enricher, Role};
use crate::core::persistence::PersistenceStore;
use crate::core::store::{detail_string, Record};
use crate::error::EnrichError;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

/// Values an info pass publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoUpdate {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub detail: String,
    pub description: Option<String>,
    pub archived: bool,
    pub favourite: bool,
    /// Owner edit stamp observed before persistence was read
    pub edits: u64,
}

pub struct InfoEnricher {
    store: Arc<dyn PersistenceStore>,
}

impl InfoEnricher {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }
}

impl Enricher for InfoEnricher {
    type Output = InfoUpdate;

    fn role(&self) -> Role {
        Role::Info
    }

    fn is_loaded(&self, record: &Record) -> bool {
        record.enriched.info_loaded()
    }

    fn compute(&self, record: &Record) -> Result<InfoUpdate, EnrichError> {
        if record.entries.is_empty() {
            return Err(EnrichError::NoEntries {
                path: record.status_path.clone(),
            });
        }

        let mut size = 0u64;
        let mut modified: Option<SystemTime> = None;
        for entry in &record.entries {
            let metadata = std::fs::metadata(entry).map_err(|e| EnrichError::Io {
                path: entry.clone(),
                source: e,
            })?;
            size += metadata.len();
            if let Ok(time) = metadata.modified() {
                modified = Some(modified.map_or(time, |newest| newest.max(time)));
            }
        }

        let frame_count = record.frames.as_ref().map(|frames| frames.len());
        let edits = record.enriched.edits();
        let state = self
            .store
            .merged(&record.status_path, &record.proxy_key())?;

        Ok(InfoUpdate {
            size,
            modified,
            detail: detail_string(frame_count, modified, size),
            description: state.description,
            archived: state.archived,
            favourite: state.favourite,
            edits,
        })
    }

    fn publish(&self, record: &Record, output: InfoUpdate) {
        record.enriched.update(|fields| {
            fields.size = output.size;
            fields.modified = output.modified;
            fields.detail = output.detail;
        });

        // The owner's edits are already persisted and newer than `output`.
        let applied = record.enriched.update_unless_edited(output.edits, |fields| {
            if let Some(description) = output.description {
                fields.description = description;
            }
            record.enriched.set_archived(output.archived);
            record.enriched.set_favourite(output.favourite);
        });
        if !applied {
            trace!(path = %record.status_path, "stored state superseded by an edit");
        }
        record.enriched.set_info_loaded();
    }
}
