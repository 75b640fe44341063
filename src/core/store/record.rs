//! The item record and its two independently owned halves.
//!
//! A record's fields are split by writer:
//! - [`UserState`] is written only by the owner thread (active flag, row).
//! - [`EnrichedState`] is written by worker threads (detail, stat values,
//!   thumbnail, loaded flags).
//!
//! The persisted values a user can change (description, archived,
//! favourite) are the one overlap: the owner writes them through
//! [`EnrichedState::edit`], which bumps an edit stamp under the field lock.
//! An info pass publishes them only if the stamp it read before querying
//! persistence is still current, so a user's change is never overwritten by
//! an older stored value.
//!
//! The identity fields (path, kind, frames, entries) never change after the
//! record is published. No record-wide lock exists; flags are atomics and
//! the enriched strings sit behind an `RwLock`.

use super::sort::NameKey;
use crate::core::sequence::{self, FrameSet};
use crate::core::workers::Role;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::SystemTime;

/// What a record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    File,
    Sequence,
    Asset,
    Bookmark,
}

/// Identity flags as persisted and as read by filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub active: bool,
    pub archived: bool,
    pub favourite: bool,
}

/// Owner-thread state
#[derive(Debug, Default)]
pub struct UserState {
    active: AtomicBool,
    row: AtomicUsize,
}

impl UserState {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Row the record held after the latest sort or reset
    pub fn row(&self) -> usize {
        self.row.load(Ordering::Acquire)
    }

    pub(crate) fn set_row(&self, row: usize) {
        self.row.store(row, Ordering::Release);
    }
}

/// Values computed by enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichedFields {
    pub description: String,
    pub detail: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub thumbnail: Option<PathBuf>,
}

/// Worker-written state, plus the user-editable persisted values
#[derive(Debug, Default)]
pub struct EnrichedState {
    fields: RwLock<EnrichedFields>,
    archived: AtomicBool,
    favourite: AtomicBool,
    info_loaded: AtomicBool,
    thumbnail_loaded: AtomicBool,
    failed: AtomicU8,
    edits: AtomicU64,
}

impl EnrichedState {
    /// Read access to the enriched values
    pub fn fields(&self) -> RwLockReadGuard<'_, EnrichedFields> {
        self.fields.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn update<F>(&self, update: F)
    where
        F: FnOnce(&mut EnrichedFields),
    {
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut fields);
    }

    /// Owner-side change to user-editable values
    pub(crate) fn edit<F>(&self, edit: F)
    where
        F: FnOnce(&mut EnrichedFields),
    {
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut fields);
        self.edits.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of owner-side edits so far
    pub fn edits(&self) -> u64 {
        self.edits.load(Ordering::Acquire)
    }

    /// Apply `update` unless the owner edited the record after `seen`.
    /// Returns whether it was applied.
    pub(crate) fn update_unless_edited<F>(&self, seen: u64, update: F) -> bool
    where
        F: FnOnce(&mut EnrichedFields),
    {
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        if self.edits.load(Ordering::Acquire) != seen {
            return false;
        }
        update(&mut fields);
        true
    }

    pub fn is_archived(&self) -> bool {
        self.archived.load(Ordering::Acquire)
    }

    pub fn is_favourite(&self) -> bool {
        self.favourite.load(Ordering::Acquire)
    }

    pub(crate) fn set_archived(&self, archived: bool) {
        self.archived.store(archived, Ordering::Release);
    }

    pub(crate) fn set_favourite(&self, favourite: bool) {
        self.favourite.store(favourite, Ordering::Release);
    }

    pub fn info_loaded(&self) -> bool {
        self.info_loaded.load(Ordering::Acquire)
    }

    pub fn thumbnail_loaded(&self) -> bool {
        self.thumbnail_loaded.load(Ordering::Acquire)
    }

    pub(crate) fn set_info_loaded(&self) {
        self.info_loaded.store(true, Ordering::Release);
    }

    pub(crate) fn set_thumbnail_loaded(&self) {
        self.thumbnail_loaded.store(true, Ordering::Release);
    }

    /// Whether enrichment for `role` failed during this generation
    pub fn has_failed(&self, role: Role) -> bool {
        self.failed.load(Ordering::Acquire) & role.bit() != 0
    }

    pub(crate) fn mark_failed(&self, role: Role) {
        self.failed.fetch_or(role.bit(), Ordering::AcqRel);
    }
}

/// One listed item
#[derive(Debug)]
pub struct Record {
    /// Final path segment, collapsed for sequences
    pub display_name: String,
    /// Canonical full path, unique within a bucket
    pub status_path: String,
    /// Collection parent components plus the sub-folder of the item
    pub parent_chain: Vec<String>,
    pub kind: ItemKind,
    /// Observed frames, for sequences
    pub frames: Option<FrameSet>,
    /// Underlying files, one per frame for sequences
    pub entries: Vec<PathBuf>,
    sort_name: NameKey,
    pub user: UserState,
    pub enriched: EnrichedState,
}

impl Record {
    pub fn new(kind: ItemKind, status_path: impl Into<String>, parent_chain: Vec<String>) -> Self {
        let status_path = status_path.into();
        let display_name = status_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(status_path.as_str())
            .to_string();

        Self {
            display_name,
            sort_name: NameKey::new(&status_path),
            status_path,
            parent_chain,
            kind,
            frames: None,
            entries: Vec::new(),
            user: UserState::default(),
            enriched: EnrichedState::default(),
        }
    }

    /// A plain file backed by a single entry
    pub fn file(path: impl Into<String>, parent_chain: Vec<String>) -> Self {
        let path = path.into();
        let entry = PathBuf::from(&path);
        Self::new(ItemKind::File, path, parent_chain).with_entries(vec![entry])
    }

    pub fn with_entries(mut self, entries: Vec<PathBuf>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_frames(mut self, frames: FrameSet) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Seed stat values known at scan time
    pub fn with_stat(self, size: u64, modified: Option<SystemTime>) -> Self {
        let frame_count = self.frames.as_ref().map(FrameSet::len);
        self.enriched.update(|fields| {
            fields.size = size;
            fields.modified = modified;
            fields.detail = detail_string(frame_count, modified, size);
        });
        self
    }

    pub fn with_flags(self, flags: ItemFlags) -> Self {
        self.user.set_active(flags.active);
        self.enriched.set_archived(flags.archived);
        self.enriched.set_favourite(flags.favourite);
        self
    }

    pub fn sort_name(&self) -> &NameKey {
        &self.sort_name
    }

    /// Persistence key shared by all frame ranges of a sequence
    pub fn proxy_key(&self) -> String {
        sequence::proxy_path(&self.status_path)
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == ItemKind::Sequence
    }

    pub fn flags(&self) -> ItemFlags {
        ItemFlags {
            active: self.user.is_active(),
            archived: self.enriched.is_archived(),
            favourite: self.enriched.is_favourite(),
        }
    }

    /// Path of every underlying frame, or the file itself
    pub fn frame_paths(&self) -> Vec<String> {
        match &self.frames {
            Some(frames) => sequence::frame_paths(&self.status_path, frames),
            None => vec![self.status_path.clone()],
        }
    }

    /// The text free-text filters search: path, description and detail
    pub fn searchable(&self) -> String {
        let fields = self.enriched.fields();
        format!(
            "{}\n{}\n{}",
            self.status_path.to_lowercase(),
            fields.description.trim().to_lowercase(),
            fields.detail.trim().to_lowercase()
        )
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        let fields = self.enriched.fields();
        RecordSnapshot {
            row: self.user.row(),
            name: self.display_name.clone(),
            path: self.status_path.clone(),
            kind: self.kind,
            frames: self.frames.as_ref().map(FrameSet::ranges),
            flags: self.flags(),
            description: fields.description.clone(),
            detail: fields.detail.clone(),
            size: fields.size,
            thumbnail: fields.thumbnail.clone(),
            info_loaded: self.enriched.info_loaded(),
            thumbnail_loaded: self.enriched.thumbnail_loaded(),
        }
    }
}

/// A serialisable point-in-time copy of a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub row: usize,
    pub name: String,
    pub path: String,
    pub kind: ItemKind,
    pub frames: Option<String>,
    pub flags: ItemFlags,
    pub description: String,
    pub detail: String,
    pub size: u64,
    pub thumbnail: Option<PathBuf>,
    pub info_loaded: bool,
    pub thumbnail_loaded: bool,
}

/// Human readable byte count, e.g. `1.5MB`
pub fn byte_to_string(bytes: u64) -> String {
    const UNITS: [&str; 8] = ["", "K", "M", "G", "T", "P", "E", "Z"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value.abs() < 1024.0 {
            return format!("{:.1}{}B", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}YiB", value)
}

/// Detail line shown under an item.
///
/// Files: `dd/MM/yyyy HH:MM;size`. Sequences prefix the frame count:
/// `3f;dd/MM/yyyy HH:MM;size`.
pub fn detail_string(frame_count: Option<usize>, modified: Option<SystemTime>, size: u64) -> String {
    let date = modified
        .map(|time| DateTime::<Local>::from(time).format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_default();

    match frame_count {
        Some(count) => format!("{}f;{};{}", count, date, byte_to_string(size)),
        None => format!("{};{}", date, byte_to_string(size)),
    }
}
