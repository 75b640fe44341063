//! Directory walking behind a trait so scans can run over fake trees.

use super::filter::is_hidden_name;
use crate::error::ScanError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Size and modification time captured while walking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// One entry yielded by a walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Present for files whose metadata could be read
    pub stat: Option<FileStat>,
}

impl WalkEntry {
    pub fn file(path: impl Into<PathBuf>, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            stat: Some(FileStat { size, modified }),
        }
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            stat: None,
        }
    }

    /// Final path segment
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
    }
}

/// Source of directory entries for the scanner
pub trait FilesystemWalker: Send + Sync {
    /// Every entry below `root`, in no particular order.
    ///
    /// Unreadable entries are yielded as errors; the walk continues.
    fn walk<'a>(&'a self, root: &Path) -> Box<dyn Iterator<Item = Result<WalkEntry, ScanError>> + 'a>;
}

/// Walker implementation using the walkdir crate
#[derive(Debug, Clone, Default)]
pub struct WalkDirWalker {
    follow_symlinks: bool,
    include_hidden: bool,
    max_depth: Option<usize>,
}

impl WalkDirWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Descend into `.`-prefixed directories
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }
}

impl FilesystemWalker for WalkDirWalker {
    fn walk<'a>(&'a self, root: &Path) -> Box<dyn Iterator<Item = Result<WalkEntry, ScanError>> + 'a> {
        let mut walker = WalkDir::new(root).follow_links(self.follow_symlinks);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.include_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(move |entry| {
                include_hidden
                    || entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry.file_name().to_str().is_some_and(is_hidden_name)
            })
            .map(|result| match result {
                Ok(entry) => {
                    let is_dir = entry.file_type().is_dir();
                    if is_dir {
                        return Ok(WalkEntry::dir(entry.path()));
                    }
                    let metadata = entry.metadata().map_err(|e| ScanError::ReadEntry {
                        path: entry.path().to_path_buf(),
                        source: io::Error::other(e.to_string()),
                    })?;
                    Ok(WalkEntry::file(
                        entry.path(),
                        metadata.len(),
                        metadata.modified().ok(),
                    ))
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::PermissionDenied) {
                        Err(ScanError::PermissionDenied { path })
                    } else {
                        Err(ScanError::ReadEntry {
                            path,
                            source: io::Error::other(e.to_string()),
                        })
                    }
                }
            });

        Box::new(entries)
    }
}
