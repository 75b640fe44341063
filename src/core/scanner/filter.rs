//! Entry filtering logic for the scanner.

use std::collections::HashSet;
use std::path::Path;

/// System files that never show up in a catalog
const SYSTEM_NAMES: [&str; 1] = ["thumbs.db"];

pub(crate) fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Decides which files a collection lists
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Lower-case extensions to accept; `None` accepts any
    extensions: Option<HashSet<String>>,
    include_hidden: bool,
}

impl EntryFilter {
    /// Accept every visible file
    pub fn new() -> Self {
        Self::default()
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Only accept these extensions; an empty list accepts any
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self.extensions = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();

        if !self.include_hidden && is_hidden_name(&name) {
            return false;
        }

        let lower = name.to_lowercase();
        if SYSTEM_NAMES.iter().any(|system| lower.contains(system)) {
            return false;
        }

        match &self.extensions {
            None => true,
            Some(extensions) => path
                .extension()
                .is_some_and(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase())),
        }
    }
}
