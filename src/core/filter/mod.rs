//! # Filter Module
//!
//! Row visibility over a bucket.
//!
//! A [`FilterView`] never reorders or copies rows; it answers "is row N
//! visible" from the record's current fields, so enrichment results (a new
//! description, an archived flag) take effect on the next query.
//!
//! ## Filter text
//! - `--token` and `--"quoted token"` exclude any row containing the token.
//! - Every remaining whitespace-separated term must match. Terms are
//!   case-insensitive regular expressions; a term that is not a valid
//!   pattern is matched as plain text.
//!
//! The text is matched against the record's path, description and detail
//! line, lower-cased and joined with newlines.

use crate::core::store::{Bucket, Record};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static EXCLUSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"--"([^"]*)"|--(\S+)"#).expect("exclusion pattern is valid")
});

/// Toggleable visibility flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterFlag {
    /// Only the Active record is visible
    ActiveOnly,
    /// Archived records are visible
    ShowArchived,
    /// Only favourites are visible
    FavouritesOnly,
}

#[derive(Debug, Clone)]
enum Term {
    Pattern(Regex),
    Text(String),
}

impl Term {
    fn parse(term: &str) -> Self {
        match RegexBuilder::new(term).case_insensitive(true).build() {
            Ok(regex) => Term::Pattern(regex),
            Err(e) => {
                debug!(term, error = %e, "filter term is not a valid pattern, matching as text");
                Term::Text(term.to_lowercase())
            }
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        match self {
            Term::Pattern(regex) => regex.is_match(haystack),
            Term::Text(text) => haystack.contains(text.as_str()),
        }
    }
}

/// Parsed filter text
#[derive(Debug, Clone, Default)]
struct FilterText {
    exclusions: Vec<String>,
    terms: Vec<Term>,
}

impl FilterText {
    fn parse(text: &str) -> Self {
        let exclusions = EXCLUSION_RE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();

        let remaining = EXCLUSION_RE.replace_all(text, " ");
        let terms = remaining.split_whitespace().map(Term::parse).collect();

        Self { exclusions, terms }
    }

    fn is_empty(&self) -> bool {
        self.exclusions.is_empty() && self.terms.is_empty()
    }

    fn accepts(&self, searchable: &str) -> bool {
        if self
            .exclusions
            .iter()
            .any(|token| searchable.contains(token.as_str()))
        {
            return false;
        }
        self.terms.iter().all(|term| term.matches(searchable))
    }
}

/// Read-only visibility view over buckets
#[derive(Debug, Clone, Default)]
pub struct FilterView {
    text: String,
    parsed: FilterText,
    active_only: bool,
    show_archived: bool,
    favourites_only: bool,
}

impl FilterView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.parsed = FilterText::parse(text);
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn flag(&self, flag: FilterFlag) -> bool {
        match flag {
            FilterFlag::ActiveOnly => self.active_only,
            FilterFlag::ShowArchived => self.show_archived,
            FilterFlag::FavouritesOnly => self.favourites_only,
        }
    }

    pub fn set_flag(&mut self, flag: FilterFlag, enabled: bool) {
        match flag {
            FilterFlag::ActiveOnly => self.active_only = enabled,
            FilterFlag::ShowArchived => self.show_archived = enabled,
            FilterFlag::FavouritesOnly => self.favourites_only = enabled,
        }
    }

    pub fn with_flag(mut self, flag: FilterFlag, enabled: bool) -> Self {
        self.set_flag(flag, enabled);
        self
    }

    /// Whether `record` passes the filter
    pub fn accepts(&self, record: &Record) -> bool {
        if self.active_only {
            return record.user.is_active();
        }

        if !self.parsed.is_empty() && !self.parsed.accepts(&record.searchable()) {
            return false;
        }

        if !self.show_archived && record.enriched.is_archived() {
            return false;
        }

        !self.favourites_only || record.enriched.is_favourite()
    }

    /// Whether row `row` of `bucket` is visible. Absent rows never are.
    pub fn row_visible(&self, bucket: &Bucket, row: usize) -> bool {
        bucket.get(row).is_some_and(|record| self.accepts(record))
    }

    /// Every visible row, in bucket order
    pub fn visible_rows(&self, bucket: &Bucket) -> Vec<usize> {
        bucket
            .iter()
            .enumerate()
            .filter(|(_, record)| self.accepts(record))
            .map(|(row, _)| row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{BucketKey, DataStore, Granularity, ItemFlags};

    fn key() -> BucketKey {
        BucketKey::new("scenes", Granularity::File)
    }

    fn store_with(records: Vec<Record>) -> DataStore {
        let mut store = DataStore::new();
        store.replace_bucket(&key(), records);
        store
    }

    fn visible_names(store: &mut DataStore, view: &FilterView) -> Vec<String> {
        let bucket = store.get(&key());
        view.visible_rows(bucket)
            .into_iter()
            .map(|row| bucket.get(row).unwrap().display_name.clone())
            .collect()
    }

    #[test]
    fn exclusion_rejects_containing_rows() {
        let mut store = store_with(vec![
            Record::file("/s/foobar.ma", vec![]),
            Record::file("/s/foobaz.ma", vec![]),
        ]);
        let view = FilterView::new().with_text("foo --bar");
        assert_eq!(visible_names(&mut store, &view), vec!["foobaz.ma"]);
    }

    #[test]
    fn quoted_exclusion_may_contain_spaces() {
        let record = Record::file("/s/a.ma", vec![]);
        record.enriched.update(|f| f.description = "Needs Review".to_string());
        let other = Record::file("/s/b.ma", vec![]);
        let mut store = store_with(vec![record, other]);

        let view = FilterView::new().with_text(r#"--"needs review""#);
        assert_eq!(visible_names(&mut store, &view), vec!["b.ma"]);
    }

    #[test]
    fn terms_are_case_insensitive_patterns() {
        let mut store = store_with(vec![
            Record::file("/s/Shot_010.ma", vec![]),
            Record::file("/s/shot_020.ma", vec![]),
            Record::file("/s/layout.ma", vec![]),
        ]);
        let view = FilterView::new().with_text("SHOT_0[12]0");
        assert_eq!(
            visible_names(&mut store, &view),
            vec!["Shot_010.ma", "shot_020.ma"]
        );
    }

    #[test]
    fn all_terms_must_match() {
        let mut store = store_with(vec![
            Record::file("/s/hero_anim.ma", vec![]),
            Record::file("/s/hero_layout.ma", vec![]),
        ]);
        let view = FilterView::new().with_text("hero anim");
        assert_eq!(visible_names(&mut store, &view), vec!["hero_anim.ma"]);
    }

    #[test]
    fn invalid_pattern_falls_back_to_text() {
        let mut store = store_with(vec![
            Record::file("/s/a[1.ma", vec![]),
            Record::file("/s/a1.ma", vec![]),
        ]);
        let view = FilterView::new().with_text("a[1");
        assert_eq!(visible_names(&mut store, &view), vec!["a[1.ma"]);
    }

    #[test]
    fn text_matches_description_and_detail() {
        let record = Record::file("/s/a.ma", vec![]);
        record.enriched.update(|f| f.description = "Approved by client".to_string());
        let mut store = store_with(vec![record, Record::file("/s/b.ma", vec![])]);

        let view = FilterView::new().with_text("approved");
        assert_eq!(visible_names(&mut store, &view), vec!["a.ma"]);
    }

    #[test]
    fn archived_hidden_unless_shown() {
        let archived = Record::file("/s/old.ma", vec![]).with_flags(ItemFlags {
            archived: true,
            ..Default::default()
        });
        let mut store = store_with(vec![archived, Record::file("/s/new.ma", vec![])]);

        assert_eq!(visible_names(&mut store, &FilterView::new()), vec!["new.ma"]);
        let view = FilterView::new().with_flag(FilterFlag::ShowArchived, true);
        assert_eq!(visible_names(&mut store, &view), vec!["old.ma", "new.ma"]);
    }

    #[test]
    fn favourites_and_active_only() {
        let favourite = Record::file("/s/fav.ma", vec![]).with_flags(ItemFlags {
            favourite: true,
            ..Default::default()
        });
        let active = Record::file("/s/cur.ma", vec![]).with_flags(ItemFlags {
            active: true,
            ..Default::default()
        });
        let mut store = store_with(vec![favourite, active]);

        let favourites = FilterView::new().with_flag(FilterFlag::FavouritesOnly, true);
        assert_eq!(visible_names(&mut store, &favourites), vec!["fav.ma"]);

        let active_only = FilterView::new()
            .with_flag(FilterFlag::ActiveOnly, true)
            .with_text("fav");
        assert_eq!(visible_names(&mut store, &active_only), vec!["cur.ma"]);
    }

    #[test]
    fn absent_row_is_not_visible() {
        let mut store = store_with(vec![Record::file("/s/a.ma", vec![])]);
        let view = FilterView::new();
        let bucket = store.get(&key());
        assert!(view.row_visible(bucket, 0));
        assert!(!view.row_visible(bucket, 1));
    }

    #[test]
    fn visibility_is_deterministic() {
        let mut store = store_with(vec![
            Record::file("/s/a.ma", vec![]),
            Record::file("/s/b.nk", vec![]),
        ]);
        let view = FilterView::new().with_text(r"\.ma\b");
        let first = visible_names(&mut store, &view);
        let second = visible_names(&mut store, &view);
        assert_eq!(first, vec!["a.ma"]);
        assert_eq!(first, second);
    }
}
