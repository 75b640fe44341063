//! # Sequence Module
//!
//! Recognises numbered frame sequences and converts between the concrete
//! per-frame form (`shot.0001.exr`) and the collapsed form
//! (`shot.[0001-0003].exr`).
//!
//! A file belongs to a sequence when the final path segment contains a
//! digit run before the extension. Only the run closest to the extension
//! counts: in `job_sh010_v002.0001.exr` the frame is `0001`.
//!
//! ## Example
//! ```rust,ignore
//! let m = match_sequence("/renders/shot.0001.exr").unwrap();
//! assert_eq!(m.frame, "0001");
//! assert_eq!(m.proxy_path(), "/renders/shot.[0].exr");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Most frames [`parse_ranges`] expands
pub const MAX_RANGE_SPAN: u64 = 1_000_000;

/// Placeholder used instead of a frame number or range in persistence keys.
pub const SEQUENCE_PROXY: &str = "[0]";

static SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)([0-9]+)([^0-9/\\]*)\.([^./\\]+)$").expect("sequence pattern is valid")
});

static COLLAPSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\[([0-9][0-9,\-]*)\]([^/\\]*)$").expect("collapsed pattern is valid")
});

/// A path split around its frame number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMatch {
    /// Everything before the frame number
    pub prefix: String,
    /// The frame number as written, padding included
    pub frame: String,
    /// Everything between the frame number and the extension dot
    pub suffix: String,
    /// Extension without the dot
    pub ext: String,
}

impl SequenceMatch {
    /// Numeric value of the frame token; `None` if it does not fit a u64.
    pub fn frame_number(&self) -> Option<u64> {
        self.frame.parse().ok()
    }

    /// Number of characters in the frame token
    pub fn pad(&self) -> usize {
        self.frame.len()
    }

    /// The persistence key shared by every frame of the sequence
    pub fn proxy_path(&self) -> String {
        format!("{}{}{}.{}", self.prefix, SEQUENCE_PROXY, self.suffix, self.ext)
    }

    /// The concrete path of one frame
    pub fn path_for(&self, frame: u64, pad: usize) -> String {
        format!(
            "{}{:0width$}{}.{}",
            self.prefix,
            frame,
            self.suffix,
            self.ext,
            width = pad
        )
    }

    /// The collapsed `prefix[ranges]suffix.ext` path for a frame set
    pub fn collapsed_path(&self, frames: &FrameSet) -> String {
        format!(
            "{}[{}]{}.{}",
            self.prefix,
            frames.ranges(),
            self.suffix,
            self.ext
        )
    }
}

/// A path in its collapsed `[range]` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collapsed {
    /// Everything before the opening bracket
    pub prefix: String,
    /// Range text without the brackets, e.g. `0001-0003,0007`
    pub range: String,
    /// Everything after the closing bracket
    pub suffix: String,
}

impl Collapsed {
    /// The range including its brackets
    pub fn bracketed(&self) -> String {
        format!("[{}]", self.range)
    }

    fn with_frame(&self, frame: &str) -> String {
        format!("{}{}{}", self.prefix, frame, self.suffix)
    }
}

/// The set of frames observed for one sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSet {
    frames: BTreeSet<u64>,
    pad: usize,
}

impl FrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame token. The pad width is the shortest token seen so
    /// that unpadded runs like `98, 99, 100` keep their natural widths.
    pub fn insert(&mut self, frame: u64, token_len: usize) {
        if self.frames.is_empty() || token_len < self.pad {
            self.pad = token_len;
        }
        self.frames.insert(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    pub fn first(&self) -> Option<u64> {
        self.frames.first().copied()
    }

    pub fn last(&self) -> Option<u64> {
        self.frames.last().copied()
    }

    pub fn contains(&self, frame: u64) -> bool {
        self.frames.contains(&frame)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.frames.iter().copied()
    }

    /// Range notation, e.g. `0001-0003,0007`
    pub fn ranges(&self) -> String {
        format_ranges(self.frames.iter().copied(), self.pad)
    }
}

/// Split a path around the frame number closest to its extension.
///
/// Returns `None` when the file name has no digit run before the
/// extension, and for paths that are already collapsed.
pub fn match_sequence(path: &str) -> Option<SequenceMatch> {
    if is_collapsed(path).is_some() {
        return None;
    }
    let caps = SEQUENCE_RE.captures(path)?;
    Some(SequenceMatch {
        prefix: caps[1].to_string(),
        frame: caps[2].to_string(),
        suffix: caps[3].to_string(),
        ext: caps[4].to_string(),
    })
}

/// Recognise a path that already carries a bracketed frame range.
///
/// Only the final path segment is considered; `ep[01]/shot.0001.exr` is
/// not collapsed.
pub fn is_collapsed(path: &str) -> Option<Collapsed> {
    let caps = COLLAPSED_RE.captures(path)?;
    Some(Collapsed {
        prefix: caps[1].to_string(),
        range: caps[2].to_string(),
        suffix: caps[3].to_string(),
    })
}

/// Path of the first frame of a collapsed sequence.
///
/// Paths that are not collapsed are returned unchanged.
pub fn start_path(path: &str) -> String {
    match is_collapsed(path) {
        Some(collapsed) => {
            let first: String = collapsed
                .range
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            collapsed.with_frame(&first)
        }
        None => path.to_string(),
    }
}

/// Path of the last frame of a collapsed sequence.
///
/// Paths that are not collapsed are returned unchanged.
pub fn end_path(path: &str) -> String {
    match is_collapsed(path) {
        Some(collapsed) => {
            let digits = collapsed
                .range
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .count();
            let last = &collapsed.range[collapsed.range.len() - digits..];
            collapsed.with_frame(last)
        }
        None => path.to_string(),
    }
}

/// Minimal comma-separated run notation for a set of frames.
///
/// `{1, 2, 3, 7}` with a pad of 3 becomes `001-003,007`.
pub fn format_ranges<I>(frames: I, pad: usize) -> String
where
    I: IntoIterator<Item = u64>,
{
    let sorted: BTreeSet<u64> = frames.into_iter().collect();
    let mut runs: Vec<(u64, u64)> = Vec::new();

    for frame in sorted {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == frame => *end = frame,
            _ => runs.push((frame, frame)),
        }
    }

    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                format!("{:0width$}", start, width = pad)
            } else {
                format!("{:0width$}-{:0width$}", start, end, width = pad)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse run notation produced by [`format_ranges`] back into frames.
///
/// Returns `None` for malformed text and for text naming more than
/// [`MAX_RANGE_SPAN`] frames.
pub fn parse_ranges(text: &str) -> Option<BTreeSet<u64>> {
    let mut frames = BTreeSet::new();
    if text.is_empty() {
        return Some(frames);
    }

    for block in text.split(',') {
        match block.split_once('-') {
            Some((start, end)) => {
                let start: u64 = start.parse().ok()?;
                let end: u64 = end.parse().ok()?;
                let span = end.checked_sub(start)?;
                if (frames.len() as u64).saturating_add(span) >= MAX_RANGE_SPAN {
                    return None;
                }
                frames.extend(start..=end);
            }
            None => {
                frames.insert(block.parse().ok()?);
            }
        }
    }
    Some(frames)
}

/// The key under which descriptions and flags are persisted.
///
/// Sequences use [`SEQUENCE_PROXY`] in place of the frame number or range so
/// the key survives frames being added or removed.
pub fn proxy_path(path: &str) -> String {
    if let Some(collapsed) = is_collapsed(path) {
        return collapsed.with_frame(SEQUENCE_PROXY);
    }
    match match_sequence(path) {
        Some(m) => m.proxy_path(),
        None => path.to_string(),
    }
}

/// Expand a collapsed path into the path of every frame in `frames`.
pub fn frame_paths(path: &str, frames: &FrameSet) -> Vec<String> {
    match is_collapsed(path) {
        Some(collapsed) => frames
            .iter()
            .map(|frame| collapsed.with_frame(&format!("{:0width$}", frame, width = frames.pad())))
            .collect(),
        None => vec![path.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_finds_frame_before_extension() {
        let m = match_sequence("/jobs/renders/shot.0001.exr").unwrap();
        assert_eq!(m.prefix, "/jobs/renders/shot.");
        assert_eq!(m.frame, "0001");
        assert_eq!(m.suffix, "");
        assert_eq!(m.ext, "exr");
        assert_eq!(m.frame_number(), Some(1));
    }

    #[test]
    fn match_prefers_last_digit_run() {
        let m = match_sequence("/jobs/job_sh010_animation_v002.0010.c4d").unwrap();
        assert_eq!(m.frame, "0010");
        assert_eq!(m.prefix, "/jobs/job_sh010_animation_v002.");

        let m = match_sequence("job_sh010_animation_v002_gw.c4d").unwrap();
        assert_eq!(m.frame, "002");
        assert_eq!(m.suffix, "_gw");
    }

    #[test]
    fn match_ignores_digits_in_directories() {
        assert!(match_sequence("/jobs/shot010/plate.exr").is_none());
        assert!(match_sequence("/jobs/shot010/notes.txt").is_none());
    }

    #[test]
    fn match_rejects_collapsed_paths() {
        assert!(match_sequence("/r/shot.[0001-0003].exr").is_none());
    }

    #[test]
    fn collapsed_is_recognised() {
        let c = is_collapsed("/r/shot_[001-299]_gw.png").unwrap();
        assert_eq!(c.prefix, "/r/shot_");
        assert_eq!(c.range, "001-299");
        assert_eq!(c.bracketed(), "[001-299]");
        assert_eq!(c.suffix, "_gw.png");
        assert!(is_collapsed("/r/shot_0001.png").is_none());
    }

    #[test]
    fn bracketed_folder_is_not_a_collapsed_path() {
        let path = "/jobs/ep[01]/shot.0002.exr";
        assert!(is_collapsed(path).is_none());

        let m = match_sequence(path).unwrap();
        assert_eq!(m.prefix, "/jobs/ep[01]/shot.");
        assert_eq!(proxy_path(path), "/jobs/ep[01]/shot.[0].exr");
        assert_eq!(
            proxy_path("/jobs/ep[01]/shot.[0001-0003].exr"),
            "/jobs/ep[01]/shot.[0].exr"
        );
        assert_eq!(start_path("/jobs/ep[01]/notes.txt"), "/jobs/ep[01]/notes.txt");
    }

    #[test]
    fn start_and_end_paths_substitute_extremes() {
        let path = "/r/shot.[0001-0003,0007].exr";
        assert_eq!(start_path(path), "/r/shot.0001.exr");
        assert_eq!(end_path(path), "/r/shot.0007.exr");
        assert_eq!(start_path("/r/notes.txt"), "/r/notes.txt");
    }

    #[test]
    fn match_then_collapse_round_trips_to_extremes() {
        let m = match_sequence("/r/plate_v01.1001.dpx").unwrap();
        let mut frames = FrameSet::new();
        for frame in [1001, 1002, 1003, 1010] {
            frames.insert(frame, 4);
        }
        let collapsed = m.collapsed_path(&frames);
        assert_eq!(collapsed, "/r/plate_v01.[1001-1003,1010].dpx");
        assert_eq!(start_path(&collapsed), m.path_for(1001, 4));
        assert_eq!(end_path(&collapsed), m.path_for(1010, 4));
    }

    #[test]
    fn format_ranges_builds_minimal_runs() {
        assert_eq!(format_ranges([1, 2, 3, 7], 3), "001-003,007");
        assert_eq!(format_ranges([7, 3, 1, 2, 2], 3), "001-003,007");
        assert_eq!(format_ranges([5], 0), "5");
        assert_eq!(format_ranges(Vec::<u64>::new(), 4), "");
    }

    #[test]
    fn parse_ranges_reconstructs_the_set() {
        let sets: [&[u64]; 4] = [&[1, 2, 3, 7], &[0], &[10, 12, 14, 15, 16], &[]];
        for set in sets {
            let expected: BTreeSet<u64> = set.iter().copied().collect();
            let text = format_ranges(set.iter().copied(), 4);
            assert_eq!(parse_ranges(&text), Some(expected));
        }
        assert_eq!(parse_ranges("3-1"), None);
        assert_eq!(parse_ranges("a-b"), None);
    }

    #[test]
    fn parse_ranges_refuses_huge_spans() {
        assert_eq!(parse_ranges("0-18446744073709551615"), None);
        assert_eq!(parse_ranges("1-1000001,5"), None);
        assert_eq!(parse_ranges("1-600000,700001-1300000"), None);
        assert_eq!(parse_ranges("1001-2000").map(|set| set.len()), Some(1000));
    }

    #[test]
    fn frame_set_keeps_shortest_pad() {
        let mut frames = FrameSet::new();
        frames.insert(100, 3);
        frames.insert(98, 2);
        frames.insert(99, 2);
        assert_eq!(frames.pad(), 2);
        assert_eq!(frames.ranges(), "98-100");
    }

    #[test]
    fn proxy_path_is_stable_across_frame_ranges() {
        assert_eq!(proxy_path("/r/shot.0001.exr"), "/r/shot.[0].exr");
        assert_eq!(proxy_path("/r/shot.[0001-0003].exr"), "/r/shot.[0].exr");
        assert_eq!(proxy_path("/r/shot.[0001-0009].exr"), "/r/shot.[0].exr");
        assert_eq!(proxy_path("/r/notes.txt"), "/r/notes.txt");
    }

    #[test]
    fn frame_paths_expand_every_frame() {
        let mut frames = FrameSet::new();
        frames.insert(1, 2);
        frames.insert(2, 2);
        let paths = frame_paths("/r/a.[01-02].png", &frames);
        assert_eq!(paths, vec!["/r/a.01.png", "/r/a.02.png"]);
    }
}
