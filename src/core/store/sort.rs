//! Natural ("numeric-aware") ordering of item names.
//!
//! Names are split into alternating text and digit chunks so that digit
//! runs compare by value: `file9.ma` sorts before `file10.ma`.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    /// Digit run with leading zeros stripped; `width` is the written length.
    Number { digits: String, width: usize },
    /// Text run, kept in lower case for comparison and as written for ties.
    Text { folded: String, original: String },
}

impl Chunk {
    fn number(run: &str) -> Self {
        let digits = run.trim_start_matches('0');
        Chunk::Number {
            digits: if digits.is_empty() { "0" } else { digits }.to_string(),
            width: run.len(),
        }
    }

    fn text(run: &str) -> Self {
        Chunk::Text {
            folded: run.to_lowercase(),
            original: run.to_string(),
        }
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Chunk::Number { digits: a, width: wa },
                Chunk::Number { digits: b, width: wb },
            ) => a
                .len()
                .cmp(&b.len())
                .then_with(|| a.cmp(b))
                .then_with(|| wa.cmp(wb)),
            (
                Chunk::Text { folded: a, original: oa },
                Chunk::Text { folded: b, original: ob },
            ) => a.cmp(b).then_with(|| oa.cmp(ob)),
            (Chunk::Number { .. }, Chunk::Text { .. }) => Ordering::Less,
            (Chunk::Text { .. }, Chunk::Number { .. }) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Precomputed natural sort key for a name or path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameKey(Vec<Chunk>);

impl NameKey {
    pub fn new(name: &str) -> Self {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut in_digits = None;

        for (index, c) in name.char_indices() {
            let is_digit = c.is_ascii_digit();
            match in_digits {
                Some(previous) if previous != is_digit => {
                    chunks.push(Self::chunk(&name[start..index], previous));
                    start = index;
                }
                _ => {}
            }
            in_digits = Some(is_digit);
        }
        if let Some(is_digit) = in_digits {
            chunks.push(Self::chunk(&name[start..], is_digit));
        }

        NameKey(chunks)
    }

    fn chunk(run: &str, is_digit: bool) -> Chunk {
        if is_digit {
            Chunk::number(run)
        } else {
            Chunk::text(run)
        }
    }
}
