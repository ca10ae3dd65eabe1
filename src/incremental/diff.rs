//! Line-level diff between two versions of a document.

use text_size::{TextRange, TextSize};

/// The single differing region between two texts, widened to whole lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineDiff {
    /// Start of the first changed line, same in both texts
    pub start: TextSize,
    /// End of the changed region in the old text
    pub old_end: TextSize,
    /// End of the changed region in the new text
    pub new_end: TextSize,
    /// Index of the first changed line
    pub first_line: u32,
    /// Newlines added (positive) or removed (negative) by the edit
    pub line_delta: i64,
}

impl LineDiff {
    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.start, self.old_end)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.start, self.new_end)
    }

    /// Byte shift applied to everything after the changed region
    pub fn byte_delta(&self) -> i64 {
        i64::from(u32::from(self.new_end)) - i64::from(u32::from(self.old_end))
    }
}

/// Scan whole lines for a common prefix and suffix.
///
/// Returns `None` when the texts are identical.
pub fn line_diff(old: &str, new: &str) -> Option<LineDiff> {
    if old == new {
        return None;
    }

    let mut prefix = 0usize;
    let mut first_line = 0u32;
    for (a, b) in old.split_inclusive('\n').zip(new.split_inclusive('\n')) {
        if a != b || !a.ends_with('\n') {
            break;
        }
        prefix += a.len();
        first_line += 1;
    }

    // Suffix lines, never overlapping the prefix in either text
    let max_suffix = (old.len() - prefix).min(new.len() - prefix);
    let mut suffix = 0usize;
    let mut old_lines = old[prefix..].split_inclusive('\n').rev();
    let mut new_lines = new[prefix..].split_inclusive('\n').rev();
    loop {
        match (old_lines.next(), new_lines.next()) {
            (Some(a), Some(b)) if a == b && suffix + a.len() <= max_suffix => suffix += a.len(),
            _ => break,
        }
    }

    let old_end = old.len() - suffix;
    let new_end = new.len() - suffix;
    let newlines = |s: &str| s.bytes().filter(|b| *b == b'\n').count() as i64;
    Some(LineDiff {
        start: TextSize::new(prefix as u32),
        old_end: TextSize::new(old_end as u32),
        new_end: TextSize::new(new_end as u32),
        first_line,
        line_delta: newlines(&new[prefix..new_end]) - newlines(&old[prefix..old_end]),
    })
}
