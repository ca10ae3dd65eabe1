//! Byte offset ↔ line/column conversion.

use text_size::{TextRange, TextSize};

use super::position::{Position, Span};

/// Line start table for a document.
///
/// Line numbers are 0-indexed; columns are byte offsets within the line.
/// A document always has at least one line, and every `\n` starts a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<TextSize>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::new(0)];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(TextSize::new(offset as u32 + 1));
            }
        }
        Self {
            line_starts,
            len: TextSize::of(text),
        }
    }

    /// Number of lines (a trailing newline opens an empty final line)
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Total document length in bytes
    pub fn len(&self) -> TextSize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == TextSize::new(0)
    }

    /// Line containing `offset`; offsets past the end map to the last line
    pub fn line_of(&self, offset: TextSize) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line as u32,
            Err(next) => (next - 1) as u32,
        }
    }

    /// Offset of the first byte of `line`, or the document end for `line == line_count()`
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        let line = line as usize;
        if line < self.line_starts.len() {
            Some(self.line_starts[line])
        } else if line == self.line_starts.len() {
            Some(self.len)
        } else {
            None
        }
    }

    pub fn line_col(&self, offset: TextSize) -> Position {
        let offset = offset.min(self.len);
        let line = self.line_of(offset);
        let column = offset - self.line_starts[line as usize];
        Position::new(line, column.into())
    }

    pub fn span(&self, range: TextRange) -> Span {
        Span::new(self.line_col(range.start()), self.line_col(range.end()))
    }

    /// Lines touched by `range`, first and last inclusive
    pub fn line_range(&self, range: TextRange) -> (u32, u32) {
        let start = self.line_of(range.start());
        let end = if range.is_empty() {
            start
        } else {
            self.line_of(range.end() - TextSize::new(1))
        };
        (start, end.max(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_has_one_line() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 1);
        assert!(index.is_empty());
        assert_eq!(index.line_of(TextSize::new(0)), 0);
    }

    #[test]
    fn test_line_col_conversion() {
        let index = LineIndex::new("SUM([a])\nAVG([b])\n");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_col(TextSize::new(0)), Position::new(0, 0));
        assert_eq!(index.line_col(TextSize::new(9)), Position::new(1, 0));
        assert_eq!(index.line_col(TextSize::new(12)), Position::new(1, 3));
        assert_eq!(index.line_start(2), Some(TextSize::new(18)));
        assert_eq!(index.line_start(3), Some(TextSize::new(18)));
        assert_eq!(index.line_start(4), None);
    }

    #[test]
    fn test_line_range_excludes_trailing_newline() {
        let text = "IF [a]\nTHEN 1\nEND\n";
        let index = LineIndex::new(text);
        let range = TextRange::new(TextSize::new(0), TextSize::new(7));
        assert_eq!(index.line_range(range), (0, 0));
        let range = TextRange::new(TextSize::new(0), TextSize::new(17));
        assert_eq!(index.line_range(range), (0, 2));
    }
}
