//! Parse results and the top-level segment index.

use std::collections::BTreeSet;
use std::ops::Range;

use text_size::{TextRange, TextSize};

use crate::parser::errors::ParseError;
use crate::parser::{RecoveryInfo, SegmentStats};
use crate::semantic::{Diagnostic, DiagnosticCollector};

use super::symbol::{Symbol, SymbolKind};

/// A run of top-level statements and comments that share lines.
///
/// Segments never share a line with each other and are sorted by position.
/// Incremental reparsing replaces whole segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start_line: u32,
    /// Last line touched, inclusive
    pub end_line: u32,
    pub range: TextRange,
    /// Indices into [`ParseResult::symbols`]
    pub symbols: Range<usize>,
    /// Indices into [`ParseResult::parse_errors`]
    pub errors: Range<usize>,
    /// Top-level statements in the segment; zero when it holds only comments
    pub statements: u32,
    pub stats: SegmentStats,
}

impl Segment {
    pub(crate) fn shifted(&self, delta: i64, line_delta: i64, symbol_delta: i64, error_delta: i64) -> Segment {
        let line = |l: u32| (i64::from(l) + line_delta).max(0) as u32;
        let index = |i: usize, d: i64| (i as i64 + d).max(0) as usize;
        Segment {
            start_line: line(self.start_line),
            end_line: line(self.end_line),
            range: crate::parser::errors::shift_range(self.range, delta),
            symbols: index(self.symbols.start, symbol_delta)..index(self.symbols.end, symbol_delta),
            errors: index(self.errors.start, error_delta)..index(self.errors.end, error_delta),
            statements: self.statements,
            stats: self.stats,
        }
    }
}

/// Everything known about one version of a document after parsing.
///
/// Results are shared as `Arc<ParseResult>` and never mutated once handed
/// to consumers.
#[derive(Clone, Debug, Default)]
pub struct ParseResult {
    /// Root symbols in document order
    pub symbols: Vec<Symbol>,
    /// Syntax diagnostics, replaced by the full list once validated
    pub diagnostics: Vec<Diagnostic>,
    /// Parse errors in document order
    pub parse_errors: Vec<ParseError>,
    pub is_partially_valid: bool,
    /// Lines touched by the edit that produced this result (incremental only)
    pub changed_lines: Option<BTreeSet<u32>>,
    pub recovery: RecoveryInfo,
    pub segments: Vec<Segment>,
    pub line_count: usize,
}

impl ParseResult {
    /// Result for a document whose parse could not run at all
    pub fn failed(line_count: usize, error: ParseError) -> Self {
        Self {
            symbols: Vec::new(),
            diagnostics: vec![Diagnostic::from(&error)],
            parse_errors: vec![error],
            is_partially_valid: false,
            changed_lines: None,
            recovery: RecoveryInfo::default(),
            segments: Vec::new(),
            line_count,
        }
    }

    /// Build a result from parser output, deriving recovery statistics,
    /// partial validity and the syntax diagnostics.
    pub(crate) fn assemble(
        symbols: Vec<Symbol>,
        parse_errors: Vec<ParseError>,
        segments: Vec<Segment>,
        line_count: usize,
    ) -> Self {
        let recovery = RecoveryInfo::from_stats(segments.iter().map(|s| &s.stats));
        let structural_error = parse_errors
            .iter()
            .any(|e| e.code.is_structural() && e.severity.is_error());
        let mut any_valid = false;
        for symbol in &symbols {
            symbol.walk(&mut |s: &Symbol| {
                if s.is_complete && s.kind != SymbolKind::Comment && !s.is_error_marker() {
                    any_valid = true;
                }
            });
        }

        let mut collector = DiagnosticCollector::new();
        collector.extend_from_parse_errors(&parse_errors);
        Self {
            symbols,
            diagnostics: collector.finish(),
            parse_errors,
            is_partially_valid: !structural_error || any_valid,
            changed_lines: None,
            recovery,
            segments,
            line_count,
        }
    }

    /// Total number of symbols in the tree
    pub fn symbol_count(&self) -> usize {
        self.symbols.iter().map(Symbol::count).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.parse_errors.iter().any(|e| e.severity.is_error())
    }

    /// Deepest symbol containing `offset`
    pub fn symbol_at(&self, offset: TextSize) -> Option<&Symbol> {
        self.symbols.iter().find_map(|s| s.find_at(offset))
    }

    /// Depth-first walk over every symbol
    pub fn walk<'a>(&'a self, mut f: impl FnMut(&'a Symbol)) {
        for symbol in &self.symbols {
            symbol.walk(&mut f);
        }
    }

    /// The root symbols wrapped in a single `CalculationRoot`
    pub fn document_symbol(&self, document_len: TextSize) -> Symbol {
        let mut root = Symbol::new(
            "calculation",
            SymbolKind::CalculationRoot,
            TextRange::up_to(document_len),
        )
        .with_children(self.symbols.clone());
        root.is_complete = self.symbols.iter().all(|s| s.is_complete);
        root
    }

    /// Equality of content, ignoring `changed_lines`
    pub fn structurally_eq(&self, other: &ParseResult) -> bool {
        self.symbols == other.symbols
            && self.diagnostics == other.diagnostics
            && self.parse_errors == other.parse_errors
            && self.is_partially_valid == other.is_partially_valid
            && self.recovery == other.recovery
            && self.segments == other.segments
            && self.line_count == other.line_count
    }

    /// Check tree containment and ordering for every root
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut previous_end: Option<TextSize> = None;
        for symbol in &self.symbols {
            if let Some(end) = previous_end
                && symbol.range.start() < end
            {
                return Err(format!("root '{}' overlaps its predecessor", symbol.name));
            }
            previous_end = Some(symbol.range.end());
            symbol.check_invariants()?;
        }
        if self.recovery.recovered_errors > self.recovery.total_errors {
            return Err("recovered errors exceed total errors".to_string());
        }
        Ok(())
    }

    /// Rough memory footprint used by the document cache
    pub fn approx_memory_bytes(&self) -> usize {
        let symbols: usize = self.symbols.iter().map(Symbol::approx_memory_bytes).sum();
        let errors: usize = self
            .parse_errors
            .iter()
            .map(|e| {
                std::mem::size_of::<ParseError>()
                    + e.message.len()
                    + e.recovery_action.as_ref().map_or(0, String::len)
            })
            .sum();
        let diagnostics: usize = self
            .diagnostics
            .iter()
            .map(|d| std::mem::size_of::<Diagnostic>() + d.message.len())
            .sum();
        std::mem::size_of::<ParseResult>()
            + symbols
            + errors
            + diagnostics
            + self.segments.len() * std::mem::size_of::<Segment>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::errors::ErrorCode;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(TextSize::new(start), TextSize::new(end))
    }

    #[test]
    fn test_failed_result_is_not_partially_valid() {
        let result = ParseResult::failed(
            3,
            ParseError::new("internal parser error", range(0, 0), ErrorCode::E0999),
        );
        assert!(!result.is_partially_valid);
        assert!(result.symbols.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn test_structural_equality_ignores_changed_lines() {
        let a = ParseResult {
            is_partially_valid: true,
            ..ParseResult::default()
        };
        let mut b = a.clone();
        b.changed_lines = Some(BTreeSet::from([2]));
        assert!(a.structurally_eq(&b));
    }

    #[test]
    fn test_segment_shift() {
        let segment = Segment {
            start_line: 4,
            end_line: 6,
            range: range(40, 60),
            symbols: 2..3,
            errors: 0..1,
            statements: 1,
            stats: SegmentStats::default(),
        };
        let moved = segment.shifted(-10, -1, 1, 0);
        assert_eq!(moved.start_line, 3);
        assert_eq!(moved.end_line, 5);
        assert_eq!(moved.range, range(30, 50));
        assert_eq!(moved.symbols, 3..4);
        assert_eq!(moved.errors, 0..1);
    }

    #[test]
    fn test_document_symbol_wraps_roots() {
        let result = ParseResult {
            symbols: vec![Symbol::new(
                "Sales",
                SymbolKind::FieldReference { qualifier: None },
                range(0, 7),
            )],
            ..ParseResult::default()
        };
        let root = result.document_symbol(TextSize::new(7));
        assert_eq!(root.kind, SymbolKind::CalculationRoot);
        assert_eq!(root.children.len(), 1);
        assert!(root.check_invariants().is_ok());
    }
}
