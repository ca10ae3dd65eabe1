//! Incremental reparsing
//!
//! An edit is reduced to the run of changed lines. The top-level segments
//! around it are reparsed from a window of the new text and spliced between
//! the cached segments before and after it. Anything unexpected falls back to
//! a full parse; the spliced result is always what a full parse would give.

mod diff;

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use text_size::{TextRange, TextSize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::base::LineIndex;
use crate::parser::{ParseOptions, parse_document_cancellable, parse_tokens, tokenize_at};
use crate::syntax::{ParseResult, Segment};

pub use diff::{LineDiff, line_diff};

/// Documents shorter than this are always parsed in full.
pub const DEFAULT_LINE_THRESHOLD: usize = 200;

/// Window growth attempts before giving up on a splice
const MAX_WINDOW_RETRIES: u32 = 3;

/// Why a splice could not be used. Never surfaced to callers: every variant
/// downgrades to a full reparse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IncrementalError {
    #[error("cached result covers {cached} lines but the baseline text has {actual}")]
    StaleBaseline { cached: usize, actual: usize },

    #[error("no statement boundary at offset {offset:?} after {attempts} window attempts")]
    NoBoundary { offset: TextSize, attempts: u32 },

    #[error("window {window:?} runs past the end of the document ({len:?})")]
    WindowOverflow { window: TextRange, len: TextSize },
}

/// Full and incremental parsing with a shared set of options.
#[derive(Clone, Debug)]
pub struct IncrementalParser {
    options: ParseOptions,
    line_threshold: usize,
}

impl Default for IncrementalParser {
    fn default() -> Self {
        Self::new(ParseOptions::default(), DEFAULT_LINE_THRESHOLD)
    }
}

impl IncrementalParser {
    pub fn new(options: ParseOptions, line_threshold: usize) -> Self {
        Self {
            options,
            line_threshold,
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn line_threshold(&self) -> usize {
        self.line_threshold
    }

    /// Parse `text` from scratch
    pub fn parse(&self, text: &str) -> ParseResult {
        crate::parser::parse_document(text, &self.options)
    }

    /// Parse `new_text` reusing `previous`, the result for `old_text`.
    pub fn reparse(&self, old_text: &str, previous: &ParseResult, new_text: &str) -> ParseResult {
        let never = CancellationToken::new();
        self.reparse_cancellable(old_text, previous, new_text, &never)
            .unwrap_or_else(|| self.parse(new_text))
    }

    /// Like [`reparse`](Self::reparse), returning `None` once `cancel` fires.
    pub fn reparse_cancellable(
        &self,
        old_text: &str,
        previous: &ParseResult,
        new_text: &str,
        cancel: &CancellationToken,
    ) -> Option<ParseResult> {
        let Some(diff) = line_diff(old_text, new_text) else {
            let mut unchanged = previous.clone();
            unchanged.changed_lines = Some(BTreeSet::new());
            return Some(unchanged);
        };

        let started = Instant::now();
        let new_index = LineIndex::new(new_text);
        let changed = changed_lines(&diff, &new_index);

        if new_index.line_count() < self.line_threshold || previous.segments.is_empty() {
            return self.full(new_text, changed, cancel);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.splice(old_text, previous, new_text, &new_index, &diff, cancel)
        }));
        match outcome {
            Ok(Ok(Some(mut result))) => {
                tracing::trace!(
                    first_line = diff.first_line,
                    changed = changed.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "incremental reparse"
                );
                result.changed_lines = Some(changed);
                Some(result)
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "incremental reparse failed; falling back to full parse");
                self.full(new_text, changed, cancel)
            }
            Err(_) => {
                tracing::error!("incremental reparse panicked; falling back to full parse");
                self.full(new_text, changed, cancel)
            }
        }
    }

    fn full(
        &self,
        text: &str,
        changed: BTreeSet<u32>,
        cancel: &CancellationToken,
    ) -> Option<ParseResult> {
        let mut result = parse_document_cancellable(text, &self.options, cancel)?;
        result.changed_lines = Some(changed);
        Some(result)
    }

    /// Reparse the segments around the edit and splice them between the
    /// cached ones. `Ok(None)` means cancelled.
    fn splice(
        &self,
        old_text: &str,
        previous: &ParseResult,
        new_text: &str,
        new_index: &LineIndex,
        diff: &LineDiff,
        cancel: &CancellationToken,
    ) -> Result<Option<ParseResult>, IncrementalError> {
        let old_index = LineIndex::new(old_text);
        if old_index.line_count() != previous.line_count {
            return Err(IncrementalError::StaleBaseline {
                cached: previous.line_count,
                actual: old_index.line_count(),
            });
        }

        let segments = &previous.segments;
        let (_, old_last_line) = old_index.line_range(diff.old_range());
        let first = first_affected(segments, diff.first_line);
        let after = segments.partition_point(|s| s.start_line <= old_last_line);

        let window_start = if first == 0 {
            TextSize::new(0)
        } else {
            old_index
                .line_start(segments[first].start_line)
                .ok_or(IncrementalError::StaleBaseline {
                    cached: previous.line_count,
                    actual: old_index.line_count(),
                })?
        };

        let delta = diff.byte_delta();
        let mut attempts = 0;
        let mut offset = TextSize::new(0);
        while attempts <= MAX_WINDOW_RETRIES {
            let stop = next_statement(segments, after + grow(attempts));
            attempts += 1;

            // The window runs through the statement after `stop`, so lookahead
            // from the segment before the boundary never reaches its end.
            let (window_end, boundary) = match segments.get(stop) {
                Some(segment) => (
                    segments
                        .get(next_statement(segments, stop + 1))
                        .map_or(TextSize::of(new_text), |s| shift(s.range.end(), delta)),
                    Some(shift_range(segment.range, delta)),
                ),
                None => (TextSize::of(new_text), None),
            };
            let window = TextRange::new(window_start, window_end.max(window_start));
            if window.end() > TextSize::of(new_text) {
                return Err(IncrementalError::WindowOverflow {
                    window,
                    len: TextSize::of(new_text),
                });
            }

            let tokens = tokenize_at(&new_text[window], window_start);
            let Some(output) = parse_tokens(new_text, tokens, new_index, &self.options, Some(cancel))
            else {
                return Ok(None);
            };

            let cut = match boundary {
                None => output.segments.len(),
                Some(boundary) => {
                    match output.segments.iter().position(|s| s.range == boundary) {
                        Some(cut) => cut,
                        None => {
                            offset = boundary.start();
                            tracing::trace!(attempt = attempts, ?boundary, "no boundary in window");
                            continue;
                        }
                    }
                }
            };

            let parts = Splice {
                previous,
                first,
                stop,
                delta,
                line_delta: diff.line_delta,
            };
            return Ok(Some(parts.assemble(output, cut, new_index.line_count())));
        }

        Err(IncrementalError::NoBoundary { offset, attempts })
    }
}

/// Cached parts kept around a reparsed window.
struct Splice<'p> {
    previous: &'p ParseResult,
    /// First cached segment replaced by the window
    first: usize,
    /// First cached segment kept after the window
    stop: usize,
    delta: i64,
    line_delta: i64,
}

impl Splice<'_> {
    fn assemble(
        self,
        window: crate::parser::ParseOutput,
        cut: usize,
        line_count: usize,
    ) -> ParseResult {
        let previous = self.previous;
        let segments = &previous.segments;

        let (head_symbols, head_errors) = segments
            .get(self.first)
            .map_or((previous.symbols.len(), previous.parse_errors.len()), |s| {
                (s.symbols.start, s.errors.start)
            });
        let (window_symbols, window_errors) = window
            .segments
            .get(cut)
            .map_or((window.symbols.len(), window.errors.len()), |s| {
                (s.symbols.start, s.errors.start)
            });
        let (tail_symbols, tail_errors) = segments
            .get(self.stop)
            .map_or((previous.symbols.len(), previous.parse_errors.len()), |s| {
                (s.symbols.start, s.errors.start)
            });

        let mut symbols = Vec::with_capacity(
            head_symbols + window_symbols + previous.symbols.len() - tail_symbols,
        );
        symbols.extend_from_slice(&previous.symbols[..head_symbols]);
        symbols.extend(window.symbols.into_iter().take(window_symbols));
        let tail_symbol_start = symbols.len();
        symbols.extend(
            previous.symbols[tail_symbols..]
                .iter()
                .map(|s| s.shifted(self.delta, self.line_delta)),
        );

        let mut errors = Vec::with_capacity(head_errors + window_errors);
        errors.extend_from_slice(&previous.parse_errors[..head_errors]);
        errors.extend(window.errors.into_iter().take(window_errors));
        let tail_error_start = errors.len();
        errors.extend(
            previous.parse_errors[tail_errors..]
                .iter()
                .map(|e| e.shifted(self.delta)),
        );

        let mut spliced = Vec::with_capacity(segments.len());
        spliced.extend_from_slice(&segments[..self.first]);
        spliced.extend(
            window.segments[..cut]
                .iter()
                .map(|s| s.shifted(0, 0, head_symbols as i64, head_errors as i64)),
        );
        let symbol_delta = tail_symbol_start as i64 - tail_symbols as i64;
        let error_delta = tail_error_start as i64 - tail_errors as i64;
        spliced.extend(
            segments[self.stop.min(segments.len())..]
                .iter()
                .map(|s| s.shifted(self.delta, self.line_delta, symbol_delta, error_delta)),
        );

        ParseResult::assemble(symbols, errors, spliced, line_count)
    }
}

/// Segment where reparsing starts for a change at `line`.
///
/// A change can extend the statement before it, so the window starts at the
/// statement segment before the last one starting above the change.
fn first_affected(segments: &[Segment], line: u32) -> usize {
    let last_before = segments
        .partition_point(|s| s.start_line < line)
        .saturating_sub(1);
    let mut first = last_before.saturating_sub(1);
    while first > 0 && segments[first].statements == 0 {
        first -= 1;
    }
    first
}

/// First segment at or after `from` holding a statement
fn next_statement(segments: &[Segment], from: usize) -> usize {
    let mut index = from.min(segments.len());
    while index < segments.len() && segments[index].statements == 0 {
        index += 1;
    }
    index
}

/// Extra segments added to the window on each retry
fn grow(attempt: u32) -> usize {
    if attempt == 0 { 0 } else { 1 << attempt }
}

fn shift(offset: TextSize, delta: i64) -> TextSize {
    TextSize::new((i64::from(u32::from(offset)) + delta).max(0) as u32)
}

fn shift_range(range: TextRange, delta: i64) -> TextRange {
    TextRange::new(shift(range.start(), delta), shift(range.end(), delta))
}

/// Lines of the new text touched by the edit
fn changed_lines(diff: &LineDiff, new_index: &LineIndex) -> BTreeSet<u32> {
    let (start, end) = new_index.line_range(diff.new_range());
    (start..=end).collect()
}
