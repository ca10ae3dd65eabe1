//! Error recovery bookkeeping.
//!
//! The parser reports every fault through a [`RecoveryEngine`]. Structural and
//! lexical faults are counted; a fault counts as recovered once a complete
//! symbol is finished after it, outside of an error-marker scan. Counts are
//! kept per top-level item so cached statements can be recombined after an
//! incremental splice.

use crate::parser::errors::ParseError;

/// Document-level recovery statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryInfo {
    pub total_errors: usize,
    pub recovered_errors: usize,
}

impl RecoveryInfo {
    /// Fold per-segment statistics in document order
    pub fn from_stats<'a>(stats: impl IntoIterator<Item = &'a SegmentStats>) -> Self {
        let folded = stats
            .into_iter()
            .fold(SegmentStats::default(), |acc, next| acc.then(next));
        Self {
            total_errors: folded.total as usize,
            recovered_errors: folded.recovered as usize,
        }
    }

    pub fn unrecovered(&self) -> usize {
        self.total_errors - self.recovered_errors
    }
}

/// Recovery statistics for one top-level item or segment.
///
/// `trailing_pending` counts faults not yet followed by a valid symbol; they
/// are resolved by the next segment that produces one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub total: u32,
    pub recovered: u32,
    pub trailing_pending: u32,
    pub produced_valid: bool,
}

impl SegmentStats {
    /// Statistics of `self` followed by `next`
    pub fn then(&self, next: &SegmentStats) -> SegmentStats {
        let carried = if next.produced_valid {
            self.trailing_pending
        } else {
            0
        };
        SegmentStats {
            total: self.total + next.total,
            recovered: self.recovered + next.recovered + carried,
            trailing_pending: if next.produced_valid {
                next.trailing_pending
            } else {
                self.trailing_pending + next.trailing_pending
            },
            produced_valid: self.produced_valid || next.produced_valid,
        }
    }
}

/// Collects faults for the item currently being parsed.
#[derive(Debug, Default)]
pub(crate) struct RecoveryEngine {
    errors: Vec<ParseError>,
    stats: SegmentStats,
    scan_depth: u32,
}

impl RecoveryEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a fault. Advisory codes are kept but not counted.
    pub(crate) fn fault(&mut self, error: ParseError) {
        if error.code.is_structural() {
            self.stats.total += 1;
            self.stats.trailing_pending += 1;
        }
        self.errors.push(error);
    }

    /// Structural faults recorded for the current item so far
    pub(crate) fn structural_faults(&self) -> u32 {
        self.stats.total
    }

    /// A complete symbol was finished
    pub(crate) fn note_valid(&mut self) {
        if self.scan_depth > 0 {
            return;
        }
        self.stats.recovered += self.stats.trailing_pending;
        self.stats.trailing_pending = 0;
        self.stats.produced_valid = true;
    }

    /// Symbols finished between `begin_scan` and `end_scan` belong to an
    /// error marker and never count as recovery.
    pub(crate) fn begin_scan(&mut self) {
        self.scan_depth += 1;
    }

    pub(crate) fn end_scan(&mut self) {
        self.scan_depth = self.scan_depth.saturating_sub(1);
    }

    pub(crate) fn in_scan(&self) -> bool {
        self.scan_depth > 0
    }

    /// Take the faults and statistics of the finished item
    pub(crate) fn take_item(&mut self) -> (Vec<ParseError>, SegmentStats) {
        self.scan_depth = 0;
        (
            std::mem::take(&mut self.errors),
            std::mem::take(&mut self.stats),
        )
    }
}
