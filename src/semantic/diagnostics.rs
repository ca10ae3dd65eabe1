//! Diagnostics: user-facing faults and advisories.
//!
//! Parse errors are converted into diagnostics and joined by the semantic
//! validator's findings. The collector sorts by severity then position and
//! collapses duplicates reported for the same range and code.

use std::sync::Arc;

use text_size::TextRange;

use crate::parser::errors::{ErrorCode, ParseError, RelatedInfo, Severity};

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Source range.
    pub range: TextRange,
    /// The diagnostic message.
    pub message: Arc<str>,
    /// Severity level.
    pub severity: Severity,
    /// Categorized code (e.g., E0203).
    pub code: ErrorCode,
    /// Suggested fix carried over from the parser.
    pub recovery_action: Option<Arc<str>>,
    /// Optional related information.
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    pub fn new(
        code: ErrorCode,
        severity: Severity,
        range: TextRange,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            range,
            message: message.into(),
            severity,
            code,
            recovery_action: None,
            related: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(code: ErrorCode, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(code, Severity::Error, range, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: ErrorCode, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(code, Severity::Warning, range, message)
    }

    /// Create a new informational diagnostic.
    pub fn info(code: ErrorCode, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(code, Severity::Info, range, message)
    }

    /// Add related information.
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(error: &ParseError) -> Self {
        Self {
            range: error.range,
            message: Arc::from(error.message.as_str()),
            severity: error.severity,
            code: error.code,
            recovery_action: error.recovery_action.as_deref().map(Arc::from),
            related: error.related.clone(),
        }
    }
}

// Shared with the parser so both layers report identical text and collapse.
pub(crate) fn arity_message(name: &str, expected: &str, actual: usize) -> String {
    format!(
        "{} expects {} argument{}, found {}",
        name,
        expected,
        if expected == "1" { "" } else { "s" },
        actual
    )
}

pub(crate) fn unknown_function_message(name: &str) -> String {
    format!("unknown function '{}'", name)
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics during validation.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add the diagnostic form of every parse error.
    pub fn extend_from_parse_errors(&mut self, errors: &[ParseError]) {
        self.diagnostics.extend(errors.iter().map(Diagnostic::from));
    }

    /// Block whose closing keyword or brace never appeared.
    pub fn unterminated_block(&mut self, keyword: &str, keyword_range: TextRange, closer: &str) {
        let code = if closer == "END" {
            ErrorCode::E0301
        } else {
            ErrorCode::E0202
        };
        self.add(Diagnostic::error(
            code,
            keyword_range,
            format!("{} is missing its closing {}", keyword, closer),
        ));
    }

    /// Wrong number of arguments.
    pub fn arity_mismatch(&mut self, name: &str, range: TextRange, expected: &str, actual: usize) {
        self.add(Diagnostic::error(
            ErrorCode::E0501,
            range,
            arity_message(name, expected, actual),
        ));
    }

    /// Call to a function missing from the signature table.
    pub fn unknown_function(&mut self, name: &str, range: TextRange) {
        self.add(Diagnostic::warning(
            ErrorCode::E0502,
            range,
            unknown_function_message(name),
        ));
    }

    /// Aggregate nested in an aggregate with no LOD scope between them.
    pub fn nested_aggregate(&mut self, inner: &str, outer: Option<(&str, TextRange)>, range: TextRange) {
        let message = match outer {
            Some((outer, _)) => format!(
                "aggregate {} is nested inside aggregate {}; use an LOD expression to aggregate at a different level",
                inner, outer
            ),
            None => format!(
                "aggregate {} is nested inside another aggregate; use an LOD expression to aggregate at a different level",
                inner
            ),
        };
        let mut diagnostic = Diagnostic::warning(ErrorCode::E0601, range, message);
        if let Some((outer, outer_range)) = outer {
            diagnostic = diagnostic.with_related(RelatedInfo::new(
                format!("outer aggregate {}", outer),
                outer_range,
            ));
        }
        self.add(diagnostic);
    }

    /// Blocks nested beyond the configured maximum.
    pub fn nesting_too_deep(&mut self, range: TextRange, depth: usize, max: usize) {
        self.add(Diagnostic::warning(
            ErrorCode::E0602,
            range,
            format!("block nesting depth {} exceeds maximum of {}", depth, max),
        ));
    }

    /// Table calculation whose result depends on the view layout.
    pub fn table_calculation(&mut self, name: &str, range: TextRange) {
        self.add(Diagnostic::info(
            ErrorCode::E0603,
            range,
            format!(
                "{} is a table calculation; its result depends on how the view is partitioned",
                name
            ),
        ));
    }

    /// `{FIXED : ...}` with no dimensions aggregates over the whole table.
    pub fn fixed_without_dimensions(&mut self, range: TextRange) {
        self.add(Diagnostic::info(
            ErrorCode::E0604,
            range,
            "FIXED expression has no dimensions and aggregates over the entire data source",
        ));
    }

    /// LOD expression inside another LOD expression.
    pub fn nested_lod(&mut self, range: TextRange, outer: TextRange) {
        self.add(
            Diagnostic::warning(
                ErrorCode::E0605,
                range,
                "LOD expression nested inside another LOD expression may be expensive to compute",
            )
            .with_related(RelatedInfo::new("enclosing LOD expression", outer)),
        );
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Sort by severity then start offset and drop repeated (range, code) pairs.
    ///
    /// The first diagnostic for a pair wins; parser-reported ones are added
    /// before the validator's, so they keep their recovery hints.
    pub fn finish(self) -> Vec<Diagnostic> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut unique: Vec<Diagnostic> = self
            .diagnostics
            .into_iter()
            .filter(|d| seen.insert((d.range, d.code)))
            .collect();
        unique.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then(a.range.start().cmp(&b.range.start()))
                .then(a.range.end().cmp(&b.range.end()))
                .then(a.code.cmp(&b.code))
        });
        unique
    }
}
