//! Parse errors.
//!
//! A `ParseError` carries its code, a severity, the range it applies to, an
//! optional fix the editor can offer, and pointers to related locations such
//! as the keyword that opened an unterminated block.

use text_size::{TextRange, TextSize};

use super::codes::ErrorCode;
use super::context::ParseContext;

/// Severity level for parse errors and diagnostics
///
/// Ordered from most to least severe so that sorting puts errors first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// A hard error that leaves the calculation invalid
    #[default]
    Error,
    /// A warning that doesn't prevent parsing
    Warning,
    /// An informational note, e.g. a performance hint
    Info,
    /// An editor hint
    Hint,
}

impl Severity {
    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }

}

/// A secondary location, e.g. "IF opened here" for a block missing END.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    /// Description of this related location
    pub message: String,
    /// Source range
    pub range: TextRange,
}

impl RelatedInfo {
    /// Create a new related info
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }

    fn shifted(&self, delta: i64) -> Self {
        Self {
            message: self.message.clone(),
            range: shift_range(self.range, delta),
        }
    }
}

/// A fault found while parsing. Ranges are absolute document offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub range: TextRange,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Fix an editor can offer, e.g. "add END"
    pub recovery_action: Option<String>,
    pub related: Vec<RelatedInfo>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, range: TextRange, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            range,
            code,
            severity: Severity::Error,
            recovery_action: None,
            related: vec![],
        }
    }

    /// Create a builder for more complex error construction
    pub fn builder(code: ErrorCode) -> ParseErrorBuilder {
        ParseErrorBuilder::new(code)
    }

    pub fn has_recovery_action(&self) -> bool {
        self.recovery_action.is_some()
    }

    /// `E0203: unclosed parenthesis` plus the hint on a second line
    pub fn format(&self) -> String {
        let mut result = format!("{}: {}", self.code, self.message);
        if let Some(action) = &self.recovery_action {
            result.push_str(&format!("\n  hint: {}", action));
        }
        result
    }

    /// Copy of this error moved by `delta` bytes
    pub(crate) fn shifted(&self, delta: i64) -> Self {
        Self {
            message: self.message.clone(),
            range: shift_range(self.range, delta),
            code: self.code,
            severity: self.severity,
            recovery_action: self.recovery_action.clone(),
            related: self.related.iter().map(|r| r.shifted(delta)).collect(),
        }
    }
}

/// Builder for creating complex parse errors
pub struct ParseErrorBuilder {
    code: ErrorCode,
    message: Option<String>,
    range: Option<TextRange>,
    severity: Severity,
    recovery_action: Option<String>,
    related: Vec<RelatedInfo>,
}

impl ParseErrorBuilder {
    /// Create a new builder with an error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            range: None,
            severity: Severity::Error,
            recovery_action: None,
            related: vec![],
        }
    }

    /// Set the error message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the source range
    pub fn range(mut self, range: TextRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the offset (creates an empty range at that position)
    pub fn at_offset(mut self, offset: TextSize) -> Self {
        self.range = Some(TextRange::empty(offset));
        self
    }

    /// Set the severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Add a recovery action
    pub fn recovery_action(mut self, action: impl Into<String>) -> Self {
        self.recovery_action = Some(action.into());
        self
    }

    /// Add related information
    pub fn related(mut self, message: impl Into<String>, range: TextRange) -> Self {
        self.related.push(RelatedInfo::new(message, range));
        self
    }

    /// Build the parse error, falling back to the code's default message
    pub fn build(self) -> ParseError {
        ParseError {
            message: self
                .message
                .unwrap_or_else(|| self.code.default_message().to_string()),
            range: self
                .range
                .unwrap_or_else(|| TextRange::empty(TextSize::new(0))),
            code: self.code,
            severity: self.severity,
            recovery_action: self.recovery_action,
            related: self.related,
        }
    }
}

/// Helper function to create a context-aware error message
pub fn format_context_error(found: &str, context: ParseContext, code: ErrorCode) -> ParseErrorBuilder {
    let message = format!(
        "unexpected {} {}, expected {}",
        found,
        context.description(),
        context.expected_description()
    );

    ParseError::builder(code).message(message)
}

/// Move a range by a signed byte delta
pub(crate) fn shift_range(range: TextRange, delta: i64) -> TextRange {
    let shift = |offset: TextSize| -> TextSize {
        let moved = i64::from(u32::from(offset)) + delta;
        TextSize::new(moved.max(0) as u32)
    };
    TextRange::new(shift(range.start()), shift(range.end()))
}
