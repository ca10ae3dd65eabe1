//! Error code definitions for parser and validator diagnostics
//!
//! Error codes follow a naming convention: E{category}{number}
//! - E01xx: Lexical errors (unterminated tokens, invalid characters)
//! - E02xx: Delimiter errors (parentheses, braces, stray tokens)
//! - E03xx: Block errors (IF/CASE/LOD structure)
//! - E04xx: Expression errors
//! - E05xx: Function signature errors
//! - E06xx: Semantic advisories (aggregation, nesting, performance)
//! - E09xx: Generic/fallback errors

use std::fmt;

/// Error codes for parser and validator diagnostics
///
/// Each error code represents a specific category of fault,
/// enabling filtering, de-duplication, and IDE integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // E01xx: Lexical errors
    // =========================================================================
    /// Invalid or unexpected character in source
    E0101,
    /// Unterminated string literal
    E0102,
    /// Unterminated block comment
    E0103,
    /// Unclosed field bracket `[`
    E0104,
    /// Unterminated date literal `#`
    E0105,

    // =========================================================================
    // E02xx: Delimiter errors
    // =========================================================================
    /// Unexpected token at this position
    E0201,
    /// Unclosed brace `{`
    E0202,
    /// Unclosed parenthesis `(`
    E0203,
    /// Unexpected closing delimiter
    E0205,

    // =========================================================================
    // E03xx: Block errors
    // =========================================================================
    /// Block is missing `END`
    E0301,
    /// `CASE` without `WHEN`
    E0302,
    /// Missing `THEN`
    E0303,
    /// LOD expression missing `:`
    E0304,
    /// Unexpected token inside a block
    E0305,

    // =========================================================================
    // E04xx: Expression errors
    // =========================================================================
    /// Missing expression where expected
    E0401,
    /// Bare identifier used as a value
    E0402,
    /// Expression nested too deeply
    E0403,

    // =========================================================================
    // E05xx: Function signature errors
    // =========================================================================
    /// Wrong number of arguments
    E0501,
    /// Unknown function name
    E0502,

    // =========================================================================
    // E06xx: Semantic advisories
    // =========================================================================
    /// Aggregate nested inside an aggregate without an LOD scope
    E0601,
    /// Block nesting deeper than configured maximum
    E0602,
    /// Table calculation without explicit partitioning
    E0603,
    /// `FIXED` LOD without dimensions
    E0604,
    /// LOD expression nested inside another LOD
    E0605,

    // =========================================================================
    // E09xx: Generic/fallback errors
    // =========================================================================
    /// Internal parser error
    E0999,
}

impl ErrorCode {
    /// Get the string representation of the error code (e.g., "E0203")
    pub fn as_str(&self) -> &'static str {
        match self {
            // Lexical
            Self::E0101 => "E0101",
            Self::E0102 => "E0102",
            Self::E0103 => "E0103",
            Self::E0104 => "E0104",
            Self::E0105 => "E0105",
            // Delimiters
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0203 => "E0203",
            Self::E0205 => "E0205",
            // Blocks
            Self::E0301 => "E0301",
            Self::E0302 => "E0302",
            Self::E0303 => "E0303",
            Self::E0304 => "E0304",
            Self::E0305 => "E0305",
            // Expressions
            Self::E0401 => "E0401",
            Self::E0402 => "E0402",
            Self::E0403 => "E0403",
            // Signatures
            Self::E0501 => "E0501",
            Self::E0502 => "E0502",
            // Semantic
            Self::E0601 => "E0601",
            Self::E0602 => "E0602",
            Self::E0603 => "E0603",
            Self::E0604 => "E0604",
            Self::E0605 => "E0605",
            // Generic
            Self::E0999 => "E0999",
        }
    }

    /// Get a short description of the error category
    pub fn category_description(&self) -> &'static str {
        match self {
            Self::E0101 | Self::E0102 | Self::E0103 | Self::E0104 | Self::E0105 => "lexical error",
            Self::E0201 | Self::E0202 | Self::E0203 | Self::E0205 => "delimiter error",
            Self::E0301 | Self::E0302 | Self::E0303 | Self::E0304 | Self::E0305 => "block error",
            Self::E0401 | Self::E0402 | Self::E0403 => "expression error",
            Self::E0501 | Self::E0502 => "signature error",
            Self::E0601 | Self::E0602 | Self::E0603 | Self::E0604 | Self::E0605 => "semantic advisory",
            Self::E0999 => "internal error",
        }
    }

    /// Get the default message for this error code
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::E0101 => "invalid character",
            Self::E0102 => "unterminated string literal",
            Self::E0103 => "unterminated block comment",
            Self::E0104 => "unclosed bracket in field reference",
            Self::E0105 => "unterminated date literal",
            Self::E0201 => "unexpected token",
            Self::E0202 => "unclosed brace",
            Self::E0203 => "unclosed parenthesis",
            Self::E0205 => "unexpected closing delimiter",
            Self::E0301 => "block is missing END",
            Self::E0302 => "CASE without WHEN",
            Self::E0303 => "missing THEN",
            Self::E0304 => "LOD expression is missing ':'",
            Self::E0305 => "unexpected token in block",
            Self::E0401 => "expected expression",
            Self::E0402 => "field names must be enclosed in brackets",
            Self::E0403 => "expression nested too deeply",
            Self::E0501 => "wrong number of arguments",
            Self::E0502 => "unknown function",
            Self::E0601 => "aggregate nested inside another aggregate",
            Self::E0602 => "nesting depth exceeds maximum",
            Self::E0603 => "table calculation depends on view partitioning",
            Self::E0604 => "FIXED expression without dimensions",
            Self::E0605 => "LOD expression nested inside another LOD expression",
            Self::E0999 => "internal parser error",
        }
    }

    /// Whether faults with this code count towards recovery statistics
    ///
    /// Signature and semantic codes are advisory and never counted.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::E0501
                | Self::E0502
                | Self::E0601
                | Self::E0602
                | Self::E0603
                | Self::E0604
                | Self::E0605
                | Self::E0999
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
