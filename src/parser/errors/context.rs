//! Parse context tracking for context-aware error messages
//!
//! The parser passes the innermost open construct down through its calls so
//! that error messages can say where in the calculation the fault occurred,
//! and so the recovery engine knows which tokens are safe to stop at.

use crate::parser::TokenKind;

/// Represents the construct currently being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseContext {
    /// Between top-level statements
    TopLevel,
    /// Inside the argument list of a function call
    FunctionArguments,
    /// Inside a parenthesized sub-expression or `IN (...)` list
    Grouping,
    /// Inside an IF/ELSEIF/ELSE block
    IfBlock,
    /// Inside a CASE/WHEN block
    CaseBlock,
    /// Parsing the dimension list of an LOD expression
    LodDimensions,
    /// Parsing the aggregate expression of an LOD expression
    LodBody,
}

impl ParseContext {
    /// Get a human-readable description of this context for error messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::TopLevel => "at top level",
            Self::FunctionArguments => "in function arguments",
            Self::Grouping => "in parenthesized expression",
            Self::IfBlock => "in IF block",
            Self::CaseBlock => "in CASE block",
            Self::LodDimensions => "in LOD dimensions",
            Self::LodBody => "in LOD expression",
        }
    }

    /// Get a description of what tokens are expected in this context
    pub fn expected_description(&self) -> &'static str {
        match self {
            Self::TopLevel => "an expression",
            Self::FunctionArguments => "',' or ')'",
            Self::Grouping => "')'",
            Self::IfBlock => "ELSEIF, ELSE or END",
            Self::CaseBlock => "WHEN, ELSE or END",
            Self::LodDimensions => "',' or ':'",
            Self::LodBody => "'}'",
        }
    }

    /// Tokens at which resynchronization stops in this context
    ///
    /// Blank lines and end of document are always stop points in addition to these.
    pub fn recovery_tokens(&self) -> &'static [TokenKind] {
        match self {
            Self::IfBlock | Self::CaseBlock | Self::TopLevel => &[
                TokenKind::END_KW,
                TokenKind::ELSE_KW,
                TokenKind::ELSEIF_KW,
                TokenKind::WHEN_KW,
            ],
            Self::LodDimensions | Self::LodBody => &[
                TokenKind::END_KW,
                TokenKind::ELSE_KW,
                TokenKind::ELSEIF_KW,
                TokenKind::WHEN_KW,
                TokenKind::R_BRACE,
            ],
            Self::FunctionArguments | Self::Grouping => &[
                TokenKind::END_KW,
                TokenKind::ELSE_KW,
                TokenKind::ELSEIF_KW,
                TokenKind::WHEN_KW,
                TokenKind::R_PAREN,
            ],
        }
    }

    /// Check if this context is inside an IF/CASE/LOD block
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::IfBlock | Self::CaseBlock | Self::LodDimensions | Self::LodBody
        )
    }
}
