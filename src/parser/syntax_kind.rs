//! Token kinds produced by the lexer
//!
//! This enum defines every token the calculation lexer can emit. Node kinds
//! live on [`crate::syntax::SymbolKind`]; the token layer only classifies text.

/// All token kinds in the calculation language
///
/// Trivia (whitespace and comments) is kept in the stream so that the
/// token sequence is lossless; the parser skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum TokenKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    WHITESPACE = 0,
    LINE_COMMENT,       // // ...
    BLOCK_COMMENT,      // /* ... */

    // =========================================================================
    // LITERALS
    // =========================================================================
    IDENT,              // bare word, usually a function name
    NUMBER,             // 42, 3.14, 1e6
    STRING,             // "text" or 'text'
    DATE,               // #2024-01-01#
    FIELD,              // [Field Name]

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    L_PAREN,            // (
    R_PAREN,            // )
    L_BRACE,            // {
    R_BRACE,            // }
    R_BRACKET,          // ] (stray)
    COMMA,              // ,
    COLON,              // :
    DOT,                // .

    // =========================================================================
    // OPERATORS
    // =========================================================================
    PLUS,               // +
    MINUS,              // -
    STAR,               // *
    SLASH,              // /
    PERCENT,            // %
    CARET,              // ^
    EQ,                 // =
    EQ_EQ,              // ==
    BANG_EQ,            // !=
    LT_GT,              // <>
    LT,                 // <
    GT,                 // >
    LT_EQ,              // <=
    GT_EQ,              // >=

    // =========================================================================
    // KEYWORDS (case-insensitive)
    // =========================================================================
    IF_KW,
    THEN_KW,
    ELSEIF_KW,
    ELSE_KW,
    END_KW,
    CASE_KW,
    WHEN_KW,
    FIXED_KW,
    INCLUDE_KW,
    EXCLUDE_KW,
    TRUE_KW,
    FALSE_KW,
    NULL_KW,

    // Logical words are operators, not identifiers
    AND_KW,
    OR_KW,
    NOT_KW,
    IN_KW,

    // =========================================================================
    // SPECIAL
    // =========================================================================
    ERROR,
}

impl TokenKind {
    /// Whitespace and comments
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::LINE_COMMENT | Self::BLOCK_COMMENT)
    }

    pub fn is_comment(self) -> bool {
        matches!(self, Self::LINE_COMMENT | Self::BLOCK_COMMENT)
    }

    /// Tokens that join two operands (`AND`, `OR` and `IN` included)
    pub fn is_binary_operator(self) -> bool {
        matches!(
            self,
            Self::PLUS
                | Self::MINUS
                | Self::STAR
                | Self::SLASH
                | Self::PERCENT
                | Self::CARET
                | Self::EQ
                | Self::EQ_EQ
                | Self::BANG_EQ
                | Self::LT_GT
                | Self::LT
                | Self::GT
                | Self::LT_EQ
                | Self::GT_EQ
                | Self::AND_KW
                | Self::OR_KW
                | Self::IN_KW
        )
    }

    /// Operators written as words
    pub fn is_logical_operator(self) -> bool {
        matches!(self, Self::AND_KW | Self::OR_KW | Self::NOT_KW | Self::IN_KW)
    }

    /// Any operator token, symbolic or word
    pub fn is_operator(self) -> bool {
        self.is_binary_operator() || self == Self::NOT_KW
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::IF_KW
                | Self::THEN_KW
                | Self::ELSEIF_KW
                | Self::ELSE_KW
                | Self::END_KW
                | Self::CASE_KW
                | Self::WHEN_KW
                | Self::FIXED_KW
                | Self::INCLUDE_KW
                | Self::EXCLUDE_KW
                | Self::TRUE_KW
                | Self::FALSE_KW
                | Self::NULL_KW
        ) || self.is_logical_operator()
    }

    /// Keywords that continue or close an open IF/CASE block
    pub fn is_block_continuation(self) -> bool {
        matches!(
            self,
            Self::END_KW | Self::ELSE_KW | Self::ELSEIF_KW | Self::WHEN_KW | Self::THEN_KW
        )
    }

    pub fn is_lod_keyword(self) -> bool {
        matches!(self, Self::FIXED_KW | Self::INCLUDE_KW | Self::EXCLUDE_KW)
    }

    pub fn is_closing_delimiter(self) -> bool {
        matches!(self, Self::R_PAREN | Self::R_BRACE | Self::R_BRACKET)
    }

    /// Tokens that can begin an expression
    pub fn starts_expression(self) -> bool {
        matches!(
            self,
            Self::IDENT
                | Self::NUMBER
                | Self::STRING
                | Self::DATE
                | Self::FIELD
                | Self::L_PAREN
                | Self::L_BRACE
                | Self::IF_KW
                | Self::CASE_KW
                | Self::TRUE_KW
                | Self::FALSE_KW
                | Self::NULL_KW
                | Self::NOT_KW
                | Self::MINUS
                | Self::PLUS
        )
    }

    /// Short human-readable name used in error messages
    pub fn display_name(self) -> &'static str {
        match self {
            Self::WHITESPACE => "whitespace",
            Self::LINE_COMMENT | Self::BLOCK_COMMENT => "comment",
            Self::IDENT => "identifier",
            Self::NUMBER => "number",
            Self::STRING => "string",
            Self::DATE => "date literal",
            Self::FIELD => "field reference",
            Self::L_PAREN => "'('",
            Self::R_PAREN => "')'",
            Self::L_BRACE => "'{'",
            Self::R_BRACE => "'}'",
            Self::R_BRACKET => "']'",
            Self::COMMA => "','",
            Self::COLON => "':'",
            Self::DOT => "'.'",
            Self::PLUS => "'+'",
            Self::MINUS => "'-'",
            Self::STAR => "'*'",
            Self::SLASH => "'/'",
            Self::PERCENT => "'%'",
            Self::CARET => "'^'",
            Self::EQ => "'='",
            Self::EQ_EQ => "'=='",
            Self::BANG_EQ => "'!='",
            Self::LT_GT => "'<>'",
            Self::LT => "'<'",
            Self::GT => "'>'",
            Self::LT_EQ => "'<='",
            Self::GT_EQ => "'>='",
            Self::IF_KW => "IF",
            Self::THEN_KW => "THEN",
            Self::ELSEIF_KW => "ELSEIF",
            Self::ELSE_KW => "ELSE",
            Self::END_KW => "END",
            Self::CASE_KW => "CASE",
            Self::WHEN_KW => "WHEN",
            Self::FIXED_KW => "FIXED",
            Self::INCLUDE_KW => "INCLUDE",
            Self::EXCLUDE_KW => "EXCLUDE",
            Self::TRUE_KW => "TRUE",
            Self::FALSE_KW => "FALSE",
            Self::NULL_KW => "NULL",
            Self::AND_KW => "AND",
            Self::OR_KW => "OR",
            Self::NOT_KW => "NOT",
            Self::IN_KW => "IN",
            Self::ERROR => "invalid character",
        }
    }
}
