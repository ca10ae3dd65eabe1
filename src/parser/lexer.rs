//! Logos-based lexer for calculation expressions
//!
//! Fast tokenization using the logos crate. The lexer never fails: unknown
//! characters become [`TokenKind::ERROR`] tokens and unterminated strings,
//! comments, dates and field brackets are emitted with `incomplete = true`.

use super::syntax_kind::TokenKind;
use logos::Logos;
use text_size::{TextRange, TextSize};

/// A token with its kind, text, and position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub range: TextRange,
    /// Set for unterminated strings, comments, dates and fields
    pub incomplete: bool,
}

impl Token<'_> {
    pub fn offset(&self) -> TextSize {
        self.range.start()
    }
}

/// Lexer wrapping the logos-generated tokenizer
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
    base: TextSize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_base(input, TextSize::new(0))
    }

    /// Lex `input` as if it started at `base` in a larger document
    pub fn with_base(input: &'a str, base: TextSize) -> Self {
        Self {
            inner: LogosToken::lexer(input),
            base,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let logos_token = self.inner.next()?;
        let text = self.inner.slice();
        let span = self.inner.span();
        let range = TextRange::new(
            self.base + TextSize::new(span.start as u32),
            self.base + TextSize::new(span.end as u32),
        );

        let (kind, incomplete) = match logos_token {
            Ok(t) => t.classify(),
            Err(()) => (TokenKind::ERROR, false),
        };

        Some(Token {
            kind,
            text,
            range,
            incomplete,
        })
    }
}

/// Tokenize an entire string into a Vec
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

/// Tokenize a window of a document, producing absolute offsets
pub fn tokenize_at(input: &str, base: TextSize) -> Vec<Token<'_>> {
    Lexer::with_base(input, base).collect()
}

// =============================================================================
// CALLBACKS
// =============================================================================

/// Quoted string; a doubled quote is an escaped quote. Stops at end of line.
fn lex_quoted(lex: &mut logos::Lexer<LogosToken>, quote: u8) -> Option<bool> {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' | b'\r' => break,
            b if b == quote => {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                    continue;
                }
                lex.bump(i + 1);
                return Some(true);
            }
            _ => i += 1,
        }
    }
    lex.bump(i);
    Some(false)
}

/// Field reference `[...]`; `]]` is an escaped bracket. Stops at end of line.
fn lex_field(lex: &mut logos::Lexer<LogosToken>) -> Option<bool> {
    lex_quoted(lex, b']')
}

/// Date literal `#...#`. Stops at end of line.
fn lex_date(lex: &mut logos::Lexer<LogosToken>) -> Option<bool> {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' | b'\r' => break,
            b'#' => {
                lex.bump(i + 1);
                return Some(true);
            }
            _ => i += 1,
        }
    }
    lex.bump(i);
    Some(false)
}

/// Block comment; an unterminated one runs to the end of the document.
fn lex_block_comment(lex: &mut logos::Lexer<LogosToken>) -> Option<bool> {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(idx) => {
            lex.bump(idx + 2);
            Some(true)
        }
        None => {
            lex.bump(rest.len());
            Some(false)
        }
    }
}

/// Logos token enum - maps to TokenKind
///
/// Variants carrying a `bool` record whether the construct was terminated.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum LogosToken {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    #[regex(r"//[^\n]*", allow_greedy = true)]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment(bool),

    // =========================================================================
    // LITERALS
    // =========================================================================
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    Number,

    #[token("\"", |lex| lex_quoted(lex, b'"'))]
    DoubleString(bool),

    #[token("'", |lex| lex_quoted(lex, b'\''))]
    SingleString(bool),

    #[token("#", lex_date)]
    Date(bool),

    #[token("[", lex_field)]
    Field(bool),

    // =========================================================================
    // MULTI-CHARACTER OPERATORS (must come before single-char)
    // =========================================================================
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<>")]
    LtGt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,

    // =========================================================================
    // SINGLE-CHARACTER PUNCTUATION
    // =========================================================================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // =========================================================================
    // KEYWORDS (case-insensitive)
    // =========================================================================
    #[token("if", ignore(case))]
    IfKw,
    #[token("then", ignore(case))]
    ThenKw,
    #[token("elseif", ignore(case))]
    ElseIfKw,
    #[token("else", ignore(case))]
    ElseKw,
    #[token("end", ignore(case))]
    EndKw,
    #[token("case", ignore(case))]
    CaseKw,
    #[token("when", ignore(case))]
    WhenKw,
    #[token("fixed", ignore(case))]
    FixedKw,
    #[token("include", ignore(case))]
    IncludeKw,
    #[token("exclude", ignore(case))]
    ExcludeKw,
    #[token("true", ignore(case))]
    TrueKw,
    #[token("false", ignore(case))]
    FalseKw,
    #[token("null", ignore(case))]
    NullKw,
    #[token("and", ignore(case))]
    AndKw,
    #[token("or", ignore(case))]
    OrKw,
    #[token("not", ignore(case))]
    NotKw,
    #[token("in", ignore(case))]
    InKw,
}

impl LogosToken {
    /// Token kind plus the `incomplete` flag
    fn classify(self) -> (TokenKind, bool) {
        let kind = match self {
            Self::Whitespace => TokenKind::WHITESPACE,
            Self::LineComment => TokenKind::LINE_COMMENT,
            Self::BlockComment(terminated) => return (TokenKind::BLOCK_COMMENT, !terminated),
            Self::Ident => TokenKind::IDENT,
            Self::Number => TokenKind::NUMBER,
            Self::DoubleString(terminated) | Self::SingleString(terminated) => {
                return (TokenKind::STRING, !terminated);
            }
            Self::Date(terminated) => return (TokenKind::DATE, !terminated),
            Self::Field(terminated) => return (TokenKind::FIELD, !terminated),
            Self::EqEq => TokenKind::EQ_EQ,
            Self::BangEq => TokenKind::BANG_EQ,
            Self::LtGt => TokenKind::LT_GT,
            Self::LtEq => TokenKind::LT_EQ,
            Self::GtEq => TokenKind::GT_EQ,
            Self::AmpAmp => TokenKind::AND_KW,
            Self::PipePipe => TokenKind::OR_KW,
            Self::LParen => TokenKind::L_PAREN,
            Self::RParen => TokenKind::R_PAREN,
            Self::LBrace => TokenKind::L_BRACE,
            Self::RBrace => TokenKind::R_BRACE,
            Self::RBracket => TokenKind::R_BRACKET,
            Self::Comma => TokenKind::COMMA,
            Self::Colon => TokenKind::COLON,
            Self::Dot => TokenKind::DOT,
            Self::Plus => TokenKind::PLUS,
            Self::Minus => TokenKind::MINUS,
            Self::Star => TokenKind::STAR,
            Self::Slash => TokenKind::SLASH,
            Self::Percent => TokenKind::PERCENT,
            Self::Caret => TokenKind::CARET,
            Self::Eq => TokenKind::EQ,
            Self::Lt => TokenKind::LT,
            Self::Gt => TokenKind::GT,
            Self::IfKw => TokenKind::IF_KW,
            Self::ThenKw => TokenKind::THEN_KW,
            Self::ElseIfKw => TokenKind::ELSEIF_KW,
            Self::ElseKw => TokenKind::ELSE_KW,
            Self::EndKw => TokenKind::END_KW,
            Self::CaseKw => TokenKind::CASE_KW,
            Self::WhenKw => TokenKind::WHEN_KW,
            Self::FixedKw => TokenKind::FIXED_KW,
            Self::IncludeKw => TokenKind::INCLUDE_KW,
            Self::ExcludeKw => TokenKind::EXCLUDE_KW,
            Self::TrueKw => TokenKind::TRUE_KW,
            Self::FalseKw => TokenKind::FALSE_KW,
            Self::NullKw => TokenKind::NULL_KW,
            Self::AndKw => TokenKind::AND_KW,
            Self::OrKw => TokenKind::OR_KW,
            Self::NotKw => TokenKind::NOT_KW,
            Self::InKw => TokenKind::IN_KW,
        };
        (kind, false)
    }
}
