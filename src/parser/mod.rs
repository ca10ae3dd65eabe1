//! Error-tolerant parser for calculation expressions
//!
//! ## Architecture
//!
//! ```text
//! Source Text
//!     ↓
//! Lexer (logos) → Tokens with TokenKind, trivia included
//!     ↓
//! Parser → Symbol tree + ParseErrors (never fails)
//!     ↓
//! Segments → line-disjoint groups of top-level statements
//!     ↓
//! ParseResult → handed to the semantic validator and the incremental parser
//! ```
//!
//! Errors are recovered locally: an unclosed call stops at the next line
//! that cannot continue it, a stray token inside a block is wrapped in an
//! error marker and the block carries on at the next clause keyword.

#[allow(clippy::module_inception)]
mod parser;

pub mod errors;
mod lexer;
mod recovery;
mod syntax_kind;

pub use errors::{ErrorCode, ParseContext, ParseError, ParseErrorBuilder, RelatedInfo, Severity};
pub use lexer::{Lexer, Token, tokenize, tokenize_at};
pub use parser::{DEFAULT_RECURSION_LIMIT, ParseOptions, parse_document, parse_document_cancellable};
pub use recovery::{RecoveryInfo, SegmentStats};
pub use syntax_kind::TokenKind;

pub(crate) use parser::{ParseOutput, parse_tokens};
