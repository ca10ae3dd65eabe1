//! Syntax layer: the symbol tree and parse results handed to consumers.

mod parse_result;
mod symbol;

pub use parse_result::{ParseResult, Segment};
pub use symbol::{
    Argument, BlockKind, Branch, BranchKind, LiteralKind, LodKind, Symbol, SymbolKind,
};
