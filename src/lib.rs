//! # calcls-base
//!
//! Core library for analyzing Tableau-style calculation expressions: a
//! tolerant parser with error recovery, incremental reparsing, semantic
//! validation, and the caching and debouncing services an editor needs.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! host        → AnalysisHost, document cache, debouncer, diagnostics store
//!   ↓
//! incremental → Line diff and segment splicing
//!   ↓
//! semantic    → Signature table, validator, diagnostics
//!   ↓
//! syntax      → Symbol tree, ParseResult, segments
//!   ↓
//! parser      → Logos lexer, recursive-descent parser, error recovery
//!   ↓
//! base        → Primitives (LineIndex, DocumentUri, TextRange)
//! ```

// ============================================================================
// MODULES (dependency order: base → parser → syntax → semantic → incremental → host)
// ============================================================================

/// Foundation types: LineIndex, DocumentUri, TextRange
pub mod base;

/// Parser: Logos lexer, recursive-descent parser, error recovery
pub mod parser;

/// Syntax: symbol tree, ParseResult
pub mod syntax;

/// Semantic validation against a function signature table
pub mod semantic;

/// Incremental reparsing of edited documents
pub mod incremental;

/// Analysis services for editor integration
pub mod host;

// Re-export foundation types
pub use base::{DocumentUri, LineIndex, Position, Span, TextRange, TextSize};

pub use host::{AnalysisConfig, AnalysisError, AnalysisHost};
pub use incremental::IncrementalParser;
pub use parser::{ParseError, ParseOptions, parse_document};
pub use semantic::{Diagnostic, SignatureTable, ValidationOptions, analyze, validate};
pub use syntax::{ParseResult, Symbol, SymbolKind};
