//! Semantic validation over a finished symbol tree.
//!
//! The validator never changes the tree. It re-reads the parse errors, walks
//! every root and adds structural, signature and heuristic findings.
//! Error-marker subtrees are skipped: their contents are guesses.

use std::panic::{self, AssertUnwindSafe};

use text_size::{TextRange, TextSize};

use super::diagnostics::{Diagnostic, DiagnosticCollector};
use super::signatures::SignatureTable;
use crate::parser::{ParseOptions, parse_document};
use crate::syntax::{BlockKind, BranchKind, LodKind, ParseResult, Symbol, SymbolKind};

/// Default limit for nested IF/CASE blocks.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 3;

/// Options for a validation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Deepest allowed IF/CASE nesting before a warning
    pub max_nesting_depth: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

/// What the walk knows about the ancestors of the current symbol.
#[derive(Clone, Copy, Debug, Default)]
struct Scope<'s> {
    block_depth: usize,
    /// Opening brace of the innermost enclosing LOD
    lod: Option<TextRange>,
    /// Nearest aggregate call with no LOD in between
    aggregate: Option<&'s Symbol>,
    /// An ancestor already reported excessive nesting
    depth_reported: bool,
}

/// Walks a parse result and collects diagnostics.
pub struct Validator<'a> {
    signatures: &'a SignatureTable,
    options: ValidationOptions,
    collector: DiagnosticCollector,
}

impl<'a> Validator<'a> {
    pub fn new(signatures: &'a SignatureTable, options: ValidationOptions) -> Self {
        Self {
            signatures,
            options,
            collector: DiagnosticCollector::new(),
        }
    }

    /// Check every root of `result`, including its parse errors.
    pub fn check(&mut self, result: &ParseResult) {
        self.collector.extend_from_parse_errors(&result.parse_errors);
        for symbol in &result.symbols {
            self.visit(symbol, Scope::default());
        }
    }

    fn visit<'s>(&mut self, symbol: &'s Symbol, scope: Scope<'s>) {
        let mut inner = scope;
        match &symbol.kind {
            SymbolKind::ErrorMarker => return,
            SymbolKind::Block {
                block,
                branches,
                terminator,
            } => {
                if terminator.is_none() {
                    self.collector.unterminated_block(
                        block.display_name(),
                        opening_range(symbol, *block),
                        block.closer(),
                    );
                }
                match block {
                    BlockKind::If | BlockKind::Case => {
                        inner.block_depth += 1;
                        if inner.block_depth > self.options.max_nesting_depth && !inner.depth_reported {
                            let depth = scope.block_depth + nesting_depth(symbol);
                            self.collector.nesting_too_deep(
                                opening_range(symbol, *block),
                                depth,
                                self.options.max_nesting_depth,
                            );
                            inner.depth_reported = true;
                        }
                    }
                    BlockKind::Lod(kind) => {
                        if let Some(outer) = scope.lod {
                            self.collector.nested_lod(opening_range(symbol, *block), outer);
                        }
                        if *kind == LodKind::Fixed
                            && !branches.iter().any(|b| b.kind == BranchKind::Dimensions)
                        {
                            self.collector.fixed_without_dimensions(symbol.range);
                        }
                        inner.lod = Some(opening_range(symbol, *block));
                        inner.aggregate = None;
                    }
                }
            }
            SymbolKind::FunctionCall {
                arguments,
                nested_in_aggregate,
            } => {
                let range = name_range(symbol);
                match self.signatures.get(&symbol.name) {
                    None => self.collector.unknown_function(&symbol.name, range),
                    Some(signature) => {
                        if symbol.is_complete && !signature.accepts(arguments.len()) {
                            self.collector.arity_mismatch(
                                &symbol.name,
                                range,
                                &signature.expected_description(),
                                arguments.len(),
                            );
                        }
                        if signature.is_table_calculation() {
                            self.collector.table_calculation(&symbol.name, range);
                        }
                        if signature.is_aggregate() {
                            if *nested_in_aggregate || scope.aggregate.is_some() {
                                let outer = scope.aggregate.map(|s| (s.name.as_str(), name_range(s)));
                                self.collector.nested_aggregate(&symbol.name, outer, range);
                            }
                            inner.aggregate = Some(symbol);
                        }
                    }
                }
            }
            _ => {}
        }

        for child in &symbol.children {
            self.visit(child, inner);
        }
    }

    /// Sorted, de-duplicated diagnostics
    pub fn finish(self) -> Vec<Diagnostic> {
        self.collector.finish()
    }
}

/// Range of the keyword or brace that opens a block
fn opening_range(symbol: &Symbol, block: BlockKind) -> TextRange {
    let len = match block {
        BlockKind::If => 2,
        BlockKind::Case => 4,
        BlockKind::Lod(_) => 1,
    };
    TextRange::at(symbol.range.start(), TextSize::new(len))
        .intersect(symbol.range)
        .unwrap_or(symbol.range)
}

fn name_range(symbol: &Symbol) -> TextRange {
    TextRange::at(symbol.range.start(), TextSize::of(symbol.name.as_str()))
        .intersect(symbol.range)
        .unwrap_or(symbol.range)
}

/// IF/CASE levels in `symbol`'s subtree, counting `symbol` itself
fn nesting_depth(symbol: &Symbol) -> usize {
    let own = usize::from(matches!(
        symbol.block_kind(),
        Some(BlockKind::If | BlockKind::Case)
    ));
    let below = symbol
        .children
        .iter()
        .filter(|c| !c.is_error_marker())
        .map(nesting_depth)
        .max()
        .unwrap_or(0);
    own + below
}

/// Validate `result`, returning every diagnostic for it.
///
/// A panic inside a check is logged and the syntax diagnostics are
/// returned alone.
pub fn validate(
    result: &ParseResult,
    signatures: &SignatureTable,
    options: ValidationOptions,
) -> Vec<Diagnostic> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut validator = Validator::new(signatures, options);
        validator.check(result);
        validator.finish()
    }));
    outcome.unwrap_or_else(|_| {
        tracing::error!("validator panicked; publishing syntax diagnostics only");
        let mut collector = DiagnosticCollector::new();
        collector.extend_from_parse_errors(&result.parse_errors);
        collector.finish()
    })
}

/// Parse and validate `text` in one step.
pub fn analyze(text: &str, parse: &ParseOptions, options: ValidationOptions) -> ParseResult {
    let mut result = parse_document(text, parse);
    result.diagnostics = validate(&result, &parse.signatures, options);
    result
}
