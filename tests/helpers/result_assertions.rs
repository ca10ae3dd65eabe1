//! Assertion helpers for parse results.

use calcls::parser::{ErrorCode, Severity};
use calcls::{Diagnostic, ParseOptions, ParseResult, ValidationOptions, analyze, parse_document};

pub fn parse(text: &str) -> ParseResult {
    parse_document(text, &ParseOptions::default())
}

/// Parse and validate with default settings
pub fn analyzed(text: &str) -> ParseResult {
    analyze(text, &ParseOptions::default(), ValidationOptions::default())
}

pub fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect()
}

pub fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
    diagnostics.iter().map(|d| d.code).collect()
}

/// Assert tree containment, ordering and recovery bounds.
pub fn assert_well_formed(result: &ParseResult, source: &str) {
    if let Err(problem) = result.check_invariants() {
        panic!("invariant violated for {:?}: {}", source, problem);
    }
    for symbol in &result.symbols {
        assert!(
            u32::from(symbol.range.end()) as usize <= source.len(),
            "symbol '{}' ends past the document for {:?}",
            symbol.name,
            source
        );
    }
}

/// Every incomplete symbol must have a parse error inside its range.
pub fn assert_incomplete_symbols_explained(result: &ParseResult) {
    result.walk(|symbol| {
        if !symbol.is_complete {
            assert!(
                result
                    .parse_errors
                    .iter()
                    .any(|e| symbol.range.contains_range(e.range)),
                "incomplete symbol '{}' at {:?} has no parse error in range",
                symbol.name,
                symbol.range
            );
        }
    });
}

pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors = errors(diagnostics);
    assert!(
        errors.is_empty(),
        "Expected no errors, got {} error(s):\n{}",
        errors.len(),
        errors
            .iter()
            .map(|e| format!("  {:?} {}: {}", e.range, e.code, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    );
}
