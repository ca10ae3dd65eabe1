//! End-to-end parse scenarios for common calculations.

use calcls::parser::{ErrorCode, Severity};
use calcls::syntax::{BlockKind, LodKind};
use calcls::SymbolKind;
use rstest::rstest;

use crate::helpers::result_assertions::{analyzed, assert_no_errors, codes, parse};
use crate::helpers::source_fixtures::{
    MULTI_STATEMENT, NESTED_AGGREGATE, SIMPLE_AGGREGATE, SIMPLE_IF, UNCLOSED_FIELD,
};

#[test]
fn test_simple_aggregate() {
    let result = analyzed(SIMPLE_AGGREGATE);
    assert_eq!(result.symbols.len(), 1);
    let call = &result.symbols[0];
    assert_eq!(call.name, "SUM");
    assert!(call.is_function_call());
    assert_eq!(call.children.len(), 1);
    assert!(call.children[0].is_field_reference());
    assert_eq!(call.children[0].name, "Sales");
    assert!(result.diagnostics.is_empty());
    assert!(result.is_partially_valid);
}

#[test]
fn test_unclosed_field_in_call() {
    let result = analyzed(UNCLOSED_FIELD);
    let call = &result.symbols[0];
    assert!(call.is_function_call());
    assert!(!call.is_complete);
    assert!(result.diagnostics.iter().any(|d| {
        let message = d.message.to_lowercase();
        message.contains("unclosed") || message.contains("bracket") || message.contains("parenthesis")
    }));
}

#[test]
fn test_if_else_block() {
    let result = analyzed(SIMPLE_IF);
    assert_eq!(result.symbols.len(), 1);
    let block = &result.symbols[0];
    assert_eq!(block.block_kind(), Some(BlockKind::If));
    assert!(block.is_complete);
    assert_no_errors(&result.diagnostics);
}

#[test]
fn test_nested_aggregate_warns_once() {
    let result = analyzed(NESTED_AGGREGATE);
    assert!(result.symbols[0].is_complete);
    let warnings: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, ErrorCode::E0601);
    assert!(warnings[0].message.to_lowercase().contains("aggregat"));
}

#[test]
fn test_empty_document() {
    let result = analyzed("");
    assert!(result.symbols.is_empty());
    assert!(result.diagnostics.is_empty());
    assert!(result.parse_errors.is_empty());
}

#[test]
fn test_lone_open_bracket() {
    let result = analyzed("[");
    assert_eq!(result.symbols.len(), 1);
    assert!(result.symbols[0].is_field_reference());
    assert!(!result.symbols[0].is_complete);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("unclosed bracket")));
}

#[test]
fn test_multi_statement_document() {
    let result = analyzed(MULTI_STATEMENT);
    assert_no_errors(&result.diagnostics);
    let blocks: Vec<_> = result.symbols.iter().filter_map(|s| s.block_kind()).collect();
    assert_eq!(blocks, vec![BlockKind::If, BlockKind::Case]);
    assert!(result.symbols.iter().any(|s| matches!(s.kind, SymbolKind::Comment)));

    let lod = result
        .symbols
        .iter()
        .find(|s| s.block_kind() == Some(BlockKind::If))
        .and_then(|s| s.children.iter().find(|c| c.block_kind().is_some()))
        .expect("LOD inside IF");
    assert_eq!(lod.block_kind(), Some(BlockKind::Lod(LodKind::Fixed)));
}

#[rstest]
#[case("sum([Sales])", "SUM")]
#[case("Sum([Sales])", "SUM")]
#[case("COUNTD([Customer])", "COUNTD")]
#[case("DATETRUNC('month', [Order Date])", "DATETRUNC")]
fn test_function_names_are_case_insensitive(#[case] source: &str, #[case] expected: &str) {
    let result = analyzed(source);
    assert!(result.symbols[0].is_function_call());
    assert!(result.symbols[0].name.eq_ignore_ascii_case(expected));
    assert!(
        !codes(&result.diagnostics).contains(&ErrorCode::E0502),
        "{} should be a known function",
        source
    );
}

#[rstest]
#[case("{FIXED [Region] : SUM([Sales])}", LodKind::Fixed)]
#[case("{INCLUDE [Customer] : AVG([Profit])}", LodKind::Include)]
#[case("{EXCLUDE [Segment] : MAX([Sales])}", LodKind::Exclude)]
fn test_lod_kinds(#[case] source: &str, #[case] expected: LodKind) {
    let result = parse(source);
    assert!(result.parse_errors.is_empty(), "{:?}", result.parse_errors);
    assert_eq!(result.symbols[0].block_kind(), Some(BlockKind::Lod(expected)));
    assert!(result.symbols[0].is_complete);
}
