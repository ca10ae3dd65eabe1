//! Error recovery: one bad statement must not hide the rest of the document.

use calcls::parser::ErrorCode;
use calcls::syntax::BlockKind;
use rstest::rstest;

use crate::helpers::result_assertions::{analyzed, codes, parse};

#[test]
fn test_unclosed_call_does_not_swallow_next_statement() {
    let result = parse("SUM([Sales]\n\nAVG([Profit])");
    let names: Vec<_> = result.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["SUM", "AVG"]);
    assert!(!result.symbols[0].is_complete);
    assert!(result.symbols[1].is_complete);
    assert!(result.is_partially_valid);
}

#[test]
fn test_missing_end_reported_at_keyword() {
    let source = "IF [Sales] > 0 THEN 1\n\nSUM([Sales])";
    let result = parse(source);
    let error = result
        .parse_errors
        .iter()
        .find(|e| e.code == ErrorCode::E0301)
        .expect("missing END");
    assert_eq!(&source[error.range], "IF");
    assert_eq!(error.recovery_action.as_deref(), Some("add END"));
    assert!(result.symbols.iter().any(|s| s.name == "SUM" && s.is_complete));
}

#[test]
fn test_error_in_one_branch_keeps_the_block() {
    let result = parse("IF [a] THEN SUM([b] ELSE 0 END");
    assert_eq!(result.symbols.len(), 1);
    let block = &result.symbols[0];
    assert_eq!(block.block_kind(), Some(BlockKind::If));
    assert!(codes_of(&result).contains(&ErrorCode::E0203));
}

#[test]
fn test_recovery_counts() {
    let result = parse("SUM([a]\n\nAVG([b])\n\nMAX([c]");
    assert!(result.recovery.total_errors >= 2);
    assert!(result.recovery.recovered_errors >= 1);
    assert!(result.recovery.recovered_errors <= result.recovery.total_errors);
}

#[test]
fn test_clean_document_has_no_recovery() {
    let result = parse("SUM([a])\n\nAVG([b])");
    assert_eq!(result.recovery.total_errors, 0);
    assert_eq!(result.recovery.recovered_errors, 0);
}

#[rstest]
#[case("SUM([Sales)", ErrorCode::E0104)]
#[case("SUM([Sales]", ErrorCode::E0203)]
#[case("IF [a] THEN 1", ErrorCode::E0301)]
#[case("IF [a] 1 END", ErrorCode::E0303)]
#[case("CASE [r] ELSE 1 END", ErrorCode::E0302)]
#[case("{FIXED [r] SUM([s])}", ErrorCode::E0304)]
#[case("{FIXED [r] : SUM([s])", ErrorCode::E0202)]
#[case("Sales + 1", ErrorCode::E0402)]
fn test_error_codes(#[case] source: &str, #[case] expected: ErrorCode) {
    let result = analyzed(source);
    assert!(
        codes(&result.diagnostics).contains(&expected),
        "{:?}: expected {:?} in {:?}",
        source,
        expected,
        codes(&result.diagnostics)
    );
}

#[test]
fn test_bare_identifier_suggests_brackets() {
    let result = parse("Sales + 1");
    let error = result
        .parse_errors
        .iter()
        .find(|e| e.code == ErrorCode::E0402)
        .expect("bare identifier");
    assert_eq!(error.recovery_action.as_deref(), Some("wrap in brackets: [Sales]"));
}

fn codes_of(result: &calcls::ParseResult) -> Vec<ErrorCode> {
    result.parse_errors.iter().map(|e| e.code).collect()
}
