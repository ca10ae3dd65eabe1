//! Semantic validation against signature tables and options.

use std::sync::Arc;

use calcls::parser::{ErrorCode, Severity};
use calcls::semantic::{FunctionCategory, FunctionSignature, SignatureTable};
use calcls::{ParseOptions, ValidationOptions, analyze, parse_document, validate};
use rstest::rstest;

use crate::helpers::result_assertions::{analyzed, assert_no_errors, codes};

fn with_depth(text: &str, max_nesting_depth: usize) -> Vec<ErrorCode> {
    let result = analyze(text, &ParseOptions::default(), ValidationOptions { max_nesting_depth });
    codes(&result.diagnostics)
}

#[rstest]
#[case("IF [a] THEN 1 END", 1, false)]
#[case("IF [a] THEN IF [b] THEN 1 END END", 1, true)]
#[case("IF [a] THEN IF [b] THEN 1 END END", 2, false)]
#[case("CASE [a] WHEN 1 THEN IF [b] THEN CASE [c] WHEN 2 THEN 3 END END END", 2, true)]
#[case("CASE [a] WHEN 1 THEN IF [b] THEN CASE [c] WHEN 2 THEN 3 END END END", 3, false)]
fn test_nesting_depth_limit(#[case] text: &str, #[case] max: usize, #[case] reported: bool) {
    assert_eq!(with_depth(text, max).contains(&ErrorCode::E0602), reported);
}

#[test]
fn test_lod_does_not_count_toward_nesting() {
    let text = "IF [a] THEN {FIXED [r] : SUM(IF [b] THEN 1 END)} END";
    assert!(!with_depth(text, 2).contains(&ErrorCode::E0602));
}

#[test]
fn test_custom_signature_table() {
    let mut table = SignatureTable::builtin();
    table.insert(FunctionSignature::new("MARGIN", 2, Some(2), FunctionCategory::User));
    let options = ParseOptions::with_signatures(Arc::new(table));

    let ok = analyze("MARGIN([Sales], [Cost])", &options, ValidationOptions::default());
    assert_no_errors(&ok.diagnostics);
    assert!(!codes(&ok.diagnostics).contains(&ErrorCode::E0502));

    let short = analyze("MARGIN([Sales])", &options, ValidationOptions::default());
    assert!(codes(&short.diagnostics).contains(&ErrorCode::E0501));
}

#[test]
fn test_signatures_from_json() {
    let table = SignatureTable::from_json_str(
        r#"[{"name": "score", "minArgs": 1, "maxArgs": null, "category": "aggregate"}]"#,
    )
    .expect("valid signatures");
    let table = SignatureTable::builtin().merged(&table);
    assert!(table.is_aggregate("SCORE"));

    let result = parse_document("SUM(SCORE([a], [b], [c]))", &ParseOptions::with_signatures(Arc::new(table.clone())));
    let diagnostics = validate(&result, &table, ValidationOptions::default());
    assert_eq!(codes(&diagnostics), vec![ErrorCode::E0601]);
}

#[test]
fn test_table_calculation_is_informational() {
    let result = analyzed("RUNNING_SUM(SUM([Sales]))");
    let hint = result
        .diagnostics
        .iter()
        .find(|d| d.code == ErrorCode::E0603)
        .expect("table calculation hint");
    assert_eq!(hint.severity, Severity::Info);
    assert_no_errors(&result.diagnostics);
}

#[test]
fn test_validation_replaces_syntax_diagnostics() {
    let result = parse_document("SUM([a]", &ParseOptions::default());
    let diagnostics = validate(&result, &SignatureTable::builtin(), ValidationOptions::default());
    for syntax in &result.diagnostics {
        assert!(diagnostics.contains(syntax), "validator dropped {:?}", syntax);
    }
}

#[test]
fn test_diagnostics_are_not_duplicated() {
    let result = analyzed("LEFT([a])\n\nFOO(1)");
    let mut keys: Vec<_> = result.diagnostics.iter().map(|d| (d.range, d.code)).collect();
    let before = keys.len();
    keys.sort_by_key(|(range, code)| (range.start(), range.end(), code.as_str()));
    keys.dedup();
    assert_eq!(keys.len(), before);
}
