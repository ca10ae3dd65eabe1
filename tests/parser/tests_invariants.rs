//! Properties every parse must satisfy, whatever the input.

use calcls::parser::{ParseOptions, parse_document_cancellable};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use crate::helpers::result_assertions::{
    analyzed, assert_incomplete_symbols_explained, assert_well_formed, parse,
};
use crate::helpers::source_fixtures::{FUZZ_CORPUS, LARGE_DOCUMENT, MULTI_STATEMENT};

#[test]
fn test_fuzz_corpus_never_panics() {
    for source in FUZZ_CORPUS {
        let result = analyzed(source);
        assert_well_formed(&result, source);
    }
}

#[test]
fn test_fuzz_corpus_prefixes_never_panic() {
    // Every prefix of a valid document is a plausible mid-typing state
    for end in (0..=MULTI_STATEMENT.len()).filter(|i| MULTI_STATEMENT.is_char_boundary(*i)) {
        let source = &MULTI_STATEMENT[..end];
        let result = parse(source);
        assert_well_formed(&result, source);
    }
}

#[test]
fn test_parse_is_idempotent() {
    for source in FUZZ_CORPUS.iter().copied().chain([MULTI_STATEMENT, LARGE_DOCUMENT.as_str()]) {
        let first = analyzed(source);
        let second = analyzed(source);
        assert!(first.structurally_eq(&second), "non-deterministic parse of {:?}", source);
    }
}

#[test]
fn test_recovered_never_exceeds_total() {
    for source in FUZZ_CORPUS {
        let result = parse(source);
        assert!(
            result.recovery.recovered_errors <= result.recovery.total_errors,
            "{:?}: {:?}",
            source,
            result.recovery
        );
    }
}

#[rstest]
#[case("SUM([Sales)")]
#[case("SUM([a]")]
#[case("IF [a] THEN 1")]
#[case("IF [a] 1 END")]
#[case("CASE [x] ELSE 1 END")]
#[case("{FIXED [Region] SUM([Sales])")]
#[case("IF [a] THEN (SUM([b]) END")]
#[case("[")]
#[case("Sales + 1")]
fn test_incomplete_symbols_have_errors(#[case] source: &str) {
    let result = parse(source);
    assert!(result.symbols.iter().any(|s| !s.is_complete) || result.has_errors());
    assert_incomplete_symbols_explained(&result);
}

#[test]
fn test_segments_are_line_disjoint_and_sorted() {
    let result = parse(&LARGE_DOCUMENT);
    for pair in result.segments.windows(2) {
        assert!(
            pair[0].end_line < pair[1].start_line,
            "segments overlap: {:?} / {:?}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(result.line_count, 300);
}

#[test]
fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(parse_document_cancellable(&LARGE_DOCUMENT, &ParseOptions::default(), &token).is_none());
}
