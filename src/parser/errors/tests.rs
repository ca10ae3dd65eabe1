//! Tests for error codes, contexts and the builder

use super::*;
use crate::parser::TokenKind;
use text_size::{TextRange, TextSize};

const ALL_CODES: [ErrorCode; 25] = [
    ErrorCode::E0101,
    ErrorCode::E0102,
    ErrorCode::E0103,
    ErrorCode::E0104,
    ErrorCode::E0105,
    ErrorCode::E0201,
    ErrorCode::E0202,
    ErrorCode::E0203,
    ErrorCode::E0205,
    ErrorCode::E0301,
    ErrorCode::E0302,
    ErrorCode::E0303,
    ErrorCode::E0304,
    ErrorCode::E0305,
    ErrorCode::E0401,
    ErrorCode::E0402,
    ErrorCode::E0403,
    ErrorCode::E0501,
    ErrorCode::E0502,
    ErrorCode::E0601,
    ErrorCode::E0602,
    ErrorCode::E0603,
    ErrorCode::E0604,
    ErrorCode::E0605,
    ErrorCode::E0999,
];

#[test]
fn test_missing_end_error() {
    let keyword = TextRange::new(TextSize::new(0), TextSize::new(2));
    let err = ParseError::builder(ErrorCode::E0301)
        .message("IF block is missing END")
        .range(keyword)
        .recovery_action("add END")
        .related("IF opened here", keyword)
        .build();

    assert_eq!(err.code, ErrorCode::E0301);
    assert!(err.has_recovery_action());
    assert_eq!(err.related[0].range, keyword);
    assert_eq!(err.format(), "E0301: IF block is missing END\n  hint: add END");
}

#[test]
fn test_code_prefix_matches_category() {
    for code in ALL_CODES {
        let s = code.as_str();
        assert_eq!(s.len(), 5, "{:?}", code);
        let category = code.category_description();
        let expected = match &s[..3] {
            "E01" => "lexical error",
            "E02" => "delimiter error",
            "E03" => "block error",
            "E04" => "expression error",
            "E05" => "signature error",
            "E06" => "semantic advisory",
            _ => "internal error",
        };
        assert_eq!(category, expected, "{:?}", code);
        assert!(!code.default_message().is_empty());
    }
}

#[test]
fn test_only_syntax_codes_are_structural() {
    for code in ALL_CODES {
        let syntax = matches!(&code.as_str()[..3], "E01" | "E02" | "E03" | "E04");
        assert_eq!(code.is_structural(), syntax, "{:?}", code);
    }
}

#[test]
fn test_every_context_stops_at_end() {
    let contexts = [
        ParseContext::TopLevel,
        ParseContext::FunctionArguments,
        ParseContext::Grouping,
        ParseContext::IfBlock,
        ParseContext::CaseBlock,
        ParseContext::LodDimensions,
        ParseContext::LodBody,
    ];
    for ctx in contexts {
        assert!(
            ctx.recovery_tokens().contains(&TokenKind::END_KW),
            "context {:?} should stop at END",
            ctx
        );
    }
}

#[test]
fn test_shifted_error_moves_related() {
    let err = ParseError::builder(ErrorCode::E0401)
        .message("expected expression")
        .at_offset(TextSize::new(10))
        .related("operator", TextRange::new(8.into(), 9.into()))
        .build();
    let moved = err.shifted(-5);
    assert_eq!(moved.range, TextRange::empty(TextSize::new(5)));
    assert_eq!(moved.related[0].range, TextRange::new(3.into(), 4.into()));
    assert!(moved.severity.is_error());
}
