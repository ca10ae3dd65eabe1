//! Incremental reparsing must always agree with a full parse.

use std::collections::BTreeSet;

use calcls::incremental::DEFAULT_LINE_THRESHOLD;
use calcls::{IncrementalParser, LineIndex, ParseOptions, ParseResult};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use rstest::rstest;

use crate::helpers::result_assertions::assert_well_formed;
use crate::helpers::source_fixtures::{EDIT_FRAGMENTS, FUZZ_CORPUS, LARGE_DOCUMENT, MEDIUM_DOCUMENT};

fn replace_line(text: &str, line: usize, f: impl Fn(&str) -> String) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, l)| if i == line { f(l) } else { l.to_string() })
        .collect::<Vec<_>>()
        .join("\n")
}

fn assert_matches_full_parse(parser: &IncrementalParser, old: &str, new: &str) -> ParseResult {
    let previous = parser.parse(old);
    let incremental = parser.reparse(old, &previous, new);
    let full = parser.parse(new);
    assert!(
        incremental.structurally_eq(&full),
        "incremental result differs from full parse\n--- old\n{}\n--- new\n{}",
        old,
        new
    );
    assert_well_formed(&incremental, new);
    incremental
}

#[test]
fn test_scenario_edit_on_large_document() {
    let text = format!("SUM([Sales])\n{}", "\n".repeat(250));
    let edited = text.replacen("SUM([Sales])", "SUM([Sales]) + AVG([Profit])", 1);
    let parser = IncrementalParser::default();
    assert!(LineIndex::new(&text).line_count() > DEFAULT_LINE_THRESHOLD);

    let result = assert_matches_full_parse(&parser, &text, &edited);
    assert_eq!(result.changed_lines, Some(BTreeSet::from([0])));
    assert_eq!(result.symbols.len(), 2);
}

#[test]
fn test_edit_in_the_middle_of_a_large_document() {
    let line = 150;
    let text = replace_line(&LARGE_DOCUMENT, line, |_| "SUM([Sales])".to_string());
    let edited = replace_line(&text, line, |_| "SUM([Sales]) + AVG([Profit])".to_string());
    let parser = IncrementalParser::default();

    let result = assert_matches_full_parse(&parser, &text, &edited);
    assert_eq!(result.changed_lines, Some(BTreeSet::from([line as u32])));

    let index = LineIndex::new(&edited);
    let on_line = result
        .symbols
        .iter()
        .filter(|s| index.line_of(s.range.start()) == line as u32)
        .count();
    assert_eq!(on_line, 2);
}

#[rstest]
#[case::append_operand(|l: &str| format!("{} + 1", l))]
#[case::unclosed_call(|_: &str| "SUM([x]".to_string())]
#[case::open_block(|_: &str| "IF [a] THEN".to_string())]
#[case::close_block(|_: &str| "END".to_string())]
#[case::open_lod(|_: &str| "{FIXED [r] :".to_string())]
#[case::comment_out(|l: &str| format!("// {}", l))]
#[case::blank(|_: &str| String::new())]
fn test_single_line_edit_at_every_line(#[case] edit: fn(&str) -> String) {
    let parser = IncrementalParser::new(ParseOptions::default(), 1);
    let lines = MEDIUM_DOCUMENT.split('\n').count();
    for line in 0..lines {
        let edited = replace_line(&MEDIUM_DOCUMENT, line, edit);
        if edited == *MEDIUM_DOCUMENT {
            continue;
        }
        let result = assert_matches_full_parse(&parser, &MEDIUM_DOCUMENT, &edited);
        assert_eq!(result.changed_lines, Some(BTreeSet::from([line as u32])));
    }
}

#[test]
fn test_chained_edits_stay_equivalent() {
    let parser = IncrementalParser::new(ParseOptions::default(), 1);
    let mut text = MEDIUM_DOCUMENT.to_string();
    let mut result = parser.parse(&text);
    for (line, replacement) in [
        (10, "IF [x] THEN"),
        (12, "SUM(([y]"),
        (30, "END"),
        (45, "{EXCLUDE [s] : MIN([t])}"),
        (12, "SUM([y])"),
        (10, "SUM([x])"),
    ] {
        let edited = replace_line(&text, line, |_| replacement.to_string());
        result = parser.reparse(&text, &result, &edited);
        assert!(result.structurally_eq(&parser.parse(&edited)), "diverged after editing line {}", line);
        text = edited;
    }
}

#[test]
fn test_inserting_and_removing_lines() {
    let parser = IncrementalParser::new(ParseOptions::default(), 1);
    let inserted = MEDIUM_DOCUMENT.replacen("\n", "\nIF [new] THEN 1\nELSE 2 END\n\n", 1);
    assert_matches_full_parse(&parser, &MEDIUM_DOCUMENT, &inserted);
    assert_matches_full_parse(&parser, &inserted, &MEDIUM_DOCUMENT);
}

#[rstest]
#[case::qualifier_joins_edited_line(
    "SUM([a])\nSUM([b])\n.\n[Rate]",
    "SUM([a])\n[Parameters]\n.\n[Rate]"
)]
#[case::qualifier_leaves_edited_line(
    "SUM([a])\n[Parameters]\n.\n[Rate]",
    "SUM([a])\nSUM([b])\n.\n[Rate]"
)]
#[case::dot_moves_to_own_line(
    "SUM([a])\n[Parameters]\nSUM([b])\n[Rate]",
    "SUM([a])\n[Parameters]\n.\n[Rate]"
)]
#[case::call_arguments_on_next_line(
    "SUM([a])\n1\n(2)\n[c]",
    "SUM([a])\nFOO\n(2)\n[c]"
)]
fn test_lookahead_across_kept_segments(#[case] old: &str, #[case] new: &str) {
    let parser = IncrementalParser::new(ParseOptions::default(), 1);
    assert_matches_full_parse(&parser, old, new);
}

fn random_fragment(rng: &mut Xoshiro256StarStar) -> String {
    if rng.gen_range(0..4) == 0 {
        FUZZ_CORPUS[rng.gen_range(0..FUZZ_CORPUS.len())].to_string()
    } else {
        EDIT_FRAGMENTS[rng.gen_range(0..EDIT_FRAGMENTS.len())].to_string()
    }
}

#[rstest]
#[case(7)]
#[case(42)]
#[case(2024)]
fn test_random_edit_sequences_stay_equivalent(#[case] seed: u64) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    let parser = IncrementalParser::new(ParseOptions::default(), 1);
    let mut lines: Vec<String> = MEDIUM_DOCUMENT.split('\n').map(str::to_string).collect();
    let mut text = lines.join("\n");
    let mut result = parser.parse(&text);

    for step in 0..200 {
        let fragment = random_fragment(&mut rng);
        let line = rng.gen_range(0..lines.len());
        match rng.gen_range(0..3) {
            0 => lines[line] = fragment,
            1 if lines.len() > 1 => {
                lines.remove(line);
            }
            _ => lines.insert(line, fragment),
        }

        let edited = lines.join("\n");
        result = parser.reparse(&text, &result, &edited);
        assert!(
            result.structurally_eq(&parser.parse(&edited)),
            "seed {} diverged at step {}\n--- before\n{}\n--- after\n{}",
            seed,
            step,
            text,
            edited
        );
        text = edited;
    }
}
