//! Common calculation sources for tests.

use once_cell::sync::Lazy;

pub const SIMPLE_AGGREGATE: &str = "SUM([Sales])";
pub const UNCLOSED_FIELD: &str = "SUM([Sales)";
pub const SIMPLE_IF: &str = r#"IF [Sales] > 100 THEN "High" ELSE "Low" END"#;
pub const NESTED_AGGREGATE: &str = "SUM(AVG([Sales]))";

pub const MULTI_STATEMENT: &str = r#"
// Profit ratio
SUM([Profit]) / SUM([Sales])

IF [Region] = "West" THEN
    {FIXED [Customer] : SUM([Sales])}
ELSE
    0
END

CASE [Segment]
WHEN "Consumer" THEN 1
WHEN "Corporate" THEN 2
ELSE 3
END
"#;

/// Inputs that must never make the parser panic
pub const FUZZ_CORPUS: &[&str] = &[
    "",
    " ",
    "\n\n\n",
    "[",
    "]",
    "(",
    ")",
    "{",
    "}",
    "((((",
    "))))",
    "[[[[",
    "{{{{",
    "\"",
    "'",
    "#",
    "#2024-01-01",
    "/*",
    "*/",
    "//",
    "END",
    "THEN",
    "ELSE END",
    "IF",
    "IF THEN ELSE END",
    "CASE",
    "CASE WHEN",
    "WHEN 1 THEN 2",
    "{FIXED",
    "{FIXED :",
    "{FIXED [a] :",
    "{INCLUDE {EXCLUDE {FIXED",
    "SUM(",
    "SUM(,,,)",
    "SUM([a],",
    "SUM([a]",
    "SUM[a])",
    "[a].[",
    "[a].",
    ".[a]",
    "1 + + + 2",
    "AND OR NOT",
    "1.2.3.4",
    "IF [a] THEN (SUM([b]) END",
    "IF [a] THEN {FIXED [b] : SUM(AVG([c] END",
    "CASE [x] WHEN (1 THEN [y",
    "\u{0}\u{1}\u{7f}",
    "é[ü]ß(",
    "SUM([Sales]) /* trailing",
    "\"unterminated\nstring",
    "IF IF IF IF IF",
    "}}}} END END ) ]",
];

fn statement(i: usize) -> String {
    match i % 6 {
        0 => format!("SUM([Sales {}])", i),
        1 => format!("IF [Profit {}] > 0 THEN \"Gain\"", i),
        2 => "ELSE \"Loss\" END".to_string(),
        3 => format!("{{FIXED [Region] : AVG([Margin {}])}}", i),
        4 => "// running total".to_string(),
        _ => String::new(),
    }
}

/// A document of 300 lines, above the default incremental threshold
pub static LARGE_DOCUMENT: Lazy<String> =
    Lazy::new(|| (0..300).map(statement).collect::<Vec<_>>().join("\n"));

/// A shorter document for exhaustive per-line edits
pub static MEDIUM_DOCUMENT: Lazy<String> =
    Lazy::new(|| (0..60).map(statement).collect::<Vec<_>>().join("\n"));

/// Single lines spliced into documents by randomized edit tests
pub const EDIT_FRAGMENTS: &[&str] = &[
    "",
    ".",
    "[x]",
    "[Rate]",
    "[Parameters]",
    "[Parameters].",
    ".[Rate]",
    "FOO",
    "(1)",
    "SUM(",
    ")",
    "+ 1",
    "AND",
    "IF [a] THEN",
    "ELSE 0",
    "END",
    "CASE [s] WHEN 1 THEN 2",
    "{FIXED [r] :",
    "}",
    "// note",
    "/*",
    "*/",
    "SUM([Sales])",
];
