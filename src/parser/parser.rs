//! Recursive descent parser for calculation documents
//!
//! Builds a symbol tree from significant tokens. The parser never fails:
//! every fault becomes a [`ParseError`] reported through the recovery engine
//! and the affected symbol is marked incomplete. Top-level statements and
//! comments are grouped into line-disjoint segments for incremental reuse.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use smol_str::SmolStr;
use text_size::{TextRange, TextSize};
use tokio_util::sync::CancellationToken;

use super::errors::{ErrorCode, ParseContext, ParseError, Severity, format_context_error};
use super::lexer::{Token, tokenize};
use super::recovery::{RecoveryEngine, SegmentStats};
use super::syntax_kind::TokenKind;
use crate::base::LineIndex;
use crate::semantic::{FunctionSignature, SignatureTable, diagnostics};
use crate::syntax::{
    Argument, BlockKind, Branch, BranchKind, LiteralKind, LodKind, ParseResult, Segment, Symbol,
    SymbolKind,
};

/// Maximum expression nesting before the parser gives up on a subtree.
pub const DEFAULT_RECURSION_LIMIT: usize = 128;

/// Options for a parse pass.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Signature snapshot used for arity and aggregate checks
    pub signatures: Arc<SignatureTable>,
    pub recursion_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            signatures: SignatureTable::shared_builtin(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl ParseOptions {
    pub fn with_signatures(signatures: Arc<SignatureTable>) -> Self {
        Self {
            signatures,
            ..Self::default()
        }
    }
}

/// Parse a whole document.
pub fn parse_document(text: &str, options: &ParseOptions) -> ParseResult {
    let never = CancellationToken::new();
    parse_document_cancellable(text, options, &never)
        .unwrap_or_else(|| ParseResult::failed(LineIndex::new(text).line_count(), internal_error()))
}

/// Parse a whole document, giving up between statements once `cancel` fires.
///
/// Returns `None` only when cancelled.
pub fn parse_document_cancellable(
    text: &str,
    options: &ParseOptions,
    cancel: &CancellationToken,
) -> Option<ParseResult> {
    let started = Instant::now();
    let line_index = LineIndex::new(text);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        parse_tokens(text, tokenize(text), &line_index, options, Some(cancel))
    }));

    match outcome {
        Ok(Some(output)) => {
            let result = output.into_result(line_index.line_count());
            tracing::trace!(
                lines = result.line_count,
                segments = result.segments.len(),
                errors = result.parse_errors.len(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "parsed document"
            );
            Some(result)
        }
        Ok(None) => {
            tracing::debug!("parse cancelled");
            None
        }
        Err(_) => {
            tracing::error!(len = text.len(), "parser panicked; returning empty result");
            Some(ParseResult::failed(line_index.line_count(), internal_error()))
        }
    }
}

pub(crate) fn internal_error() -> ParseError {
    ParseError::builder(ErrorCode::E0999)
        .message("internal parser error; the document could not be analyzed")
        .at_offset(TextSize::new(0))
        .build()
}

/// Symbols, errors and segments of a parsed token window.
///
/// All ranges are absolute offsets into the full document.
#[derive(Debug, Default)]
pub(crate) struct ParseOutput {
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) errors: Vec<ParseError>,
    pub(crate) segments: Vec<Segment>,
}

impl ParseOutput {
    pub(crate) fn into_result(self, line_count: usize) -> ParseResult {
        ParseResult::assemble(self.symbols, self.errors, self.segments, line_count)
    }
}

/// Parse `tokens`, a window of `text` lexed with absolute offsets.
pub(crate) fn parse_tokens<'a>(
    text: &'a str,
    tokens: Vec<Token<'a>>,
    line_index: &LineIndex,
    options: &ParseOptions,
    cancel: Option<&CancellationToken>,
) -> Option<ParseOutput> {
    Parser::new(text, tokens, line_index, options).run(cancel)
}

// =============================================================================
// PARSER
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Aggregate,
    Lod,
}

/// One top-level statement or root comment.
struct Item {
    range: TextRange,
    is_statement: bool,
    symbols: Vec<Symbol>,
    errors: Vec<ParseError>,
    stats: SegmentStats,
}

struct Parser<'a, 'o> {
    text: &'a str,
    /// Significant tokens only
    tokens: Vec<Token<'a>>,
    /// Whether a blank line separates each token from its predecessor
    blank_before: Vec<bool>,
    comments: Vec<Token<'a>>,
    pos: usize,
    line_index: &'o LineIndex,
    options: &'o ParseOptions,
    engine: RecoveryEngine,
    scopes: Vec<Scope>,
    /// Closing delimiters awaited by the open calls, groupings and LODs
    closers: Vec<TokenKind>,
    depth: usize,
}

impl<'a, 'o> Parser<'a, 'o> {
    fn new(
        text: &'a str,
        all_tokens: Vec<Token<'a>>,
        line_index: &'o LineIndex,
        options: &'o ParseOptions,
    ) -> Self {
        let mut tokens = Vec::with_capacity(all_tokens.len() / 2);
        let mut blank_before = Vec::with_capacity(all_tokens.len() / 2);
        let mut comments = Vec::new();
        let mut blank = false;
        for token in all_tokens {
            match token.kind {
                TokenKind::WHITESPACE => {
                    if token.text.bytes().filter(|b| *b == b'\n').count() >= 2 {
                        blank = true;
                    }
                }
                TokenKind::LINE_COMMENT | TokenKind::BLOCK_COMMENT => comments.push(token),
                _ => {
                    tokens.push(token);
                    blank_before.push(blank);
                    blank = false;
                }
            }
        }

        Self {
            text,
            tokens,
            blank_before,
            comments,
            pos: 0,
            line_index,
            options,
            engine: RecoveryEngine::new(),
            scopes: Vec::new(),
            closers: Vec::new(),
            depth: 0,
        }
    }

    fn run(mut self, cancel: Option<&CancellationToken>) -> Option<ParseOutput> {
        let mut items = Vec::new();
        while !self.at_end() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return None;
            }
            let start = self.pos;
            let symbols = self.statement();
            if self.pos == start {
                self.stray_tokens();
            }
            let (errors, stats) = self.engine.take_item();
            let range = TextRange::new(
                self.tokens[start].range.start(),
                self.tokens[self.pos - 1].range.end(),
            );
            items.push(Item {
                range,
                is_statement: true,
                symbols,
                errors,
                stats,
            });
        }

        let items = self.attach_comments(items);
        Some(build_segments(items, self.line_index))
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    fn current(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    fn nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn blank_before_current(&self) -> bool {
        self.blank_before.get(self.pos).copied().unwrap_or(false)
    }

    /// An expression can start here without crossing a blank line
    fn at_operand(&self) -> bool {
        self.current_kind().is_some_and(TokenKind::starts_expression) && !self.blank_before_current()
    }

    fn at_binary_operator(&self) -> bool {
        self.current_kind().is_some_and(TokenKind::is_binary_operator) && !self.blank_before_current()
    }

    /// The current token closes an enclosing construct
    fn at_enclosing_closer(&self) -> bool {
        self.current_kind().is_some_and(|kind| self.closers.contains(&kind))
    }

    /// End offset of the last consumed token
    fn last_end(&self) -> TextSize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.range.end())
            .unwrap_or_default()
    }

    fn since(&self, start: TextSize) -> TextRange {
        TextRange::new(start, self.last_end().max(start))
    }

    // =========================================================================
    // Token consumption
    // =========================================================================

    fn bump(&mut self) -> Token<'a> {
        let token = self.tokens[self.pos];
        self.pos += 1;
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.at(kind) { Some(self.bump()) } else { None }
    }

    // =========================================================================
    // Symbols
    // =========================================================================

    /// Record continuation lines and report completeness to the recovery engine
    fn finish(&mut self, mut symbol: Symbol) -> Symbol {
        symbol.continuation_lines = continuation_lines(self.line_index, symbol.range);
        if symbol.is_complete {
            self.engine.note_valid();
        }
        symbol
    }

    fn structural_faults(&self) -> u32 {
        self.engine.structural_faults()
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statement(&mut self) -> Vec<Symbol> {
        let mut out = Vec::new();
        if self.current_kind().is_some_and(TokenKind::starts_expression) {
            self.expression(ParseContext::TopLevel, &mut out);
        } else if !self.at_end() {
            self.stray_tokens();
        }
        out
    }

    /// Consecutive tokens that cannot start a statement, reported once
    fn stray_tokens(&mut self) {
        let first = self.bump();
        let mut last = first;
        while let Some(token) = self.current() {
            if token.kind.starts_expression() || self.blank_before_current() {
                break;
            }
            last = self.bump();
        }

        let (code, found) = describe_unexpected(&first, false);
        let found = if first.range == last.range {
            found
        } else {
            format!("{} and following tokens", found)
        };
        let mut builder = format_context_error(&found, ParseContext::TopLevel, code)
            .range(first.range.cover(last.range));
        if let Some(action) = removal_hint(&first) {
            builder = builder.recovery_action(action);
        }
        self.engine.fault(builder.build());
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// `operand (binop operand)*`; binary operators leave no symbol behind
    ///
    /// Callers check that the current token starts an expression.
    fn expression(&mut self, ctx: ParseContext, out: &mut Vec<Symbol>) {
        if self.depth >= self.options.recursion_limit {
            self.too_deep(out);
            return;
        }
        self.depth += 1;

        self.operand(out);
        while self.at_binary_operator() {
            let op = self.bump();
            if op.kind.is_logical_operator() {
                out.push(self.operator(op));
            }
            if op.kind == TokenKind::IN_KW && self.at(TokenKind::L_PAREN) && !self.blank_before_current() {
                self.grouping(true, out);
                continue;
            }
            if self.at_operand() {
                self.operand(out);
            } else {
                self.engine.fault(
                    ParseError::builder(ErrorCode::E0401)
                        .message(format!(
                            "expected expression after {} {}",
                            op.kind.display_name(),
                            ctx.description()
                        ))
                        .range(op.range)
                        .recovery_action("add an operand")
                        .build(),
                );
            }
        }

        self.depth -= 1;
    }

    /// Prefix operators followed by a primary expression
    fn operand(&mut self, out: &mut Vec<Symbol>) {
        let mut prefix: Option<Token<'a>> = None;
        while let Some(kind @ (TokenKind::NOT_KW | TokenKind::MINUS | TokenKind::PLUS)) = self.current_kind() {
            if prefix.is_some() && self.blank_before_current() {
                break;
            }
            let op = self.bump();
            if kind == TokenKind::NOT_KW {
                out.push(self.operator(op));
            }
            prefix = Some(op);
        }

        let primary_ok = self.current_kind().is_some_and(TokenKind::starts_expression)
            && (prefix.is_none() || !self.blank_before_current());
        if !primary_ok {
            if let Some(op) = prefix {
                self.engine.fault(
                    ParseError::builder(ErrorCode::E0401)
                        .message(format!("expected expression after {}", op.kind.display_name()))
                        .range(op.range)
                        .build(),
                );
            }
            return;
        }

        match self.current_kind() {
            Some(TokenKind::FIELD) => {
                let symbol = self.field_reference();
                out.push(symbol);
            }
            Some(TokenKind::IDENT) => {
                let symbol = if self.nth_kind(1) == Some(TokenKind::L_PAREN) {
                    self.call()
                } else {
                    self.bare_identifier()
                };
                out.push(symbol);
            }
            Some(TokenKind::L_PAREN) => self.grouping(false, out),
            Some(TokenKind::L_BRACE) => {
                let symbol = self.lod_block();
                out.push(symbol);
            }
            Some(TokenKind::IF_KW) => {
                let symbol = self.if_block();
                out.push(symbol);
            }
            Some(TokenKind::CASE_KW) => {
                let symbol = self.case_block();
                out.push(symbol);
            }
            _ => {
                let symbol = self.literal();
                out.push(symbol);
            }
        }
    }

    /// Skip a balanced run of tokens once the nesting limit is hit
    fn too_deep(&mut self, out: &mut Vec<Symbol>) {
        let Some(first) = self.current() else {
            return;
        };
        let mut balance = 0usize;
        let mut last = self.bump();
        if matches!(
            first.kind,
            TokenKind::L_PAREN | TokenKind::L_BRACE | TokenKind::IF_KW | TokenKind::CASE_KW
        ) {
            balance += 1;
        }
        while let Some(token) = self.current() {
            match token.kind {
                TokenKind::L_PAREN | TokenKind::L_BRACE | TokenKind::IF_KW | TokenKind::CASE_KW => {
                    balance += 1
                }
                TokenKind::R_PAREN | TokenKind::R_BRACE | TokenKind::END_KW => {
                    if balance == 0 {
                        break;
                    }
                    balance -= 1;
                }
                TokenKind::COMMA if balance == 0 => break,
                _ => {}
            }
            if balance == 0 && self.blank_before_current() {
                break;
            }
            last = self.bump();
        }

        let range = first.range.cover(last.range);
        self.engine.fault(
            ParseError::builder(ErrorCode::E0403)
                .message(format!(
                    "expression nested more than {} levels deep",
                    self.options.recursion_limit
                ))
                .range(range)
                .recovery_action("split the calculation into smaller parts")
                .build(),
        );
        let marker = Symbol::new("error", SymbolKind::ErrorMarker, range).incomplete();
        out.push(self.finish(marker));
    }

    fn operator(&mut self, token: Token<'a>) -> Symbol {
        let symbol = Symbol::new(token.kind.display_name(), SymbolKind::Operator, token.range);
        self.finish(symbol)
    }

    fn literal(&mut self) -> Symbol {
        let token = self.bump();
        let (kind, unterminated) = match token.kind {
            TokenKind::STRING => (
                LiteralKind::String,
                Some((ErrorCode::E0102, "add the closing quote")),
            ),
            TokenKind::DATE => (
                LiteralKind::Date,
                Some((ErrorCode::E0105, "add the closing '#'")),
            ),
            TokenKind::TRUE_KW | TokenKind::FALSE_KW => (LiteralKind::Boolean, None),
            TokenKind::NULL_KW => (LiteralKind::Null, None),
            _ => (LiteralKind::Number, None),
        };

        let mut symbol = Symbol::new(token.text, SymbolKind::Literal(kind), token.range);
        if token.incomplete
            && let Some((code, action)) = unterminated
        {
            self.engine.fault(
                ParseError::builder(code)
                    .range(token.range)
                    .recovery_action(action)
                    .build(),
            );
            symbol.is_complete = false;
        }
        self.finish(symbol)
    }

    fn field_reference(&mut self) -> Symbol {
        let token = self.bump();
        let mut complete = self.check_field_token(&token);
        let mut name = field_name(token.text, !token.incomplete);
        let mut qualifier = None;
        let mut range = token.range;

        if complete
            && self.at(TokenKind::DOT)
            && self.nth_kind(1) == Some(TokenKind::FIELD)
        {
            self.bump();
            let field = self.bump();
            complete = self.check_field_token(&field);
            qualifier = Some(name);
            name = field_name(field.text, !field.incomplete);
            range = range.cover(field.range);
        }

        let mut symbol = Symbol::new(name, SymbolKind::FieldReference { qualifier }, range);
        symbol.is_complete = complete;
        self.finish(symbol)
    }

    fn check_field_token(&mut self, token: &Token<'a>) -> bool {
        if !token.incomplete {
            return true;
        }
        self.engine.fault(
            ParseError::builder(ErrorCode::E0104)
                .message(format!("unclosed bracket in field reference '{}'", token.text))
                .range(token.range)
                .recovery_action("add ']'")
                .build(),
        );
        false
    }

    fn bare_identifier(&mut self) -> Symbol {
        let token = self.bump();
        self.engine.fault(
            ParseError::builder(ErrorCode::E0402)
                .message(format!(
                    "'{}' is not a function call; field names must be enclosed in brackets",
                    token.text
                ))
                .range(token.range)
                .recovery_action(format!("wrap in brackets: [{}]", token.text))
                .build(),
        );
        let symbol = Symbol::new(
            token.text,
            SymbolKind::FieldReference { qualifier: None },
            token.range,
        )
        .incomplete();
        self.finish(symbol)
    }

    /// Parenthesized expression, or the value list of `IN (...)`
    fn grouping(&mut self, list: bool, out: &mut Vec<Symbol>) {
        let lparen = self.bump();
        self.closers.push(TokenKind::R_PAREN);
        if self.at_operand() {
            loop {
                self.expression(ParseContext::Grouping, out);
                if list && self.eat(TokenKind::COMMA).is_some() && self.at_operand() {
                    continue;
                }
                break;
            }
        } else if self.at(TokenKind::R_PAREN) {
            self.engine.fault(
                ParseError::builder(ErrorCode::E0401)
                    .message("expected expression inside parentheses")
                    .range(lparen.range)
                    .build(),
            );
        }

        self.closers.pop();
        if self.eat(TokenKind::R_PAREN).is_none() {
            self.engine.fault(
                ParseError::builder(ErrorCode::E0203)
                    .message("unclosed parenthesis")
                    .range(lparen.range)
                    .recovery_action("add ')'")
                    .build(),
            );
        }
    }

    // =========================================================================
    // Function calls
    // =========================================================================

    fn call(&mut self) -> Symbol {
        let name_token = self.bump();
        let lparen = self.bump();
        let options = self.options;
        let signature = options.signatures.get(name_token.text);
        let is_aggregate = signature.is_some_and(FunctionSignature::is_aggregate);
        let nested_in_aggregate = is_aggregate && self.scopes.last() == Some(&Scope::Aggregate);
        if is_aggregate {
            self.scopes.push(Scope::Aggregate);
        }

        let mut children = Vec::new();
        let mut arguments = Vec::new();
        let closed = if self.eat(TokenKind::R_PAREN).is_some() {
            true
        } else {
            self.closers.push(TokenKind::R_PAREN);
            let closed = self.arguments(name_token.text, &mut children, &mut arguments);
            self.closers.pop();
            closed
        };

        if is_aggregate {
            self.scopes.pop();
        }

        let complete = closed && arguments.iter().all(|a| a.is_complete);
        if !closed {
            self.engine.fault(
                ParseError::builder(ErrorCode::E0203)
                    .message(format!("unclosed parenthesis in call to {}", name_token.text))
                    .range(lparen.range)
                    .recovery_action("add ')'")
                    .related(format!("{} called here", name_token.text), name_token.range)
                    .build(),
            );
        } else if complete && !self.engine.in_scan() {
            self.check_signature(&name_token, signature, arguments.len());
        }

        let range = self.since(name_token.range.start());
        let mut symbol = Symbol::new(
            name_token.text,
            SymbolKind::FunctionCall {
                arguments,
                nested_in_aggregate,
            },
            range,
        )
        .with_children(children);
        symbol.is_complete = complete;
        self.finish(symbol)
    }

    /// Parse arguments after `(`; returns whether the closing `)` was found
    fn arguments(
        &mut self,
        function: &str,
        children: &mut Vec<Symbol>,
        arguments: &mut Vec<Argument>,
    ) -> bool {
        loop {
            if let Some(token) = self.current()
                && matches!(token.kind, TokenKind::COMMA | TokenKind::R_PAREN)
            {
                self.engine.fault(
                    ParseError::builder(ErrorCode::E0401)
                        .message(format!("missing argument in call to {}", function))
                        .range(token.range)
                        .recovery_action("add an argument or remove the extra ','")
                        .build(),
                );
                arguments.push(Argument {
                    text: String::new(),
                    range: TextRange::empty(token.range.start()),
                    is_complete: false,
                });
            } else if self.at_operand() {
                let start = self.tokens[self.pos].range.start();
                let faults = self.structural_faults();
                self.expression(ParseContext::FunctionArguments, children);
                let range = self.since(start);
                arguments.push(Argument {
                    text: self.text[range].trim().to_string(),
                    range,
                    is_complete: self.structural_faults() == faults,
                });
            } else {
                return false;
            }

            match self.current_kind() {
                Some(TokenKind::COMMA) => {
                    self.bump();
                    if self.at_end() || self.blank_before_current() {
                        return false;
                    }
                }
                Some(TokenKind::R_PAREN) => {
                    self.bump();
                    return true;
                }
                _ => return false,
            }
        }
    }

    fn check_signature(
        &mut self,
        name: &Token<'a>,
        signature: Option<&FunctionSignature>,
        count: usize,
    ) {
        match signature {
            None => self.engine.fault(
                ParseError::builder(ErrorCode::E0502)
                    .message(diagnostics::unknown_function_message(name.text))
                    .range(name.range)
                    .severity(Severity::Warning)
                    .build(),
            ),
            Some(signature) if !signature.accepts(count) => self.engine.fault(
                ParseError::builder(ErrorCode::E0501)
                    .message(diagnostics::arity_message(
                        name.text,
                        &signature.expected_description(),
                        count,
                    ))
                    .range(name.range)
                    .build(),
            ),
            Some(_) => {}
        }
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Expression required after `keyword`; reports E0401 when absent
    fn required_expression(&mut self, keyword: &Token<'a>, ctx: ParseContext, out: &mut Vec<Symbol>) {
        if self.at_operand() {
            self.expression(ctx, out);
        } else {
            self.engine.fault(
                ParseError::builder(ErrorCode::E0401)
                    .message(format!("expected expression after {}", keyword.kind.display_name()))
                    .range(keyword.range)
                    .build(),
            );
        }
    }

    /// `THEN value`; returns false when THEN is missing
    fn then_clause(
        &mut self,
        opener: &Token<'a>,
        ctx: ParseContext,
        children: &mut Vec<Symbol>,
        branches: &mut Vec<Branch>,
    ) -> bool {
        if let Some(then) = self.eat(TokenKind::THEN_KW) {
            self.required_expression(&then, ctx, children);
            branches.push(Branch {
                kind: BranchKind::Then,
                keyword_range: then.range,
                range: self.since(then.range.start()),
            });
            return true;
        }

        self.engine.fault(
            ParseError::builder(ErrorCode::E0303)
                .message(format!("{} is missing THEN", opener.kind.display_name()))
                .range(opener.range)
                .recovery_action("add THEN")
                .build(),
        );
        if self.at_operand() {
            self.expression(ctx, children);
        }
        false
    }

    /// Whether the clause loop of an IF/CASE block should stop here
    fn block_interrupted(&self) -> bool {
        match self.current_kind() {
            None => true,
            Some(kind) => {
                (self.blank_before_current() && !kind.is_block_continuation())
                    || self.at_enclosing_closer()
            }
        }
    }

    fn if_block(&mut self) -> Symbol {
        let if_token = self.bump();
        let ctx = ParseContext::IfBlock;
        let mut children = Vec::new();
        let mut branches = Vec::new();

        self.required_expression(&if_token, ctx, &mut children);
        branches.push(Branch {
            kind: BranchKind::If,
            keyword_range: if_token.range,
            range: self.since(if_token.range.start()),
        });
        let mut complete = self.then_clause(&if_token, ctx, &mut children, &mut branches);

        let mut terminator = None;
        while !self.block_interrupted() {
            match self.current_kind() {
                Some(TokenKind::ELSEIF_KW) => {
                    let keyword = self.bump();
                    self.required_expression(&keyword, ctx, &mut children);
                    branches.push(Branch {
                        kind: BranchKind::ElseIf,
                        keyword_range: keyword.range,
                        range: self.since(keyword.range.start()),
                    });
                    complete &= self.then_clause(&keyword, ctx, &mut children, &mut branches);
                }
                Some(TokenKind::ELSE_KW) => {
                    let keyword = self.bump();
                    self.required_expression(&keyword, ctx, &mut children);
                    branches.push(Branch {
                        kind: BranchKind::Else,
                        keyword_range: keyword.range,
                        range: self.since(keyword.range.start()),
                    });
                }
                Some(TokenKind::END_KW) => {
                    terminator = Some(self.bump().range);
                    break;
                }
                _ => {
                    let marker = self.resync(ctx);
                    children.push(marker);
                }
            }
        }

        if terminator.is_none() {
            complete = false;
            self.missing_end(&if_token);
        }
        self.finish_block(BlockKind::If, &if_token, children, branches, terminator, complete)
    }

    fn case_block(&mut self) -> Symbol {
        let case_token = self.bump();
        let ctx = ParseContext::CaseBlock;
        let mut children = Vec::new();
        let mut branches = Vec::new();

        self.required_expression(&case_token, ctx, &mut children);
        branches.push(Branch {
            kind: BranchKind::Case,
            keyword_range: case_token.range,
            range: self.since(case_token.range.start()),
        });

        let mut complete = true;
        let mut saw_when = false;
        let mut terminator = None;
        while !self.block_interrupted() {
            match self.current_kind() {
                Some(TokenKind::WHEN_KW) => {
                    let keyword = self.bump();
                    saw_when = true;
                    self.required_expression(&keyword, ctx, &mut children);
                    branches.push(Branch {
                        kind: BranchKind::When,
                        keyword_range: keyword.range,
                        range: self.since(keyword.range.start()),
                    });
                    complete &= self.then_clause(&keyword, ctx, &mut children, &mut branches);
                }
                Some(TokenKind::ELSE_KW) => {
                    let keyword = self.bump();
                    self.required_expression(&keyword, ctx, &mut children);
                    branches.push(Branch {
                        kind: BranchKind::Else,
                        keyword_range: keyword.range,
                        range: self.since(keyword.range.start()),
                    });
                }
                Some(TokenKind::END_KW) => {
                    terminator = Some(self.bump().range);
                    break;
                }
                _ => {
                    let marker = self.resync(ctx);
                    children.push(marker);
                }
            }
        }

        if !saw_when {
            complete = false;
            self.engine.fault(
                ParseError::builder(ErrorCode::E0302)
                    .message("CASE without WHEN")
                    .range(case_token.range)
                    .recovery_action("add a WHEN ... THEN clause")
                    .build(),
            );
        }
        if terminator.is_none() {
            complete = false;
            self.missing_end(&case_token);
        }
        self.finish_block(BlockKind::Case, &case_token, children, branches, terminator, complete)
    }

    fn missing_end(&mut self, opener: &Token<'a>) {
        self.engine.fault(
            ParseError::builder(ErrorCode::E0301)
                .message(format!("{} block is missing END", opener.kind.display_name()))
                .range(opener.range)
                .recovery_action("add END")
                .build(),
        );
    }

    fn lod_block(&mut self) -> Symbol {
        let lbrace = self.bump();
        self.scopes.push(Scope::Lod);
        self.closers.push(TokenKind::R_BRACE);
        let mut children = Vec::new();
        let mut branches = Vec::new();
        let mut complete = true;

        let lod_kind = match self.current_kind() {
            Some(TokenKind::FIXED_KW) => Some(LodKind::Fixed),
            Some(TokenKind::INCLUDE_KW) => Some(LodKind::Include),
            Some(TokenKind::EXCLUDE_KW) => Some(LodKind::Exclude),
            _ => None,
        };

        let block = match lod_kind {
            Some(kind) => {
                let keyword = self.bump();
                let dims_start = self.pos;
                while self.at_operand() {
                    self.expression(ParseContext::LodDimensions, &mut children);
                    if self.eat(TokenKind::COMMA).is_none() {
                        break;
                    }
                }
                if self.pos > dims_start {
                    branches.push(Branch {
                        kind: BranchKind::Dimensions,
                        keyword_range: keyword.range,
                        range: self.since(keyword.range.start()),
                    });
                }

                if let Some(colon) = self.eat(TokenKind::COLON) {
                    self.required_expression(&colon, ParseContext::LodBody, &mut children);
                    branches.push(Branch {
                        kind: BranchKind::Aggregate,
                        keyword_range: colon.range,
                        range: self.since(colon.range.start()),
                    });
                } else {
                    complete = false;
                    self.engine.fault(
                        ParseError::builder(ErrorCode::E0304)
                            .message(format!(
                                "{} expression is missing ':'",
                                keyword.kind.display_name()
                            ))
                            .range(keyword.range)
                            .recovery_action("add ':' before the aggregate expression")
                            .build(),
                    );
                }
                BlockKind::Lod(kind)
            }
            None => {
                self.required_expression(&lbrace, ParseContext::LodBody, &mut children);
                branches.push(Branch {
                    kind: BranchKind::Aggregate,
                    keyword_range: lbrace.range,
                    range: self.since(lbrace.range.start()),
                });
                BlockKind::Lod(LodKind::Table)
            }
        };

        let mut terminator = None;
        while let Some(kind) = self.current_kind() {
            if kind == TokenKind::R_BRACE {
                terminator = Some(self.bump().range);
                break;
            }
            if (self.blank_before_current() && !kind.is_block_continuation())
                || self.at_enclosing_closer()
                || matches!(
                    kind,
                    TokenKind::END_KW | TokenKind::ELSE_KW | TokenKind::ELSEIF_KW | TokenKind::WHEN_KW
                )
            {
                break;
            }
            let marker = self.resync(ParseContext::LodBody);
            children.push(marker);
        }
        self.scopes.pop();
        self.closers.pop();

        if terminator.is_none() {
            complete = false;
            self.engine.fault(
                ParseError::builder(ErrorCode::E0202)
                    .message("unclosed '{' in LOD expression")
                    .range(lbrace.range)
                    .recovery_action("add '}'")
                    .build(),
            );
        }
        self.finish_block(block, &lbrace, children, branches, terminator, complete)
    }

    fn finish_block(
        &mut self,
        block: BlockKind,
        opener: &Token<'a>,
        children: Vec<Symbol>,
        branches: Vec<Branch>,
        terminator: Option<TextRange>,
        complete: bool,
    ) -> Symbol {
        let range = self.since(opener.range.start());
        let mut symbol = Symbol::new(
            block.display_name(),
            SymbolKind::Block {
                block,
                branches,
                terminator,
            },
            range,
        )
        .with_children(children);
        symbol.is_complete = complete;
        self.finish(symbol)
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Report the unexpected current token and skip to the next stop point
    /// for `ctx`, keeping any constructs found on the way under an ErrorMarker.
    fn resync(&mut self, ctx: ParseContext) -> Symbol {
        let start = self.pos;
        let fault = self.bump_unexpected(ctx);

        self.engine.begin_scan();
        let mut children = Vec::new();
        while let Some(token) = self.current() {
            if ctx.recovery_tokens().contains(&token.kind)
                || self.at_enclosing_closer()
                || (self.pos > start && self.blank_before_current())
            {
                break;
            }
            let before = self.pos;
            if token.kind.starts_expression() {
                self.expression(ctx, &mut children);
            }
            if self.pos == before {
                self.bump();
            }
        }
        self.engine.end_scan();

        if self.pos == start {
            self.bump();
        }
        let marker = Symbol::new("error", SymbolKind::ErrorMarker, self.since(fault.range.start()))
            .with_children(children)
            .incomplete();
        self.finish(marker)
    }

    /// Report the current token as unexpected in `ctx`; consumes it unless
    /// it can start an expression the resync scan should keep.
    fn bump_unexpected(&mut self, ctx: ParseContext) -> Token<'a> {
        let token = self.tokens[self.pos];
        let (code, found) = describe_unexpected(&token, ctx.is_block());
        let mut builder = format_context_error(&found, ctx, code).range(token.range);
        if let Some(action) = removal_hint(&token) {
            builder = builder.recovery_action(action);
        }
        self.engine.fault(builder.build());
        if !token.kind.starts_expression() {
            self.pos += 1;
        }
        token
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Attach comments to the deepest enclosing symbol; comments outside
    /// every statement become items of their own.
    fn attach_comments(&mut self, mut items: Vec<Item>) -> Vec<Item> {
        let comments = std::mem::take(&mut self.comments);
        let mut root_comments = Vec::new();

        for token in comments {
            let (symbol, error) = self.comment(&token);
            let idx = items.partition_point(|item| item.range.end() <= token.range.start());
            match items.get_mut(idx) {
                Some(item) if item.range.contains_range(token.range) => {
                    insert_comment(&mut item.symbols, symbol);
                    if let Some(error) = error {
                        item.stats = item.stats.then(&unrecovered(1));
                        item.errors.push(error);
                    }
                }
                _ => {
                    let stats = if error.is_some() {
                        unrecovered(1)
                    } else {
                        SegmentStats::default()
                    };
                    root_comments.push(Item {
                        range: token.range,
                        is_statement: false,
                        symbols: vec![symbol],
                        errors: error.into_iter().collect(),
                        stats,
                    });
                }
            }
        }

        if root_comments.is_empty() {
            return items;
        }
        let mut merged = Vec::with_capacity(items.len() + root_comments.len());
        let mut statements = items.into_iter().peekable();
        let mut comments = root_comments.into_iter().peekable();
        loop {
            let take_statement = match (statements.peek(), comments.peek()) {
                (Some(s), Some(c)) => s.range.start() < c.range.start(),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_statement {
                statements.next()
            } else {
                comments.next()
            };
            merged.extend(next);
        }
        merged
    }

    fn comment(&self, token: &Token<'a>) -> (Symbol, Option<ParseError>) {
        let mut symbol = Symbol::new(
            token.text.trim_end(),
            SymbolKind::Comment,
            token.range,
        );
        symbol.continuation_lines = continuation_lines(self.line_index, token.range);
        if !token.incomplete {
            return (symbol, None);
        }
        symbol.is_complete = false;
        let error = ParseError::builder(ErrorCode::E0103)
            .range(TextRange::at(token.range.start(), TextSize::new(2)))
            .recovery_action("add '*/'")
            .build();
        (symbol, Some(error))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn continuation_lines(line_index: &LineIndex, range: TextRange) -> std::collections::BTreeSet<u32> {
    let (start, end) = line_index.line_range(range);
    (start + 1..=end).collect()
}

fn unrecovered(count: u32) -> SegmentStats {
    SegmentStats {
        total: count,
        recovered: 0,
        trailing_pending: count,
        produced_valid: false,
    }
}

/// Error code and description for a token that cannot appear here
fn describe_unexpected(token: &Token<'_>, in_block: bool) -> (ErrorCode, String) {
    match token.kind {
        TokenKind::ERROR => (ErrorCode::E0101, format!("character '{}'", token.text)),
        kind if kind.is_closing_delimiter() => (ErrorCode::E0205, kind.display_name().to_string()),
        kind if in_block => (ErrorCode::E0305, kind.display_name().to_string()),
        kind => (ErrorCode::E0201, kind.display_name().to_string()),
    }
}

fn removal_hint(token: &Token<'_>) -> Option<String> {
    match token.kind {
        TokenKind::ERROR => Some(format!("remove '{}'", token.text)),
        kind if kind.is_closing_delimiter() => Some(format!("remove the unmatched {}", kind.display_name())),
        kind if kind.is_block_continuation() => Some(format!("remove the stray {}", kind.display_name())),
        _ => None,
    }
}

/// Field name without brackets, with `]]` unescaped
fn field_name(text: &str, terminated: bool) -> SmolStr {
    let inner = text.strip_prefix('[').unwrap_or(text);
    let inner = if terminated {
        inner.strip_suffix(']').unwrap_or(inner)
    } else {
        inner
    };
    if inner.contains("]]") {
        SmolStr::new(inner.replace("]]", "]"))
    } else {
        SmolStr::new(inner)
    }
}

fn insert_comment(symbols: &mut Vec<Symbol>, comment: Symbol) {
    let idx = symbols.partition_point(|s| s.range.end() <= comment.range.start());
    match symbols.get_mut(idx) {
        Some(parent) if parent.range.contains_range(comment.range) => {
            insert_comment(&mut parent.children, comment)
        }
        _ => symbols.insert(idx, comment),
    }
}

/// Merge items sharing a line into segments
fn build_segments(items: Vec<Item>, line_index: &LineIndex) -> ParseOutput {
    let mut output = ParseOutput::default();
    let mut pending: Option<(u32, u32, u32, Item)> = None;

    for item in items {
        let (start_line, end_line) = line_index.line_range(item.range);
        let statements = u32::from(item.is_statement);
        match pending.as_mut() {
            Some((_, last_line, count, open)) if start_line <= *last_line => {
                *last_line = (*last_line).max(end_line);
                *count += statements;
                open.range = open.range.cover(item.range);
                open.stats = open.stats.then(&item.stats);
                open.symbols.extend(item.symbols);
                open.errors.extend(item.errors);
            }
            _ => {
                if let Some(done) = pending.take() {
                    push_segment(&mut output, done);
                }
                pending = Some((start_line, end_line, statements, item));
            }
        }
    }
    if let Some(done) = pending {
        push_segment(&mut output, done);
    }
    output
}

fn push_segment(
    output: &mut ParseOutput,
    (start_line, end_line, statements, mut item): (u32, u32, u32, Item),
) {
    item.errors
        .sort_by_key(|e| (e.range.start(), e.range.end(), e.code));
    let symbols = output.symbols.len()..output.symbols.len() + item.symbols.len();
    let errors = output.errors.len()..output.errors.len() + item.errors.len();
    output.symbols.extend(item.symbols);
    output.errors.extend(item.errors);
    output.segments.push(Segment {
        start_line,
        end_line,
        range: item.range,
        symbols,
        errors,
        statements,
        stats: item.stats,
    });
}
