//! Symbol tree: the hierarchical parse result handed to feature providers.

use std::collections::BTreeSet;

use smol_str::SmolStr;
use text_size::{TextRange, TextSize};

use crate::parser::errors::shift_range;

// ============================================================================
// SYMBOL KINDS
// ============================================================================

/// Kind of IF/CASE/LOD block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    Case,
    Lod(LodKind),
}

impl BlockKind {
    /// Keyword or token that closes this block.
    pub fn closer(&self) -> &'static str {
        match self {
            BlockKind::If | BlockKind::Case => "END",
            BlockKind::Lod(_) => "'}'",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BlockKind::If => "IF",
            BlockKind::Case => "CASE",
            BlockKind::Lod(LodKind::Fixed) => "FIXED",
            BlockKind::Lod(LodKind::Include) => "INCLUDE",
            BlockKind::Lod(LodKind::Exclude) => "EXCLUDE",
            BlockKind::Lod(LodKind::Table) => "LOD",
        }
    }
}

/// Scope keyword of an LOD expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodKind {
    Fixed,
    Include,
    Exclude,
    /// `{ expr }` without a keyword: table-scoped
    Table,
}

/// Clause of a block, introduced by a keyword (or `:` for LOD bodies).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchKind {
    If,
    Then,
    ElseIf,
    Else,
    Case,
    When,
    Dimensions,
    Aggregate,
}

/// One clause of a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub kind: BranchKind,
    /// Range of the introducing keyword
    pub keyword_range: TextRange,
    /// Keyword through the end of the clause expression
    pub range: TextRange,
}

/// One argument of a function call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    /// Source text of the argument, trimmed
    pub text: String,
    pub range: TextRange,
    pub is_complete: bool,
}

/// Kind of a literal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Number,
    String,
    Date,
    Boolean,
    Null,
}

/// Symbol kind, carrying only the data relevant to each variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// Whole-document container; see [`crate::syntax::ParseResult::document_symbol`]
    CalculationRoot,
    Block {
        block: BlockKind,
        branches: Vec<Branch>,
        /// `END` or `}` when present
        terminator: Option<TextRange>,
    },
    FunctionCall {
        arguments: Vec<Argument>,
        /// Aggregate call inside another aggregate with no LOD scope between
        nested_in_aggregate: bool,
    },
    FieldReference {
        /// `Parameters` in `[Parameters].[Rate]`
        qualifier: Option<SmolStr>,
    },
    Operator,
    Literal(LiteralKind),
    Comment,
    ErrorMarker,
}

impl SymbolKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SymbolKind::CalculationRoot => "calculation",
            SymbolKind::Block { block, .. } => match block {
                BlockKind::If => "IF block",
                BlockKind::Case => "CASE block",
                BlockKind::Lod(_) => "LOD expression",
            },
            SymbolKind::FunctionCall { .. } => "function call",
            SymbolKind::FieldReference { .. } => "field reference",
            SymbolKind::Operator => "operator",
            SymbolKind::Literal(_) => "literal",
            SymbolKind::Comment => "comment",
            SymbolKind::ErrorMarker => "error",
        }
    }
}

// ============================================================================
// SYMBOL
// ============================================================================

/// A node of the symbol tree.
///
/// Children are owned exclusively by their parent, lie inside the parent's
/// range and are ordered by strictly increasing, non-overlapping ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: SymbolKind,
    pub range: TextRange,
    pub children: Vec<Symbol>,
    pub is_complete: bool,
    /// Lines after the first one that this symbol spans
    pub continuation_lines: BTreeSet<u32>,
}

impl Symbol {
    pub fn new(name: impl Into<SmolStr>, kind: SymbolKind, range: TextRange) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
            children: Vec::new(),
            is_complete: true,
            continuation_lines: BTreeSet::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Symbol>) -> Self {
        self.children = children;
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.is_complete = false;
        self
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self.kind, SymbolKind::FunctionCall { .. })
    }

    pub fn is_field_reference(&self) -> bool {
        matches!(self.kind, SymbolKind::FieldReference { .. })
    }

    pub fn is_error_marker(&self) -> bool {
        matches!(self.kind, SymbolKind::ErrorMarker)
    }

    pub fn block_kind(&self) -> Option<BlockKind> {
        match &self.kind {
            SymbolKind::Block { block, .. } => Some(*block),
            _ => None,
        }
    }

    /// Arguments of a function call; empty for other kinds
    pub fn arguments(&self) -> &[Argument] {
        match &self.kind {
            SymbolKind::FunctionCall { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Number of symbols in this subtree, including `self`
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Symbol::count).sum::<usize>()
    }

    /// Depth-first pre-order walk
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Symbol)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Deepest symbol whose range contains `offset`
    pub fn find_at(&self, offset: TextSize) -> Option<&Symbol> {
        if !self.range.contains_inclusive(offset) {
            return None;
        }
        self.children
            .iter()
            .find_map(|child| child.find_at(offset))
            .or(Some(self))
    }

    /// Copy of this subtree moved by `delta` bytes and `line_delta` lines
    pub(crate) fn shifted(&self, delta: i64, line_delta: i64) -> Symbol {
        Symbol {
            name: self.name.clone(),
            kind: shift_kind(&self.kind, delta),
            range: shift_range(self.range, delta),
            children: self
                .children
                .iter()
                .map(|c| c.shifted(delta, line_delta))
                .collect(),
            is_complete: self.is_complete,
            continuation_lines: self
                .continuation_lines
                .iter()
                .map(|line| (i64::from(*line) + line_delta).max(0) as u32)
                .collect(),
        }
    }

    /// Rough heap + inline footprint of this subtree
    pub fn approx_memory_bytes(&self) -> usize {
        let own = std::mem::size_of::<Symbol>()
            + self.name.len()
            + self.continuation_lines.len() * std::mem::size_of::<u32>() * 2;
        let kind = match &self.kind {
            SymbolKind::Block { branches, .. } => branches.len() * std::mem::size_of::<Branch>(),
            SymbolKind::FunctionCall { arguments, .. } => arguments
                .iter()
                .map(|a| std::mem::size_of::<Argument>() + a.text.len())
                .sum(),
            _ => 0,
        };
        own + kind + self.children.iter().map(Symbol::approx_memory_bytes).sum::<usize>()
    }

    /// Check the containment and ordering invariants for this subtree
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut previous_end: Option<TextSize> = None;
        for child in &self.children {
            if child.range.start() < self.range.start() || child.range.end() > self.range.end() {
                return Err(format!(
                    "child '{}' {:?} escapes parent '{}' {:?}",
                    child.name, child.range, self.name, self.range
                ));
            }
            if let Some(end) = previous_end
                && child.range.start() < end
            {
                return Err(format!(
                    "child '{}' {:?} overlaps its predecessor in '{}'",
                    child.name, child.range, self.name
                ));
            }
            previous_end = Some(child.range.end());
            child.check_invariants()?;
        }
        Ok(())
    }
}

fn shift_kind(kind: &SymbolKind, delta: i64) -> SymbolKind {
    match kind {
        SymbolKind::Block {
            block,
            branches,
            terminator,
        } => SymbolKind::Block {
            block: *block,
            branches: branches
                .iter()
                .map(|b| Branch {
                    kind: b.kind,
                    keyword_range: shift_range(b.keyword_range, delta),
                    range: shift_range(b.range, delta),
                })
                .collect(),
            terminator: terminator.map(|t| shift_range(t, delta)),
        },
        SymbolKind::FunctionCall {
            arguments,
            nested_in_aggregate,
        } => SymbolKind::FunctionCall {
            arguments: arguments
                .iter()
                .map(|a| Argument {
                    text: a.text.clone(),
                    range: shift_range(a.range, delta),
                    is_complete: a.is_complete,
                })
                .collect(),
            nested_in_aggregate: *nested_in_aggregate,
        },
        other => other.clone(),
    }
}
