//! Term model for the Keel expansion engine
//!
//! This module provides the tagged tree that every lowerer consumes and
//! produces. Terms are owned recursively, so a tree can never contain a cycle,
//! and a lowering step always builds a new tree instead of mutating its input.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a span in the original source code.
///
/// # Examples
///
/// ```rust
/// use keel::ast::Span;
/// let span = Span { start: 0, end: 5 };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opaque identifier separating same-named variables introduced in different
/// lexical contexts. Assigned by the reader; the engine only mints fresh ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScopeTag(pub u32);

impl ScopeTag {
    /// Scope of variables written directly by the author.
    pub const ROOT: ScopeTag = ScopeTag(0);

    /// First tag handed out by the engine for generated variables.
    pub const GENERATED_BASE: u32 = 1 << 31;

    pub fn is_generated(&self) -> bool {
        self.0 >= Self::GENERATED_BASE
    }
}

/// A variable reference. Two symbols denote the same variable iff both the
/// name and the scope tag match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub scope: ScopeTag,
}

impl Symbol {
    pub fn new(name: impl Into<String>, scope: ScopeTag) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    /// The bare catch-all `_`.
    pub fn is_wildcard(&self) -> bool {
        self.name == "_"
    }

    /// Underscore-prefixed variables bind, but are never reported as unused.
    pub fn is_ignored(&self) -> bool {
        self.name.starts_with('_')
    }

    pub fn key(&self) -> (String, ScopeTag) {
        (self.name.clone(), self.scope)
    }
}

/// Literal leaf values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Atom(String),
    Str(String),
}

impl Literal {
    /// `nil` and `false` are the only falsy values.
    pub fn is_falsy(&self) -> bool {
        matches!(self, Literal::Nil | Literal::Bool(false))
    }
}

/// Per-node metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub span: Span,
    /// Emitted by the engine rather than written by the author.
    #[serde(default)]
    pub generated: bool,
    /// On a `case`: bindings made by the selected clause survive the case.
    #[serde(default)]
    pub export_bindings: bool,
}

impl Meta {
    pub fn generated() -> Self {
        Self {
            generated: true,
            ..Self::default()
        }
    }
}

/// The core tree node.
///
/// # Examples
///
/// ```rust
/// use keel::ast::Term;
/// let call = Term::node("match?", vec![Term::atom("ok"), Term::var("x")]);
/// assert_eq!(call.pretty(), "match?(:ok, x)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Literal(Literal),
    Symbol(Symbol),
    /// Two-element tuple; keyword entries are pairs keyed by an atom.
    Pair(Box<Term>, Box<Term>),
    Node {
        tag: String,
        #[serde(default)]
        meta: Meta,
        #[serde(default)]
        children: Vec<Term>,
    },
    Sequence(Vec<Term>),
    /// Tagged positional composite (a record value or record pattern).
    Aggregate { tag: String, elements: Vec<Term> },
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Term {
    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    pub fn nil() -> Self {
        Term::Literal(Literal::Nil)
    }

    pub fn bool(value: bool) -> Self {
        Term::Literal(Literal::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Term::Literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Term::Literal(Literal::Float(value))
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Term::Literal(Literal::Atom(name.into()))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Term::Literal(Literal::Str(value.into()))
    }

    /// A variable in the root scope.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Symbol(Symbol::new(name, ScopeTag::ROOT))
    }

    pub fn scoped_var(name: impl Into<String>, scope: ScopeTag) -> Self {
        Term::Symbol(Symbol::new(name, scope))
    }

    /// The bare `_` variable.
    pub fn wildcard() -> Self {
        Term::var("_")
    }

    pub fn pair(left: Term, right: Term) -> Self {
        Term::Pair(Box::new(left), Box::new(right))
    }

    /// A keyword entry `name: value`.
    pub fn keyword(name: &str, value: Term) -> Self {
        Term::pair(Term::atom(name), value)
    }

    pub fn seq(items: Vec<Term>) -> Self {
        Term::Sequence(items)
    }

    pub fn aggregate(tag: impl Into<String>, elements: Vec<Term>) -> Self {
        Term::Aggregate {
            tag: tag.into(),
            elements,
        }
    }

    pub fn node(tag: impl Into<String>, children: Vec<Term>) -> Self {
        Term::Node {
            tag: tag.into(),
            meta: Meta::default(),
            children,
        }
    }

    /// A node flagged as emitted by the engine.
    pub fn generated(tag: impl Into<String>, children: Vec<Term>) -> Self {
        Term::Node {
            tag: tag.into(),
            meta: Meta::generated(),
            children,
        }
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Term::Node { meta, .. } => Some(meta),
            _ => None,
        }
    }

    pub fn span(&self) -> Span {
        self.meta().map(|m| m.span).unwrap_or_default()
    }

    /// Returns this term with its node span replaced. Non-nodes carry no span.
    pub fn with_span(mut self, span: Span) -> Self {
        if let Term::Node { meta, .. } = &mut self {
            meta.span = span;
        }
        self
    }

    pub fn exporting_bindings(mut self) -> Self {
        if let Term::Node { meta, .. } = &mut self {
            meta.export_bindings = true;
        }
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn tag(&self) -> Option<&str> {
        match self {
            Term::Node { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Children of a node with the given tag.
    pub fn as_node(&self, expected: &str) -> Option<&[Term]> {
        match self {
            Term::Node { tag, children, .. } if tag == expected => Some(children),
            _ => None,
        }
    }

    pub fn is_node(&self, expected: &str) -> bool {
        self.as_node(expected).is_some()
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Term::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Literal(Literal::Atom(name)) => Some(name),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_symbol().is_some_and(Symbol::is_wildcard)
    }

    /// Reads a keyword sequence `[k1: v1, k2: v2]`. The empty sequence is a
    /// valid keyword sequence.
    pub fn as_keywords(&self) -> Option<Vec<(&str, &Term)>> {
        let Term::Sequence(items) = self else {
            return None;
        };
        items
            .iter()
            .map(|item| match item {
                Term::Pair(key, value) => key.as_atom().map(|k| (k, value.as_ref())),
                _ => None,
            })
            .collect()
    }

    /// True when evaluating the term cannot have side effects.
    pub fn is_pure(&self) -> bool {
        match self {
            Term::Literal(_) | Term::Symbol(_) => true,
            Term::Pair(left, right) => left.is_pure() && right.is_pure(),
            Term::Sequence(items) => items.iter().all(Term::is_pure),
            Term::Aggregate { elements, .. } => elements.iter().all(Term::is_pure),
            Term::Node { .. } => false,
        }
    }

    /// First variable carrying a scope from the engine's reserved range.
    pub fn generated_symbol(&self) -> Option<&Symbol> {
        match self {
            Term::Literal(_) => None,
            Term::Symbol(sym) => sym.scope.is_generated().then_some(sym),
            Term::Pair(left, right) => left.generated_symbol().or_else(|| right.generated_symbol()),
            Term::Sequence(items) | Term::Aggregate { elements: items, .. } => {
                items.iter().find_map(Term::generated_symbol)
            }
            Term::Node { children, .. } => children.iter().find_map(Term::generated_symbol),
        }
    }

    /// Pretty-prints the term in a compact surface syntax.
    pub fn pretty(&self) -> String {
        self.to_string()
    }

    // ------------------------------------------------------------------------
    // Pretty-printing helpers
    // ------------------------------------------------------------------------

    fn fmt_node(tag: &str, children: &[Term], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (tag, children) {
            (prim::CASE, [subject, clauses @ ..]) => {
                write!(f, "case {} do ", subject)?;
                write_joined(f, clauses, "; ")?;
                write!(f, " end")
            }
            (prim::BLOCK, exprs) => {
                write!(f, "(")?;
                write_joined(f, exprs, "; ")?;
                write!(f, ")")
            }
            (prim::CALL, [target, name, args @ ..]) => {
                let name = name.as_atom().map(str::to_string).unwrap_or_else(|| name.to_string());
                write!(f, "{}.{}(", target, name)?;
                write_joined(f, args, ", ")?;
                write!(f, ")")
            }
            (prim::RAISE, [kind, rest @ ..]) => {
                write!(f, "raise {}", kind)?;
                for term in rest {
                    write!(f, ", {}", term)?;
                }
                Ok(())
            }
            (prim::BINARY, segments) => {
                write!(f, "<<")?;
                write_joined(f, segments, ", ")?;
                write!(f, ">>")
            }
            (prim::PIN, [inner]) => write!(f, "^{}", inner),
            (prim::TYPED, [value, ty]) => {
                let ty = ty.as_atom().map(str::to_string).unwrap_or_else(|| ty.to_string());
                write!(f, "{}::{}", value, ty)
            }
            (prim::CONS, [head, tail]) => write!(f, "[{} | {}]", head, tail),
            (prim::DONT_CARE, []) => write!(f, "_"),
            (prim::DEF, [head, body]) => write!(f, "def {} do {} end", head, body),
            (
                prim::CLAUSE | prim::WHEN | prim::MATCH | prim::DEFAULT | "<>" | "|>",
                [left, right],
            ) => {
                write!(f, "{} {} {}", left, tag, right)
            }
            _ => {
                write!(f, "{}(", tag)?;
                write_joined(f, children, ", ")?;
                write!(f, ")")
            }
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

impl From<Symbol> for Term {
    fn from(sym: Symbol) -> Self {
        Term::Symbol(sym)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Nil => write!(f, "nil"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{:?}", n),
            Literal::Atom(name) => write!(f, ":{}", name),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope == ScopeTag::ROOT {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}#{}", self.name, self.scope.0)
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Literal(lit) => write!(f, "{}", lit),
            Term::Symbol(sym) => write!(f, "{}", sym),
            Term::Pair(left, right) => write!(f, "{{{}, {}}}", left, right),
            Term::Sequence(items) => {
                write!(f, "[")?;
                write_joined(f, items, ", ")?;
                write!(f, "]")
            }
            Term::Aggregate { tag, elements } => {
                write!(f, "{{{}", tag)?;
                for element in elements {
                    write!(f, ", {}", element)?;
                }
                write!(f, "}}")
            }
            Term::Node { tag, children, .. } => Term::fmt_node(tag, children, f),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Term], sep: &str) -> fmt::Result {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", term)?;
    }
    Ok(())
}

// ============================================================================
// MODULE EXPORTS
// ============================================================================

pub mod prim;
