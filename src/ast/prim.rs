//! Primitive node tags of the core calculus and builders for them.
//!
//! Every lowerer emits trees made only of these nodes plus the non-node term
//! variants. Builders mark their output as generated.

use super::{Literal, Term};

pub const CASE: &str = "case";
pub const CLAUSE: &str = "->";
pub const WHEN: &str = "when";
pub const MATCH: &str = "=";
pub const PIN: &str = "^";
pub const BLOCK: &str = "block";
pub const CALL: &str = "call";
pub const RAISE: &str = "raise";
pub const BINARY: &str = "<<>>";
pub const TYPED: &str = "::";
pub const CONS: &str = "|";
pub const DEF: &str = "def";
pub const DEFAULT: &str = "\\\\";
/// The explicit "don't care" placeholder, distinct from the `_` variable.
pub const DONT_CARE: &str = "_";

/// Module that hosts the guard-safe kernel primitives.
pub const KERNEL: &str = "kernel";

/// Tags that may appear in lowered output.
pub const ALL: &[&str] = &[
    CASE, CLAUSE, WHEN, MATCH, PIN, BLOCK, CALL, RAISE, BINARY, TYPED, CONS, DEF, DEFAULT,
];

pub fn is_primitive(tag: &str) -> bool {
    ALL.contains(&tag)
}

pub fn case(subject: Term, clauses: Vec<Term>) -> Term {
    let mut children = Vec::with_capacity(clauses.len() + 1);
    children.push(subject);
    children.extend(clauses);
    Term::generated(CASE, children)
}

pub fn clause(head: Term, body: Term) -> Term {
    Term::generated(CLAUSE, vec![head, body])
}

pub fn when(pattern: Term, guard: Term) -> Term {
    Term::generated(WHEN, vec![pattern, guard])
}

pub fn match_(pattern: Term, value: Term) -> Term {
    Term::generated(MATCH, vec![pattern, value])
}

pub fn pin(var: Term) -> Term {
    Term::generated(PIN, vec![var])
}

pub fn block(exprs: Vec<Term>) -> Term {
    Term::generated(BLOCK, exprs)
}

pub fn call(target: Term, name: &str, args: Vec<Term>) -> Term {
    let mut children = Vec::with_capacity(args.len() + 2);
    children.push(target);
    children.push(Term::atom(name));
    children.extend(args);
    Term::generated(CALL, children)
}

/// Call into the kernel module, e.g. `kernel.falsy?(x)`.
pub fn kernel(name: &str, args: Vec<Term>) -> Term {
    call(Term::atom(KERNEL), name, args)
}

pub fn raise(kind: &str, message: impl Into<String>, extra: Vec<Term>) -> Term {
    let mut children = vec![Term::atom(kind), Term::str(message)];
    children.extend(extra);
    Term::generated(RAISE, children)
}

pub fn binary(segments: Vec<Term>) -> Term {
    Term::generated(BINARY, segments)
}

pub fn typed(value: Term, ty: &str) -> Term {
    Term::generated(TYPED, vec![value, Term::atom(ty)])
}

pub fn cons(head: Term, tail: Term) -> Term {
    Term::generated(CONS, vec![head, tail])
}

pub fn def(head: Term, body: Term) -> Term {
    Term::generated(DEF, vec![head, body])
}

pub fn dont_care() -> Term {
    Term::node(DONT_CARE, vec![])
}

/// Splits a clause head into its pattern and optional guard.
pub fn split_guard(head: &Term) -> (&Term, Option<&Term>) {
    match head.as_node(WHEN) {
        Some([pattern, guard]) => (pattern, Some(guard)),
        _ => (head, None),
    }
}

/// A literal known at expansion time to be truthy.
pub fn is_truthy_constant(term: &Term) -> bool {
    matches!(term, Term::Literal(lit) if !lit.is_falsy())
}

pub fn is_falsy_constant(term: &Term) -> bool {
    matches!(term, Term::Literal(Literal::Nil | Literal::Bool(false)))
}
