//! # Keel Test Helpers
//!
//! Term builders shared by the integration tests. Every program runs through
//! an isolated `ExecutionPipeline`, so record schemas never leak between tests.

#![allow(dead_code)]

use keel::ast::{prim, Term};
use keel::engine::ExecutionPipeline;
use keel::runtime::value::Value;
use keel::KeelError;

pub fn pipeline() -> ExecutionPipeline {
    ExecutionPipeline::isolated()
}

/// Expands and evaluates `term` in a fresh pipeline.
pub fn run(term: Term) -> Result<Value, KeelError> {
    pipeline().execute(term)
}

pub fn run_in_module(module: &str, term: Term) -> Result<Value, KeelError> {
    pipeline().with_module(module).execute(term)
}

pub fn expand(term: Term) -> Result<Term, KeelError> {
    pipeline().expand(term)
}

// ============================================================================
// TERM BUILDERS
// ============================================================================

pub fn node(tag: &str, children: Vec<Term>) -> Term {
    Term::node(tag, children)
}

pub fn var(name: &str) -> Term {
    Term::var(name)
}

pub fn block(exprs: Vec<Term>) -> Term {
    prim::block(exprs)
}

pub fn assign(pattern: Term, value: Term) -> Term {
    prim::match_(pattern, value)
}

pub fn kw(entries: Vec<(&str, Term)>) -> Term {
    Term::seq(
        entries
            .into_iter()
            .map(|(k, v)| Term::keyword(k, v))
            .collect(),
    )
}

pub fn ok(value: Term) -> Term {
    Term::pair(Term::atom("ok"), value)
}

pub fn match_q(pattern: Term, expr: Term) -> Term {
    node("match?", vec![pattern, expr])
}

pub fn cond(clauses: Vec<(Term, Term)>) -> Term {
    node(
        "cond",
        clauses
            .into_iter()
            .map(|(c, b)| prim::clause(c, b))
            .collect(),
    )
}

/// Right-nested `a <> b <> c`.
pub fn concat(operands: Vec<Term>) -> Term {
    let mut iter = operands.into_iter().rev();
    let last = iter.next().unwrap_or_else(|| Term::str(""));
    iter.fold(last, |acc, operand| node("<>", vec![operand, acc]))
}

pub fn case(subject: Term, clauses: Vec<(Term, Term)>) -> Term {
    prim::case(
        subject,
        clauses
            .into_iter()
            .map(|(h, b)| prim::clause(h, b))
            .collect(),
    )
}

pub fn gt(a: Term, b: Term) -> Term {
    prim::kernel(">", vec![a, b])
}

pub fn ints(ns: &[i64]) -> Value {
    Value::list(ns.iter().map(|n| Value::Int(*n)))
}

pub fn int_seq(ns: &[i64]) -> Term {
    Term::seq(ns.iter().map(|n| Term::int(*n)).collect())
}

pub fn user_record() -> Term {
    node(
        "defrecord",
        vec![
            Term::atom("User"),
            kw(vec![("name", Term::nil()), ("age", Term::int(0))]),
        ],
    )
}
