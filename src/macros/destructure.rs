//! `destructure([p1, ..., pn], expr)`: binds patterns against a list of any
//! length.
//!
//! Each step matches head and tail while the remaining list is non-empty,
//! and binds the pattern to `nil` once it reaches `[]` or `nil`. The steps
//! export their bindings, so the patterns stay bound after the construct.

use crate::ast::{prim, Term};
use crate::macros::context::LexicalContext;
use crate::macros::types::MacroEnv;
use crate::{expansion_err, KeelError};

pub const DESTRUCTURE: &str = "destructure";

pub fn expand_destructure(
    term: &Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    ctx.reject_guard(DESTRUCTURE, term)?;
    ctx.reject_match(DESTRUCTURE, term)?;
    let Some([patterns, expr]) = term.as_node(DESTRUCTURE) else {
        return Err(expansion_err!(
            DESTRUCTURE,
            term,
            "destructure expects a list of patterns and an expression"
        ));
    };
    let Term::Sequence(patterns) = patterns else {
        return Err(expansion_err!(
            DESTRUCTURE,
            patterns,
            "destructure requires a list on the left side, got: {}",
            patterns
        ));
    };

    let mut acc = expr.clone();
    for pattern in patterns {
        acc = destructure_step(pattern.clone(), acc, env);
    }
    Ok(acc)
}

/// `case acc { [p | t] -> t; other when other == [] or other == nil -> p = nil }`
fn destructure_step(pattern: Term, acc: Term, env: &mut MacroEnv) -> Term {
    let tail = env.fresh_var("tail");
    let other = env.fresh_var("other");
    let exhausted = prim::kernel(
        "or",
        vec![
            prim::kernel("==", vec![other.clone(), Term::seq(vec![])]),
            prim::kernel("==", vec![other.clone(), Term::nil()]),
        ],
    );
    prim::case(
        acc,
        vec![
            prim::clause(prim::cons(pattern.clone(), tail.clone()), tail),
            prim::clause(
                prim::when(other, exhausted),
                prim::match_(pattern, Term::nil()),
            ),
        ],
    )
    .exporting_bindings()
}
