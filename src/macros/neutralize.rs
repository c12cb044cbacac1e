//! `match?(pattern, expr)`: a pattern used as a boolean test.
//!
//! Every free variable of the pattern is renamed to an underscore-prefixed
//! neutral variable in a fresh scope. The neutral variable matches anything,
//! binds only inside the generated clause, and never collides with a variable
//! of the enclosing scope. A guard attached to the pattern is rewritten with
//! the same table, but only for variables the pattern side already renamed;
//! anything else in the guard refers to the enclosing scope and stays as is.

use crate::ast::{prim, Term};
use crate::macros::bindings::BindingTable;
use crate::macros::context::LexicalContext;
use crate::macros::types::MacroEnv;
use crate::{expansion_err, KeelError};

pub const MATCH_Q: &str = "match?";

/// Lowers `match?(pattern, expr)`.
pub fn expand_match_q(
    term: &Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    ctx.reject_guard(MATCH_Q, term)?;
    ctx.reject_match(MATCH_Q, term)?;
    let Some([pattern, expr]) = term.as_node(MATCH_Q) else {
        return Err(expansion_err!(
            MATCH_Q,
            term,
            "match? expects a pattern and an expression"
        ));
    };

    if is_catch_all(pattern) {
        return Ok(if expr.is_pure() {
            Term::bool(true)
        } else {
            prim::block(vec![expr.clone(), Term::bool(true)])
        });
    }

    let mut table = BindingTable::new();
    let head = neutralize_head(pattern, &mut table, env, ctx)?;
    Ok(prim::case(
        expr.clone(),
        vec![
            prim::clause(head, Term::bool(true)),
            prim::clause(Term::wildcard(), Term::bool(false)),
        ],
    )
    .with_span(term.span()))
}

fn is_catch_all(pattern: &Term) -> bool {
    pattern.is_wildcard() || pattern.is_node(prim::DONT_CARE)
}

/// Rewrites a possibly guarded pattern.
pub fn neutralize_head(
    head: &Term,
    table: &mut BindingTable,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    let (pattern, guard) = prim::split_guard(head);
    let pattern = neutralize_pattern(pattern, table, env, ctx)?;
    match guard {
        Some(guard) => Ok(prim::when(pattern, neutralize_guard(guard, table))),
        None => Ok(pattern),
    }
}

/// Pattern side: every variable except `_` is neutralized. Pinned variables
/// are kept and must be bound in the enclosing scope.
pub fn neutralize_pattern(
    term: &Term,
    table: &mut BindingTable,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    Ok(match term {
        Term::Literal(_) => term.clone(),
        Term::Symbol(sym) if sym.is_wildcard() => term.clone(),
        Term::Symbol(sym) => Term::Symbol(table.neutralize(sym, || env.fresh_scope())),
        Term::Pair(left, right) => Term::pair(
            neutralize_pattern(left, table, env, ctx)?,
            neutralize_pattern(right, table, env, ctx)?,
        ),
        Term::Sequence(items) => Term::Sequence(neutralize_all(items, table, env, ctx)?),
        Term::Aggregate { tag, elements } => Term::Aggregate {
            tag: tag.clone(),
            elements: neutralize_all(elements, table, env, ctx)?,
        },
        Term::Node { tag, children, .. } if tag == prim::PIN => {
            check_pinned(term, children, ctx)?;
            term.clone()
        }
        Term::Node {
            tag,
            meta,
            children,
        } => Term::Node {
            tag: tag.clone(),
            meta: *meta,
            children: neutralize_all(children, table, env, ctx)?,
        },
    })
}

fn neutralize_all(
    terms: &[Term],
    table: &mut BindingTable,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Vec<Term>, KeelError> {
    terms
        .iter()
        .map(|t| neutralize_pattern(t, table, env, ctx))
        .collect()
}

fn check_pinned(term: &Term, children: &[Term], ctx: &LexicalContext) -> Result<(), KeelError> {
    let Some(sym) = children.first().and_then(Term::as_symbol) else {
        return Err(expansion_err!(
            MATCH_Q,
            term,
            "the pin operator ^ expects a variable"
        ));
    };
    if !ctx.is_visible(sym) {
        return Err(expansion_err!(
            MATCH_Q,
            term,
            "undefined variable ^{}",
            sym.name
        ));
    }
    Ok(())
}

/// Guard side: only variables already renamed on the pattern side change.
pub fn neutralize_guard(term: &Term, table: &BindingTable) -> Term {
    match term {
        Term::Literal(_) => term.clone(),
        Term::Symbol(sym) => match table.replacement(sym) {
            Some(neutral) => Term::Symbol(neutral.clone()),
            None => term.clone(),
        },
        Term::Pair(left, right) => Term::pair(
            neutralize_guard(left, table),
            neutralize_guard(right, table),
        ),
        Term::Sequence(items) => {
            Term::Sequence(items.iter().map(|t| neutralize_guard(t, table)).collect())
        }
        Term::Aggregate { tag, elements } => Term::Aggregate {
            tag: tag.clone(),
            elements: elements.iter().map(|t| neutralize_guard(t, table)).collect(),
        },
        Term::Node {
            tag,
            meta,
            children,
        } => Term::Node {
            tag: tag.clone(),
            meta: *meta,
            children: children.iter().map(|t| neutralize_guard(t, table)).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ScopeTag, Symbol};
    use crate::runtime::registry::build_isolated_macro_env;

    fn match_q(pattern: Term, expr: Term) -> Term {
        Term::node(MATCH_Q, vec![pattern, expr])
    }

    fn lower(term: &Term, ctx: &LexicalContext) -> Result<Term, KeelError> {
        let mut env = build_isolated_macro_env();
        expand_match_q(term, &mut env, ctx)
    }

    fn clauses(out: &Term) -> (&Term, &Term) {
        let Some([_, hit, miss]) = out.as_node(prim::CASE) else {
            panic!("expected a two-clause case, got {}", out);
        };
        (hit, miss)
    }

    #[test]
    fn pattern_variables_are_neutralized() {
        let term = match_q(
            Term::pair(Term::atom("ok"), Term::var("value")),
            Term::var("result"),
        );
        let out = lower(&term, &LexicalContext::new()).unwrap();
        let (hit, miss) = clauses(&out);
        let Some([head, body]) = hit.as_node(prim::CLAUSE) else {
            panic!("expected clause");
        };
        let Term::Pair(_, var) = head else {
            panic!("expected pair pattern");
        };
        let sym = var.as_symbol().unwrap();
        assert_eq!(sym.name, "_value");
        assert!(sym.scope.is_generated());
        assert_eq!(body, &Term::bool(true));
        assert_eq!(miss.pretty(), "_ -> false");
    }

    #[test]
    fn guard_rewrites_only_pattern_variables() {
        // match?(x when x > limit, v): x is neutralized on both sides, limit is not.
        let guard = prim::kernel(">", vec![Term::var("x"), Term::var("limit")]);
        let term = match_q(prim::when(Term::var("x"), guard), Term::var("v"));
        let out = lower(&term, &LexicalContext::new()).unwrap();
        let (hit, _) = clauses(&out);
        let Some([head, _]) = hit.as_node(prim::CLAUSE) else {
            panic!("expected clause");
        };
        let (pattern, guard) = prim::split_guard(head);
        let neutral = pattern.as_symbol().unwrap().clone();
        let Some([_, _, left, right]) = guard.unwrap().as_node(prim::CALL) else {
            panic!("expected a kernel call in the guard");
        };
        assert_eq!(left.as_symbol(), Some(&neutral));
        assert_eq!(right, &Term::var("limit"));
    }

    #[test]
    fn repeated_variables_share_one_replacement() {
        let term = match_q(
            Term::pair(Term::var("a"), Term::var("a")),
            Term::var("v"),
        );
        let out = lower(&term, &LexicalContext::new()).unwrap();
        let (hit, _) = clauses(&out);
        let Some([Term::Pair(l, r), _]) = hit.as_node(prim::CLAUSE) else {
            panic!("expected pair clause");
        };
        assert_eq!(l, r);
    }

    #[test]
    fn same_name_in_different_scopes_is_two_variables() {
        let term = match_q(
            Term::pair(Term::var("a"), Term::scoped_var("a", ScopeTag(4))),
            Term::var("v"),
        );
        let out = lower(&term, &LexicalContext::new()).unwrap();
        let (hit, _) = clauses(&out);
        let Some([Term::Pair(l, r), _]) = hit.as_node(prim::CLAUSE) else {
            panic!("expected pair clause");
        };
        assert_ne!(l, r);
    }

    #[test]
    fn pinned_variables_are_kept_when_visible() {
        let term = match_q(prim::pin(Term::var("expected")), Term::var("v"));
        let ctx = LexicalContext::new().with_bindings([Symbol::new("expected", ScopeTag::ROOT)]);
        let out = lower(&term, &ctx).unwrap();
        let (hit, _) = clauses(&out);
        assert_eq!(hit.pretty(), "^expected -> true");

        let err = lower(&term, &LexicalContext::new()).unwrap_err();
        assert!(err.to_string().contains("undefined variable ^expected"));
    }

    #[test]
    fn bare_wildcard_short_circuits() {
        let pure = lower(&match_q(Term::wildcard(), Term::var("v")), &LexicalContext::new());
        assert_eq!(pure.unwrap(), Term::bool(true));

        let effect = Term::node("send", vec![Term::var("pid")]);
        let out = lower(&match_q(Term::wildcard(), effect), &LexicalContext::new()).unwrap();
        assert_eq!(out.pretty(), "(send(pid); true)");
    }

    #[test]
    fn rejected_in_guards() {
        let term = match_q(Term::atom("ok"), Term::var("v"));
        let err = lower(&term, &LexicalContext::new().to_guard()).unwrap_err();
        assert_eq!(err.construct(), Some(MATCH_Q));
    }
}
