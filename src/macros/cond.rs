//! `cond`, `if` and `unless`: clause chains lowered to nested binary cases.
//!
//! The chain folds right to left. Each clause wraps the accumulator in
//!
//! ```text
//! case c do
//!   x when kernel.falsy?(x) -> acc
//!   _ -> body
//! end
//! ```
//!
//! and the innermost accumulator raises `cond_clause` unless the last clause
//! is a default branch.

use crate::ast::{prim, Term};
use crate::macros::context::LexicalContext;
use crate::macros::types::MacroEnv;
use crate::{expansion_err, KeelError};

pub const COND: &str = "cond";
pub const IF: &str = "if";
pub const UNLESS: &str = "unless";

/// Raised at run time when no clause condition is truthy.
pub const NO_CLAUSE_KIND: &str = "cond_clause";
pub const NO_CLAUSE_MESSAGE: &str = "no cond clause evaluated to a truthy value";

/// How a condition is lowered, decided before any term is emitted.
#[derive(Debug, Clone, PartialEq)]
enum Condition<'a> {
    /// The don't-care form: always selected.
    Default,
    /// A literal known to be truthy: always selected.
    Truthy,
    /// A literal known to be falsy: never selected.
    Falsy,
    /// Evaluated at run time.
    Dynamic(&'a Term),
}

fn classify<'a>(construct: &str, condition: &'a Term) -> Result<Condition<'a>, KeelError> {
    if condition.is_wildcard() {
        return Err(KeelError::Expansion {
            construct: construct.to_string(),
            message: "unbound variable _ inside cond. If you want the last clause to always \
                      match, use a truthy value instead"
                .to_string(),
            term: condition.pretty(),
            ctx: crate::ErrorContext {
                help: Some("replace `_ ->` with `true ->`".to_string()),
                span: Some(condition.span()).filter(|s| !s.is_empty()),
                ..crate::ErrorContext::none()
            },
            source: None,
        });
    }
    if condition.is_node(prim::DONT_CARE) {
        return Ok(Condition::Default);
    }
    if prim::is_falsy_constant(condition) {
        return Ok(Condition::Falsy);
    }
    if prim::is_truthy_constant(condition) {
        return Ok(Condition::Truthy);
    }
    Ok(Condition::Dynamic(condition))
}

/// Lowers `cond(c1 -> b1, c2 -> b2, ...)`.
pub fn expand_cond(term: &Term, env: &mut MacroEnv, ctx: &LexicalContext) -> Result<Term, KeelError> {
    ctx.reject_guard(COND, term)?;
    ctx.reject_match(COND, term)?;
    let Some(clauses) = term.as_node(COND) else {
        return Err(expansion_err!(COND, term, "malformed cond"));
    };
    if clauses.is_empty() {
        return Err(expansion_err!(COND, term, "cond requires at least one clause"));
    }
    let pairs = clauses
        .iter()
        .map(|clause| match clause.as_node(prim::CLAUSE) {
            Some([condition, body]) => Ok((condition, body)),
            _ => Err(expansion_err!(
                COND,
                clause,
                "expected `condition -> body` clauses in cond"
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    lower_clause_chain(COND, &pairs, None, env)
}

/// Lowers `if(c, then)`, `if(c, then, else)` or `if(c, [do: then, else: e])`.
pub fn expand_if(term: &Term, env: &mut MacroEnv, ctx: &LexicalContext) -> Result<Term, KeelError> {
    ctx.reject_guard(IF, term)?;
    ctx.reject_match(IF, term)?;
    let (condition, then, otherwise) = branches(IF, term)?;
    lower_clause_chain(IF, &[(condition, &then)], Some(otherwise), env)
}

/// Lowers `unless` as `if` with the branches swapped.
pub fn expand_unless(
    term: &Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    ctx.reject_guard(UNLESS, term)?;
    ctx.reject_match(UNLESS, term)?;
    let (condition, then, otherwise) = branches(UNLESS, term)?;
    lower_clause_chain(UNLESS, &[(condition, &otherwise)], Some(then), env)
}

/// Extracts the condition and both branches; a missing else is `nil`.
fn branches<'a>(construct: &str, term: &'a Term) -> Result<(&'a Term, Term, Term), KeelError> {
    let Some(children) = term.as_node(construct) else {
        return Err(expansion_err!(construct, term, "malformed {}", construct));
    };
    match children {
        [condition, opts] if opts.as_keywords().is_some_and(|kw| !kw.is_empty()) => {
            let mut then = None;
            let mut otherwise = None;
            for (key, value) in opts.as_keywords().unwrap_or_default() {
                match key {
                    "do" => then = Some(value.clone()),
                    "else" => otherwise = Some(value.clone()),
                    other => {
                        return Err(expansion_err!(
                            construct,
                            term,
                            "invalid option {} for {}, expected do or else",
                            other,
                            construct
                        ))
                    }
                }
            }
            let Some(then) = then else {
                return Err(expansion_err!(construct, term, "{} requires a do option", construct));
            };
            Ok((condition, then, otherwise.unwrap_or_else(Term::nil)))
        }
        [condition, then] => Ok((condition, then.clone(), Term::nil())),
        [condition, then, otherwise] => Ok((condition, then.clone(), otherwise.clone())),
        _ => Err(expansion_err!(
            construct,
            term,
            "{} expects a condition and one or two branches",
            construct
        )),
    }
}

/// Folds `(condition, body)` pairs right to left into nested cases.
///
/// With `fallback`, reaching the end of the chain yields it instead of
/// raising.
pub fn lower_clause_chain(
    construct: &str,
    clauses: &[(&Term, &Term)],
    fallback: Option<Term>,
    env: &mut MacroEnv,
) -> Result<Term, KeelError> {
    let classified = clauses
        .iter()
        .map(|(condition, body)| Ok((classify(construct, condition)?, *body)))
        .collect::<Result<Vec<_>, KeelError>>()?;

    let mut acc =
        fallback.unwrap_or_else(|| prim::raise(NO_CLAUSE_KIND, NO_CLAUSE_MESSAGE, Vec::new()));
    for (condition, body) in classified.into_iter().rev() {
        acc = match condition {
            Condition::Default | Condition::Truthy => body.clone(),
            Condition::Falsy => acc,
            Condition::Dynamic(condition) => {
                let x = env.fresh_var("x");
                prim::case(
                    condition.clone(),
                    vec![
                        prim::clause(
                            prim::when(x.clone(), prim::kernel("falsy?", vec![x])),
                            acc,
                        ),
                        prim::clause(Term::wildcard(), body.clone()),
                    ],
                )
            }
        };
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::types::MacroFn;
    use crate::runtime::registry::build_isolated_macro_env;

    fn cond(clauses: Vec<(Term, Term)>) -> Term {
        Term::node(
            COND,
            clauses
                .into_iter()
                .map(|(c, b)| prim::clause(c, b))
                .collect(),
        )
    }

    fn lower(term: &Term) -> Result<Term, KeelError> {
        let mut env = build_isolated_macro_env();
        expand_cond(term, &mut env, &LexicalContext::new())
    }

    #[test]
    fn dynamic_conditions_nest_right_to_left() {
        let out = lower(&cond(vec![
            (Term::var("a"), Term::int(1)),
            (Term::var("b"), Term::int(2)),
        ]))
        .unwrap();
        let Some([subject, falsy, truthy]) = out.as_node(prim::CASE) else {
            panic!("expected case, got {}", out);
        };
        assert_eq!(subject, &Term::var("a"));
        assert_eq!(truthy.pretty(), "_ -> 1");
        let Some([_, inner]) = falsy.as_node(prim::CLAUSE) else {
            panic!("expected clause");
        };
        let Some([subject, falsy, _]) = inner.as_node(prim::CASE) else {
            panic!("expected nested case");
        };
        assert_eq!(subject, &Term::var("b"));
        let Some([_, last]) = falsy.as_node(prim::CLAUSE) else {
            panic!("expected clause");
        };
        assert_eq!(
            last.pretty(),
            "raise :cond_clause, \"no cond clause evaluated to a truthy value\""
        );
    }

    #[test]
    fn falsy_test_is_a_guard_safe_kernel_call() {
        let out = lower(&cond(vec![(Term::var("a"), Term::int(1))])).unwrap();
        let Some([_, falsy, _]) = out.as_node(prim::CASE) else {
            panic!("expected case");
        };
        let Some([head, _]) = falsy.as_node(prim::CLAUSE) else {
            panic!("expected clause");
        };
        let (pattern, guard) = prim::split_guard(head);
        let x = pattern.as_symbol().unwrap();
        assert!(x.scope.is_generated());
        assert_eq!(
            guard.unwrap(),
            &prim::kernel("falsy?", vec![pattern.clone()])
        );
    }

    #[test]
    fn dont_care_and_truthy_literals_end_the_chain() {
        let out = lower(&cond(vec![
            (Term::var("a"), Term::int(1)),
            (prim::dont_care(), Term::int(2)),
        ]))
        .unwrap();
        assert!(!out.pretty().contains("raise"));

        let out = lower(&cond(vec![
            (Term::bool(true), Term::int(1)),
            (Term::var("b"), Term::int(2)),
        ]))
        .unwrap();
        assert_eq!(out, Term::int(1));
    }

    #[test]
    fn falsy_literals_are_dropped() {
        let out = lower(&cond(vec![
            (Term::nil(), Term::int(1)),
            (Term::bool(false), Term::int(2)),
        ]))
        .unwrap();
        assert!(out.is_node(prim::RAISE));
    }

    #[test]
    fn bare_wildcard_variable_is_rejected() {
        let err = lower(&cond(vec![
            (Term::var("a"), Term::int(1)),
            (Term::wildcard(), Term::int(2)),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("unbound variable _ inside cond"));
        let report = format!("{:?}", miette::Report::new(err));
        assert!(report.contains("true ->"));
    }

    #[test]
    fn empty_cond_is_rejected() {
        let err = lower(&Term::node(COND, vec![])).unwrap_err();
        assert!(err.to_string().contains("at least one clause"));
    }

    #[test]
    fn if_defaults_missing_else_to_nil() {
        let mut env = build_isolated_macro_env();
        let term = Term::node(IF, vec![Term::var("c"), Term::int(1)]);
        let out = expand_if(&term, &mut env, &LexicalContext::new()).unwrap();
        let Some([_, falsy, truthy]) = out.as_node(prim::CASE) else {
            panic!("expected case");
        };
        assert!(falsy.pretty().ends_with("-> nil"));
        assert_eq!(truthy.pretty(), "_ -> 1");
    }

    #[test]
    fn if_and_unless_are_rejected_in_guards() {
        let mut env = build_isolated_macro_env();
        let guard = LexicalContext::new().to_guard();
        for (name, lower) in [(IF, expand_if as MacroFn), (UNLESS, expand_unless)] {
            let term = Term::node(name, vec![Term::var("c"), Term::int(1), Term::int(2)]);
            let err = lower(&term, &mut env, &guard).unwrap_err();
            assert!(err.to_string().contains("not allowed in guards"));
        }
    }

    #[test]
    fn if_accepts_keyword_branches_and_unless_swaps() {
        let mut env = build_isolated_macro_env();
        let kw = Term::seq(vec![
            Term::keyword("do", Term::int(1)),
            Term::keyword("else", Term::int(2)),
        ]);
        let out = expand_unless(
            &Term::node(UNLESS, vec![Term::var("c"), kw]),
            &mut env,
            &LexicalContext::new(),
        )
        .unwrap();
        let Some([_, falsy, truthy]) = out.as_node(prim::CASE) else {
            panic!("expected case");
        };
        assert!(falsy.pretty().ends_with("-> 1"));
        assert_eq!(truthy.pretty(), "_ -> 2");
    }
}
