//! Recursive expansion driver.
//!
//! Walks a term top-down. A node whose tag names a registered lowerer is
//! replaced by the lowerer's output, which is expanded again until no
//! construct remains. Every other node is rebuilt from its expanded children,
//! with the lexical context adjusted for the position each child occupies:
//! match heads are patterns, guards are guards, and clause bodies see the
//! variables their head binds.

use crate::ast::{prim, ScopeTag, Term};
use crate::macros::bindings::{exported_bindings, pattern_variables};
use crate::macros::context::LexicalContext;
use crate::macros::types::{MacroEnv, MacroExpansionStep, MacroProvenance};
use crate::{err_msg, expansion_err, KeelError};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Fully expands `term` in a plain expression context.
pub fn expand(term: Term, env: &mut MacroEnv) -> Result<Term, KeelError> {
    expand_in(term, env, &LexicalContext::new())
}

/// Fully expands `term` in the given lexical context.
///
/// Scope tags at or above [`ScopeTag::GENERATED_BASE`] belong to the engine;
/// input carrying one is rejected so generated binders cannot capture it.
pub fn expand_in(term: Term, env: &mut MacroEnv, ctx: &LexicalContext) -> Result<Term, KeelError> {
    if let Some(sym) = term.generated_symbol() {
        return Err(err_msg!(
            Input,
            "variable {} uses reserved scope tag {} (tags from {} are engine-generated)",
            sym.name,
            sym.scope.0,
            ScopeTag::GENERATED_BASE
        ));
    }
    expand_term(term, env, ctx, 0)
}

// ============================================================================
// EXPANSION
// ============================================================================

fn expand_term(
    term: Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Term, KeelError> {
    let Some((construct, provenance, expanded)) = expand_once(&term, env, ctx, depth)? else {
        return map_term(term, env, ctx, depth);
    };
    tracing::trace!(
        construct = construct.as_str(),
        depth,
        input = %term,
        output = %expanded,
        "expanded construct"
    );
    if env.config.trace {
        env.trace.push(MacroExpansionStep {
            construct,
            provenance,
            input: term,
            output: expanded.clone(),
        });
    }
    expand_term(expanded, env, ctx, depth + 1)
}

/// Applies the lowerer registered for the node's tag, if any.
fn expand_once(
    term: &Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Option<(String, MacroProvenance, Term)>, KeelError> {
    let Some(tag) = term.tag() else {
        return Ok(None);
    };
    let Some((provenance, func)) = env.lookup_macro(tag) else {
        return Ok(None);
    };
    if depth >= env.config.max_depth {
        return Err(expansion_err!(
            tag,
            term,
            "expansion recursion limit ({}) exceeded",
            env.config.max_depth
        ));
    }
    let construct = tag.to_string();
    let expanded = func(term, env, ctx).map_err(|e| e.or_span(term.span()))?;
    Ok(Some((construct, provenance, expanded)))
}

// ============================================================================
// TRAVERSAL
// ============================================================================

/// Rebuilds a term from its expanded children.
fn map_term(
    term: Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Term, KeelError> {
    match term {
        Term::Literal(_) | Term::Symbol(_) => Ok(term),
        Term::Pair(left, right) => Ok(Term::Pair(
            Box::new(expand_term(*left, env, ctx, depth)?),
            Box::new(expand_term(*right, env, ctx, depth)?),
        )),
        Term::Sequence(items) => Ok(Term::Sequence(map_all(items, env, ctx, depth)?)),
        Term::Aggregate { tag, elements } => Ok(Term::Aggregate {
            tag,
            elements: map_all(elements, env, ctx, depth)?,
        }),
        Term::Node {
            tag,
            meta,
            children,
        } => {
            let children = map_node_children(&tag, children, env, ctx, depth)?;
            Ok(Term::Node {
                tag,
                meta,
                children,
            })
        }
    }
}

fn map_all(
    terms: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    terms
        .into_iter()
        .map(|t| expand_term(t, env, ctx, depth))
        .collect()
}

fn map_node_children(
    tag: &str,
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    match tag {
        prim::PIN => Ok(children),
        prim::MATCH => map_match(children, env, ctx, depth),
        prim::CASE => map_case(children, env, ctx, depth),
        prim::CLAUSE => map_clause(children, env, ctx, depth),
        prim::WHEN => map_when(children, env, ctx, depth),
        prim::BLOCK => map_block(children, env, ctx, depth),
        prim::DEF => map_def(children, env, ctx, depth),
        prim::TYPED => map_typed(children, env, ctx, depth),
        _ => map_all(children, env, ctx, depth),
    }
}

/// `pattern = value`: the left side is a pattern.
fn map_match(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut iter = children.into_iter();
    let (Some(pattern), Some(value), None) = (iter.next(), iter.next(), iter.next()) else {
        return Err(err_msg!(Internal, "`=` expects a pattern and a value"));
    };
    // Inside a pattern both sides are patterns.
    let value = expand_term(value, env, ctx, depth)?;
    let pattern = expand_term(pattern, env, &ctx.to_match(), depth)?;
    Ok(vec![pattern, value])
}

fn map_case(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut iter = children.into_iter();
    let Some(subject) = iter.next() else {
        return Ok(Vec::new());
    };
    let subject = expand_term(subject, env, ctx, depth)?;
    // Bindings exported by the subject are visible inside every clause.
    let clause_ctx = ctx.to_expr().with_bindings(exported_bindings(&subject));
    let mut out = vec![subject];
    for clause in iter {
        out.push(expand_term(clause, env, &clause_ctx, depth)?);
    }
    Ok(out)
}

/// `head -> body`: the head is a (possibly guarded) pattern, the body sees
/// its bindings.
fn map_clause(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut iter = children.into_iter();
    let (Some(head), Some(body), None) = (iter.next(), iter.next(), iter.next()) else {
        return Err(err_msg!(Internal, "a clause expects a head and a body"));
    };
    let head = expand_head(head, env, ctx, depth)?;
    let (pattern, _) = prim::split_guard(&head);
    let body_ctx = ctx.to_expr().with_bindings(pattern_variables(pattern));
    let body = expand_term(body, env, &body_ctx, depth)?;
    Ok(vec![head, body])
}

/// Expands a clause head. A `when` head routes its own sides.
fn expand_head(
    head: Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Term, KeelError> {
    if head.is_node(prim::WHEN) {
        return expand_term(head, env, ctx, depth);
    }
    expand_term(head, env, &ctx.to_match(), depth)
}

fn map_when(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut iter = children.into_iter();
    let (Some(pattern), Some(guard), None) = (iter.next(), iter.next(), iter.next()) else {
        return Err(err_msg!(Internal, "`when` expects a pattern and a guard"));
    };
    let pattern = expand_term(pattern, env, &ctx.to_match(), depth)?;
    let guard_ctx = ctx.to_guard().with_bindings(pattern_variables(&pattern));
    let guard = expand_term(guard, env, &guard_ctx, depth)?;
    Ok(vec![pattern, guard])
}

/// Sequential expressions; bindings made by one are visible to the next.
fn map_block(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut scope = ctx.clone();
    let mut out = Vec::with_capacity(children.len());
    for expr in children {
        let expr = expand_term(expr, env, &scope, depth)?;
        for sym in exported_bindings(&expr) {
            scope.bind(sym);
        }
        out.push(expr);
    }
    Ok(out)
}

/// `def name(params) do body end`: parameters are patterns, defaults are
/// expressions, and the body sees the parameters.
fn map_def(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut iter = children.into_iter();
    let (Some(head), Some(body), None) = (iter.next(), iter.next(), iter.next()) else {
        return Err(err_msg!(Internal, "`def` expects a head and a body"));
    };
    let head = match head {
        Term::Node {
            tag,
            meta,
            children,
        } => {
            let mut params = Vec::with_capacity(children.len());
            for param in children {
                params.push(expand_param(param, env, ctx, depth)?);
            }
            Term::Node {
                tag,
                meta,
                children: params,
            }
        }
        other => other,
    };
    let mut bound = Vec::new();
    if let Term::Node { children, .. } = &head {
        for param in children {
            let pattern = param
                .as_node(prim::DEFAULT)
                .and_then(|c| c.first())
                .unwrap_or(param);
            bound.extend(pattern_variables(pattern));
        }
    }
    let body = expand_term(body, env, &ctx.to_expr().with_bindings(bound), depth)?;
    Ok(vec![head, body])
}

fn expand_param(
    param: Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Term, KeelError> {
    if let Some([pattern, default]) = param.as_node(prim::DEFAULT) {
        let pattern = expand_term(pattern.clone(), env, &ctx.to_match(), depth)?;
        let default = expand_term(default.clone(), env, &ctx.to_expr(), depth)?;
        return Ok(Term::generated(prim::DEFAULT, vec![pattern, default]).with_span(param.span()));
    }
    expand_term(param, env, &ctx.to_match(), depth)
}

/// `value::type`: the type annotation is never expanded.
fn map_typed(
    children: Vec<Term>,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
    depth: usize,
) -> Result<Vec<Term>, KeelError> {
    let mut iter = children.into_iter();
    let Some(value) = iter.next() else {
        return Ok(Vec::new());
    };
    let mut out = vec![expand_term(value, env, ctx, depth)?];
    out.extend(iter);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::registry::build_isolated_macro_env;

    #[test]
    fn plain_terms_pass_through() {
        let mut env = build_isolated_macro_env();
        let term = prim::call(Term::atom("lists"), "reverse", vec![Term::var("l")]);
        assert_eq!(expand(term.clone(), &mut env).unwrap(), term);
        assert!(env.trace().is_empty());
    }

    #[test]
    fn constructs_are_expanded_until_only_primitives_remain() {
        let mut env = build_isolated_macro_env();
        let term = Term::node(
            "if",
            vec![
                Term::node("match?", vec![Term::atom("ok"), Term::var("v")]),
                Term::int(1),
                Term::int(2),
            ],
        );
        let out = expand(term, &mut env).unwrap();
        assert!(out.is_node(prim::CASE));
        assert!(!out.pretty().contains("match?"));
        let steps: Vec<_> = env.trace().iter().map(|s| s.construct.as_str()).collect();
        assert_eq!(steps, vec!["if", "match?"]);
    }

    #[test]
    fn clause_heads_are_expanded_in_match_context() {
        let mut env = build_isolated_macro_env();
        let term = prim::case(
            Term::var("s"),
            vec![prim::clause(
                Term::node("<>", vec![Term::str("ab"), Term::var("rest")]),
                Term::var("rest"),
            )],
        );
        let out = expand(term, &mut env).unwrap();
        let Some([_, clause]) = out.as_node(prim::CASE) else {
            panic!("expected case, got {}", out);
        };
        let Some([head, _]) = clause.as_node(prim::CLAUSE) else {
            panic!("expected clause");
        };
        assert_eq!(head.pretty(), "<<\"ab\", rest::binary>>");
    }

    #[test]
    fn depth_limit_is_reported() {
        fn forever(_: &Term, _: &mut MacroEnv, _: &LexicalContext) -> Result<Term, KeelError> {
            Ok(Term::node("forever", vec![]))
        }
        let mut env = build_isolated_macro_env();
        env.user_macros.register("forever", forever);
        let err = expand(Term::node("forever", vec![]), &mut env).unwrap_err();
        assert!(err.to_string().contains("recursion limit (128)"));
    }

    #[test]
    fn tracing_can_be_disabled() {
        let mut env = build_isolated_macro_env();
        env.config.trace = false;
        let term = Term::node("unless", vec![Term::bool(true), Term::int(1)]);
        expand(term, &mut env).unwrap();
        assert!(env.trace().is_empty());
    }
}
