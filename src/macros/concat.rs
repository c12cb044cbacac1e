//! `<>` chains lowered to a single `<<>>` byte template.
//!
//! The same template is valid on both sides of a match. Constructing, every
//! segment emits its bytes in order. Matching, fixed segments must match
//! literally and one variable segment may capture what is left, provided it
//! is the first or the last segment.

use crate::ast::{prim, Literal, Term};
use crate::macros::context::LexicalContext;
use crate::macros::types::MacroEnv;
use crate::{expansion_err, KeelError};

pub const CONCAT: &str = "<>";

/// Result of trying to fold one operand at expansion time.
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Constant(String),
    Dynamic(Term),
}

/// A template segment in match position.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// Pinned variable: matched literally against its current value.
    Bound(Term),
    /// Free variable: captures a variable-length run.
    Free(Term),
}

/// Folds a single operand, rejecting literals that are not binaries.
pub fn try_constant_fold(term: &Term) -> Result<Folded, KeelError> {
    match term {
        Term::Literal(Literal::Str(s)) => Ok(Folded::Constant(s.clone())),
        Term::Literal(_) | Term::Sequence(_) | Term::Pair(..) | Term::Aggregate { .. } => {
            Err(expansion_err!(
                CONCAT,
                term,
                "expected binary argument in <> operator but got: {}",
                term
            ))
        }
        _ => Ok(Folded::Dynamic(term.clone())),
    }
}

/// Flattens a `<>` chain into operands, collapsing adjacent constants.
pub fn flatten(term: &Term) -> Result<Vec<Folded>, KeelError> {
    let mut operands = Vec::new();
    collect(term, &mut operands)?;
    let mut out: Vec<Folded> = Vec::with_capacity(operands.len());
    for operand in operands {
        match (out.last_mut(), operand) {
            (Some(Folded::Constant(prev)), Folded::Constant(next)) => prev.push_str(&next),
            (_, operand) => out.push(operand),
        }
    }
    Ok(out)
}

fn collect(term: &Term, out: &mut Vec<Folded>) -> Result<(), KeelError> {
    if let Some(children) = term.as_node(CONCAT) {
        let [left, right] = children else {
            return Err(expansion_err!(CONCAT, term, "<> expects exactly two operands"));
        };
        collect(left, out)?;
        return collect(right, out);
    }
    out.push(try_constant_fold(term)?);
    Ok(())
}

/// Lowers `left <> right` in construction or match position.
pub fn expand_concat(
    term: &Term,
    _env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    let operands = flatten(term)?;
    if ctx.in_match {
        let segments = classify_segments(term, operands)?;
        return Ok(match_template(segments).with_span(term.span()));
    }
    if let [Folded::Constant(s)] = operands.as_slice() {
        return Ok(Term::str(s.clone()));
    }
    let segments = operands
        .into_iter()
        .map(|operand| match operand {
            Folded::Constant(s) => Term::str(s),
            Folded::Dynamic(t) => prim::typed(t, "binary"),
        })
        .collect();
    Ok(prim::binary(segments).with_span(term.span()))
}

fn classify_segments(term: &Term, operands: Vec<Folded>) -> Result<Vec<Segment>, KeelError> {
    let segments = operands
        .into_iter()
        .map(|operand| match operand {
            Folded::Constant(s) => Ok(Segment::Literal(s)),
            Folded::Dynamic(t) if t.is_node(prim::PIN) => Ok(Segment::Bound(t)),
            Folded::Dynamic(t) if t.as_symbol().is_some() => Ok(Segment::Free(t)),
            Folded::Dynamic(t) => Err(expansion_err!(
                CONCAT,
                &t,
                "invalid argument for <> operator inside a match, expected a literal binary or a variable"
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let free: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, Segment::Free(_)))
        .map(|(i, _)| i)
        .collect();
    match free.as_slice() {
        [] => Ok(segments),
        [i] if *i == 0 || *i == segments.len() - 1 => Ok(segments),
        [_] => Err(expansion_err!(
            CONCAT,
            term,
            "a variable-length segment inside a <> match must be the first or the last segment"
        )),
        _ => Err(expansion_err!(
            CONCAT,
            term,
            "a <> match may contain at most one variable-length segment"
        )),
    }
}

fn match_template(segments: Vec<Segment>) -> Term {
    prim::binary(
        segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(s) => Term::str(s),
                Segment::Bound(t) | Segment::Free(t) => prim::typed(t, "binary"),
            })
            .collect(),
    )
}
