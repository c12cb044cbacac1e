//! `defdelegate fun(params), to: target, as: name, append_first: bool`
//!
//! Generates `def fun(params) do target.name(args) end`. Defaulted
//! parameters keep their default in the head; only the variable is
//! forwarded.

use crate::ast::{prim, Literal, Term};
use crate::macros::context::LexicalContext;
use crate::macros::types::MacroEnv;
use crate::{expansion_err, KeelError};

pub const DEFDELEGATE: &str = "defdelegate";

/// Parsed `defdelegate` options.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateOptions {
    pub target: Term,
    pub name: String,
    pub append_first: bool,
}

pub fn expand_defdelegate(
    term: &Term,
    _env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    ctx.reject_guard(DEFDELEGATE, term)?;
    ctx.reject_match(DEFDELEGATE, term)?;
    if ctx.module.is_none() {
        return Err(expansion_err!(
            DEFDELEGATE,
            term,
            "cannot invoke defdelegate outside a module"
        ));
    }
    let Some([head, opts]) = term.as_node(DEFDELEGATE) else {
        return Err(expansion_err!(
            DEFDELEGATE,
            term,
            "defdelegate expects a function head and a keyword list of options"
        ));
    };

    let (fun, params) = match head {
        Term::Node { tag, children, .. } => (tag.as_str(), children.as_slice()),
        Term::Symbol(sym) => (sym.name.as_str(), &[] as &[Term]),
        _ => {
            return Err(expansion_err!(
                DEFDELEGATE,
                head,
                "defdelegate expects a function head, got: {}",
                head
            ))
        }
    };
    let options = parse_options(term, fun, opts)?;

    let mut args = params
        .iter()
        .map(|param| forwarded_argument(term, param))
        .collect::<Result<Vec<_>, _>>()?;
    if options.append_first && !args.is_empty() {
        args.rotate_left(1);
    }

    let head = Term::node(fun, params.to_vec()).with_span(head.span());
    Ok(prim::def(
        head,
        prim::call(options.target, &options.name, args),
    ))
}

pub fn parse_options(term: &Term, fun: &str, opts: &Term) -> Result<DelegateOptions, KeelError> {
    let Some(entries) = opts.as_keywords() else {
        return Err(expansion_err!(
            DEFDELEGATE,
            term,
            "defdelegate options must be a keyword list, got: {}",
            opts
        ));
    };
    let mut target = None;
    let mut name = fun.to_string();
    let mut append_first = false;
    for (key, value) in entries {
        match (key, value) {
            ("to", value) => target = Some(value.clone()),
            ("as", Term::Literal(Literal::Atom(alias))) => name = alias.clone(),
            ("as", other) => {
                return Err(expansion_err!(
                    DEFDELEGATE,
                    term,
                    "the :as option of defdelegate must be an atom, got: {}",
                    other
                ))
            }
            ("append_first", Term::Literal(Literal::Bool(flag))) => append_first = *flag,
            ("append_first", other) => {
                return Err(expansion_err!(
                    DEFDELEGATE,
                    term,
                    "the :append_first option of defdelegate must be a boolean, got: {}",
                    other
                ))
            }
            (unknown, _) => {
                return Err(expansion_err!(
                    DEFDELEGATE,
                    term,
                    "unknown option {} for defdelegate, expected :to, :as or :append_first",
                    unknown
                ))
            }
        }
    }
    let Some(target) = target else {
        return Err(expansion_err!(
            DEFDELEGATE,
            term,
            "missing required :to option for defdelegate {}",
            fun
        ));
    };
    Ok(DelegateOptions {
        target,
        name,
        append_first,
    })
}

/// The variable a parameter forwards: `x` or the `x` of `x \\ default`.
fn forwarded_argument(term: &Term, param: &Term) -> Result<Term, KeelError> {
    let var = param
        .as_node(prim::DEFAULT)
        .and_then(|c| c.first())
        .unwrap_or(param);
    match var.as_symbol() {
        Some(sym) if !sym.is_wildcard() => Ok(var.clone()),
        _ => Err(expansion_err!(
            DEFDELEGATE,
            term,
            "defdelegate only accepts variable parameters, got: {}",
            param
        )),
    }
}
