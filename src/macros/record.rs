//! Records: `defrecord` declares a field layout, `record` resolves field
//! names to positions at expansion time.
//!
//! | form                         | lowers to                              |
//! |------------------------------|----------------------------------------|
//! | `record(Tag, [k: v])`        | aggregate, defaults for missing fields |
//! | same, in a pattern           | aggregate, `_` for missing fields      |
//! | `record(Tag, :field)`        | the field position                     |
//! | `record(Tag, rec, :field)`   | shape-checked field access             |
//! | `record(Tag, rec, [k: v])`   | shape-checked update                   |
//! | `record(Tag, rec)`           | `[name: value, ...]`                   |
//!
//! A tag that is not an atom is only known at run time. Field access then
//! falls back to `record.fetch(tag, rec, field)`; every other form needs the
//! schema at expansion time.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{prim, Literal, Term};
use crate::macros::context::LexicalContext;
use crate::macros::types::MacroEnv;
use crate::runtime::schema::{FieldDescriptor, Schema};
use crate::{expansion_err, KeelError};

pub const DEFRECORD: &str = "defrecord";
pub const RECORD: &str = "record";

/// Module hosting the run-time record helpers.
pub const RECORD_MODULE: &str = "record";
pub const BAD_RECORD_KIND: &str = "bad_record";
pub const UNKNOWN_RECORD_KIND: &str = "unknown_record";

// ============================================================================
// DEFRECORD
// ============================================================================

/// Lowers `defrecord(Tag, [name: default, ...])`, registering the schema.
pub fn expand_defrecord(
    term: &Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    ctx.reject_guard(DEFRECORD, term)?;
    ctx.reject_match(DEFRECORD, term)?;
    let Some([tag, fields]) = term.as_node(DEFRECORD) else {
        return Err(expansion_err!(
            DEFRECORD,
            term,
            "defrecord expects a tag and a list of fields"
        ));
    };
    let Some(tag) = tag.as_atom() else {
        return Err(expansion_err!(
            DEFRECORD,
            tag,
            "record tag must be an atom, got: {}",
            tag
        ));
    };
    let Term::Sequence(entries) = fields else {
        return Err(expansion_err!(
            DEFRECORD,
            fields,
            "record fields must be a list, got: {}",
            fields
        ));
    };

    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let descriptor = field_descriptor(entry, position)?;
        if !seen.insert(descriptor.name.clone()) {
            return Err(expansion_err!(
                DEFRECORD,
                entry,
                "duplicate field {} in record {}",
                descriptor.name,
                tag
            ));
        }
        descriptors.push(descriptor);
    }
    env.register_schema(tag, descriptors)?;
    Ok(Term::atom(tag))
}

/// Reads `name: default`, a bare `:name`, or `(name: default)::type`.
fn field_descriptor(entry: &Term, position: usize) -> Result<FieldDescriptor, KeelError> {
    if let Some([inner, ty]) = entry.as_node(prim::TYPED) {
        let mut descriptor = field_descriptor(inner, position)?;
        descriptor.ty = Some(ty.clone());
        return Ok(descriptor);
    }
    match entry {
        Term::Literal(Literal::Atom(name)) => Ok(FieldDescriptor::new(name, Term::nil(), position)),
        Term::Pair(key, default) => match key.as_atom() {
            Some(name) => Ok(FieldDescriptor::new(name, (**default).clone(), position)),
            None => Err(invalid_field(entry)),
        },
        _ => Err(invalid_field(entry)),
    }
}

fn invalid_field(entry: &Term) -> KeelError {
    expansion_err!(
        DEFRECORD,
        entry,
        "record fields must be atoms or name: default pairs, got: {}",
        entry
    )
}

// ============================================================================
// RECORD
// ============================================================================

/// Lowers every `record(...)` form.
pub fn expand_record(
    term: &Term,
    env: &mut MacroEnv,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    let Some(children) = term.as_node(RECORD) else {
        return Err(expansion_err!(RECORD, term, "malformed record"));
    };
    match children {
        [tag, Term::Literal(Literal::Atom(field))] => {
            let schema = static_schema(term, tag, env)?;
            field_position(term, &schema, field).map(|p| Term::int(p as i64))
        }
        [tag, kw] if kw.as_keywords().is_some() => {
            let schema = static_schema(term, tag, env)?;
            build(term, &schema, kw, ctx)
        }
        [tag, record] => {
            ctx.reject_match(RECORD, term)?;
            ctx.reject_guard(RECORD, term)?;
            let schema = static_schema(term, tag, env)?;
            Ok(to_keywords(&schema, record, env))
        }
        [tag, record, Term::Literal(Literal::Atom(field))] => {
            ctx.reject_match(RECORD, term)?;
            ctx.reject_guard(RECORD, term)?;
            // A dynamic tag, or one declared elsewhere, resolves at run time.
            match lookup(tag, env) {
                Some(schema) => access(term, &schema, record, field, env),
                None => Ok(runtime_fetch(tag, record, field)),
            }
        }
        [tag, record, kw] if kw.as_keywords().is_some() => {
            ctx.reject_match(RECORD, term)?;
            ctx.reject_guard(RECORD, term)?;
            let schema = static_schema(term, tag, env)?;
            update(term, &schema, record, kw, env)
        }
        _ => Err(expansion_err!(
            RECORD,
            term,
            "record expects a tag followed by fields, a field name, or a record"
        )),
    }
}

fn runtime_fetch(tag: &Term, record: &Term, field: &str) -> Term {
    prim::call(
        Term::atom(RECORD_MODULE),
        "fetch",
        vec![tag.clone(), record.clone(), Term::atom(field)],
    )
}

fn lookup(tag: &Term, env: &MacroEnv) -> Option<Arc<Schema>> {
    tag.as_atom().and_then(|t| env.lookup_schema(t))
}

fn static_schema(term: &Term, tag: &Term, env: &MacroEnv) -> Result<Arc<Schema>, KeelError> {
    let Some(name) = tag.as_atom() else {
        return Err(expansion_err!(
            RECORD,
            term,
            "record tag must be an atom known at expansion time, got: {}",
            tag
        ));
    };
    env.lookup_schema(name)
        .ok_or_else(|| expansion_err!(RECORD, term, "record {} is not defined", name))
}

fn field_position(term: &Term, schema: &Schema, field: &str) -> Result<usize, KeelError> {
    schema.position_of(field).ok_or_else(|| {
        expansion_err!(
            RECORD,
            term,
            "unknown field {} for record {}",
            field,
            schema.tag
        )
    })
}

/// Construction or pattern: one element per declared field.
fn build(
    term: &Term,
    schema: &Schema,
    kw: &Term,
    ctx: &LexicalContext,
) -> Result<Term, KeelError> {
    let mut supplied: Vec<Option<Term>> = vec![None; schema.len()];
    let mut rest: Option<Term> = None;
    for (key, value) in kw.as_keywords().unwrap_or_default() {
        if key == "_" {
            rest = Some(value.clone());
            continue;
        }
        place(term, schema, &mut supplied, key, value)?;
    }
    let elements = schema
        .fields
        .iter()
        .zip(supplied)
        .map(|(field, value)| {
            value.or_else(|| rest.clone()).unwrap_or_else(|| {
                if ctx.in_match {
                    Term::wildcard()
                } else {
                    field.default.clone()
                }
            })
        })
        .collect();
    Ok(Term::aggregate(schema.tag.clone(), elements))
}

/// Stores `value` at the position of field `key`; each field at most once.
fn place(
    term: &Term,
    schema: &Schema,
    slots: &mut [Option<Term>],
    key: &str,
    value: &Term,
) -> Result<(), KeelError> {
    let position = field_position(term, schema, key)?;
    if slots[position].is_some() {
        return Err(expansion_err!(
            RECORD,
            term,
            "field {} given more than once for record {}",
            key,
            schema.tag
        ));
    }
    slots[position] = Some(value.clone());
    Ok(())
}

/// `case rec { {Tag, _, v, _} -> v; other -> raise bad_record }`
fn access(
    term: &Term,
    schema: &Schema,
    record: &Term,
    field: &str,
    env: &mut MacroEnv,
) -> Result<Term, KeelError> {
    let position = field_position(term, schema, field)?;
    let value = env.fresh_var("value");
    let pattern = Term::aggregate(
        schema.tag.clone(),
        (0..schema.len())
            .map(|i| {
                if i == position {
                    value.clone()
                } else {
                    Term::wildcard()
                }
            })
            .collect(),
    );
    Ok(shape_checked(schema, record, pattern, value, env))
}

/// Rebuilds the aggregate with the given positions replaced.
fn update(
    term: &Term,
    schema: &Schema,
    record: &Term,
    kw: &Term,
    env: &mut MacroEnv,
) -> Result<Term, KeelError> {
    let mut updates: Vec<Option<Term>> = vec![None; schema.len()];
    for (key, value) in kw.as_keywords().unwrap_or_default() {
        place(term, schema, &mut updates, key, value)?;
    }
    let mut pattern = Vec::with_capacity(schema.len());
    let mut rebuilt = Vec::with_capacity(schema.len());
    for (field, update) in schema.fields.iter().zip(updates) {
        match update {
            Some(value) => {
                pattern.push(Term::wildcard());
                rebuilt.push(value);
            }
            None => {
                let var = env.fresh_var(&field.name);
                pattern.push(var.clone());
                rebuilt.push(var);
            }
        }
    }
    Ok(shape_checked(
        schema,
        record,
        Term::aggregate(schema.tag.clone(), pattern),
        Term::aggregate(schema.tag.clone(), rebuilt),
        env,
    ))
}

/// `[name: value, ...]` in declaration order.
fn to_keywords(schema: &Schema, record: &Term, env: &mut MacroEnv) -> Term {
    let vars: Vec<Term> = schema
        .fields
        .iter()
        .map(|f| env.fresh_var(&f.name))
        .collect();
    let keywords = schema
        .fields
        .iter()
        .zip(&vars)
        .map(|(f, v)| Term::keyword(&f.name, v.clone()))
        .collect();
    shape_checked(
        schema,
        record,
        Term::aggregate(schema.tag.clone(), vars),
        Term::seq(keywords),
        env,
    )
}

fn shape_checked(
    schema: &Schema,
    record: &Term,
    pattern: Term,
    body: Term,
    env: &mut MacroEnv,
) -> Term {
    let other = env.fresh_var("other");
    prim::case(
        record.clone(),
        vec![
            prim::clause(pattern, body),
            prim::clause(
                other.clone(),
                prim::raise(
                    BAD_RECORD_KIND,
                    format!("expected a {} record", schema.tag),
                    vec![other],
                ),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::registry::build_isolated_macro_env;

    fn user_env() -> MacroEnv {
        let mut env = build_isolated_macro_env();
        let decl = Term::node(
            DEFRECORD,
            vec![
                Term::atom("User"),
                Term::seq(vec![
                    Term::keyword("name", Term::nil()),
                    Term::keyword("age", Term::int(0)),
                ]),
            ],
        );
        expand_defrecord(&decl, &mut env, &LexicalContext::new()).unwrap();
        env
    }

    fn record(children: Vec<Term>) -> Term {
        Term::node(RECORD, children)
    }

    fn kw(entries: Vec<(&str, Term)>) -> Term {
        Term::seq(
            entries
                .into_iter()
                .map(|(k, v)| Term::keyword(k, v))
                .collect(),
        )
    }

    #[test]
    fn defrecord_registers_positions_and_returns_the_tag() {
        let env = user_env();
        let schema = env.lookup_schema("User").unwrap();
        assert_eq!(schema.position_of("name"), Some(0));
        assert_eq!(schema.field("age").unwrap().default, Term::int(0));
    }

    #[test]
    fn defrecord_accepts_bare_and_typed_fields() {
        let mut env = build_isolated_macro_env();
        let decl = Term::node(
            DEFRECORD,
            vec![
                Term::atom("Point"),
                Term::seq(vec![
                    Term::atom("x"),
                    prim::typed(Term::keyword("y", Term::int(0)), "integer"),
                ]),
            ],
        );
        let out = expand_defrecord(&decl, &mut env, &LexicalContext::new()).unwrap();
        assert_eq!(out, Term::atom("Point"));
        let schema = env.lookup_schema("Point").unwrap();
        assert_eq!(schema.field("x").unwrap().default, Term::nil());
        assert_eq!(schema.field("y").unwrap().ty, Some(Term::atom("integer")));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let mut env = build_isolated_macro_env();
        let decl = Term::node(
            DEFRECORD,
            vec![Term::atom("P"), Term::seq(vec![Term::atom("x"), Term::atom("x")])],
        );
        let err = expand_defrecord(&decl, &mut env, &LexicalContext::new()).unwrap_err();
        assert!(err.to_string().contains("duplicate field x"));
    }

    #[test]
    fn construction_fills_defaults_and_patterns_fill_wildcards() {
        let mut env = user_env();
        let term = record(vec![Term::atom("User"), kw(vec![("age", Term::int(25))])]);
        let built = expand_record(&term, &mut env, &LexicalContext::new()).unwrap();
        assert_eq!(built.pretty(), "{User, nil, 25}");
        let pattern = expand_record(&term, &mut env, &LexicalContext::new().to_match()).unwrap();
        assert_eq!(pattern.pretty(), "{User, _, 25}");
    }

    #[test]
    fn underscore_key_sets_unspecified_fields() {
        let mut env = user_env();
        let term = record(vec![
            Term::atom("User"),
            kw(vec![("_", Term::atom("unset")), ("age", Term::int(3))]),
        ]);
        let out = expand_record(&term, &mut env, &LexicalContext::new().to_match()).unwrap();
        assert_eq!(out.pretty(), "{User, :unset, 3}");
    }

    #[test]
    fn unknown_fields_and_tags_are_named() {
        let mut env = user_env();
        let term = record(vec![Term::atom("User"), kw(vec![("email", Term::nil())])]);
        let err = expand_record(&term, &mut env, &LexicalContext::new()).unwrap_err();
        assert!(err.to_string().contains("unknown field email for record User"));

        let term = record(vec![Term::atom("Order"), kw(vec![])]);
        let err = expand_record(&term, &mut env, &LexicalContext::new()).unwrap_err();
        assert!(err.to_string().contains("record Order is not defined"));
    }

    #[test]
    fn field_index_is_a_literal() {
        let mut env = user_env();
        let term = record(vec![Term::atom("User"), Term::atom("age")]);
        assert_eq!(
            expand_record(&term, &mut env, &LexicalContext::new()).unwrap(),
            Term::int(1)
        );
    }

    #[test]
    fn access_is_shape_checked() {
        let mut env = user_env();
        let term = record(vec![Term::atom("User"), Term::var("u"), Term::atom("age")]);
        let out = expand_record(&term, &mut env, &LexicalContext::new()).unwrap();
        let Some([subject, hit, miss]) = out.as_node(prim::CASE) else {
            panic!("expected case, got {}", out);
        };
        assert_eq!(subject, &Term::var("u"));
        assert!(hit.pretty().starts_with("{User, _, value#"));
        assert!(miss.pretty().contains("raise :bad_record"));
    }

    #[test]
    fn dynamic_tags_fall_back_to_run_time_fetch() {
        let mut env = user_env();
        let term = record(vec![Term::var("tag"), Term::var("u"), Term::atom("age")]);
        let out = expand_record(&term, &mut env, &LexicalContext::new()).unwrap();
        assert_eq!(out.pretty(), ":record.fetch(tag, u, :age)");
    }

    #[test]
    fn update_rebuilds_untouched_positions() {
        let mut env = user_env();
        let term = record(vec![
            Term::atom("User"),
            Term::var("u"),
            kw(vec![("age", Term::int(26))]),
        ]);
        let out = expand_record(&term, &mut env, &LexicalContext::new()).unwrap();
        let Some([_, hit, _]) = out.as_node(prim::CASE) else {
            panic!("expected case");
        };
        let Some([Term::Aggregate { elements: pattern, .. }, Term::Aggregate { elements: body, .. }]) =
            hit.as_node(prim::CLAUSE)
        else {
            panic!("expected aggregate clause, got {}", hit);
        };
        assert_eq!(pattern[0], body[0]);
        assert!(pattern[1].is_wildcard());
        assert_eq!(body[1], Term::int(26));
    }

    #[test]
    fn repeated_keys_are_rejected_in_construction_and_update() {
        let mut env = user_env();
        let twice = || kw(vec![("age", Term::int(1)), ("age", Term::int(2))]);
        let built = record(vec![Term::atom("User"), twice()]);
        let updated = record(vec![Term::atom("User"), Term::var("u"), twice()]);
        for term in [built, updated] {
            let err = expand_record(&term, &mut env, &LexicalContext::new()).unwrap_err();
            assert!(err.to_string().contains("field age given more than once for record User"));
        }
    }

    #[test]
    fn access_is_rejected_in_patterns() {
        let mut env = user_env();
        let term = record(vec![Term::atom("User"), Term::var("u"), Term::atom("age")]);
        assert!(expand_record(&term, &mut env, &LexicalContext::new().to_match()).is_err());
    }
}
