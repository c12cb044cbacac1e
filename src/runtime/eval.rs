//! Reference evaluator for the primitive core calculus.
//!
//! Runs fully lowered terms so their run-time behavior can be observed:
//! which clause a `case` selects, what a pattern binds, which error a
//! `raise` produces. Surface constructs must be expanded first; an
//! unexpanded construct evaluates as a call to an undefined function.
//!
//! ## Scoping
//!
//! - Patterns bind into the current scope; a variable repeated within one
//!   pattern must match equal values.
//! - Each `case` clause runs in a copy of the scope. Its bindings are dropped
//!   afterwards unless the `case` exports them.
//! - Function bodies start from an empty scope holding only the parameters.

use std::collections::HashMap;

use crate::ast::{prim, Literal, Symbol, Term};
use crate::macros::record::{BAD_RECORD_KIND, RECORD_MODULE, UNKNOWN_RECORD_KIND};
use crate::primitives::PrimitiveRegistry;
use crate::runtime::schema::SchemaSnapshot;
use crate::runtime::value::Value;
use crate::{err_msg, raise_err, KeelError};

/// Variable bindings of one scope.
pub type Bindings = im::HashMap<Symbol, Value>;

/// Maximum nesting of user-defined function calls.
pub const MAX_CALL_DEPTH: usize = 200;

#[derive(Debug, Clone)]
struct Function {
    params: Vec<Term>,
    body: Term,
}

impl Function {
    fn required(&self) -> usize {
        self.params.len() - self.defaults()
    }

    fn defaults(&self) -> usize {
        self.params.iter().filter(|p| p.is_node(prim::DEFAULT)).count()
    }

    fn accepts(&self, arity: usize) -> bool {
        (self.required()..=self.params.len()).contains(&arity)
    }
}

/// A piece of a binary pattern.
enum Piece<'a> {
    Fixed(String),
    Free(&'a Term),
}

pub struct Evaluator {
    primitives: PrimitiveRegistry,
    schemas: SchemaSnapshot,
    functions: HashMap<(String, String), Vec<Function>>,
    module: String,
    depth: usize,
}

// ============================================================================
// PUBLIC API
// ============================================================================

impl Evaluator {
    pub fn new(primitives: PrimitiveRegistry, schemas: SchemaSnapshot) -> Self {
        Self {
            primitives,
            schemas,
            functions: HashMap::new(),
            module: String::new(),
            depth: 0,
        }
    }

    /// Functions defined by `def` land in `module`.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Evaluates a term in an empty scope.
    pub fn eval_program(&mut self, term: &Term) -> Result<Value, KeelError> {
        self.eval(term, &mut Bindings::new())
    }

    /// Evaluates a term, returning its value and the scope it leaves behind.
    pub fn run(&mut self, term: &Term) -> Result<(Value, Bindings), KeelError> {
        let mut env = Bindings::new();
        let value = self.eval(term, &mut env)?;
        Ok((value, env))
    }

    pub fn has_function(&self, module: &str, name: &str, arity: usize) -> bool {
        self.functions
            .get(&(module.to_string(), name.to_string()))
            .is_some_and(|defs| defs.iter().any(|f| f.accepts(arity)))
    }

    pub fn eval(&mut self, term: &Term, env: &mut Bindings) -> Result<Value, KeelError> {
        match term {
            Term::Literal(lit) => Ok(Value::from(lit)),
            Term::Symbol(sym) if sym.is_wildcard() => Err(err_msg!(
                Eval,
                "invalid use of _, it can only be used inside patterns"
            )),
            Term::Symbol(sym) => env
                .get(sym)
                .cloned()
                .ok_or_else(|| err_msg!(Eval, "undefined variable {}", sym)),
            Term::Pair(left, right) => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(Value::pair(left, right))
            }
            Term::Sequence(items) => Ok(Value::List(self.eval_all(items, env)?.into())),
            Term::Aggregate { tag, elements } => Ok(Value::Record {
                tag: tag.clone(),
                fields: self.eval_all(elements, env)?,
            }),
            Term::Node {
                tag,
                meta,
                children,
            } => self
                .eval_node(tag, meta.export_bindings, children, env)
                .map_err(|e| e.or_span(meta.span)),
        }
    }
}

// ============================================================================
// NODES
// ============================================================================

impl Evaluator {
    fn eval_all(&mut self, terms: &[Term], env: &mut Bindings) -> Result<Vec<Value>, KeelError> {
        terms.iter().map(|t| self.eval(t, env)).collect()
    }

    fn eval_node(
        &mut self,
        tag: &str,
        export: bool,
        children: &[Term],
        env: &mut Bindings,
    ) -> Result<Value, KeelError> {
        match (tag, children) {
            (prim::CASE, [subject, clauses @ ..]) => self.eval_case(subject, clauses, export, env),
            (prim::MATCH, [pattern, value]) => {
                let value = self.eval(value, env)?;
                if !self.match_pattern(pattern, &value, env)? {
                    return Err(raise_err!(
                        "badmatch",
                        "no match of right hand side value: {}",
                        value
                    ));
                }
                Ok(value)
            }
            (prim::BLOCK, exprs) => {
                let mut last = Value::Nil;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
            (prim::CALL, [target, name, args @ ..]) => {
                let module = match self.eval(target, env)? {
                    Value::Atom(module) => module,
                    other => {
                        return Err(err_msg!(
                            Eval,
                            "call target must be a module atom, got: {}",
                            other
                        ))
                    }
                };
                let Some(name) = name.as_atom() else {
                    return Err(err_msg!(Eval, "call name must be an atom, got: {}", name));
                };
                let args = self.eval_all(args, env)?;
                self.call(&module, name, args)
            }
            (prim::RAISE, [kind, message, extra @ ..]) => {
                let Some(kind) = kind.as_atom() else {
                    return Err(err_msg!(Eval, "raise kind must be an atom, got: {}", kind));
                };
                let message = match self.eval(message, env)? {
                    Value::Binary(s) => s,
                    other => other.to_string(),
                };
                let extra = self.eval_all(extra, env)?;
                if extra.is_empty() {
                    return Err(raise_err!(kind, "{}", message));
                }
                let detail: Vec<String> = extra.iter().map(Value::to_string).collect();
                Err(raise_err!(kind, "{}: {}", message, detail.join(", ")))
            }
            (prim::BINARY, segments) => self.construct_binary(segments, env),
            (prim::CONS, [head, tail]) => {
                let head = self.eval(head, env)?;
                match self.eval(tail, env)? {
                    Value::List(mut items) => {
                        items.push_front(head);
                        Ok(Value::List(items))
                    }
                    other => Err(err_msg!(
                        Eval,
                        "improper lists are not supported, tail was: {}",
                        other
                    )),
                }
            }
            (prim::DEF, [head, body]) => self.define(head, body),
            (prim::PIN, [inner]) => self.eval(inner, env),
            (prim::DONT_CARE, _) => Err(err_msg!(
                Eval,
                "invalid use of _, it can only be used inside patterns"
            )),
            (tag, _) if prim::is_primitive(tag) => {
                Err(err_msg!(Eval, "malformed {} node with {} children", tag, children.len()))
            }
            (name, args) => {
                let args = self.eval_all(args, env)?;
                let module = self.module.clone();
                self.apply_function(&module, name, args)
            }
        }
    }

    fn eval_case(
        &mut self,
        subject: &Term,
        clauses: &[Term],
        export: bool,
        env: &mut Bindings,
    ) -> Result<Value, KeelError> {
        let value = self.eval(subject, env)?;
        for clause in clauses {
            let Some([head, body]) = clause.as_node(prim::CLAUSE) else {
                return Err(err_msg!(Eval, "case expects clauses, got: {}", clause));
            };
            let (pattern, guard) = prim::split_guard(head);
            let mut local = env.clone();
            if !self.match_pattern(pattern, &value, &mut local)? {
                continue;
            }
            if let Some(guard) = guard {
                if !self.guard_passes(guard, &local)? {
                    continue;
                }
            }
            let result = self.eval(body, &mut local)?;
            if export {
                *env = local;
            }
            return Ok(result);
        }
        Err(raise_err!(
            "case_clause",
            "no case clause matching: {}",
            value
        ))
    }

    /// A guard passes only on exactly `true`; a raised error fails it.
    fn guard_passes(&mut self, guard: &Term, env: &Bindings) -> Result<bool, KeelError> {
        let mut scratch = env.clone();
        match self.eval(guard, &mut scratch) {
            Ok(Value::Bool(true)) => Ok(true),
            Ok(_) | Err(KeelError::Raise { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn construct_binary(&mut self, segments: &[Term], env: &mut Bindings) -> Result<Value, KeelError> {
        let mut out = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let value_term = match segment.as_node(prim::TYPED) {
                Some([inner, _ty]) => inner,
                _ => segment,
            };
            match self.eval(value_term, env)? {
                Value::Binary(s) => out.push_str(&s),
                other => {
                    return Err(raise_err!(
                        "argument_error",
                        "construction of binary failed: segment {} of type 'binary': expected a binary but got: {}",
                        i + 1,
                        other
                    ))
                }
            }
        }
        Ok(Value::Binary(out))
    }
}

// ============================================================================
// FUNCTIONS
// ============================================================================

impl Evaluator {
    fn define(&mut self, head: &Term, body: &Term) -> Result<Value, KeelError> {
        let (name, params) = match head {
            Term::Node { tag, children, .. } => (tag.clone(), children.clone()),
            Term::Symbol(sym) => (sym.name.clone(), Vec::new()),
            other => return Err(err_msg!(Eval, "invalid function head: {}", other)),
        };
        tracing::debug!(
            module = self.module.as_str(),
            name = name.as_str(),
            arity = params.len(),
            "defined function"
        );
        self.functions
            .entry((self.module.clone(), name.clone()))
            .or_default()
            .push(Function {
                params,
                body: body.clone(),
            });
        Ok(Value::Atom(name))
    }

    fn call(&mut self, module: &str, name: &str, args: Vec<Value>) -> Result<Value, KeelError> {
        if module == RECORD_MODULE && name == "fetch" {
            return self.record_fetch(&args);
        }
        if let Some(primitive) = self.primitives.get(module, name) {
            return primitive(&args);
        }
        self.apply_function(module, name, args)
    }

    fn apply_function(
        &mut self,
        module: &str,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, KeelError> {
        let arity = args.len();
        let function = self
            .functions
            .get(&(module.to_string(), name.to_string()))
            .and_then(|defs| defs.iter().find(|f| f.accepts(arity)))
            .cloned();
        let Some(function) = function else {
            let qualified = if module.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", module, name)
            };
            return Err(raise_err!(
                "undefined_function",
                "function {}/{} is undefined",
                qualified,
                arity
            ));
        };
        if self.depth >= MAX_CALL_DEPTH {
            return Err(err_msg!(
                Eval,
                "call depth limit ({}) exceeded in {}/{}",
                MAX_CALL_DEPTH,
                name,
                arity
            ));
        }
        self.depth += 1;
        let result = self.invoke(&function, name, args);
        self.depth -= 1;
        result
    }

    /// Binds arguments left to right. Defaulted parameters take arguments
    /// leftmost first; the rest evaluate their default.
    fn invoke(&mut self, function: &Function, name: &str, args: Vec<Value>) -> Result<Value, KeelError> {
        let arity = args.len();
        let mut supplied_defaults = arity - function.required();
        let mut args = args.into_iter();
        let mut env = Bindings::new();
        for param in &function.params {
            let (pattern, value) = match param.as_node(prim::DEFAULT) {
                Some([pattern, default]) if supplied_defaults == 0 => {
                    (pattern, self.eval(default, &mut env)?)
                }
                Some([pattern, _]) => {
                    supplied_defaults -= 1;
                    (pattern, next_arg(&mut args)?)
                }
                _ => (param, next_arg(&mut args)?),
            };
            if !self.match_pattern(pattern, &value, &mut env)? {
                return Err(raise_err!(
                    "function_clause",
                    "no function clause matching in {}/{}",
                    name,
                    arity
                ));
            }
        }
        self.eval(&function.body, &mut env)
    }

    fn record_fetch(&self, args: &[Value]) -> Result<Value, KeelError> {
        let [tag, record, field] = args else {
            return Err(raise_err!(
                "arity_error",
                "record.fetch expects 3 arguments, got {}",
                args.len()
            ));
        };
        let (Value::Atom(tag), Value::Atom(field)) = (tag, field) else {
            return Err(raise_err!(
                "argument_error",
                "record.fetch expects an atom tag and an atom field"
            ));
        };
        let Some(schema) = self.schemas.lookup(tag) else {
            return Err(raise_err!(UNKNOWN_RECORD_KIND, "record {} is not defined", tag));
        };
        let Some(position) = schema.position_of(field) else {
            return Err(raise_err!(
                "unknown_field",
                "unknown field {} for record {}",
                field,
                tag
            ));
        };
        match record {
            Value::Record { tag: t, fields } if t == tag && fields.len() == schema.len() => {
                Ok(fields[position].clone())
            }
            other => Err(raise_err!(
                BAD_RECORD_KIND,
                "expected a {} record: {}",
                tag,
                other
            )),
        }
    }
}

fn next_arg(args: &mut std::vec::IntoIter<Value>) -> Result<Value, KeelError> {
    args.next()
        .ok_or_else(|| err_msg!(Internal, "argument list shorter than its arity"))
}

// ============================================================================
// PATTERN MATCHING
// ============================================================================

impl Evaluator {
    /// Matches `value` against `pattern`, adding the bindings to `env` on success.
    pub fn match_pattern(
        &self,
        pattern: &Term,
        value: &Value,
        env: &mut Bindings,
    ) -> Result<bool, KeelError> {
        let mut bound = Bindings::new();
        if !self.bind_pattern(pattern, value, env, &mut bound)? {
            return Ok(false);
        }
        env.extend(bound);
        Ok(true)
    }

    fn bind_pattern(
        &self,
        pattern: &Term,
        value: &Value,
        env: &Bindings,
        bound: &mut Bindings,
    ) -> Result<bool, KeelError> {
        match (pattern, value) {
            (Term::Literal(lit), value) => Ok(Value::from(lit) == *value),
            (Term::Symbol(sym), _) if sym.is_wildcard() => Ok(true),
            (Term::Symbol(sym), value) => match bound.get(sym) {
                Some(previous) => Ok(previous == value),
                None => {
                    bound.insert(sym.clone(), value.clone());
                    Ok(true)
                }
            },
            (Term::Pair(pl, pr), Value::Pair(vl, vr)) => {
                Ok(self.bind_pattern(pl, vl, env, bound)? && self.bind_pattern(pr, vr, env, bound)?)
            }
            (Term::Sequence(items), Value::List(values)) if items.len() == values.len() => {
                self.bind_all(items, values.iter(), env, bound)
            }
            (
                Term::Aggregate { tag, elements },
                Value::Record {
                    tag: value_tag,
                    fields,
                },
            ) if tag == value_tag && elements.len() == fields.len() => {
                self.bind_all(elements, fields.iter(), env, bound)
            }
            (Term::Node { tag, children, .. }, value) => {
                self.bind_node(pattern, tag, children, value, env, bound)
            }
            _ => Ok(false),
        }
    }

    fn bind_all<'v>(
        &self,
        patterns: &[Term],
        values: impl Iterator<Item = &'v Value>,
        env: &Bindings,
        bound: &mut Bindings,
    ) -> Result<bool, KeelError> {
        for (pattern, value) in patterns.iter().zip(values) {
            if !self.bind_pattern(pattern, value, env, bound)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn bind_node(
        &self,
        pattern: &Term,
        tag: &str,
        children: &[Term],
        value: &Value,
        env: &Bindings,
        bound: &mut Bindings,
    ) -> Result<bool, KeelError> {
        match (tag, children) {
            (prim::PIN, [Term::Symbol(sym)]) => match env.get(sym) {
                Some(pinned) => Ok(pinned == value),
                None => Err(err_msg!(Eval, "undefined variable ^{}", sym)),
            },
            (prim::DONT_CARE, []) => Ok(true),
            (prim::CONS, [head, tail]) => {
                let Value::List(items) = value else {
                    return Ok(false);
                };
                let Some(first) = items.front() else {
                    return Ok(false);
                };
                let rest = Value::List(items.skip(1));
                Ok(self.bind_pattern(head, first, env, bound)?
                    && self.bind_pattern(tail, &rest, env, bound)?)
            }
            (prim::MATCH, [left, right]) => Ok(self.bind_pattern(left, value, env, bound)?
                && self.bind_pattern(right, value, env, bound)?),
            (prim::TYPED, [inner, _ty]) => self.bind_pattern(inner, value, env, bound),
            (prim::BINARY, segments) => match value {
                Value::Binary(s) => self.bind_binary(segments, s, env, bound),
                _ => Ok(false),
            },
            _ => Err(err_msg!(Eval, "illegal pattern: {}", pattern)),
        }
    }

    /// Strips the fixed prefix and suffix, then hands what is left to the
    /// single free segment, if any.
    fn bind_binary(
        &self,
        segments: &[Term],
        subject: &str,
        env: &Bindings,
        bound: &mut Bindings,
    ) -> Result<bool, KeelError> {
        let mut pieces = Vec::with_capacity(segments.len());
        for segment in segments {
            let inner = match segment.as_node(prim::TYPED) {
                Some([inner, _ty]) => inner,
                _ => segment,
            };
            let piece = match inner {
                Term::Literal(Literal::Str(s)) => Piece::Fixed(s.clone()),
                Term::Symbol(_) => Piece::Free(inner),
                Term::Node { tag, children, .. } if tag == prim::PIN => {
                    let Some(sym) = children.first().and_then(Term::as_symbol) else {
                        return Err(err_msg!(Eval, "illegal pattern: {}", segment));
                    };
                    match env.get(sym) {
                        Some(Value::Binary(s)) => Piece::Fixed(s.clone()),
                        Some(_) => return Ok(false),
                        None => return Err(err_msg!(Eval, "undefined variable ^{}", sym)),
                    }
                }
                _ => return Err(err_msg!(Eval, "illegal binary segment: {}", segment)),
            };
            pieces.push(piece);
        }

        let free_at = pieces.iter().position(|p| matches!(p, Piece::Free(_)));
        let (prefix, free, suffix) = match free_at {
            Some(i) => (&pieces[..i], Some(&pieces[i]), &pieces[i + 1..]),
            None => (&pieces[..], None, &pieces[pieces.len()..]),
        };
        if suffix.iter().any(|p| matches!(p, Piece::Free(_))) {
            return Err(err_msg!(
                Eval,
                "a binary pattern may contain only one variable-length segment"
            ));
        }

        let mut rest = subject;
        for piece in prefix {
            let Piece::Fixed(fixed) = piece else { continue };
            let Some(r) = rest.strip_prefix(fixed.as_str()) else {
                return Ok(false);
            };
            rest = r;
        }
        for piece in suffix.iter().rev() {
            let Piece::Fixed(fixed) = piece else { continue };
            let Some(r) = rest.strip_suffix(fixed.as_str()) else {
                return Ok(false);
            };
            rest = r;
        }
        match free {
            Some(Piece::Free(var)) => {
                self.bind_pattern(var, &Value::Binary(rest.to_string()), env, bound)
            }
            _ => Ok(rest.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::registry::build_default_primitive_registry;
    use crate::runtime::schema::{Schema, SchemaTable};

    fn evaluator() -> Evaluator {
        Evaluator::new(build_default_primitive_registry(), SchemaSnapshot::default())
    }

    #[test]
    fn case_selects_the_first_matching_clause() {
        let term = prim::case(
            Term::pair(Term::atom("ok"), Term::int(1)),
            vec![
                prim::clause(Term::pair(Term::atom("error"), Term::var("e")), Term::var("e")),
                prim::clause(Term::pair(Term::atom("ok"), Term::var("v")), Term::var("v")),
            ],
        );
        let (value, env) = evaluator().run(&term).unwrap();
        assert_eq!(value, Value::Int(1));
        assert!(env.is_empty());
    }

    #[test]
    fn exporting_case_keeps_clause_bindings() {
        let term = prim::block(vec![
            prim::case(
                Term::int(1),
                vec![prim::clause(Term::var("x"), Term::nil())],
            )
            .exporting_bindings(),
            Term::var("x"),
        ]);
        assert_eq!(evaluator().eval_program(&term).unwrap(), Value::Int(1));
    }

    #[test]
    fn repeated_pattern_variables_must_agree() {
        let pattern = Term::pair(Term::var("a"), Term::var("a"));
        let ev = evaluator();
        let mut env = Bindings::new();
        assert!(!ev
            .match_pattern(&pattern, &Value::pair(Value::Int(1), Value::Int(2)), &mut env)
            .unwrap());
        assert!(ev
            .match_pattern(&pattern, &Value::pair(Value::Int(1), Value::Int(1)), &mut env)
            .unwrap());
    }

    #[test]
    fn guard_errors_fail_the_clause() {
        let term = prim::case(
            Term::atom("a"),
            vec![
                prim::clause(
                    prim::when(Term::var("x"), prim::kernel(">", vec![Term::var("x"), Term::int(1)])),
                    Term::int(1),
                ),
                prim::clause(Term::wildcard(), Term::int(2)),
            ],
        );
        assert_eq!(evaluator().eval_program(&term).unwrap(), Value::Int(2));
    }

    #[test]
    fn unmatched_case_raises_case_clause() {
        let term = prim::case(Term::int(1), vec![prim::clause(Term::int(2), Term::nil())]);
        let err = evaluator().eval_program(&term).unwrap_err();
        assert_eq!(err.raised_kind(), Some("case_clause"));
    }

    #[test]
    fn binary_templates_match_prefix_and_suffix() {
        let ev = evaluator();
        let mut env = Bindings::new();
        let prefix = prim::binary(vec![Term::str("ab"), prim::typed(Term::var("rest"), "binary")]);
        assert!(ev
            .match_pattern(&prefix, &Value::binary("abcd"), &mut env)
            .unwrap());
        assert_eq!(env.get(&Symbol::new("rest", Default::default())), Some(&Value::binary("cd")));

        let suffix = prim::binary(vec![prim::typed(Term::var("stem"), "binary"), Term::str(".txt")]);
        assert!(ev
            .match_pattern(&suffix, &Value::binary("notes.txt"), &mut env)
            .unwrap());
        assert!(!ev
            .match_pattern(&suffix, &Value::binary("notes.md"), &mut env)
            .unwrap());
    }

    #[test]
    fn defined_functions_take_defaults_leftmost_first() {
        let head = Term::node(
            "pad",
            vec![
                Term::node(prim::DEFAULT, vec![Term::var("a"), Term::int(1)]),
                Term::node(prim::DEFAULT, vec![Term::var("b"), Term::int(2)]),
            ],
        );
        let term = prim::block(vec![
            prim::def(head, Term::pair(Term::var("a"), Term::var("b"))),
            Term::node("pad", vec![Term::int(9)]),
        ]);
        let value = evaluator().eval_program(&term).unwrap();
        assert_eq!(value, Value::pair(Value::Int(9), Value::Int(2)));
    }

    #[test]
    fn record_fetch_checks_tag_and_shape() {
        let table = SchemaTable::new();
        table
            .register(
                "User",
                Schema::from_defaults("User", [("name", Term::nil()), ("age", Term::int(0))]).fields,
            )
            .unwrap();
        let mut ev = Evaluator::new(build_default_primitive_registry(), table.snapshot());
        let fetch = |tag: &str, rec: Term| {
            prim::call(
                Term::atom(RECORD_MODULE),
                "fetch",
                vec![Term::atom(tag), rec, Term::atom("age")],
            )
        };
        let user = Term::aggregate("User", vec![Term::nil(), Term::int(25)]);
        assert_eq!(ev.eval_program(&fetch("User", user)).unwrap(), Value::Int(25));

        let err = ev.eval_program(&fetch("User", Term::int(3))).unwrap_err();
        assert_eq!(err.raised_kind(), Some(BAD_RECORD_KIND));
        let err = ev
            .eval_program(&fetch("Order", Term::aggregate("Order", vec![])))
            .unwrap_err();
        assert_eq!(err.raised_kind(), Some(UNKNOWN_RECORD_KIND));
    }
}
