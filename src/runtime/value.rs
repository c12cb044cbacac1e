//! Run-time values produced by evaluating lowered code.

use std::fmt;

use im::Vector;
use serde::Serialize;

use crate::ast::{Literal, Term};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Atom(String),
    /// A UTF-8 binary.
    Binary(String),
    List(Vector<Value>),
    Pair(Box<Value>, Box<Value>),
    Record { tag: String, fields: Vec<Value> },
}

impl Value {
    pub fn atom(name: impl Into<String>) -> Self {
        Value::Atom(name.into())
    }

    pub fn binary(s: impl Into<String>) -> Self {
        Value::Binary(s.into())
    }

    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn pair(left: Value, right: Value) -> Self {
        Value::Pair(Box::new(left), Box::new(right))
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Atom(_) => "atom",
            Value::Binary(_) => "binary",
            Value::List(_) => "list",
            Value::Pair(..) => "tuple",
            Value::Record { .. } => "record",
        }
    }

    pub fn as_binary(&self) -> Option<&str> {
        match self {
            Value::Binary(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vector<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Equality where integers and floats compare by numeric value.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            _ => self == other,
        }
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Nil => Value::Nil,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(n) => Value::Float(*n),
            Literal::Atom(a) => Value::Atom(a.clone()),
            Literal::Str(s) => Value::Binary(s.clone()),
        }
    }
}

impl From<&Value> for Term {
    /// Quotes a value back into a term.
    fn from(value: &Value) -> Self {
        match value {
            Value::Nil => Term::nil(),
            Value::Bool(b) => Term::bool(*b),
            Value::Int(n) => Term::int(*n),
            Value::Float(n) => Term::float(*n),
            Value::Atom(a) => Term::atom(a.clone()),
            Value::Binary(s) => Term::str(s.clone()),
            Value::List(items) => Term::seq(items.iter().map(Term::from).collect()),
            Value::Pair(l, r) => Term::pair(Term::from(l.as_ref()), Term::from(r.as_ref())),
            Value::Record { tag, fields } => {
                Term::aggregate(tag.clone(), fields.iter().map(Term::from).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Term::from(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_like_terms() {
        let user = Value::Record {
            tag: "User".into(),
            fields: vec![Value::Nil, Value::Int(25)],
        };
        assert_eq!(user.to_string(), "{User, nil, 25}");
        let list = Value::list([Value::binary("a"), Value::atom("b")]);
        assert_eq!(list.to_string(), "[\"a\", :b]");
    }

    #[test]
    fn loose_equality_crosses_numeric_types() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).loose_eq(&Value::Int(2)));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }
}
