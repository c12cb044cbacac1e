//! Lexical context handed to every lowerer by the expansion driver.

use crate::ast::{Symbol, Term};
use crate::{expansion_err, KeelError};

/// What the driver knows about the position of the term being expanded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexicalContext {
    /// Inside a clause guard.
    pub in_guard: bool,
    /// On the pattern side of a match.
    pub in_match: bool,
    /// Variables bound by enclosing scopes, in binding order.
    pub visible_bindings: Vec<Symbol>,
    /// Tag of the module being compiled, if any.
    pub module: Option<String>,
}

impl LexicalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_module(module: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            ..Self::default()
        }
    }

    pub fn to_match(&self) -> Self {
        Self {
            in_match: true,
            in_guard: false,
            ..self.clone()
        }
    }

    pub fn to_guard(&self) -> Self {
        Self {
            in_match: false,
            in_guard: true,
            ..self.clone()
        }
    }

    /// Plain expression position.
    pub fn to_expr(&self) -> Self {
        Self {
            in_match: false,
            in_guard: false,
            ..self.clone()
        }
    }

    pub fn with_bindings<I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut next = self.clone();
        for sym in bindings {
            next.bind(sym);
        }
        next
    }

    pub fn bind(&mut self, sym: Symbol) {
        if !self.visible_bindings.contains(&sym) {
            self.visible_bindings.push(sym);
        }
    }

    pub fn is_visible(&self, sym: &Symbol) -> bool {
        self.visible_bindings.contains(sym)
    }

    /// Fails with an expansion error if `term` sits in guard position.
    pub fn reject_guard(&self, construct: &str, term: &Term) -> Result<(), KeelError> {
        if self.in_guard {
            return Err(expansion_err!(
                construct,
                term,
                "invalid expression in guard, {} is not allowed in guards",
                construct
            ));
        }
        Ok(())
    }

    /// Fails with an expansion error if `term` sits in pattern position.
    pub fn reject_match(&self, construct: &str, term: &Term) -> Result<(), KeelError> {
        if self.in_match {
            return Err(expansion_err!(
                construct,
                term,
                "cannot invoke {} inside a match",
                construct
            ));
        }
        Ok(())
    }
}
