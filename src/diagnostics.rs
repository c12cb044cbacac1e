//! Unified `miette`-based diagnostics for the Keel engine.
//!
//! Every failure produced by expansion, schema registration, evaluation of
//! lowered code, or the CLI is a `KeelError`. Construct errors through the
//! macros below rather than building `ErrorContext` by hand:
//!
//! - `err_msg!(Schema, "conflicting schema for {}", tag)` for message-only errors.
//! - `err_ctx!(Eval, "unbound variable", span, help)` for errors with a span and help.
//! - `expansion_err!("cond", term, "message {}", arg)` for expansion-time errors;
//!   the offending sub-term is pretty-printed into the diagnostic.
//! - `raise_err!("cond_clause", "message")` for errors raised by lowered code.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::ast::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe error classification corresponding to `KeelError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// A construct could not be lowered.
    Expansion,
    /// Conflicting or malformed record schema registration.
    Schema,
    /// Raised at run time by lowered code.
    Raise,
    /// Evaluation of a malformed core term.
    Eval,
    /// Unreadable input (CLI).
    Input,
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Expansion => "Expansion",
            ErrorType::Schema => "Schema",
            ErrorType::Raise => "Raise",
            ErrorType::Eval => "Eval",
            ErrorType::Input => "Input",
            ErrorType::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single additional label for multi-span diagnostics.
#[derive(Debug)]
pub struct RelatedLabel {
    pub span: Span,
    pub label: String,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
    pub related: Vec<RelatedLabel>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_span(span: Span) -> Self {
        Self {
            span: Some(span),
            ..Self::default()
        }
    }

    pub fn with_help(span: Span, help: impl Into<String>) -> Self {
        Self {
            span: Some(span),
            help: Some(help.into()),
            ..Self::default()
        }
    }
}

/// Unified error type for all Keel failure modes.
#[derive(Debug, Error)]
pub enum KeelError {
    #[error("Expansion error in `{construct}`: {message}")]
    Expansion {
        construct: String,
        message: String,
        /// Pretty-printed offending sub-term.
        term: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Schema error: {message}")]
    Schema {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{kind}: {message}")]
    Raise {
        kind: String,
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Evaluation error: {message}")]
    Eval {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Input error: {message}")]
    Input {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl KeelError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            KeelError::Expansion { ctx, .. }
            | KeelError::Schema { ctx, .. }
            | KeelError::Raise { ctx, .. }
            | KeelError::Eval { ctx, .. }
            | KeelError::Input { ctx, .. }
            | KeelError::Internal { ctx, .. } => ctx,
        }
    }

    fn get_ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            KeelError::Expansion { ctx, .. }
            | KeelError::Schema { ctx, .. }
            | KeelError::Raise { ctx, .. }
            | KeelError::Eval { ctx, .. }
            | KeelError::Input { ctx, .. }
            | KeelError::Internal { ctx, .. } => ctx,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            KeelError::Expansion { .. } => ErrorType::Expansion,
            KeelError::Schema { .. } => ErrorType::Schema,
            KeelError::Raise { .. } => ErrorType::Raise,
            KeelError::Eval { .. } => ErrorType::Eval,
            KeelError::Input { .. } => ErrorType::Input,
            KeelError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// The run-time error kind, for errors raised by lowered code.
    pub fn raised_kind(&self) -> Option<&str> {
        match self {
            KeelError::Raise { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// The construct whose expansion failed, for expansion-time errors.
    pub fn construct(&self) -> Option<&str> {
        match self {
            KeelError::Expansion { construct, .. } => Some(construct),
            _ => None,
        }
    }

    /// Attaches the original source text so spans render as snippets.
    pub fn with_source(mut self, name: &str, text: &str) -> Self {
        self.get_ctx_mut().source = Some(to_error_source(name, text));
        self
    }

    /// Fills in a span if the error does not carry one yet.
    pub fn or_span(mut self, span: Span) -> Self {
        let ctx = self.get_ctx_mut();
        if ctx.span.is_none() && !span.is_empty() {
            ctx.span = Some(span);
        }
        self
    }

    fn label_text(&self) -> String {
        match self {
            KeelError::Expansion { message, .. }
            | KeelError::Schema { message, .. }
            | KeelError::Raise { message, .. }
            | KeelError::Eval { message, .. }
            | KeelError::Input { message, .. }
            | KeelError::Internal { message, .. } => message.clone(),
        }
    }
}

impl Diagnostic for KeelError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self {
            KeelError::Expansion { .. } => "keel::expansion",
            KeelError::Schema { .. } => "keel::schema",
            KeelError::Raise { .. } => "keel::raise",
            KeelError::Eval { .. } => "keel::eval",
            KeelError::Input { .. } => "keel::input",
            KeelError::Internal { .. } => "keel::internal",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let ctx = self.get_ctx();
        if let Some(help) = &ctx.help {
            return Some(Box::new(help));
        }
        match self {
            KeelError::Expansion { term, .. } if !term.is_empty() => {
                Some(Box::new(format!("offending term: {}", term)))
            }
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.get_ctx();
        // Labels without source text would point into nothing.
        ctx.source.as_ref()?;
        let mut labels = Vec::new();
        if let Some(span) = ctx.span {
            labels.push(LabeledSpan::new(
                Some(self.label_text()),
                span.start,
                span.len().max(1),
            ));
        }
        for rel in &ctx.related {
            labels.push(LabeledSpan::new(
                Some(rel.label.clone()),
                rel.span.start,
                rel.span.len().max(1),
            ));
        }
        if labels.is_empty() {
            None
        } else {
            Some(Box::new(labels.into_iter()))
        }
    }
}

impl From<std::io::Error> for KeelError {
    fn from(err: std::io::Error) -> Self {
        KeelError::Input {
            message: err.to_string(),
            ctx: ErrorContext::none(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for KeelError {
    fn from(err: serde_json::Error) -> Self {
        KeelError::Input {
            message: format!("malformed term JSON: {}", err),
            ctx: ErrorContext::none(),
            source: Some(Box::new(err)),
        }
    }
}

/// Converts a source string into an `Arc<NamedSource<String>>`.
pub fn to_error_source(name: &str, text: &str) -> SourceArc {
    Arc::new(NamedSource::new(name, text.to_string()))
}

/// Constructs a message-only `KeelError` variant (`Schema`, `Eval`, `Input`, `Internal`).
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::KeelError::$variant {
            message: format!($($arg)+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a message-only `KeelError` variant carrying a span and a help text.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $span:expr, $help:expr) => {
        $crate::KeelError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_help($span, $help),
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $span:expr) => {
        $crate::KeelError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_span($span),
            source: None,
        }
    };
}

/// Constructs an expansion-time error for `construct`, recording the
/// offending term and its span.
#[macro_export]
macro_rules! expansion_err {
    ($construct:expr, $term:expr, $($arg:tt)+) => {{
        let term: &$crate::ast::Term = $term;
        $crate::KeelError::Expansion {
            construct: $construct.to_string(),
            message: format!($($arg)+),
            term: term.pretty(),
            ctx: $crate::ErrorContext {
                span: Some(term.span()).filter(|s| !s.is_empty()),
                ..$crate::ErrorContext::none()
            },
            source: None,
        }
    }};
}

/// Constructs a run-time error of the given kind, as raised by lowered code.
#[macro_export]
macro_rules! raise_err {
    ($kind:expr, $($arg:tt)+) => {
        $crate::KeelError::Raise {
            kind: $kind.to_string(),
            message: format!($($arg)+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;
    use crate::ast::Term;

    #[test]
    fn expansion_errors_render_offending_term() {
        let term = Term::node("cond", vec![]).with_span(Span { start: 0, end: 4 });
        let err = expansion_err!("cond", &term, "cond requires at least one clause")
            .with_source("input.ex", "cond do end");
        assert_eq!(err.error_type(), ErrorType::Expansion);
        assert_eq!(err.construct(), Some("cond"));
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("keel::expansion"));
        assert!(output.contains("cond requires at least one clause"));
    }

    #[test]
    fn raise_errors_carry_their_kind() {
        let err = raise_err!("cond_clause", "no cond clause evaluated to a truthy value");
        assert_eq!(err.raised_kind(), Some("cond_clause"));
        assert_eq!(
            err.to_string(),
            "cond_clause: no cond clause evaluated to a truthy value"
        );
    }

    #[test]
    fn or_span_keeps_existing_span() {
        let err = err_ctx!(Eval, "bad", Span { start: 1, end: 2 })
            .or_span(Span { start: 5, end: 9 });
        let KeelError::Eval { ctx, .. } = err else {
            panic!("expected eval error");
        };
        assert_eq!(ctx.span, Some(Span { start: 1, end: 2 }));
    }
}
