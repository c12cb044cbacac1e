use std::path::Path;

use crate::ast::{prim, Term};
use crate::macros::{
    expand_in, ExpansionConfig, LexicalContext, MacroEnv, MacroExpansionStep,
};
use crate::primitives::PrimitiveRegistry;
use crate::runtime::eval::Evaluator;
use crate::runtime::registry::{
    build_default_macro_env, build_default_primitive_registry, build_isolated_macro_env,
};
use crate::runtime::value::Value;
use crate::{err_msg, KeelError};

// ============================================================================
// PROGRAM INPUT
// ============================================================================

/// Reads a program from JSON: a single term, or an array of terms that runs
/// as one `block`.
pub fn parse_program(text: &str) -> Result<Term, KeelError> {
    let raw: serde_json::Value = serde_json::from_str(text)?;
    match raw {
        serde_json::Value::Array(items) => {
            let terms = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<Term>, _>>()?;
            Ok(Term::node(prim::BLOCK, terms))
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

// ============================================================================
// EXECUTION PIPELINE
// ============================================================================

/// Expand → validate → evaluate. The CLI and the integration tests go
/// through this type so they observe the same behavior.
pub struct ExecutionPipeline {
    pub macro_env: MacroEnv,
    pub primitives: PrimitiveRegistry,
    /// Enclosing module for expansion (`defdelegate`) and for `def`.
    pub module: Option<String>,
    /// Reject output that still contains a surface construct.
    pub validate: bool,
}

impl Default for ExecutionPipeline {
    fn default() -> Self {
        Self::with_env(build_default_macro_env())
    }
}

impl ExecutionPipeline {
    /// A pipeline whose record schemas are private to it.
    pub fn isolated() -> Self {
        Self::with_env(build_isolated_macro_env())
    }

    fn with_env(macro_env: MacroEnv) -> Self {
        Self {
            macro_env,
            primitives: build_default_primitive_registry(),
            module: None,
            validate: true,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_config(mut self, config: ExpansionConfig) -> Self {
        self.macro_env.config = config;
        self
    }

    pub fn context(&self) -> LexicalContext {
        match &self.module {
            Some(module) => LexicalContext::in_module(module),
            None => LexicalContext::new(),
        }
    }

    /// Fully expands `term`. The trace restarts with every call.
    pub fn expand(&mut self, term: Term) -> Result<Term, KeelError> {
        self.macro_env.trace.clear();
        let ctx = self.context();
        let expanded = expand_in(term, &mut self.macro_env, &ctx)?;
        if self.validate {
            self.validate_expanded(&expanded)?;
        }
        Ok(expanded)
    }

    /// Steps recorded by the last `expand` call.
    pub fn trace(&self) -> &[MacroExpansionStep] {
        self.macro_env.trace()
    }

    /// Checks that no registered construct survived expansion.
    pub fn validate_expanded(&self, term: &Term) -> Result<(), KeelError> {
        match term {
            Term::Literal(_) | Term::Symbol(_) => Ok(()),
            Term::Pair(left, right) => {
                self.validate_expanded(left)?;
                self.validate_expanded(right)
            }
            Term::Sequence(items) | Term::Aggregate { elements: items, .. } => {
                items.iter().try_for_each(|t| self.validate_expanded(t))
            }
            Term::Node { tag, children, meta } => {
                if self.macro_env.lookup_macro(tag).is_some() {
                    return Err(err_msg!(
                        Internal,
                        "construct {} survived expansion: {}",
                        tag,
                        term
                    )
                    .or_span(meta.span));
                }
                children.iter().try_for_each(|t| self.validate_expanded(t))
            }
        }
    }

    /// Evaluates an already-expanded term against the current schemas.
    pub fn evaluate(&self, expanded: &Term) -> Result<Value, KeelError> {
        let mut evaluator = Evaluator::new(
            self.primitives.clone(),
            self.macro_env.schemas().snapshot(),
        )
        .with_module(self.module.clone().unwrap_or_default());
        evaluator.eval_program(expanded)
    }

    pub fn execute(&mut self, term: Term) -> Result<Value, KeelError> {
        let expanded = self.expand(term)?;
        self.evaluate(&expanded)
    }

    /// Reads and parses a program file.
    pub fn read_file(path: &Path) -> Result<(String, Term), KeelError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            err_msg!(Input, "cannot read {}: {}", path.display(), e)
        })?;
        let term = parse_program(&text)?;
        Ok((text, term))
    }
}
