//! Core types of the expansion engine.
//!
//! This module has no dependencies on the lowerers, making it the foundation
//! layer of the macro system.
//!
//! ## Ownership
//!
//! - `MacroFn` is a function pointer, cheaply copyable
//! - `MacroEnv` owns both registries, the trace and the scope counter
//! - the schema table is shared through an `Arc`, so several environments can
//!   expand against one table

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{ScopeTag, Term};
use crate::macros::context::LexicalContext;
use crate::runtime::schema::{FieldDescriptor, Schema, SchemaTable};
use crate::KeelError;

/// Maximum number of nested expansions before the driver gives up.
pub const MAX_EXPANSION_DEPTH: usize = 128;

/// A lowerer: receives the whole construct node, the environment, and the
/// lexical context of the node, and returns its replacement.
///
/// # Examples
///
/// ```rust
/// use keel::macros::MacroFn;
/// use keel::ast::Term;
/// // Lowers `noop(x)` to `x`.
/// let noop: MacroFn = |node, _env, _ctx| {
///     Ok(node.as_node("noop").and_then(|c| c.first()).cloned().unwrap_or_else(Term::nil))
/// };
/// ```
pub type MacroFn = fn(&Term, &mut MacroEnv, &LexicalContext) -> Result<Term, KeelError>;

/// Registry of lowerers keyed by construct tag.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    pub macros: HashMap<String, MacroFn>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a lowerer, returning the one it replaced, if any.
    pub fn register(&mut self, name: &str, func: MacroFn) -> Option<MacroFn> {
        self.macros.insert(name.to_string(), func)
    }

    /// Registers a lowerer, failing if the tag is taken.
    pub fn register_or_error(&mut self, name: &str, func: MacroFn) -> Result<(), KeelError> {
        if self.macros.contains_key(name) {
            return Err(crate::err_msg!(
                Internal,
                "macro '{}' is already registered",
                name
            ));
        }
        self.macros.insert(name.to_string(), func);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<MacroFn> {
        self.macros.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.macros.keys()
    }
}

/// Which registry a lowerer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroProvenance {
    User,
    Core,
}

/// One expansion step, for traceability.
#[derive(Debug, Clone)]
pub struct MacroExpansionStep {
    pub construct: String,
    pub provenance: MacroProvenance,
    pub input: Term,
    pub output: Term,
}

/// Tunables for one expansion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionConfig {
    pub max_depth: usize,
    /// Record every step in `MacroEnv::trace`.
    pub trace: bool,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_EXPANSION_DEPTH,
            trace: true,
        }
    }
}

/// Expansion environment: registries, schema table, trace, fresh scopes.
#[derive(Debug, Clone)]
pub struct MacroEnv {
    pub user_macros: MacroRegistry,
    pub core_macros: MacroRegistry,
    pub config: ExpansionConfig,
    pub trace: Vec<MacroExpansionStep>,
    schemas: Arc<SchemaTable>,
    next_scope: u32,
}

impl MacroEnv {
    /// An environment with no lowerers registered.
    pub fn new(schemas: Arc<SchemaTable>) -> Self {
        Self {
            user_macros: MacroRegistry::new(),
            core_macros: MacroRegistry::new(),
            config: ExpansionConfig::default(),
            trace: Vec::new(),
            schemas,
            next_scope: ScopeTag::GENERATED_BASE,
        }
    }

    pub fn with_config(mut self, config: ExpansionConfig) -> Self {
        self.config = config;
        self
    }

    /// Looks up a lowerer, user registry first.
    pub fn lookup_macro(&self, name: &str) -> Option<(MacroProvenance, MacroFn)> {
        self.user_macros
            .macros
            .get(name)
            .map(|f| (MacroProvenance::User, *f))
            .or_else(|| {
                self.core_macros
                    .macros
                    .get(name)
                    .map(|f| (MacroProvenance::Core, *f))
            })
    }

    pub fn trace(&self) -> &[MacroExpansionStep] {
        &self.trace
    }

    /// Mints a scope tag no author-written variable can carry.
    pub fn fresh_scope(&mut self) -> ScopeTag {
        let tag = ScopeTag(self.next_scope);
        self.next_scope = self.next_scope.wrapping_add(1).max(ScopeTag::GENERATED_BASE);
        tag
    }

    /// A generated variable named `name` in a fresh scope.
    pub fn fresh_var(&mut self, name: &str) -> Term {
        let scope = self.fresh_scope();
        Term::scoped_var(name, scope)
    }

    pub fn schemas(&self) -> &Arc<SchemaTable> {
        &self.schemas
    }

    pub fn lookup_schema(&self, tag: &str) -> Option<Arc<Schema>> {
        self.schemas.lookup(tag)
    }

    pub fn register_schema(
        &self,
        tag: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Arc<Schema>, KeelError> {
        self.schemas.register(tag, fields)
    }
}
