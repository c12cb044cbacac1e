//!
//! Canonical construction of the primitive registry and the macro
//! environment, shared by the library, the CLI and the tests.
//!
//! ## Usage Workflow
//! ```rust
//! use keel::runtime::registry::{build_default_primitive_registry, build_isolated_macro_env};
//! // 1. Primitives (used for evaluation)
//! let primitives = build_default_primitive_registry();
//! // 2. Macro environment (used for expansion)
//! let env = build_isolated_macro_env();
//! assert!(!primitives.is_empty());
//! assert!(!env.core_macros.is_empty());
//! ```
//!
//! ## Schema Tables
//! `build_default_macro_env` shares the process-wide schema table, so a
//! record defined in one expansion is visible to the next. Tests that define
//! records use `build_isolated_macro_env` to get a private table.

use std::sync::Arc;

use crate::macros::{self, MacroEnv, MacroRegistry};
use crate::primitives::{self, PrimitiveRegistry};
use crate::runtime::schema::SchemaTable;

// ============================================================================
// Public API Implementation
// ============================================================================

/// Builds a primitive registry with every standard primitive registered.
#[inline]
pub fn build_default_primitive_registry() -> PrimitiveRegistry {
    let mut registry = PrimitiveRegistry::new();
    primitives::register_all_primitives(&mut registry);
    registry
}

/// Builds a macro registry holding the built-in lowerers.
#[inline]
pub fn build_default_macro_registry() -> MacroRegistry {
    let mut registry = MacroRegistry::new();
    macros::std::register_std_macros(&mut registry);
    registry
}

/// The macro environment backed by the process-wide schema table.
pub fn build_default_macro_env() -> MacroEnv {
    build_macro_env_with(SchemaTable::global())
}

pub fn build_macro_env_with(schemas: Arc<SchemaTable>) -> MacroEnv {
    let mut env = MacroEnv::new(schemas);
    env.core_macros = build_default_macro_registry();
    env
}

/// A macro environment with its own empty schema table.
pub fn build_isolated_macro_env() -> MacroEnv {
    build_macro_env_with(Arc::new(SchemaTable::new()))
}
