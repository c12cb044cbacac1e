//! # Keel Macro Expansion System
//!
//! Lowers surface constructs into the primitive core calculus of
//! [`crate::ast::prim`] before evaluation.
//!
//! ## Core Principles
//!
//! - **Syntactic Only**: lowerers see terms, never values. The only state
//!   they touch is the record schema table and the fresh-scope counter.
//! - **Pure Transformation**: every lowering builds a new tree.
//! - **Context Aware**: the driver tells each lowerer whether it sits in a
//!   pattern, a guard, or an expression, and which variables are bound.
//! - **Inspectable**: each step can be recorded in the expansion trace.
//!
//! ## Constructs
//!
//! | construct      | module                    |
//! |----------------|---------------------------|
//! | `match?`       | [`neutralize`]            |
//! | `cond`, `if`, `unless` | [`cond`]          |
//! | `<>`           | [`concat`]                |
//! | `destructure`  | [`destructure`]           |
//! | `defrecord`, `record` | [`record`]         |
//! | `defdelegate`  | [`delegate`]              |

pub mod bindings;
pub mod concat;
pub mod cond;
pub mod context;
pub mod delegate;
pub mod destructure;
pub mod expander;
pub mod neutralize;
pub mod record;
pub mod std;
pub mod types;

pub use context::LexicalContext;
pub use expander::{expand, expand_in};
pub use types::{
    ExpansionConfig, MacroEnv, MacroExpansionStep, MacroFn, MacroProvenance, MacroRegistry,
    MAX_EXPANSION_DEPTH,
};
