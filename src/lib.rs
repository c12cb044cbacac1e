//! Keel: a compile-time lowering engine for pattern-aware surface constructs.
//!
//! Surface constructs (`match?`, `cond`, `if`, `unless`, `<>`, `destructure`,
//! records and `defdelegate`) are expanded into a small core calculus of
//! primitive nodes. A reference evaluator runs the lowered code.

pub use crate::diagnostics::{to_error_source, ErrorContext, ErrorType, KeelError};

pub mod ast;
pub mod cli;
pub mod diagnostics;
pub mod engine;
pub mod macros;
pub mod primitives;
pub mod runtime;
