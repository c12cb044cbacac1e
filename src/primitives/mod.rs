//! # Keel Primitive Operations
//!
//! Native functions reachable through `call(:module, :name, args)` in lowered
//! code. They are thin: argument checks, then the operation.
//!
//! ## Module Structure
//!
//! - **`kernel`**: guard-safe comparisons, boolean logic, type tests, `falsy?`
//! - **`lists`**: list operations (`reverse`, `append`, ...)
//!
//! All primitives are pure functions of their evaluated arguments.

use im::HashMap;

use crate::runtime::value::Value;
use crate::{raise_err, KeelError};

pub mod kernel;
pub mod lists;

/// A primitive: evaluated arguments in, value out.
pub type PrimitiveFn = fn(args: &[Value]) -> Result<Value, KeelError>;

/// Registry of primitives keyed by `module.name`.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveRegistry {
    pub primitives: HashMap<String, PrimitiveFn>,
}

impl PrimitiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: &str, name: &str, func: PrimitiveFn) {
        self.primitives.insert(qualified(module, name), func);
    }

    pub fn get(&self, module: &str, name: &str) -> Option<PrimitiveFn> {
        self.primitives.get(&qualified(module, name)).copied()
    }

    pub fn has(&self, module: &str, name: &str) -> bool {
        self.get(module, name).is_some()
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.primitives.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

fn qualified(module: &str, name: &str) -> String {
    format!("{}.{}", module, name)
}

/// Registers every standard primitive.
pub fn register_all_primitives(registry: &mut PrimitiveRegistry) {
    kernel::register_kernel_primitives(registry);
    lists::register_list_primitives(registry);
}

// ============================================================================
// SHARED ARGUMENT HELPERS
// ============================================================================

/// Checks the argument count - DRY utility
pub fn expect_arity(args: &[Value], expected: usize, name: &str) -> Result<(), KeelError> {
    if args.len() != expected {
        return Err(raise_err!(
            "arity_error",
            "{} expects {} argument{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            args.len()
        ));
    }
    Ok(())
}

/// Raises `argument_error` for a value of the wrong type - DRY utility
pub fn type_error(name: &str, expected: &str, got: &Value) -> KeelError {
    raise_err!(
        "argument_error",
        "{} expects {}, got {} {}",
        name,
        expected,
        got.type_name(),
        got
    )
}

pub fn expect_bool(args: &[Value], index: usize, name: &str) -> Result<bool, KeelError> {
    match &args[index] {
        Value::Bool(b) => Ok(*b),
        other => Err(type_error(name, "a boolean", other)),
    }
}

pub fn expect_list<'a>(
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<&'a im::Vector<Value>, KeelError> {
    args[index]
        .as_list()
        .ok_or_else(|| type_error(name, "a list", &args[index]))
}
