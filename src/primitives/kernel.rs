//!
//! Guard-safe kernel primitives.
//!
//! ## Primitives Provided
//!
//! - **Truthiness**: `falsy?`, `truthy?`
//! - **Comparison**: `==`, `!=`, `<`, `>`, `<=`, `>=`
//! - **Logic**: `and`, `or`, `not` (strictly boolean)
//! - **Type tests**: `is_nil`, `is_atom`, `is_binary`, `is_integer`, `is_list`
//! - **Sizes**: `byte_size`, `length`
//! - **Arithmetic**: `+`, `-` (integers only)

use crate::primitives::{
    expect_arity, expect_bool, expect_list, type_error, PrimitiveFn, PrimitiveRegistry,
};
use crate::runtime::value::Value;

pub const MODULE: &str = "kernel";

// ============================================================================
// TRUTHINESS
// ============================================================================

/// Returns true for `nil` and `false`.
///
/// Usage: kernel.falsy?(x)
///
/// Example:
///   kernel.falsy?(nil) ; => true
///   kernel.falsy?(0)   ; => false
pub const PRIM_FALSY: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.falsy?")?;
    Ok(Value::Bool(args[0].is_falsy()))
};

pub const PRIM_TRUTHY: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.truthy?")?;
    Ok(Value::Bool(!args[0].is_falsy()))
};

// ============================================================================
// COMPARISON
// ============================================================================

/// Structural equality; integers and floats compare by value.
///
/// Usage: kernel.==(a, b)
pub const PRIM_EQ: PrimitiveFn = |args| {
    expect_arity(args, 2, "kernel.==")?;
    Ok(Value::Bool(args[0].loose_eq(&args[1])))
};

pub const PRIM_NEQ: PrimitiveFn = |args| {
    expect_arity(args, 2, "kernel.!=")?;
    Ok(Value::Bool(!args[0].loose_eq(&args[1])))
};

pub const PRIM_LT: PrimitiveFn = |args| compare(args, "kernel.<", |o| o.is_lt());
pub const PRIM_GT: PrimitiveFn = |args| compare(args, "kernel.>", |o| o.is_gt());
pub const PRIM_LTE: PrimitiveFn = |args| compare(args, "kernel.<=", |o| o.is_le());
pub const PRIM_GTE: PrimitiveFn = |args| compare(args, "kernel.>=", |o| o.is_ge());

/// Orders numbers with numbers and binaries with binaries.
fn compare(
    args: &[Value],
    name: &str,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, crate::KeelError> {
    expect_arity(args, 2, name)?;
    let ordering = match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Binary(a), Value::Binary(b)) => a.partial_cmp(b),
        (a, Value::Int(_) | Value::Float(_) | Value::Binary(_)) => {
            return Err(type_error(name, "comparable operands", a))
        }
        (_, b) => return Err(type_error(name, "comparable operands", b)),
    };
    Ok(Value::Bool(ordering.is_some_and(test)))
}

// ============================================================================
// LOGIC
// ============================================================================

/// Boolean `or`; both operands must be booleans.
///
/// Usage: kernel.or(a, b)
pub const PRIM_OR: PrimitiveFn = |args| {
    expect_arity(args, 2, "kernel.or")?;
    Ok(Value::Bool(
        expect_bool(args, 0, "kernel.or")? || expect_bool(args, 1, "kernel.or")?,
    ))
};

pub const PRIM_AND: PrimitiveFn = |args| {
    expect_arity(args, 2, "kernel.and")?;
    Ok(Value::Bool(
        expect_bool(args, 0, "kernel.and")? && expect_bool(args, 1, "kernel.and")?,
    ))
};

pub const PRIM_NOT: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.not")?;
    Ok(Value::Bool(!expect_bool(args, 0, "kernel.not")?))
};

// ============================================================================
// TYPE TESTS AND SIZES
// ============================================================================

pub const PRIM_IS_NIL: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.is_nil")?;
    Ok(Value::Bool(matches!(args[0], Value::Nil)))
};

pub const PRIM_IS_ATOM: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.is_atom")?;
    Ok(Value::Bool(matches!(
        args[0],
        Value::Atom(_) | Value::Nil | Value::Bool(_)
    )))
};

pub const PRIM_IS_BINARY: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.is_binary")?;
    Ok(Value::Bool(matches!(args[0], Value::Binary(_))))
};

pub const PRIM_IS_INTEGER: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.is_integer")?;
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
};

pub const PRIM_IS_LIST: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.is_list")?;
    Ok(Value::Bool(matches!(args[0], Value::List(_))))
};

/// Usage: kernel.byte_size(bin)
pub const PRIM_BYTE_SIZE: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.byte_size")?;
    match &args[0] {
        Value::Binary(s) => Ok(Value::Int(s.len() as i64)),
        other => Err(type_error("kernel.byte_size", "a binary", other)),
    }
};

pub const PRIM_LENGTH: PrimitiveFn = |args| {
    expect_arity(args, 1, "kernel.length")?;
    Ok(Value::Int(expect_list(args, 0, "kernel.length")?.len() as i64))
};

// ============================================================================
// ARITHMETIC
// ============================================================================

pub const PRIM_ADD: PrimitiveFn = |args| integer_op(args, "kernel.+", i64::checked_add);
pub const PRIM_SUB: PrimitiveFn = |args| integer_op(args, "kernel.-", i64::checked_sub);

fn integer_op(
    args: &[Value],
    name: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<Value, crate::KeelError> {
    expect_arity(args, 2, name)?;
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| crate::raise_err!("arithmetic_error", "{} overflowed", name)),
        (Value::Int(_), other) | (other, _) => Err(type_error(name, "integers", other)),
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

pub fn register_kernel_primitives(registry: &mut PrimitiveRegistry) {
    registry.register(MODULE, "falsy?", PRIM_FALSY);
    registry.register(MODULE, "truthy?", PRIM_TRUTHY);
    registry.register(MODULE, "==", PRIM_EQ);
    registry.register(MODULE, "!=", PRIM_NEQ);
    registry.register(MODULE, "<", PRIM_LT);
    registry.register(MODULE, ">", PRIM_GT);
    registry.register(MODULE, "<=", PRIM_LTE);
    registry.register(MODULE, ">=", PRIM_GTE);
    registry.register(MODULE, "or", PRIM_OR);
    registry.register(MODULE, "and", PRIM_AND);
    registry.register(MODULE, "not", PRIM_NOT);
    registry.register(MODULE, "is_nil", PRIM_IS_NIL);
    registry.register(MODULE, "is_atom", PRIM_IS_ATOM);
    registry.register(MODULE, "is_binary", PRIM_IS_BINARY);
    registry.register(MODULE, "is_integer", PRIM_IS_INTEGER);
    registry.register(MODULE, "is_list", PRIM_IS_LIST);
    registry.register(MODULE, "byte_size", PRIM_BYTE_SIZE);
    registry.register(MODULE, "length", PRIM_LENGTH);
    registry.register(MODULE, "+", PRIM_ADD);
    registry.register(MODULE, "-", PRIM_SUB);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_matches_nil_and_false_only() {
        assert_eq!(PRIM_FALSY(&[Value::Nil]).unwrap(), Value::Bool(true));
        assert_eq!(PRIM_FALSY(&[Value::Bool(false)]).unwrap(), Value::Bool(true));
        assert_eq!(PRIM_FALSY(&[Value::Int(0)]).unwrap(), Value::Bool(false));
        assert_eq!(PRIM_FALSY(&[Value::list([])]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn comparisons_reject_mixed_kinds() {
        assert_eq!(
            PRIM_GT(&[Value::Int(3), Value::Float(2.5)]).unwrap(),
            Value::Bool(true)
        );
        let err = PRIM_LT(&[Value::atom("a"), Value::Int(1)]).unwrap_err();
        assert_eq!(err.raised_kind(), Some("argument_error"));
    }

    #[test]
    fn logic_is_strictly_boolean() {
        assert_eq!(
            PRIM_OR(&[Value::Bool(false), Value::Bool(true)]).unwrap(),
            Value::Bool(true)
        );
        assert!(PRIM_AND(&[Value::Nil, Value::Bool(true)]).is_err());
    }

    #[test]
    fn addition_checks_overflow() {
        assert_eq!(PRIM_ADD(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
        let err = PRIM_ADD(&[Value::Int(i64::MAX), Value::Int(1)]).unwrap_err();
        assert_eq!(err.raised_kind(), Some("arithmetic_error"));
    }
}
