//!
//! List primitives, the usual target of forwarding functions.
//!
//! ## Primitives Provided
//!
//! - `reverse/1`, `append/2`, `first/1`, `last/1`, `member?/2`

use crate::primitives::{expect_arity, expect_list, PrimitiveFn, PrimitiveRegistry};
use crate::runtime::value::Value;

pub const MODULE: &str = "lists";

/// Usage: lists.reverse(list)
///
/// Example:
///   lists.reverse([1, 2, 3]) ; => [3, 2, 1]
pub const PRIM_REVERSE: PrimitiveFn = |args| {
    expect_arity(args, 1, "lists.reverse")?;
    let list = expect_list(args, 0, "lists.reverse")?;
    Ok(Value::List(list.iter().rev().cloned().collect()))
};

/// Usage: lists.append(left, right)
pub const PRIM_APPEND: PrimitiveFn = |args| {
    expect_arity(args, 2, "lists.append")?;
    let mut left = expect_list(args, 0, "lists.append")?.clone();
    left.append(expect_list(args, 1, "lists.append")?.clone());
    Ok(Value::List(left))
};

/// First element, or `nil` for the empty list.
pub const PRIM_FIRST: PrimitiveFn = |args| {
    expect_arity(args, 1, "lists.first")?;
    Ok(expect_list(args, 0, "lists.first")?
        .front()
        .cloned()
        .unwrap_or(Value::Nil))
};

pub const PRIM_LAST: PrimitiveFn = |args| {
    expect_arity(args, 1, "lists.last")?;
    Ok(expect_list(args, 0, "lists.last")?
        .back()
        .cloned()
        .unwrap_or(Value::Nil))
};

/// Usage: lists.member?(value, list)
pub const PRIM_MEMBER: PrimitiveFn = |args| {
    expect_arity(args, 2, "lists.member?")?;
    let list = expect_list(args, 1, "lists.member?")?;
    Ok(Value::Bool(list.iter().any(|v| v.loose_eq(&args[0]))))
};

pub fn register_list_primitives(registry: &mut PrimitiveRegistry) {
    registry.register(MODULE, "reverse", PRIM_REVERSE);
    registry.register(MODULE, "append", PRIM_APPEND);
    registry.register(MODULE, "first", PRIM_FIRST);
    registry.register(MODULE, "last", PRIM_LAST);
    registry.register(MODULE, "member?", PRIM_MEMBER);
}
