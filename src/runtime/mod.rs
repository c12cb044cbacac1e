//! Run-time support for lowered code: the schema table shared with the
//! expander, value model, registry construction and the reference evaluator.

pub mod eval;
pub mod registry;
pub mod schema;
pub mod value;

pub use eval::{Bindings, Evaluator};
pub use schema::{FieldDescriptor, Schema, SchemaSnapshot, SchemaTable};
pub use value::Value;
