//! Record schema table.
//!
//! Schemas are insert-once, read-many. Registration serializes through a
//! write lock; readers clone an `im::HashMap` snapshot (structural sharing,
//! O(1)) and look up without holding any lock. A registered schema is never
//! mutated. Re-registering a tag with an identical schema is a no-op; with a
//! different one it is an error.

use std::sync::{Arc, RwLock};

use im::HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ast::Term;
use crate::{err_msg, KeelError};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// One declared record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub default: Term,
    pub position: usize,
    /// Declared type, kept verbatim for tooling.
    #[serde(default)]
    pub ty: Option<Term>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, default: Term, position: usize) -> Self {
        Self {
            name: name.into(),
            default,
            position,
            ty: None,
        }
    }
}

/// The ordered field layout of a record tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tag: String,
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Builds a schema from `(name, default)` pairs, assigning positions in order.
    pub fn from_defaults<I, S>(tag: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Term)>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(position, (name, default))| FieldDescriptor::new(name, default, position))
            .collect();
        Self {
            tag: tag.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.position)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A lock-free, point-in-time view of the schema table.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaSnapshot {
    pub fn lookup(&self, tag: &str) -> Option<Arc<Schema>> {
        self.schemas.get(tag).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Shared, thread-safe schema registry.
#[derive(Debug, Default)]
pub struct SchemaTable {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

static GLOBAL_SCHEMAS: Lazy<Arc<SchemaTable>> = Lazy::new(|| Arc::new(SchemaTable::new()));

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table.
    pub fn global() -> Arc<SchemaTable> {
        Arc::clone(&GLOBAL_SCHEMAS)
    }

    /// Registers `fields` under `tag`.
    ///
    /// # Errors
    /// Returns `KeelError::Schema` if `tag` is already registered with a
    /// different field layout.
    pub fn register(
        &self,
        tag: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Arc<Schema>, KeelError> {
        let schema = Schema {
            tag: tag.to_string(),
            fields,
        };
        let mut guard = self.schemas.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guard.get(tag) {
            if **existing == schema {
                return Ok(Arc::clone(existing));
            }
            return Err(err_msg!(
                Schema,
                "record {} is already defined with fields [{}], cannot redefine it with fields [{}]",
                tag,
                existing.field_names().collect::<Vec<_>>().join(", "),
                schema.field_names().collect::<Vec<_>>().join(", ")
            ));
        }
        let schema = Arc::new(schema);
        guard.insert(tag.to_string(), Arc::clone(&schema));
        tracing::debug!(tag, fields = schema.len(), "registered record schema");
        Ok(schema)
    }

    pub fn lookup(&self, tag: &str) -> Option<Arc<Schema>> {
        self.read().get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.read().contains_key(tag)
    }

    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            schemas: self.read().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Schema>>> {
        self.schemas.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_fields() -> Vec<FieldDescriptor> {
        Schema::from_defaults("User", [("name", Term::nil()), ("age", Term::int(0))]).fields
    }

    #[test]
    fn register_is_idempotent_for_identical_layouts() {
        let table = SchemaTable::new();
        let first = table.register("User", user_fields()).unwrap();
        let second = table.register("User", user_fields()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
        assert_eq!(first.position_of("age"), Some(1));
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let table = SchemaTable::new();
        table.register("User", user_fields()).unwrap();
        let other = Schema::from_defaults("User", [("id", Term::nil())]).fields;
        let err = table.register("User", other).unwrap_err();
        assert!(err.to_string().contains("already defined"));
        assert_eq!(table.lookup("User").unwrap().len(), 2);
    }

    #[test]
    fn snapshots_do_not_see_later_registrations() {
        let table = SchemaTable::new();
        let before = table.snapshot();
        table.register("User", user_fields()).unwrap();
        assert!(before.lookup("User").is_none());
        assert!(table.snapshot().lookup("User").is_some());
    }
}
