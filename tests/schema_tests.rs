//! Schema table behavior under sharing.

use std::sync::Arc;
use std::thread;

use keel::ast::Term;
use keel::runtime::schema::{Schema, SchemaTable};
use keel::KeelError;

fn point_fields() -> Vec<keel::runtime::schema::FieldDescriptor> {
    Schema::from_defaults("Point", [("x", Term::int(0)), ("y", Term::int(0))]).fields
}

#[test]
fn concurrent_identical_registrations_agree() {
    let table = Arc::new(SchemaTable::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let table = Arc::clone(&table);
            thread::spawn(move || table.register("Point", point_fields()))
        })
        .collect();

    for handle in handles {
        let schema = handle.join().expect("thread panicked").expect("registration failed");
        assert_eq!(schema.position_of("y"), Some(1));
    }
    assert_eq!(table.len(), 1);
}

#[test]
fn readers_keep_their_snapshot_while_writers_register() {
    let table = Arc::new(SchemaTable::new());
    table.register("Point", point_fields()).unwrap();
    let snapshot = table.snapshot();

    let writer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for i in 0..16 {
                let tag = format!("Tag{}", i);
                table
                    .register(&tag, Schema::from_defaults(tag.as_str(), [("v", Term::nil())]).fields)
                    .unwrap();
            }
        })
    };
    writer.join().expect("writer panicked");

    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.lookup("Tag3").is_none());
    assert_eq!(table.len(), 17);
    assert!(table.contains("Tag3"));
}

#[test]
fn conflicting_layouts_are_schema_errors() {
    let table = SchemaTable::new();
    table.register("Point", point_fields()).unwrap();
    let flipped = Schema::from_defaults("Point", [("y", Term::int(0)), ("x", Term::int(0))]).fields;
    let err = table.register("Point", flipped).unwrap_err();
    assert!(matches!(err, KeelError::Schema { .. }));
    assert_eq!(
        table.lookup("Point").unwrap().field_names().collect::<Vec<_>>(),
        vec!["x", "y"]
    );
}

#[test]
fn defaults_must_match_for_a_registration_to_be_identical() {
    let table = SchemaTable::new();
    table.register("Point", point_fields()).unwrap();
    let other_defaults =
        Schema::from_defaults("Point", [("x", Term::int(1)), ("y", Term::int(0))]).fields;
    assert!(table.register("Point", other_defaults).is_err());
}
