//! Shared fixtures for the integration tests.

use polystore::backends::sqlite::Database;
use polystore::query::Value;
use polystore::schema::{EntityDescriptor, FieldType};

/// The product catalog used throughout the integration tests.
pub fn products() -> EntityDescriptor {
    EntityDescriptor::new("products")
        .with_field("name", FieldType::String)
        .with_field("description", FieldType::String)
        .with_field("price", FieldType::Float)
        .with_field("discontinued_at", FieldType::Timestamp)
}

/// An in-memory database seeded with five products.
///
/// Prices ascending: red bucket (3.50), wrench (9.50), hammer (14.00),
/// Redwood plank (18.00), wrench set (39.00). Only the hammer is
/// discontinued.
pub fn seeded_database() -> Database {
    let db = Database::in_memory().expect("failed to open in-memory database");
    db.execute(
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price REAL NOT NULL,
            discontinued_at TEXT
        )",
        &[],
    )
    .expect("failed to create products table");

    let rows: &[(&str, &str, f64, Option<&str>)] = &[
        ("wrench", "hand tool for plumbing", 9.5, None),
        ("wrench set", "tool set in a steel case", 39.0, None),
        ("Redwood plank", "carpentry grade lumber", 18.0, None),
        ("hammer", "claw hammer", 14.0, Some("2025-12-01T00:00:00Z")),
        ("red bucket", "plastic bucket", 3.5, None),
    ];
    for (name, description, price, discontinued_at) in rows {
        db.execute(
            "INSERT INTO products (name, description, price, discontinued_at)
             VALUES (?, ?, ?, ?)",
            &[
                Value::Str((*name).to_string()),
                Value::Str((*description).to_string()),
                Value::Float(*price),
                discontinued_at
                    .map(|ts| Value::Str(ts.to_string()))
                    .unwrap_or(Value::Null),
            ],
        )
        .expect("failed to seed products");
    }
    db
}
