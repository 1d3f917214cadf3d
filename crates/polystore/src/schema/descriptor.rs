//! Entity descriptors: the read-only schema interface consumed by queries.

use serde::{Deserialize, Serialize};

use super::Field;

/// The declared type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean flag.
    Boolean,
    /// UTC timestamp.
    Timestamp,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(s)
    }
}

/// A declared field of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name as stored in the backend.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
}

/// Describes one entity type: its relation/collection name and declared
/// fields.
///
/// Descriptors are produced by the schema layer and only read here. The
/// identity field defaults to `id`; document stores that reserve their own
/// identity name (`_id`) ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    relation_name: String,
    id_field: Field,
    fields: Vec<FieldDef>,
}

impl EntityDescriptor {
    /// Creates a descriptor for the given relation/collection name.
    pub fn new(relation_name: impl Into<String>) -> Self {
        EntityDescriptor {
            relation_name: relation_name.into(),
            id_field: Field::named("id"),
            fields: Vec::new(),
        }
    }

    /// Declares a field.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
        });
        self
    }

    /// Overrides the identity field.
    pub fn with_id_field(mut self, field: Field) -> Self {
        self.id_field = field;
        self
    }

    /// The canonical relation/collection name.
    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    /// The identity field of this entity type.
    pub fn id_field(&self) -> &Field {
        &self.id_field
    }

    /// All declared fields.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns a [`Field`] reference for a declared field, or `None` when the
    /// name was never declared.
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields
            .iter()
            .find(|def| def.name == name)
            .map(|def| Field::named(&def.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup() {
        let descriptor = EntityDescriptor::new("products")
            .with_field("name", FieldType::String)
            .with_field("price", FieldType::Float);

        assert_eq!(descriptor.relation_name(), "products");
        assert_eq!(descriptor.fields().len(), 2);
        assert_eq!(descriptor.field("name"), Some(Field::named("name")));
        assert_eq!(descriptor.field("missing"), None);
        assert_eq!(descriptor.id_field(), &Field::named("id"));
    }

    #[test]
    fn test_id_field_override() {
        let descriptor =
            EntityDescriptor::new("events").with_id_field(Field::named("event_id"));
        assert_eq!(descriptor.id_field().name(), "event_id");
    }
}
