//! Filter factory compiling semantic predicates into BSON filter documents.

use mongodb::bson::{doc, Bson, Document};

use crate::query::{strip_wildcards, FilterFactory, Value};
use crate::schema::Field;

use super::constraint::MongoConstraint;

/// Builds [`MongoConstraint`]s.
///
/// Field paths render dot-joined, which MongoDB resolves natively into
/// embedded documents. `eq` with a Null value compiles to `{field: null}`,
/// which MongoDB matches against both null values and absent fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoFilters;

impl From<Value> for Bson {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(b),
            Value::Int(i) => Bson::Int64(i),
            Value::Float(f) => Bson::Double(f),
            Value::Str(s) => Bson::String(s),
            Value::Timestamp(ts) => {
                Bson::DateTime(mongodb::bson::DateTime::from_millis(ts.timestamp_millis()))
            }
        }
    }
}

impl MongoFilters {
    fn compare(&self, field: &Field, operator: &str, value: Value) -> MongoConstraint {
        MongoConstraint::new(doc! {
            field.to_string(): { operator: Bson::from(value) }
        })
    }

    fn documents(&self, constraints: Vec<MongoConstraint>) -> Vec<Document> {
        constraints
            .into_iter()
            .map(MongoConstraint::into_document)
            .collect()
    }
}

impl FilterFactory for MongoFilters {
    type Constraint = MongoConstraint;

    fn eq(&self, field: &Field, value: impl Into<Value>) -> MongoConstraint {
        MongoConstraint::new(doc! { field.to_string(): Bson::from(value.into()) })
    }

    fn prefix(&self, field: &Field, text: &str) -> MongoConstraint {
        let pattern = format!("^{}", regex::escape(&strip_wildcards(text)));
        MongoConstraint::new(doc! {
            field.to_string(): { "$regex": pattern, "$options": "i" }
        })
    }

    fn gt(&self, field: &Field, value: impl Into<Value>) -> MongoConstraint {
        self.compare(field, "$gt", value.into())
    }

    fn gte(&self, field: &Field, value: impl Into<Value>) -> MongoConstraint {
        self.compare(field, "$gte", value.into())
    }

    fn lt(&self, field: &Field, value: impl Into<Value>) -> MongoConstraint {
        self.compare(field, "$lt", value.into())
    }

    fn lte(&self, field: &Field, value: impl Into<Value>) -> MongoConstraint {
        self.compare(field, "$lte", value.into())
    }

    fn match_all(&self) -> MongoConstraint {
        MongoConstraint::new(Document::new())
    }

    fn match_none(&self) -> MongoConstraint {
        MongoConstraint::new(MongoConstraint::match_none_filter())
    }

    fn combine_all(&self, constraints: Vec<MongoConstraint>) -> MongoConstraint {
        MongoConstraint::new(doc! { "$and": self.documents(constraints) })
    }

    fn combine_any(&self, constraints: Vec<MongoConstraint>) -> MongoConstraint {
        MongoConstraint::new(doc! { "$or": self.documents(constraints) })
    }

    fn negate(&self, constraint: MongoConstraint) -> MongoConstraint {
        MongoConstraint::new(doc! { "$nor": [constraint.into_document()] })
    }
}
