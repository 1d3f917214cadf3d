//! Elastic constraints: JSON query-DSL fragments.

use serde_json::{json, Value};

use crate::query::Constraint;

/// A compiled Elasticsearch predicate.
///
/// Wraps one Query-DSL JSON fragment. `match_all`/`match_none` are the two
/// neutral elements the composition rules recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticConstraint {
    query: Value,
}

impl ElasticConstraint {
    pub(crate) fn new(query: Value) -> Self {
        ElasticConstraint { query }
    }

    /// The native query fragment.
    pub fn query(&self) -> &Value {
        &self.query
    }

    pub(crate) fn into_json(self) -> Value {
        self.query
    }
}

impl Constraint for ElasticConstraint {
    fn is_match_all(&self) -> bool {
        self.query == json!({ "match_all": {} })
    }

    fn is_match_none(&self) -> bool {
        self.query == json!({ "match_none": {} })
    }
}
