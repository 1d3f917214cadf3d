//! SQL constraints: a WHERE fragment plus its positional parameters.

use crate::query::{Constraint, Value};

pub(crate) const MATCH_ALL_SQL: &str = "1=1";
pub(crate) const MATCH_NONE_SQL: &str = "1=0";

/// A compiled SQL predicate.
///
/// Parameters line up with the `?` placeholders in the fragment, in order.
/// Constraints are immutable; composition happens through [`SqlFilters`]
/// which concatenates fragments and parameter lists.
///
/// [`SqlFilters`]: super::SqlFilters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlConstraint {
    sql: String,
    params: Vec<Value>,
}

impl SqlConstraint {
    pub(crate) fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        SqlConstraint {
            sql: sql.into(),
            params,
        }
    }

    /// The WHERE fragment.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Positional parameters, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl Constraint for SqlConstraint {
    fn is_match_all(&self) -> bool {
        self.sql == MATCH_ALL_SQL && self.params.is_empty()
    }

    fn is_match_none(&self) -> bool {
        self.sql == MATCH_NONE_SQL && self.params.is_empty()
    }
}
