//! Filter factory compiling semantic predicates into Query-DSL JSON.

use serde_json::{json, Value as Json};

use crate::query::{strip_wildcards, FilterFactory, Mode, QueryField, Value};
use crate::schema::Field;

use super::constraint::ElasticConstraint;

/// Builds [`ElasticConstraint`]s.
///
/// Equality compiles to `term` queries, prefix matching to case-insensitive
/// `prefix` queries, composition to `bool` queries. This factory overrides
/// the free-text token dispatch so that a [`QueryField`] boost is carried
/// into the generated clause (Elasticsearch is the only scoring backend).
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticFilters;

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::Timestamp(ts) => json!(ts.to_rfc3339()),
        }
    }
}

impl ElasticFilters {
    fn term(&self, field: &Field, value: Json, boost: Option<f32>) -> ElasticConstraint {
        let mut body = json!({ "value": value });
        if let Some(boost) = boost {
            body["boost"] = json!(boost);
        }
        ElasticConstraint::new(json!({ "term": { field.to_string(): body } }))
    }

    fn prefix_clause(&self, field: &Field, text: &str, boost: Option<f32>) -> ElasticConstraint {
        let mut body = json!({
            "value": strip_wildcards(text),
            "case_insensitive": true
        });
        if let Some(boost) = boost {
            body["boost"] = json!(boost);
        }
        ElasticConstraint::new(json!({ "prefix": { field.to_string(): body } }))
    }

    fn range(&self, field: &Field, operator: &str, value: Value) -> ElasticConstraint {
        ElasticConstraint::new(json!({
            "range": { field.to_string(): { operator: Json::from(value) } }
        }))
    }

    fn clauses(&self, constraints: Vec<ElasticConstraint>) -> Vec<Json> {
        constraints
            .into_iter()
            .map(ElasticConstraint::into_json)
            .collect()
    }
}

impl FilterFactory for ElasticFilters {
    type Constraint = ElasticConstraint;

    fn eq(&self, field: &Field, value: impl Into<Value>) -> ElasticConstraint {
        let value = value.into();
        if value.is_null() {
            // Null means "field is null or absent": documents without the
            // field in their index.
            ElasticConstraint::new(json!({
                "bool": { "must_not": [ { "exists": { "field": field.to_string() } } ] }
            }))
        } else {
            self.term(field, Json::from(value), None)
        }
    }

    fn prefix(&self, field: &Field, text: &str) -> ElasticConstraint {
        self.prefix_clause(field, text, None)
    }

    fn gt(&self, field: &Field, value: impl Into<Value>) -> ElasticConstraint {
        self.range(field, "gt", value.into())
    }

    fn gte(&self, field: &Field, value: impl Into<Value>) -> ElasticConstraint {
        self.range(field, "gte", value.into())
    }

    fn lt(&self, field: &Field, value: impl Into<Value>) -> ElasticConstraint {
        self.range(field, "lt", value.into())
    }

    fn lte(&self, field: &Field, value: impl Into<Value>) -> ElasticConstraint {
        self.range(field, "lte", value.into())
    }

    fn match_all(&self) -> ElasticConstraint {
        ElasticConstraint::new(json!({ "match_all": {} }))
    }

    fn match_none(&self) -> ElasticConstraint {
        ElasticConstraint::new(json!({ "match_none": {} }))
    }

    fn combine_all(&self, constraints: Vec<ElasticConstraint>) -> ElasticConstraint {
        ElasticConstraint::new(json!({ "bool": { "must": self.clauses(constraints) } }))
    }

    fn combine_any(&self, constraints: Vec<ElasticConstraint>) -> ElasticConstraint {
        ElasticConstraint::new(json!({
            "bool": {
                "should": self.clauses(constraints),
                "minimum_should_match": 1
            }
        }))
    }

    fn negate(&self, constraint: ElasticConstraint) -> ElasticConstraint {
        ElasticConstraint::new(json!({ "bool": { "must_not": [ constraint.into_json() ] } }))
    }

    /// Token dispatch carrying the spec's boost into the generated clause.
    fn compile_search_token(&self, spec: &QueryField, token: &str) -> ElasticConstraint {
        match spec.mode() {
            Mode::Equal => self.term(spec.field(), json!(token), spec.boost()),
            Mode::Like => {
                if token.contains('*') {
                    self.prefix_clause(spec.field(), token, spec.boost())
                } else {
                    self.term(spec.field(), json!(token), spec.boost())
                }
            }
            Mode::Prefix => self.prefix_clause(spec.field(), token, spec.boost()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Constraint, QueryCompiler};

    #[test]
    fn test_eq_renders_term_query() {
        let c = ElasticFilters.eq(&Field::named("name"), "wrench");
        assert_eq!(c.query(), &json!({ "term": { "name": { "value": "wrench" } } }));
    }

    #[test]
    fn test_eq_null_renders_must_not_exists() {
        let c = ElasticFilters.eq(&Field::named("discontinued_at"), Value::Null);
        assert_eq!(
            c.query(),
            &json!({ "bool": { "must_not": [ { "exists": { "field": "discontinued_at" } } ] } })
        );
    }

    #[test]
    fn test_eq_ignore_null_contract() {
        let field = Field::named("name");
        assert_eq!(
            ElasticFilters.eq(&field, "wrench"),
            ElasticFilters.eq_ignore_null(&field, "wrench")
        );
        assert!(ElasticFilters
            .eq_ignore_null(&field, None::<&str>)
            .is_match_all());
    }

    #[test]
    fn test_prefix_strips_wildcards() {
        let with_marker = ElasticFilters.prefix(&Field::named("name"), "abc*");
        let without = ElasticFilters.prefix(&Field::named("name"), "abc");
        assert_eq!(with_marker, without);
        assert_eq!(
            without.query(),
            &json!({ "prefix": { "name": { "value": "abc", "case_insensitive": true } } })
        );
    }

    #[test]
    fn test_range_operators() {
        let field = Field::named("price");
        assert_eq!(
            ElasticFilters.gt(&field, 5).query(),
            &json!({ "range": { "price": { "gt": 5 } } })
        );
        assert_eq!(
            ElasticFilters.lte(&field, 5).query(),
            &json!({ "range": { "price": { "lte": 5 } } })
        );
    }

    #[test]
    fn test_neutral_elements() {
        assert!(ElasticFilters.and(Vec::new()).is_match_all());
        assert!(ElasticFilters.or(Vec::new()).is_match_none());
        assert!(ElasticFilters
            .and([ElasticFilters.or(Vec::new())])
            .is_match_none());
        assert!(ElasticFilters.not(ElasticFilters.match_all()).is_match_none());
    }

    #[test]
    fn test_boost_carried_into_search_clauses() {
        let spec = QueryField::equal(Field::named("name")).with_boost(2.0);
        let c = ElasticFilters.compile_search_token(&spec, "wrench");
        assert_eq!(
            c.query(),
            &json!({ "term": { "name": { "value": "wrench", "boost": 2.0 } } })
        );
    }

    #[test]
    fn test_compiler_builds_and_of_ors() {
        let specs = vec![
            QueryField::equal(Field::named("name")),
            QueryField::prefix(Field::named("description")),
        ];
        let compiled = QueryCompiler::new(&ElasticFilters, &specs).compile("red car");

        let expected = ElasticFilters.and([
            ElasticFilters.or([
                ElasticFilters.eq(&Field::named("name"), "red"),
                ElasticFilters.prefix(&Field::named("description"), "red"),
            ]),
            ElasticFilters.or([
                ElasticFilters.eq(&Field::named("name"), "car"),
                ElasticFilters.prefix(&Field::named("description"), "car"),
            ]),
        ]);
        assert_eq!(compiled, expected);
    }

    #[test]
    fn test_compiler_empty_query_is_match_all() {
        let specs = vec![QueryField::prefix(Field::named("name"))];
        assert!(QueryCompiler::new(&ElasticFilters, &specs)
            .compile("  ")
            .is_match_all());
    }
}
