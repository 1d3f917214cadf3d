//! Filter factory compiling semantic predicates into SQL fragments.

use crate::query::{strip_wildcards, FilterFactory, Value};
use crate::schema::Field;

use super::constraint::{SqlConstraint, MATCH_ALL_SQL, MATCH_NONE_SQL};

/// Builds [`SqlConstraint`]s.
///
/// Identifiers are rendered double-quoted from the field's full path. Joined
/// paths (`customer.name`) are quoted as-is and surface as backend errors at
/// execution time since this backend performs no join resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFilters;

/// Quotes an identifier, escaping embedded quotes.
pub(crate) fn quote_ident(path: &str) -> String {
    format!("\"{}\"", path.replace('"', "\"\""))
}

pub(crate) fn column(field: &Field) -> String {
    quote_ident(&field.to_string())
}

/// Escapes LIKE wildcards so user text is matched literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl SqlFilters {
    fn compare(&self, field: &Field, op: &str, value: Value) -> SqlConstraint {
        SqlConstraint::new(format!("{} {} ?", column(field), op), vec![value])
    }
}

impl FilterFactory for SqlFilters {
    type Constraint = SqlConstraint;

    fn eq(&self, field: &Field, value: impl Into<Value>) -> SqlConstraint {
        let value = value.into();
        if value.is_null() {
            SqlConstraint::new(format!("{} IS NULL", column(field)), Vec::new())
        } else {
            self.compare(field, "=", value)
        }
    }

    fn prefix(&self, field: &Field, text: &str) -> SqlConstraint {
        let pattern = format!("{}%", escape_like(&strip_wildcards(text)));
        SqlConstraint::new(
            format!("{} LIKE ? ESCAPE '\\'", column(field)),
            vec![Value::Str(pattern)],
        )
    }

    fn gt(&self, field: &Field, value: impl Into<Value>) -> SqlConstraint {
        self.compare(field, ">", value.into())
    }

    fn gte(&self, field: &Field, value: impl Into<Value>) -> SqlConstraint {
        self.compare(field, ">=", value.into())
    }

    fn lt(&self, field: &Field, value: impl Into<Value>) -> SqlConstraint {
        self.compare(field, "<", value.into())
    }

    fn lte(&self, field: &Field, value: impl Into<Value>) -> SqlConstraint {
        self.compare(field, "<=", value.into())
    }

    fn match_all(&self) -> SqlConstraint {
        SqlConstraint::new(MATCH_ALL_SQL, Vec::new())
    }

    fn match_none(&self) -> SqlConstraint {
        SqlConstraint::new(MATCH_NONE_SQL, Vec::new())
    }

    fn combine_all(&self, constraints: Vec<SqlConstraint>) -> SqlConstraint {
        self.join_with(" AND ", constraints)
    }

    fn combine_any(&self, constraints: Vec<SqlConstraint>) -> SqlConstraint {
        self.join_with(" OR ", constraints)
    }

    fn negate(&self, constraint: SqlConstraint) -> SqlConstraint {
        let (sql, params) = constraint.into_parts();
        SqlConstraint::new(format!("NOT ({})", sql), params)
    }
}

impl SqlFilters {
    fn join_with(&self, separator: &str, constraints: Vec<SqlConstraint>) -> SqlConstraint {
        let mut sql = String::new();
        let mut params = Vec::new();
        for (i, constraint) in constraints.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(separator);
            }
            let (fragment, mut fragment_params) = constraint.into_parts();
            sql.push('(');
            sql.push_str(&fragment);
            sql.push(')');
            params.append(&mut fragment_params);
        }
        SqlConstraint::new(sql, params)
    }
}
