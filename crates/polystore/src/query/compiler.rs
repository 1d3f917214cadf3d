//! Free-text query compilation.

use crate::schema::Field;

use super::filters::FilterFactory;

/// How a free-text token is matched against one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The token must equal the field value.
    Equal,
    /// Prefix match when the token carries a wildcard, equality otherwise.
    Like,
    /// Starts-with match (the default for free-text search).
    #[default]
    Prefix,
}

/// A searchable field: a [`Field`] paired with a match [`Mode`] and an
/// optional boost consumed by scoring backends.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    field: Field,
    mode: Mode,
    boost: Option<f32>,
}

impl QueryField {
    /// Field matched by equality.
    pub fn equal(field: Field) -> Self {
        QueryField {
            field,
            mode: Mode::Equal,
            boost: None,
        }
    }

    /// Field matched by prefix when the token has a wildcard, else equality.
    pub fn like(field: Field) -> Self {
        QueryField {
            field,
            mode: Mode::Like,
            boost: None,
        }
    }

    /// Field matched by prefix (default free-text behavior).
    pub fn prefix(field: Field) -> Self {
        QueryField {
            field,
            mode: Mode::Prefix,
            boost: None,
        }
    }

    /// Sets a relevance boost. Only scoring backends consume it.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    /// The field this spec searches.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// The match mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The relevance boost, if set.
    pub fn boost(&self) -> Option<f32> {
        self.boost
    }
}

/// Compiles a free-text search string into one combined constraint.
///
/// The compiler is generic over the backend's [`FilterFactory`], so a single
/// implementation serves every backend. The input is tokenized on whitespace;
/// each token is compiled once per search field and the alternatives are
/// OR-combined, then all per-token constraints are AND-combined: a document
/// matches when every token matches in at least one configured field.
///
/// An empty query compiles to the neutral match-all constraint.
pub struct QueryCompiler<'a, F: FilterFactory> {
    factory: &'a F,
    fields: &'a [QueryField],
}

impl<'a, F: FilterFactory> QueryCompiler<'a, F> {
    /// Creates a compiler for the given factory and searchable fields.
    pub fn new(factory: &'a F, fields: &'a [QueryField]) -> Self {
        QueryCompiler { factory, fields }
    }

    /// Compiles `query` into a single constraint (AND over tokens of OR over
    /// fields).
    pub fn compile(&self, query: &str) -> F::Constraint {
        let per_token = query.split_whitespace().map(|token| {
            self.factory.or(
                self.fields
                    .iter()
                    .map(|spec| self.factory.compile_search_token(spec, token)),
            )
        });
        self.factory.and(per_token)
    }
}
