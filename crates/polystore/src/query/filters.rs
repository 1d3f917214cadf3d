//! The constraint and filter-factory capability traits.
//!
//! A backend participates in the query core by providing a [`Constraint`]
//! value type and a [`FilterFactory`] that builds leaf predicates and raw
//! combinators for it. Everything with uniform semantics across backends
//! (null handling, neutral-element normalization, search-token dispatch)
//! lives here as provided methods so each backend only implements its native
//! representation.

use std::fmt;

use crate::schema::Field;

use super::compiler::{Mode, QueryField};
use super::value::Value;

/// A compiled, backend-specific predicate.
///
/// Constraints are immutable values, composable only through the factory that
/// produced them, and compared by their rendered form. The two neutral
/// elements must be recognizable so composition can normalize them away.
pub trait Constraint: Clone + PartialEq + fmt::Debug {
    /// True when this constraint matches every entity.
    fn is_match_all(&self) -> bool;

    /// True when this constraint matches no entity.
    fn is_match_none(&self) -> bool;
}

/// Removes wildcard markers from prefix text.
///
/// Wildcards carry no meaning in prefix mode; factories call this so that
/// `prefix(f, "abc*")` and `prefix(f, "abc")` compile identically.
pub(crate) fn strip_wildcards(text: &str) -> String {
    text.replace('*', "")
}

/// Per-backend authority for turning semantic predicates into [`Constraint`]s.
///
/// Implementations provide the leaf predicates (`eq`, `prefix`, ranges), the
/// two neutral elements, and the raw combinators. Composition (`and`, `or`,
/// `not`), null-skipping (`eq_ignore_null`) and free-text token dispatch are
/// provided here with identical semantics for every backend:
///
/// - `and` with zero effective operands is match-all, `or` is match-none;
/// - neutral operands are dropped, single survivors are returned unwrapped;
/// - an `and` containing match-none collapses to match-none, an `or`
///   containing match-all collapses to match-all.
pub trait FilterFactory {
    /// The native constraint type built by this factory.
    type Constraint: Constraint;

    /// Exact-match predicate.
    ///
    /// A [`Value::Null`] argument compiles to "field is null or absent".
    fn eq(&self, field: &Field, value: impl Into<Value>) -> Self::Constraint;

    /// Starts-with predicate. Wildcard markers in `text` are stripped.
    fn prefix(&self, field: &Field, text: &str) -> Self::Constraint;

    /// Strictly-greater-than predicate, open-ended above.
    fn gt(&self, field: &Field, value: impl Into<Value>) -> Self::Constraint;

    /// Greater-or-equal predicate, open-ended above.
    fn gte(&self, field: &Field, value: impl Into<Value>) -> Self::Constraint;

    /// Strictly-less-than predicate, open-ended below.
    fn lt(&self, field: &Field, value: impl Into<Value>) -> Self::Constraint;

    /// Less-or-equal predicate, open-ended below.
    fn lte(&self, field: &Field, value: impl Into<Value>) -> Self::Constraint;

    /// The constraint matching every entity (identity under AND).
    fn match_all(&self) -> Self::Constraint;

    /// The constraint matching no entity (identity under OR).
    fn match_none(&self) -> Self::Constraint;

    /// Raw conjunction of two or more constraints, without normalization.
    fn combine_all(&self, constraints: Vec<Self::Constraint>) -> Self::Constraint;

    /// Raw disjunction of two or more constraints, without normalization.
    fn combine_any(&self, constraints: Vec<Self::Constraint>) -> Self::Constraint;

    /// Raw negation of a non-neutral constraint.
    fn negate(&self, constraint: Self::Constraint) -> Self::Constraint;

    /// Exact match that skips null: a [`Value::Null`] argument yields the
    /// neutral match-all constraint instead of a null predicate.
    ///
    /// This keeps the common "filter if present" pattern error-free:
    /// `eq_ignore_null(f, maybe_value)` composes as identity under AND when
    /// the value is absent.
    fn eq_ignore_null(&self, field: &Field, value: impl Into<Value>) -> Self::Constraint {
        let value = value.into();
        if value.is_null() {
            self.match_all()
        } else {
            self.eq(field, value)
        }
    }

    /// Conjunction. Zero effective operands yield match-all.
    fn and(&self, constraints: impl IntoIterator<Item = Self::Constraint>) -> Self::Constraint {
        let mut kept = Vec::new();
        for constraint in constraints {
            if constraint.is_match_none() {
                return self.match_none();
            }
            if !constraint.is_match_all() {
                kept.push(constraint);
            }
        }
        match kept.len() {
            0 => self.match_all(),
            1 => kept.swap_remove(0),
            _ => self.combine_all(kept),
        }
    }

    /// Disjunction. Zero effective operands yield match-none.
    fn or(&self, constraints: impl IntoIterator<Item = Self::Constraint>) -> Self::Constraint {
        let mut kept = Vec::new();
        for constraint in constraints {
            if constraint.is_match_all() {
                return self.match_all();
            }
            if !constraint.is_match_none() {
                kept.push(constraint);
            }
        }
        match kept.len() {
            0 => self.match_none(),
            1 => kept.swap_remove(0),
            _ => self.combine_any(kept),
        }
    }

    /// Negation. Neutral elements flip into each other.
    fn not(&self, constraint: Self::Constraint) -> Self::Constraint {
        if constraint.is_match_all() {
            self.match_none()
        } else if constraint.is_match_none() {
            self.match_all()
        } else {
            self.negate(constraint)
        }
    }

    /// Compiles one free-text token against one search-field spec.
    ///
    /// `Equal` always compiles to `eq`. `Like` compiles to `prefix` only when
    /// the token carries a wildcard marker, falling back to the cheaper `eq`
    /// for literal tokens. The default mode always compiles to `prefix`.
    /// Backends may override this to honor the spec's boost.
    fn compile_search_token(&self, spec: &QueryField, token: &str) -> Self::Constraint {
        match spec.mode() {
            Mode::Equal => self.eq(spec.field(), token),
            Mode::Like => {
                if token.contains('*') {
                    self.prefix(spec.field(), token)
                } else {
                    self.eq(spec.field(), token)
                }
            }
            Mode::Prefix => self.prefix(spec.field(), token),
        }
    }
}
