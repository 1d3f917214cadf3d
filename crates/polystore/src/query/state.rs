//! Shared query-builder bookkeeping.

use crate::error::{StoreResult, UsageError};
use crate::schema::Field;

/// Hard ceiling for materializing operations (`into_vec`, random sampling).
///
/// Anything larger must go through `iterate`, which never holds the full
/// result set in memory.
pub const MAX_LIST_SIZE: usize = 1000;

/// Sort direction for an explicit ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest value first.
    Ascending,
    /// Largest value first.
    Descending,
}

/// The state every fluent query builder accumulates.
///
/// Constraints combine under an implicit AND at execution time. `limit == 0`
/// means unbounded. Builders own one `QueryState` and are single-use: the
/// execution methods consume the builder, so a finished query cannot be
/// mutated or re-run.
#[derive(Debug, Clone)]
pub struct QueryState<C> {
    constraints: Vec<C>,
    sorts: Vec<(Field, SortOrder)>,
    projection: Vec<Field>,
    skip: usize,
    limit: usize,
}

impl<C> Default for QueryState<C> {
    fn default() -> Self {
        QueryState {
            constraints: Vec::new(),
            sorts: Vec::new(),
            projection: Vec::new(),
            skip: 0,
            limit: 0,
        }
    }
}

impl<C> QueryState<C> {
    /// Appends a constraint (implicit AND).
    pub fn add_constraint(&mut self, constraint: C) {
        self.constraints.push(constraint);
    }

    /// Appends a sort directive.
    pub fn order_by(&mut self, field: Field, order: SortOrder) {
        self.sorts.push((field, order));
    }

    /// Restricts the fetched fields.
    pub fn project(&mut self, fields: &[Field]) {
        self.projection = fields.to_vec();
    }

    /// Replaces the projection wholesale.
    pub fn set_projection(&mut self, fields: Vec<Field>) {
        self.projection = fields;
    }

    /// Sets the number of results to skip.
    pub fn set_skip(&mut self, skip: usize) {
        self.skip = skip;
    }

    /// Sets the maximum number of results (0 = unbounded).
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Accumulated constraints, in call order.
    pub fn constraints(&self) -> &[C] {
        &self.constraints
    }

    /// Consumes the state, yielding the constraints.
    pub fn into_constraints(self) -> Vec<C> {
        self.constraints
    }

    /// Sort directives, in call order.
    pub fn sorts(&self) -> &[(Field, SortOrder)] {
        &self.sorts
    }

    /// Projection fields; empty means "all fields".
    pub fn projection(&self) -> &[Field] {
        &self.projection
    }

    /// Results to skip.
    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Result cap; 0 means unbounded.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Guards a collect-all materialization.
    ///
    /// An explicit limit above [`MAX_LIST_SIZE`] is a usage error raised
    /// before any backend call.
    pub fn verify_list_limit(&self) -> StoreResult<()> {
        if self.limit > MAX_LIST_SIZE {
            return Err(UsageError::ListLimitExceeded {
                requested: self.limit,
                max: MAX_LIST_SIZE,
            }
            .into());
        }
        Ok(())
    }

    /// Guards a random-sample materialization, returning the effective size.
    ///
    /// Sampling requires an explicit limit between 1 and [`MAX_LIST_SIZE`];
    /// violations are usage errors raised before any backend call.
    pub fn verify_sample_limit(&self) -> StoreResult<usize> {
        if self.limit == 0 {
            return Err(UsageError::MissingSampleLimit {
                max: MAX_LIST_SIZE,
            }
            .into());
        }
        self.verify_list_limit()?;
        Ok(self.limit)
    }

    /// Guards an unbounded collect-all while rows stream in.
    pub fn guard_overflow(&self, collected: usize) -> StoreResult<()> {
        if self.limit == 0 && collected > MAX_LIST_SIZE {
            return Err(UsageError::TooManyResults {
                max: MAX_LIST_SIZE,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_limit_guard_raised_before_backend_call() {
        let mut state: QueryState<()> = QueryState::default();
        state.set_limit(5000);

        let err = state.verify_list_limit().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Usage(UsageError::ListLimitExceeded {
                requested: 5000,
                max: MAX_LIST_SIZE,
            })
        ));
    }

    #[test]
    fn test_sample_requires_explicit_limit() {
        let state: QueryState<()> = QueryState::default();
        assert!(matches!(
            state.verify_sample_limit().unwrap_err(),
            StoreError::Usage(UsageError::MissingSampleLimit { .. })
        ));

        let mut bounded: QueryState<()> = QueryState::default();
        bounded.set_limit(100);
        assert_eq!(bounded.verify_sample_limit().unwrap(), 100);
    }

    #[test]
    fn test_overflow_guard_only_applies_unbounded() {
        let unbounded: QueryState<()> = QueryState::default();
        assert!(unbounded.guard_overflow(MAX_LIST_SIZE).is_ok());
        assert!(unbounded.guard_overflow(MAX_LIST_SIZE + 1).is_err());

        let mut bounded: QueryState<()> = QueryState::default();
        bounded.set_limit(10);
        assert!(bounded.guard_overflow(MAX_LIST_SIZE + 1).is_ok());
    }
}
