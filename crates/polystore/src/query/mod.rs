//! The backend-agnostic query core.
//!
//! Everything in this module is generic over a backend's
//! [`FilterFactory`]: the factory turns semantic predicates into native
//! [`Constraint`]s, the [`QueryCompiler`] turns free-text input into an
//! AND-of-ORs constraint tree, and [`QueryState`] carries the bookkeeping
//! every fluent query builder shares (filters, sorts, projection,
//! pagination). Backends plug in underneath without this module knowing
//! their native representations.

mod compiler;
pub(crate) mod exec;
mod facet;
mod filters;
mod state;
mod value;

pub use compiler::{Mode, QueryCompiler, QueryField};
pub use facet::FacetResult;
pub use filters::{Constraint, FilterFactory};
pub use state::{QueryState, SortOrder, MAX_LIST_SIZE};
pub use value::Value;

pub(crate) use filters::strip_wildcards;
