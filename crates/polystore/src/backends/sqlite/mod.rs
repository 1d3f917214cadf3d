//! SQLite backend: constraints compile to SQL text plus positional
//! parameters, executed over an r2d2 connection pool.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> polystore::StoreResult<()> {
//! use polystore::backends::sqlite::{Database, FILTERS};
//! use polystore::query::FilterFactory;
//! use polystore::schema::{EntityDescriptor, Field, FieldType};
//!
//! let db = Database::in_memory()?;
//! let products = EntityDescriptor::new("products")
//!     .with_field("name", FieldType::String)
//!     .with_field("price", FieldType::Float);
//!
//! let count = db
//!     .query(&products)
//!     .eq(&Field::named("name"), "wrench")
//!     .filter(FILTERS.lt(&Field::named("price"), 10.0))
//!     .count()
//!     .await?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

mod constraint;
mod database;
mod filters;
mod query;

pub use constraint::SqlConstraint;
pub use database::{Database, DatabaseConfig};
pub use filters::SqlFilters;
pub use query::{SqlQuery, SqlRow, SqlValue};

/// Shared instance of the SQL filter factory.
pub const FILTERS: SqlFilters = SqlFilters;
