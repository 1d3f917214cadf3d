//! MongoDB backend: constraints compile to BSON filter documents, executed
//! through the driver's pooled async client.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> polystore::StoreResult<()> {
//! use polystore::backends::mongo::{Mongo, MongoConfig, FILTERS};
//! use polystore::query::FilterFactory;
//! use polystore::schema::{EntityDescriptor, Field, FieldType};
//!
//! let mongo = Mongo::connect(MongoConfig::default()).await?;
//! let products = EntityDescriptor::new("products")
//!     .with_field("name", FieldType::String)
//!     .with_field("price", FieldType::Float);
//!
//! let count = mongo
//!     .query(&products)
//!     .eq(&Field::named("name"), "wrench")
//!     .filter(FILTERS.lt(&Field::named("price"), 10.0))
//!     .count()
//!     .await?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

mod client;
mod constraint;
mod filters;
mod ops;
mod query;

pub use client::{Mongo, MongoConfig};
pub use constraint::MongoConstraint;
pub use filters::MongoFilters;
pub use ops::{Deleter, Finder, Inserter, Updater};
pub use query::{MongoFacet, MongoQuery};

/// Shared instance of the Mongo filter factory.
pub const FILTERS: MongoFilters = MongoFilters;
