//! Elasticsearch backend: constraints compile to Query-DSL JSON, executed
//! over the cluster's HTTP API.
//!
//! Besides the query builder this backend owns index lifecycle management:
//! every entity has a read alias serving searches and a write alias for
//! (re)indexing, so a full reindex can be built in the background and
//! atomically committed or rolled back (see
//! [`Elastic::create_write_index`]).
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> polystore::StoreResult<()> {
//! use polystore::backends::elastic::{Elastic, ElasticConfig, FILTERS};
//! use polystore::query::{FilterFactory, QueryField};
//! use polystore::schema::{EntityDescriptor, Field, FieldType};
//!
//! let elastic = Elastic::new(ElasticConfig::default())?;
//! let products = EntityDescriptor::new("products")
//!     .with_field("name", FieldType::String)
//!     .with_field("description", FieldType::String);
//!
//! let hits = elastic
//!     .query(&products)
//!     .search(
//!         "red car",
//!         &[
//!             QueryField::equal(Field::named("name")).with_boost(2.0),
//!             QueryField::prefix(Field::named("description")),
//!         ],
//!     )
//!     .limit(25)
//!     .into_vec()
//!     .await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

mod client;
mod constraint;
mod filters;
mod query;
mod suggest;

pub use client::{Elastic, ElasticAuth, ElasticConfig, IndexInfo};
pub use constraint::ElasticConstraint;
pub use filters::ElasticFilters;
pub use query::{ElasticFacet, ElasticQuery};
pub use suggest::{SuggestBuilder, SuggestOption};

/// Shared instance of the Elasticsearch filter factory.
pub const FILTERS: ElasticFilters = ElasticFilters;
