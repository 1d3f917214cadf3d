//! Polystore: a polyglot object-datastore mapping layer.
//!
//! Application code describes its entities once and persists/queries them
//! against Elasticsearch, MongoDB, or SQLite through one abstraction. The
//! heart of the crate is the query constraint subsystem: a backend-agnostic
//! filter/search vocabulary (field equality, ranges, prefix matching,
//! free-text tokens, sort order) compiled into each backend's native query
//! representation with identical semantics everywhere (null skipping,
//! wildcard stripping, tokenization, neutral elements).
//!
//! # Backend features
//!
//! Enable backends with feature flags in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! polystore = { version = "0.1", features = ["sqlite", "elasticsearch"] }
//! ```
//!
//! - `sqlite` (default) - SQL WHERE clauses over an r2d2-pooled rusqlite
//! - `mongodb` - BSON filter documents
//! - `elasticsearch` - JSON bool/prefix queries over HTTP
//! - `cli` - the `es-index` administration binary
//!
//! # Architecture
//!
//! - [`schema`] - the read-only schema collaborator ([`schema::Field`] paths
//!   and [`schema::EntityDescriptor`]s)
//! - [`query`] - the generic core: [`query::FilterFactory`] capability trait,
//!   [`query::QueryCompiler`] free-text compilation, shared builder state
//! - [`backends`] - one facade + filter factory + query builder per backend
//! - [`error`] - usage errors vs backend errors
//!
//! # Quick start
//!
//! ```no_run
//! # async fn example() -> polystore::StoreResult<()> {
//! use polystore::backends::sqlite::Database;
//! use polystore::query::QueryField;
//! use polystore::schema::{EntityDescriptor, Field, FieldType};
//!
//! let db = Database::in_memory()?;
//! let products = EntityDescriptor::new("products")
//!     .with_field("name", FieldType::String)
//!     .with_field("description", FieldType::String);
//!
//! // Free-text search: every token must match in at least one field.
//! let specs = vec![
//!     QueryField::equal(Field::named("name")),
//!     QueryField::prefix(Field::named("description")),
//! ];
//! let total = db
//!     .query(&products)
//!     .search("red car", &specs)
//!     .count()
//!     .await?;
//! # let _ = total;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Query builders are single-use and not thread-safe: build, then execute
//! exactly once (execution methods consume the builder). [`schema::Field`]s
//! and every compiled constraint are immutable and freely shared. Iteration
//! is cooperative: a `CancellationToken` is checked once per yielded item.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod error;
pub mod query;
pub mod schema;

#[cfg(feature = "cli")]
pub mod escmd;

pub use error::{BackendError, StoreError, StoreResult, UsageError};
