//! Datastore backends.
//!
//! Each backend is gated behind a cargo feature and contributes the same
//! trio: a client facade, a filter factory with its native constraint type,
//! and a fluent single-use query builder.
//!
//! | Backend | Feature | Native representation |
//! |---------|---------|-----------------------|
//! | SQLite | `sqlite` | SQL text + positional parameters |
//! | MongoDB | `mongodb` | BSON filter documents |
//! | Elasticsearch | `elasticsearch` | JSON bool/prefix queries |

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mongodb")]
pub mod mongo;

#[cfg(feature = "elasticsearch")]
pub mod elastic;
