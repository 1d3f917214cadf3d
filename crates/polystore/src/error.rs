//! Error types for the mapping layer.
//!
//! Two categories are kept strictly apart: [`UsageError`] for caller faults
//! detected before any backend call is issued, and [`BackendError`] for
//! failures reported by a datastore during execution.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all mapping-layer operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller faults raised before contacting a backend.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Failures reported by a backend during execution.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Build-time usage errors.
///
/// These are raised by query builders while a request is still being
/// assembled; no backend round-trip has happened when one of these occurs.
#[derive(Error, Debug)]
pub enum UsageError {
    /// A bounded materialization was requested with a limit above the ceiling.
    #[error("list materialization is capped at {max} results, got limit {requested}")]
    ListLimitExceeded { requested: usize, max: usize },

    /// Random sampling was requested without an explicit limit.
    #[error("random sampling requires an explicit limit (1 to {max})")]
    MissingSampleLimit { max: usize },

    /// An unbounded collect-all produced more rows than the hard ceiling.
    #[error("result set too large: more than {max} entities matched, narrow the query or iterate")]
    TooManyResults { max: usize },

    /// A destructive index operation was attempted without the literal `YES`.
    #[error("refusing to delete index '{index}' without the literal confirmation YES")]
    ConfirmationRequired { index: String },
}

/// Errors originating from a datastore backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// The backend rejected or failed a compiled query.
    #[error("query execution failed on {backend_name}: {message}")]
    QueryFailed {
        backend_name: String,
        message: String,
        /// Backend-specific diagnostic code, when one was reported.
        code: Option<String>,
    },

    /// A backend response could not be decoded.
    #[error("malformed response from {backend_name}: {message}")]
    ResponseFormat {
        backend_name: String,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for mapping-layer operations.
pub type StoreResult<T> = Result<T, StoreError>;

// Implement conversions from driver error types

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StoreError {
    fn from(_err: r2d2::Error) -> Self {
        StoreError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(BackendError::Internal {
            backend_name: "mongodb".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "elasticsearch")]
impl From<elasticsearch::Error> for StoreError {
    fn from(err: elasticsearch::Error) -> Self {
        StoreError::Backend(BackendError::Internal {
            backend_name: "elasticsearch".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_display() {
        let err = StoreError::Usage(UsageError::ListLimitExceeded {
            requested: 5000,
            max: 1000,
        });
        assert_eq!(
            err.to_string(),
            "list materialization is capped at 1000 results, got limit 5000"
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::QueryFailed {
            backend_name: "elasticsearch".to_string(),
            message: "index_not_found_exception".to_string(),
            code: Some("404".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "query execution failed on elasticsearch: index_not_found_exception"
        );
    }

    #[test]
    fn test_usage_and_backend_are_distinct() {
        let usage: StoreError = UsageError::TooManyResults { max: 1000 }.into();
        assert!(matches!(usage, StoreError::Usage(_)));

        let backend: StoreError = BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        }
        .into();
        assert!(matches!(backend, StoreError::Backend(_)));
    }
}
