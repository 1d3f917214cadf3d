//! The SQLite client facade: an r2d2 connection pool plus query entry points.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, StoreResult};
use crate::query::Value;
use crate::schema::EntityDescriptor;

use super::query::SqlQuery;

/// Distinguishes the shared-cache names handed to in-memory databases, so two
/// `Database` instances in one process never alias each other.
static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Configuration for the SQLite facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path. `None` selects an in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open.
    #[serde(default = "default_min_idle")]
    pub min_idle: u32,

    /// Pool checkout timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Validate connections on checkout.
    #[serde(default)]
    pub test_on_check_out: bool,

    /// Executions slower than this are logged with `tracing::warn!`.
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_idle() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_slow_query_threshold_ms() -> u64 {
    1000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
            min_idle: default_min_idle(),
            connection_timeout_ms: default_connection_timeout_ms(),
            test_on_check_out: false,
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Points the database at a file instead of memory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Sets the slow-query threshold.
    pub fn with_slow_query_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.slow_query_threshold_ms = threshold_ms;
        self
    }
}

/// SQLite database facade.
///
/// Owns the connection pool; every execution checks a connection out for the
/// duration of one statement and returns it on drop, even on error. The
/// facade is the entry point for [`SqlQuery`] builders via [`Database::query`].
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    config: DatabaseConfig,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates an in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_config(DatabaseConfig::default())
    }

    /// Opens or creates a file-based database.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::with_config(DatabaseConfig::default().with_path(path))
    }

    /// Creates a database facade with custom configuration.
    pub fn with_config(config: DatabaseConfig) -> StoreResult<Self> {
        let manager = match &config.path {
            Some(path) => SqliteConnectionManager::file(path),
            None => {
                // Every pooled connection must see the same in-memory
                // database, which requires a named shared-cache URI.
                let name = MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
                SqliteConnectionManager::file(format!(
                    "file:polystore-mem-{name}?mode=memory&cache=shared"
                ))
                .with_flags(
                    OpenFlags::SQLITE_OPEN_READ_WRITE
                        | OpenFlags::SQLITE_OPEN_CREATE
                        | OpenFlags::SQLITE_OPEN_URI,
                )
            }
        };

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_idle))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .test_on_check_out(config.test_on_check_out)
            .build(manager)
            .map_err(|e| BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { pool, config })
    }

    /// Starts a query against the given entity type.
    pub fn query<'a>(&'a self, descriptor: &'a EntityDescriptor) -> SqlQuery<'a> {
        SqlQuery::new(self, descriptor)
    }

    /// Executes a statement, returning the number of affected rows.
    pub fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        let conn = self.connection()?;
        let started = Instant::now();
        let affected = conn.execute(sql, rusqlite::params_from_iter(params.iter()))?;
        self.observe(started, sql);
        Ok(affected)
    }

    /// Executes an arbitrary SELECT, returning all rows.
    pub fn query_rows(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<super::SqlRow>> {
        super::query::fetch_rows(self, sql, params)
    }

    /// Verifies that the database answers a trivial query.
    pub fn ping(&self) -> StoreResult<()> {
        let conn = self.connection()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Checks a connection out of the pool.
    pub(crate) fn connection(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Records one execution; slow ones are warned about.
    pub(crate) fn observe(&self, started: Instant, sql: &str) {
        let elapsed = started.elapsed();
        tracing::debug!(sql, elapsed_ms = elapsed.as_millis() as u64, "sqlite query");
        if elapsed > Duration::from_millis(self.config.slow_query_threshold_ms) {
            tracing::warn!(
                sql,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_query_threshold_ms,
                "slow sqlite query"
            );
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value as Sv};
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sv::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sv::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(Sv::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sv::Real(*f)),
            Value::Str(s) => ToSqlOutput::Owned(Sv::Text(s.clone())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(Sv::Text(ts.to_rfc3339())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DatabaseConfig::default();
        assert!(config.path.is_none());
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_idle, 1);
        assert_eq!(config.connection_timeout_ms, 30000);
        assert!(!config.test_on_check_out);
        assert_eq!(config.slow_query_threshold_ms, 1000);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DatabaseConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_connections, 10);

        let config: DatabaseConfig =
            serde_json::from_str(r#"{"path": "/tmp/test.db", "max_connections": 2}"#).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/test.db")));
        assert_eq!(config.max_connections, 2);
    }

    #[test]
    fn test_in_memory_ping() {
        let db = Database::in_memory().unwrap();
        db.ping().unwrap();
    }

    #[test]
    fn test_file_backed_database_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let db = Database::open(&path).unwrap();
            db.execute("CREATE TABLE t (id INTEGER)", &[]).unwrap();
            db.execute("INSERT INTO t (id) VALUES (?)", &[Value::Int(7)])
                .unwrap();
        }

        let reopened = Database::open(&path).unwrap();
        let rows = reopened.query_rows("SELECT id FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].i64("id"), Some(7));
    }

    #[test]
    fn test_query_rows_helper() {
        let db = Database::in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER, name TEXT)", &[])
            .unwrap();
        db.execute(
            "INSERT INTO t (id, name) VALUES (?, ?)",
            &[Value::Int(1), Value::Str("a".to_string())],
        )
        .unwrap();

        let rows = db.query_rows("SELECT * FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].i64("id"), Some(1));
        assert_eq!(rows[0].str("name"), Some("a"));
    }

    #[test]
    fn test_in_memory_databases_are_isolated() {
        let first = Database::in_memory().unwrap();
        let second = Database::in_memory().unwrap();

        first
            .execute("CREATE TABLE only_here (id INTEGER)", &[])
            .unwrap();
        first
            .execute("INSERT INTO only_here (id) VALUES (?)", &[Value::Int(1)])
            .unwrap();

        // The second database never saw that table.
        assert!(second.execute("DELETE FROM only_here", &[]).is_err());
    }

    #[test]
    fn test_memory_database_shared_across_pool() {
        // More connections than rows forces multiple checkouts.
        let db = Database::with_config(DatabaseConfig {
            max_connections: 4,
            ..DatabaseConfig::default()
        })
        .unwrap();

        db.execute("CREATE TABLE t (id INTEGER)", &[]).unwrap();
        for i in 0..8 {
            db.execute("INSERT INTO t (id) VALUES (?)", &[Value::Int(i)])
                .unwrap();
        }

        let conn = db.connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 8);
    }
}
