//! The fluent SQL query builder.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, StoreResult};
use crate::query::exec::{drain_pages, PageSource};
use crate::query::{FilterFactory, QueryCompiler, QueryField, QueryState, SortOrder, Value};
use crate::schema::{EntityDescriptor, Field};

use super::constraint::SqlConstraint;
use super::database::Database;
use super::filters::{column, quote_ident};
use super::FILTERS;

/// Rows fetched per round-trip while iterating.
const PAGE_SIZE: usize = 256;

/// A value read back from a SQLite column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// INTEGER column.
    Integer(i64),
    /// REAL column.
    Real(f64),
    /// TEXT column.
    Text(String),
    /// BLOB column.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns true for [`SqlValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The integer value, if this is an INTEGER column.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The float value, widening INTEGER columns.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Real(f) => Some(*f),
            SqlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The text value, if this is a TEXT column.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<rusqlite::types::Value> for SqlValue {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value as Rv;
        match value {
            Rv::Null => SqlValue::Null,
            Rv::Integer(i) => SqlValue::Integer(i),
            Rv::Real(f) => SqlValue::Real(f),
            Rv::Text(s) => SqlValue::Text(s),
            Rv::Blob(b) => SqlValue::Blob(b),
        }
    }
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    /// The value of the named column.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// The text value of the named column.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(SqlValue::as_str)
    }

    /// The integer value of the named column.
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }

    /// The float value of the named column.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(SqlValue::as_f64)
    }

    /// All columns in select order.
    pub fn columns(&self) -> &[(String, SqlValue)] {
        &self.columns
    }
}

/// A fluent, single-use query against one SQLite table.
///
/// Accumulate filters, sorts, projection and pagination, then execute exactly
/// once: every execution method consumes the builder. Obtained via
/// [`Database::query`].
pub struct SqlQuery<'a> {
    db: &'a Database,
    descriptor: &'a EntityDescriptor,
    state: QueryState<SqlConstraint>,
}

impl<'a> SqlQuery<'a> {
    pub(crate) fn new(db: &'a Database, descriptor: &'a EntityDescriptor) -> Self {
        SqlQuery {
            db,
            descriptor,
            state: QueryState::default(),
        }
    }

    /// Filters on `field = value`; a Null value filters on `field IS NULL`.
    pub fn eq(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.state.add_constraint(FILTERS.eq(field, value));
        self
    }

    /// Filters on `field = value`, skipping the constraint for Null values.
    pub fn eq_ignore_null(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.state
            .add_constraint(FILTERS.eq_ignore_null(field, value));
        self
    }

    /// Adds an arbitrary constraint (implicit AND).
    pub fn filter(mut self, constraint: SqlConstraint) -> Self {
        self.state.add_constraint(constraint);
        self
    }

    /// Compiles a free-text search over the given field specs and adds the
    /// result as one constraint.
    pub fn search(mut self, query: &str, specs: &[QueryField]) -> Self {
        let compiled = QueryCompiler::new(&FILTERS, specs).compile(query);
        self.state.add_constraint(compiled);
        self
    }

    /// Orders ascending by the given field.
    pub fn order_asc(mut self, field: &Field) -> Self {
        self.state.order_by(field.clone(), SortOrder::Ascending);
        self
    }

    /// Orders descending by the given field.
    pub fn order_desc(mut self, field: &Field) -> Self {
        self.state.order_by(field.clone(), SortOrder::Descending);
        self
    }

    /// Restricts the selected columns.
    pub fn fields(mut self, fields: &[Field]) -> Self {
        self.state.project(fields);
        self
    }

    /// Skips the first `skip` results.
    pub fn skip(mut self, skip: usize) -> Self {
        self.state.set_skip(skip);
        self
    }

    /// Caps the number of results (0 = unbounded).
    pub fn limit(mut self, limit: usize) -> Self {
        self.state.set_limit(limit);
        self
    }

    /// Streams matching rows one at a time until the predicate returns
    /// `false` or the token is cancelled; returns the number of yielded rows.
    ///
    /// The full result set is never materialized; rows are fetched in pages
    /// and no further page is requested after early termination.
    pub async fn iterate<F>(self, cancel: &CancellationToken, predicate: F) -> StoreResult<u64>
    where
        F: FnMut(SqlRow) -> bool + Send,
    {
        let mut source = self.page_source();
        let outcome = drain_pages(&mut source, cancel, predicate).await?;
        Ok(outcome.yielded)
    }

    /// Streams every matching row to the consumer (no early termination).
    pub async fn iterate_all<F>(self, cancel: &CancellationToken, mut consumer: F) -> StoreResult<u64>
    where
        F: FnMut(SqlRow) + Send,
    {
        self.iterate(cancel, |row| {
            consumer(row);
            true
        })
        .await
    }

    /// Counts all matches, honoring filters but ignoring projection and
    /// skip/limit pagination.
    pub async fn count(self) -> StoreResult<u64> {
        let (where_sql, params) = self.where_parts();
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", self.table(), where_sql);

        let conn = self.db.connection()?;
        let started = Instant::now();
        let count: i64 = conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
            row.get(0)
        })?;
        self.db.observe(started, &sql);
        Ok(count as u64)
    }

    /// Determines whether at least one row matches (identity column only,
    /// limit 1).
    pub async fn exists(self) -> StoreResult<bool> {
        let (where_sql, params) = self.where_parts();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            column(self.descriptor.id_field()),
            self.table(),
            where_sql
        );

        let conn = self.db.connection()?;
        let started = Instant::now();
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query(rusqlite::params_from_iter(params.iter()))?
            .next()?
            .is_some();
        drop(stmt);
        self.db.observe(started, &sql);
        Ok(found)
    }

    /// Deletes every match row by row, so that per-entity hooks in the owning
    /// layer can run; returns the number of deleted rows.
    ///
    /// Not transactional across rows: on a mid-stream failure, rows deleted
    /// so far stay deleted.
    pub async fn delete(self, cancel: &CancellationToken) -> StoreResult<u64> {
        self.delete_each(cancel, |_| {}).await
    }

    /// Like [`SqlQuery::delete`], invoking the callback for each row before
    /// it is deleted.
    pub async fn delete_each<F>(self, cancel: &CancellationToken, mut callback: F) -> StoreResult<u64>
    where
        F: FnMut(&SqlRow) + Send,
    {
        let id_column = self.descriptor.id_field().to_string();
        let (where_sql, params) = self.where_parts();
        // Deleted rows vanish from the match set, so we re-fetch the first
        // page instead of advancing an offset.
        let select_sql = format!(
            "SELECT * FROM {} WHERE {} LIMIT {}",
            self.table(),
            where_sql,
            PAGE_SIZE
        );
        let delete_sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.table(),
            quote_ident(&id_column)
        );

        let mut deleted = 0u64;
        loop {
            let page = fetch_rows(self.db, &select_sql, &params)?;
            if page.is_empty() {
                return Ok(deleted);
            }
            for row in page {
                if cancel.is_cancelled() {
                    return Ok(deleted);
                }
                let id = row.get(&id_column).cloned().ok_or_else(|| {
                    BackendError::ResponseFormat {
                        backend_name: "sqlite".to_string(),
                        message: format!(
                            "row of '{}' is missing its identity column '{}'",
                            self.descriptor.relation_name(),
                            id_column
                        ),
                    }
                })?;
                callback(&row);

                let conn = self.db.connection()?;
                conn.execute(&delete_sql, rusqlite::params![id])?;
                deleted += 1;
            }
        }
    }

    /// Bulk server-side delete of everything matching the current filters.
    ///
    /// The unsafe/fast counterpart to [`SqlQuery::delete`]: per-entity hooks
    /// do not run.
    pub async fn truncate(self) -> StoreResult<u64> {
        let (where_sql, params) = self.where_parts();
        let sql = format!("DELETE FROM {} WHERE {}", self.table(), where_sql);

        let conn = self.db.connection()?;
        let started = Instant::now();
        let affected = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
        self.db.observe(started, &sql);
        Ok(affected as u64)
    }

    /// Materializes all matches into a vector.
    ///
    /// A limit above [`MAX_LIST_SIZE`] is a usage error raised before any
    /// backend call; an unbounded query overflowing the ceiling mid-collect
    /// aborts with [`UsageError::TooManyResults`].
    ///
    /// [`MAX_LIST_SIZE`]: crate::query::MAX_LIST_SIZE
    /// [`UsageError::TooManyResults`]: crate::error::UsageError::TooManyResults
    pub async fn into_vec(self) -> StoreResult<Vec<SqlRow>> {
        self.state.verify_list_limit()?;

        let mut sql = self.render_select();
        if self.state.limit() > 0 {
            sql.push_str(&format!(
                " LIMIT {} OFFSET {}",
                self.state.limit(),
                self.state.skip()
            ));
        } else if self.state.skip() > 0 {
            sql.push_str(&format!(" LIMIT -1 OFFSET {}", self.state.skip()));
        }

        let (_, params) = self.where_parts();
        let rows = fetch_rows(self.db, &sql, &params)?;
        self.state.guard_overflow(rows.len())?;
        Ok(rows)
    }

    fn table(&self) -> String {
        quote_ident(self.descriptor.relation_name())
    }

    /// Renders the accumulated constraints as one WHERE fragment.
    fn where_parts(&self) -> (String, Vec<Value>) {
        FILTERS.and(self.state.constraints().to_vec()).into_parts()
    }

    fn render_select(&self) -> String {
        let columns = if self.state.projection().is_empty() {
            "*".to_string()
        } else {
            self.state
                .projection()
                .iter()
                .map(column)
                .collect::<Vec<_>>()
                .join(", ")
        };

        let (where_sql, _) = self.where_parts();
        let mut sql = format!("SELECT {} FROM {} WHERE {}", columns, self.table(), where_sql);

        if !self.state.sorts().is_empty() {
            let order = self
                .state
                .sorts()
                .iter()
                .map(|(field, direction)| {
                    let keyword = match direction {
                        SortOrder::Ascending => "ASC",
                        SortOrder::Descending => "DESC",
                    };
                    format!("{} {}", column(field), keyword)
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", order));
        }

        sql
    }

    fn page_source(self) -> SqlPageSource<'a> {
        let base_sql = self.render_select();
        let (_, params) = self.where_parts();
        SqlPageSource {
            db: self.db,
            base_sql,
            params,
            offset: self.state.skip(),
            remaining: match self.state.limit() {
                0 => None,
                limit => Some(limit),
            },
            exhausted: false,
        }
    }
}

pub(crate) fn fetch_rows(db: &Database, sql: &str, params: &[Value]) -> StoreResult<Vec<SqlRow>> {
    let conn = db.connection()?;
    let started = Instant::now();

    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = Vec::with_capacity(column_names.len());
        for (i, name) in column_names.iter().enumerate() {
            let value: rusqlite::types::Value = row.get(i)?;
            columns.push((name.clone(), SqlValue::from(value)));
        }
        out.push(SqlRow { columns });
    }
    drop(rows);
    drop(stmt);

    db.observe(started, sql);
    Ok(out)
}

/// Pages rows out of a SELECT with LIMIT/OFFSET windows.
struct SqlPageSource<'a> {
    db: &'a Database,
    base_sql: String,
    params: Vec<Value>,
    offset: usize,
    remaining: Option<usize>,
    exhausted: bool,
}

#[async_trait]
impl PageSource for SqlPageSource<'_> {
    type Item = SqlRow;

    async fn next_page(&mut self) -> StoreResult<Option<Vec<SqlRow>>> {
        if self.exhausted {
            return Ok(None);
        }

        let fetch = match self.remaining {
            Some(0) => {
                self.exhausted = true;
                return Ok(None);
            }
            Some(remaining) => remaining.min(PAGE_SIZE),
            None => PAGE_SIZE,
        };

        let sql = format!("{} LIMIT {} OFFSET {}", self.base_sql, fetch, self.offset);
        let rows = fetch_rows(self.db, &sql, &self.params)?;

        if rows.len() < fetch {
            self.exhausted = true;
        }
        if let Some(remaining) = &mut self.remaining {
            *remaining -= rows.len();
        }
        self.offset += rows.len();

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows))
    }
}
