//! SQL transport abstraction.
//!
//! Provides the `SqlExecutor` trait that every backend implements. The migration
//! engine never talks to a driver directly: it is handed a `&dyn SqlExecutor`
//! for the duration of one invocation, which keeps the engine testable against
//! an in-memory database or a scripted mock.

use std::fmt;

#[cfg(feature = "postgres")]
use may_postgres::types::{ToSql, Type};
#[cfg(feature = "postgres")]
use may_postgres::{Client, Row};

/// Executor error type
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// `PostgreSQL` error from `may_postgres`
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] may_postgres::Error),
    /// `SQLite` error from `rusqlite`
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Row parsing/conversion error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ExecutorError {
    /// Whether this error says that `table` does not exist.
    ///
    /// Matches PostgreSQL's `relation "<table>" does not exist` and SQLite's
    /// `no such table: <table>`. For a schema-qualified name PostgreSQL may
    /// report either the qualified or the bare relation, so both are checked.
    pub fn is_missing_relation(&self, table: &str) -> bool {
        let message = self.to_string();
        let bare = table.rsplit('.').next().unwrap_or(table);
        [table, bare].iter().any(|name| {
            message.contains(&format!("relation \"{name}\" does not exist"))
                || message.contains(&format!("no such table: {name}"))
        })
    }
}

/// A single column value crossing the transport boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

impl SqlValue {
    /// Integer view of the value; `Null` maps to `None`.
    pub fn as_i64(&self) -> Result<Option<i64>, ExecutorError> {
        match self {
            SqlValue::Null => Ok(None),
            SqlValue::Int(v) => Ok(Some(*v)),
            SqlValue::Text(s) => s
                .parse::<i64>()
                .map(Some)
                .map_err(|e| ExecutorError::Parse(format!("expected integer, got '{s}': {e}"))),
        }
    }

    /// Text view of the value; integers are rendered in decimal.
    pub fn as_text(&self) -> Result<String, ExecutorError> {
        match self {
            SqlValue::Null => Err(ExecutorError::Parse("expected text, got NULL".to_string())),
            SqlValue::Int(v) => Ok(v.to_string()),
            SqlValue::Text(s) => Ok(s.clone()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// One result row, columns in select order
pub type SqlRow = Vec<SqlValue>;

/// How a transport expects positional parameters to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `?1`, `?2`, ... (SQLite)
    QuestionNumbered,
    /// `%s` (pyformat-style drivers). Literal `%` in raw SQL must be doubled.
    Percent,
}

impl PlaceholderStyle {
    /// Render the placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            PlaceholderStyle::Dollar => format!("${index}"),
            PlaceholderStyle::QuestionNumbered => format!("?{index}"),
            PlaceholderStyle::Percent => "%s".to_string(),
        }
    }

    /// Whether raw scripts have to be percent-escaped before submission
    pub fn escapes_percent(&self) -> bool {
        matches!(self, PlaceholderStyle::Percent)
    }
}

/// Trait for executing database operations
///
/// Implementations run every call on the same underlying connection, so a
/// `BEGIN` issued through `batch_execute` scopes the calls that follow it.
/// See [`crate::transaction::Transaction`].
pub trait SqlExecutor {
    /// Execute a raw script (possibly several statements) with no parameters.
    ///
    /// The text is submitted verbatim.
    fn batch_execute(&self, sql: &str) -> Result<(), ExecutorError>;

    /// Execute a parameterised statement and return the number of rows affected
    fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, ExecutorError>;

    /// Execute a parameterised query and return every row
    fn query_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ExecutorError>;

    /// Placeholder syntax understood by `execute` and `query_all`
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for &T {
    fn batch_execute(&self, sql: &str) -> Result<(), ExecutorError> {
        (**self).batch_execute(sql)
    }

    fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, ExecutorError> {
        (**self).execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ExecutorError> {
        (**self).query_all(query, params)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        (**self).placeholder_style()
    }
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for Box<T> {
    fn batch_execute(&self, sql: &str) -> Result<(), ExecutorError> {
        (**self).batch_execute(sql)
    }

    fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, ExecutorError> {
        (**self).execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ExecutorError> {
        (**self).query_all(query, params)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        (**self).placeholder_style()
    }
}

/// `PostgreSQL` executor over a `may_postgres::Client`
#[cfg(feature = "postgres")]
pub struct MayPostgresExecutor {
    client: Client,
}

#[cfg(feature = "postgres")]
impl MayPostgresExecutor {
    /// Wrap an already connected client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(feature = "postgres")]
impl fmt::Debug for MayPostgresExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MayPostgresExecutor").finish_non_exhaustive()
    }
}

#[cfg(feature = "postgres")]
const NULL_PARAM: Option<i64> = None;

#[cfg(feature = "postgres")]
fn bind_params(params: &[SqlValue]) -> Vec<&dyn ToSql> {
    params
        .iter()
        .map(|param| match param {
            SqlValue::Null => &NULL_PARAM as &dyn ToSql,
            SqlValue::Int(v) => v as &dyn ToSql,
            SqlValue::Text(s) => s as &dyn ToSql,
        })
        .collect()
}

#[cfg(feature = "postgres")]
fn row_values(row: &Row) -> Result<SqlRow, ExecutorError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)?.map(|v| SqlValue::Int(i64::from(v)))
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)?.map(|v| SqlValue::Int(i64::from(v)))
        } else if *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
        {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        } else {
            return Err(ExecutorError::Parse(format!(
                "unsupported column type {} for column '{}'",
                ty,
                column.name()
            )));
        };
        values.push(value.unwrap_or(SqlValue::Null));
    }
    Ok(values)
}

#[cfg(feature = "postgres")]
impl SqlExecutor for MayPostgresExecutor {
    fn batch_execute(&self, sql: &str) -> Result<(), ExecutorError> {
        log::debug!("postgres batch_execute ({} bytes)", sql.len());
        self.client.batch_execute(sql).map_err(ExecutorError::from)
    }

    fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, ExecutorError> {
        log::debug!("postgres execute: {}", query.trim());
        self.client
            .execute(query, &bind_params(params))
            .map_err(ExecutorError::from)
    }

    fn query_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ExecutorError> {
        log::debug!("postgres query: {}", query.trim());
        let rows = self.client.query(query, &bind_params(params))?;
        rows.iter().map(row_values).collect()
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }
}

impl fmt::Display for PlaceholderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderStyle::Dollar => write!(f, "$n"),
            PlaceholderStyle::QuestionNumbered => write!(f, "?n"),
            PlaceholderStyle::Percent => write!(f, "%s"),
        }
    }
}
