//! `SQLite` transport over `rusqlite`.
//!
//! Used for local development databases and as the in-memory backend in tests.

use crate::executor::{ExecutorError, PlaceholderStyle, SqlExecutor, SqlRow, SqlValue};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Int(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Int(v),
        ValueRef::Real(v) => SqlValue::Text(v.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// `SQLite` executor over a single `rusqlite::Connection`
#[derive(Debug)]
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExecutorError> {
        let path = path.as_ref();
        log::debug!("opening sqlite database at {}", path.display());
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, ExecutorError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SqlExecutor for SqliteExecutor {
    fn batch_execute(&self, sql: &str) -> Result<(), ExecutorError> {
        log::debug!("sqlite batch_execute ({} bytes)", sql.len());
        self.conn.execute_batch(sql).map_err(ExecutorError::from)
    }

    fn execute(&self, query: &str, params: &[SqlValue]) -> Result<u64, ExecutorError> {
        log::debug!("sqlite execute: {}", query.trim());
        let affected = self.conn.execute(query, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query_all(&self, query: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, ExecutorError> {
        log::debug!("sqlite query: {}", query.trim());
        let mut stmt = self.conn.prepare(query)?;
        let column_count = stmt.column_count();
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            (0..column_count)
                .map(|idx| row.get_ref(idx).map(value_from_ref))
                .collect::<rusqlite::Result<SqlRow>>()
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ExecutorError::from)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::QuestionNumbered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_memory_database() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.batch_execute("CREATE TABLE t (id INTEGER, name TEXT, note TEXT)")
            .unwrap();

        let affected = db
            .execute(
                "INSERT INTO t (id, name, note) VALUES (?1, ?2, ?3)",
                &[SqlValue::Int(1), SqlValue::from("one"), SqlValue::Null],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = db.query_all("SELECT id, name, note FROM t", &[]).unwrap();
        assert_eq!(
            rows,
            vec![vec![SqlValue::Int(1), SqlValue::from("one"), SqlValue::Null]]
        );
    }

    #[test]
    fn test_missing_table_is_recognised() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        let err = db.query_all("SELECT MAX(version) FROM migrations", &[]).unwrap_err();
        assert!(err.is_missing_relation("migrations"), "unexpected error: {err}");
    }

    #[test]
    fn test_max_over_empty_table_is_null() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.batch_execute("CREATE TABLE t (id INTEGER)").unwrap();
        let rows = db.query_all("SELECT MAX(id) FROM t", &[]).unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Null]]);
    }

    #[test]
    fn test_placeholder_style() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        assert_eq!(db.placeholder_style(), PlaceholderStyle::QuestionNumbered);
    }
}
