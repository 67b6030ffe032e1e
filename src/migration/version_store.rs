//! Bookkeeping table access
//!
//! [`VersionStore`] is the only code that reads or writes the bookkeeping
//! table. It works over any [`SqlExecutor`], which is normally the
//! [`Transaction`](crate::transaction::Transaction) of the step being applied.

use crate::executor::{ExecutorError, SqlExecutor, SqlValue};
use crate::migration::{AppliedVersion, MigrationError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default bookkeeping table name
pub const DEFAULT_TABLE: &str = "migrations";

// Plain identifier, optionally schema-qualified: `migrations`, `public.migrations`
static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid table name regex")
});

/// Reads and writes applied versions
pub struct VersionStore<'a> {
    executor: &'a dyn SqlExecutor,
    table: &'a str,
}

impl<'a> VersionStore<'a> {
    /// Create a store over `table`
    ///
    /// The table name is spliced into SQL, so it must be a plain identifier.
    pub fn new(executor: &'a dyn SqlExecutor, table: &'a str) -> Result<Self, MigrationError> {
        validate_table_name(table)?;
        Ok(Self { executor, table })
    }

    pub fn table(&self) -> &str {
        self.table
    }

    /// Create the bookkeeping table if it does not exist yet
    pub fn install(&self) -> Result<(), MigrationError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                tag TEXT NOT NULL,
                up_sql TEXT NOT NULL,
                down_sql TEXT NOT NULL
            )",
            self.table
        );
        self.executor.batch_execute(&sql).map_err(|e| self.classify(e))?;
        log::info!("bookkeeping table `{}` installed", self.table);
        Ok(())
    }

    /// Whether the bookkeeping table exists
    pub fn is_installed(&self) -> Result<bool, MigrationError> {
        match self.current_version() {
            Ok(_) => Ok(true),
            Err(MigrationError::BookkeepingTableMissing { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `MAX(version)` over the applied records, `0` when there are none
    pub fn current_version(&self) -> Result<i64, MigrationError> {
        let sql = format!("SELECT MAX(version) AS cur_ver FROM {}", self.table);
        let rows = self.executor.query_all(&sql, &[]).map_err(|e| self.classify(e))?;
        let current = match rows.first().and_then(|row| row.first()) {
            Some(value) => value.as_i64()?.unwrap_or(0),
            None => 0,
        };
        Ok(current)
    }

    /// All applied records, ascending by version
    pub fn applied_versions(&self) -> Result<Vec<AppliedVersion>, MigrationError> {
        let sql = format!(
            "SELECT version, tag, up_sql, down_sql FROM {} ORDER BY version ASC",
            self.table
        );
        let rows = self.executor.query_all(&sql, &[]).map_err(|e| self.classify(e))?;
        rows.iter()
            .map(|row| AppliedVersion::from_row(row).map_err(MigrationError::from))
            .collect()
    }

    /// The record for `version`, if applied
    pub fn get(&self, version: i64) -> Result<Option<AppliedVersion>, MigrationError> {
        let sql = format!(
            "SELECT version, tag, up_sql, down_sql FROM {} WHERE version = {}",
            self.table,
            self.placeholder(1)
        );
        let rows = self
            .executor
            .query_all(&sql, &[SqlValue::Int(version)])
            .map_err(|e| self.classify(e))?;
        rows.first()
            .map(AppliedVersion::from_row)
            .transpose()
            .map_err(MigrationError::from)
    }

    /// Record an applied version
    pub fn insert(&self, record: &AppliedVersion) -> Result<(), MigrationError> {
        let sql = format!(
            "INSERT INTO {} (version, tag, up_sql, down_sql) VALUES ({}, {}, {}, {})",
            self.table,
            self.placeholder(1),
            self.placeholder(2),
            self.placeholder(3),
            self.placeholder(4)
        );
        self.executor
            .execute(
                &sql,
                &[
                    SqlValue::Int(record.version),
                    SqlValue::from(record.tag.as_str()),
                    SqlValue::from(record.up_sql.as_str()),
                    SqlValue::from(record.down_sql.as_str()),
                ],
            )
            .map_err(|e| self.classify(e))?;
        Ok(())
    }

    /// Remove the record for `version`; returns the number of rows deleted
    pub fn delete(&self, version: i64) -> Result<u64, MigrationError> {
        let sql = format!("DELETE FROM {} WHERE version = {}", self.table, self.placeholder(1));
        self.executor
            .execute(&sql, &[SqlValue::Int(version)])
            .map_err(|e| self.classify(e))
    }

    fn placeholder(&self, index: usize) -> String {
        self.executor.placeholder_style().placeholder(index)
    }

    fn classify(&self, err: ExecutorError) -> MigrationError {
        if err.is_missing_relation(self.table) {
            MigrationError::BookkeepingTableMissing {
                table: self.table.to_string(),
            }
        } else {
            MigrationError::Database(err)
        }
    }
}

/// Reject anything that is not a (schema-qualified) identifier
pub fn validate_table_name(table: &str) -> Result<(), MigrationError> {
    if TABLE_NAME_RE.is_match(table) {
        Ok(())
    } else {
        Err(MigrationError::InvalidIdentifier(table.to_string()))
    }
}
