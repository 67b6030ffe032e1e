//! # Migrator
//!
//! Linear, file-based SQL migrations for PostgreSQL and SQLite.
//!
//! Migrations are `<version>.<slug>.up.sql` / `<version>.<slug>.down.sql` pairs.
//! Applied versions are recorded, together with both scripts, in a bookkeeping
//! table. Every step runs in its own transaction and is checked against the
//! version recorded in the database before any of its SQL runs.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod transaction;

pub use config::MigratorConfig;
pub use executor::{ExecutorError, PlaceholderStyle, SqlExecutor, SqlRow, SqlValue};
pub use migration::{Direction, MigrationError, Migrator, RunOutcome};
pub use transaction::Transaction;

#[cfg(feature = "postgres")]
pub use executor::MayPostgresExecutor;
