//! Integration tests for the migration system against PostgreSQL
//!
//! Set `MIGRATOR_TEST_DATABASE_URL` to a database the tests may write to;
//! without it every test returns early.
//!
//! Test flow:
//! 1. Create a scratch schema and a migrations directory
//! 2. Install the bookkeeping table inside the scratch schema
//! 3. Run the migrations up and down
//! 4. Verify bookkeeping rows and the actual database schema
//! 5. Wipe the scratch schema

use migrator::connection;
use migrator::migration::{Direction, MigrationError, Migrator, RunOutcome};
use migrator::{PlaceholderStyle, SqlExecutor, SqlValue};
use std::env;
use std::fs;
use std::path::Path;

const SCHEMA: &str = "migrator_it";

fn executor() -> Option<Box<dyn SqlExecutor>> {
    let url = env::var("MIGRATOR_TEST_DATABASE_URL").ok()?;
    Some(connection::open(&url).expect("Failed to connect to test database"))
}

fn write_migrations(dir: &Path) {
    let files = [
        (
            "1.create-accounts.up.sql",
            format!("CREATE TABLE {SCHEMA}.accounts (id BIGINT PRIMARY KEY, code TEXT NOT NULL);"),
        ),
        ("1.create-accounts.down.sql", format!("DROP TABLE {SCHEMA}.accounts;")),
        (
            "2.seed-accounts.up.sql",
            format!("INSERT INTO {SCHEMA}.accounts (id, code) VALUES (1, '100% cash');"),
        ),
        ("2.seed-accounts.down.sql", format!("DELETE FROM {SCHEMA}.accounts WHERE id = 1;")),
    ];
    for (name, body) in files {
        fs::write(dir.join(name), body).expect("Failed to write migration file");
    }
}

/// Helper to check whether a table exists in the scratch schema
fn table_exists(executor: &dyn SqlExecutor, table: &str) -> bool {
    let rows = executor
        .query_all(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema::text = $1 AND table_name::text = $2",
            &[SqlValue::from(SCHEMA), SqlValue::from(table)],
        )
        .expect("Failed to query information_schema");
    rows[0][0].as_i64().expect("count").unwrap_or(0) == 1
}

#[test]
fn test_migration_lifecycle() {
    let Some(executor) = executor() else {
        eprintln!("MIGRATOR_TEST_DATABASE_URL not set, skipping");
        return;
    };
    let executor = executor.as_ref();
    assert_eq!(executor.placeholder_style(), PlaceholderStyle::Dollar);

    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    write_migrations(dir.path());
    let migrator = Migrator::new(dir.path()).with_table(format!("{SCHEMA}.migrations"));

    migrator.wipe_schema(executor, SCHEMA).expect("Failed to reset scratch schema");
    executor
        .batch_execute(&format!("CREATE SCHEMA {SCHEMA}"))
        .expect("Failed to create scratch schema");

    // Not installed yet
    assert!(matches!(
        migrator.list(executor),
        Err(MigrationError::BookkeepingTableMissing { .. })
    ));
    assert!(!migrator.status(executor).expect("status").installed);

    migrator.install(executor).expect("Failed to install bookkeeping table");

    // Up to the latest
    match migrator.migrate(executor, Direction::Up, None, None).expect("Failed to migrate up") {
        RunOutcome::Completed(steps) => assert_eq!(steps.len(), 2),
        RunOutcome::Aborted => panic!("run was not interactive"),
    }
    assert!(table_exists(executor, "accounts"));

    let records = migrator.list(executor).expect("Failed to list");
    assert_eq!(records.iter().map(|r| r.version).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(records[1].tag, "seed-accounts");

    // Literal percent signs survive untouched on a `$n` transport
    let rows = executor
        .query_all(&format!("SELECT code FROM {SCHEMA}.accounts WHERE id = 1"), &[])
        .expect("Failed to read seeded row");
    assert_eq!(rows[0][0].as_text().expect("text"), "100% cash");

    // Version mismatch aborts before running anything
    assert!(matches!(
        migrator.apply_step(executor, 1, Direction::Up),
        Err(MigrationError::VersionMismatch {
            actual: 1,
            expected: 3
        })
    ));

    // Down to zero
    migrator
        .migrate(executor, Direction::Down, Some(0), None)
        .expect("Failed to migrate down");
    assert!(!table_exists(executor, "accounts"));
    assert_eq!(migrator.current_version(executor).expect("current"), 0);

    migrator.wipe_schema(executor, SCHEMA).expect("Failed to wipe scratch schema");
}

#[test]
fn test_failed_step_rolls_back() {
    let Some(executor) = executor() else {
        eprintln!("MIGRATOR_TEST_DATABASE_URL not set, skipping");
        return;
    };
    let executor = executor.as_ref();
    let schema = format!("{SCHEMA}_rollback");

    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(
        dir.path().join("1.broken.up.sql"),
        format!("CREATE TABLE {schema}.half (id BIGINT);\nSELECT * FROM {schema}.does_not_exist;"),
    )
    .expect("write");
    fs::write(dir.path().join("1.broken.down.sql"), "").expect("write");

    let migrator = Migrator::new(dir.path()).with_table(format!("{schema}.migrations"));
    migrator.wipe_schema(executor, &schema).expect("reset");
    executor.batch_execute(&format!("CREATE SCHEMA {schema}")).expect("create schema");
    migrator.install(executor).expect("install");

    assert!(matches!(
        migrator.apply_step(executor, 1, Direction::Up),
        Err(MigrationError::MigrationExecutionFailed { version: 1, .. })
    ));
    assert_eq!(migrator.current_version(executor).expect("current"), 0);
    let rows = executor
        .query_all(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema::text = $1",
            &[SqlValue::from(schema.as_str())],
        )
        .expect("count tables");
    // Only the bookkeeping table is left
    assert_eq!(rows[0][0].as_i64().expect("count"), Some(1));

    migrator.wipe_schema(executor, &schema).expect("wipe");
}
