//! Migration-specific error types

use crate::executor::ExecutorError;
use crate::migration::Direction;
use std::path::PathBuf;

/// How a migration lookup was keyed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Version(i64),
    Slug(String),
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKey::Version(version) => write!(f, "# {version}"),
            LookupKey::Slug(slug) => write!(f, "slug {slug}"),
        }
    }
}

/// Migration-specific errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// No migration file matches the lookup
    #[error("Could not find a migration for {key} ({direction}).")]
    NotFound {
        key: LookupKey,
        direction: Direction,
    },

    /// More than one file claims the same version (or slug) and direction
    #[error("Duplicate migrations for {key} ({direction}): {}", display_paths(.paths))]
    AmbiguousMigration {
        key: LookupKey,
        direction: Direction,
        paths: Vec<PathBuf>,
    },

    /// The bookkeeping table has not been created yet
    #[error(
        "The bookkeeping table `{table}` does not exist.\n\
         Run `migrate install` to create it."
    )]
    BookkeepingTableMissing { table: String },

    /// The database moved between planning and execution
    #[error("Version mismatch. Expected: {expected}, Actual: {actual}")]
    VersionMismatch { actual: i64, expected: i64 },

    /// Requested target cannot be reached from the current state
    #[error(
        "Invalid target version ({target}) \
         (cur={current}, max={max_known}, direction={direction}). \
         Current version is {current}, max version is {max_known}. \
         Requested {direction} to {target}."
    )]
    InvalidTarget {
        target: i64,
        current: i64,
        max_known: i64,
        direction: Direction,
    },

    /// The migration script itself failed; its transaction was rolled back
    #[error("Migration {version} ({direction}) failed during execution: {source}")]
    MigrationExecutionFailed {
        version: i64,
        direction: Direction,
        #[source]
        source: ExecutorError,
    },

    /// Database error outside of a migration script
    #[error("Database error: {0}")]
    Database(#[from] ExecutorError),

    /// Filesystem error
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The migrations directory does not exist
    #[error(
        "Migrations directory not found: {}\n\
         Perhaps you are running migrate in the wrong directory?",
        .0.display()
    )]
    MigrationsDirMissing(PathBuf),

    /// A file or record does not have the expected shape
    #[error("Invalid migration format: {0}")]
    InvalidFormat(String),

    /// Slug rejected by `make`
    #[error("Invalid slug, '{0}', must be in-this-format.")]
    InvalidSlug(String),

    /// Table or schema name rejected before being spliced into SQL
    #[error("Invalid SQL identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Refusing to overwrite an existing file
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_reports_both_sides() {
        let err = MigrationError::VersionMismatch {
            actual: 4,
            expected: 3,
        };
        assert_eq!(err.to_string(), "Version mismatch. Expected: 3, Actual: 4");
    }

    #[test]
    fn test_missing_table_mentions_install() {
        let err = MigrationError::BookkeepingTableMissing {
            table: "migrations".to_string(),
        };
        assert!(err.to_string().contains("migrate install"));
    }

    #[test]
    fn test_ambiguous_lists_paths() {
        let err = MigrationError::AmbiguousMigration {
            key: LookupKey::Version(2),
            direction: Direction::Up,
            paths: vec![
                PathBuf::from("migrations/2.a.up.sql"),
                PathBuf::from("migrations/2.b.up.sql"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("# 2 (up)"));
        assert!(msg.contains("migrations/2.a.up.sql, migrations/2.b.up.sql"));
    }

    #[test]
    fn test_not_found_by_slug() {
        let err = MigrationError::NotFound {
            key: LookupKey::Slug("add-users".to_string()),
            direction: Direction::Down,
        };
        assert_eq!(
            err.to_string(),
            "Could not find a migration for slug add-users (down)."
        );
    }
}
