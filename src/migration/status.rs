//! Migration status tracking

use crate::migration::{AppliedVersion, MigrationFile};

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Whether the bookkeeping table exists
    pub installed: bool,

    /// Current version recorded in the database (`0` when not installed)
    pub current_version: i64,

    /// Highest version present in the migrations directory
    pub max_known: i64,

    /// Applied migrations (from database)
    pub applied: Vec<AppliedVersion>,

    /// Up scripts above the current version (from file system)
    pub pending: Vec<MigrationFile>,

    /// Applied versions whose up script on disk no longer matches the stored text
    pub modified: Vec<i64>,
}

impl MigrationStatus {
    /// Status of a database without a bookkeeping table
    #[must_use]
    pub fn not_installed(max_known: i64, pending: Vec<MigrationFile>) -> Self {
        Self {
            installed: false,
            current_version: 0,
            max_known,
            applied: Vec::new(),
            pending,
            modified: Vec::new(),
        }
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.installed && self.pending.is_empty()
    }

    /// Get the next pending migration version
    #[must_use]
    pub fn next_pending_version(&self) -> Option<i64> {
        self.pending.first().map(|m| m.version)
    }
}
