//! Migration system
//!
//! This module provides the infrastructure for file-based SQL migrations:
//! - Migration file naming and discovery
//! - Plan generation between the current and a target version
//! - Bookkeeping table access
//! - Step execution with a version check and rollback on failure
//!
//! # Example
//!
//! ```rust,no_run
//! use migrator::migration::{Direction, Migrator, RunOutcome};
//! use migrator::sqlite::SqliteExecutor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = SqliteExecutor::open("app.db")?;
//! let migrator = Migrator::new("migrations");
//! migrator.install(&db)?;
//!
//! if let RunOutcome::Completed(steps) = migrator.migrate(&db, Direction::Up, None, None)? {
//!     for step in steps {
//!         println!("{step}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod migrator;
pub mod plan;
pub mod record;
pub mod repository;
pub mod run;
pub mod status;
pub mod version_store;

pub use error::{LookupKey, MigrationError};
pub use file::{Direction, MigrationFile};
pub use migrator::{escape_percent, MigrationRun, Migrator};
pub use plan::{plan, Plan};
pub use record::AppliedVersion;
pub use repository::{Migration, MigrationRepository};
pub use run::{
    is_affirmative, AppliedStep, Confirm, LineConfirm, Preview, PreviewEntry, RunOutcome, RunState,
};
pub use status::MigrationStatus;
pub use version_store::{VersionStore, DEFAULT_TABLE};
