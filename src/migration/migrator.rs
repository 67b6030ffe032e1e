//! Migrator - Core migration execution engine

use crate::config::MigratorConfig;
use crate::executor::{PlaceholderStyle, SqlExecutor};
use crate::migration::error::LookupKey;
use crate::migration::plan::{plan, Plan};
use crate::migration::run::{AppliedStep, Confirm, Preview, PreviewEntry, RunOutcome, RunState};
use crate::migration::{
    AppliedVersion, Direction, MigrationError, MigrationRepository, MigrationStatus, VersionStore,
    DEFAULT_TABLE,
};
use crate::transaction::Transaction;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

static SCHEMA_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid schema name regex"));

/// Core migration execution engine
///
/// The `Migrator` ties the migrations directory to a bookkeeping table. It holds
/// no connection: every operation takes the executor it should run against.
#[derive(Debug, Clone)]
pub struct Migrator {
    repository: MigrationRepository,
    table: String,
}

/// Where the reverse script of a step comes from
enum ReverseScript {
    OnDisk { tag: String, sql: String },
    Stored,
}

impl Migrator {
    /// Create a new Migrator over `migrations_dir` using the default bookkeeping table
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            repository: MigrationRepository::new(migrations_dir),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn from_config(config: &MigratorConfig) -> Self {
        Self::new(&config.migrations_dir).with_table(config.table.clone())
    }

    /// Use a different bookkeeping table
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn repository(&self) -> &MigrationRepository {
        &self.repository
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn store<'a>(
        &'a self,
        executor: &'a dyn SqlExecutor,
    ) -> Result<VersionStore<'a>, MigrationError> {
        VersionStore::new(executor, &self.table)
    }

    /// Create the bookkeeping table
    pub fn install(&self, executor: &dyn SqlExecutor) -> Result<(), MigrationError> {
        self.store(executor)?.install()
    }

    /// Current version of the database
    pub fn current_version(&self, executor: &dyn SqlExecutor) -> Result<i64, MigrationError> {
        self.store(executor)?.current_version()
    }

    /// Installed records in version order
    pub fn list(&self, executor: &dyn SqlExecutor) -> Result<Vec<AppliedVersion>, MigrationError> {
        self.store(executor)?.applied_versions()
    }

    /// Get migration status (applied vs pending)
    ///
    /// A missing bookkeeping table is reported as `installed = false`, not as an error.
    pub fn status(&self, executor: &dyn SqlExecutor) -> Result<MigrationStatus, MigrationError> {
        let files = self.repository.scan()?;
        let max_known = files.iter().map(|f| f.version).max().unwrap_or(0);

        let store = self.store(executor)?;
        if !store.is_installed()? {
            let pending = files
                .into_iter()
                .filter(|f| f.direction == Direction::Up)
                .collect();
            return Ok(MigrationStatus::not_installed(max_known, pending));
        }
        let applied = store.applied_versions()?;
        let current_version = applied.iter().map(|r| r.version).max().unwrap_or(0);

        let mut modified = Vec::new();
        for record in &applied {
            let on_disk = files
                .iter()
                .find(|f| f.version == record.version && f.direction == Direction::Up);
            match on_disk {
                Some(file) => {
                    let sql = fs::read_to_string(&file.path)
                        .map_err(|e| MigrationError::io(&file.path, e))?;
                    if sql != record.up_sql {
                        modified.push(record.version);
                    }
                }
                None => log::warn!(
                    "applied migration {} ({}) has no up script on disk",
                    record.version,
                    record.tag
                ),
            }
        }

        let pending = files
            .into_iter()
            .filter(|f| f.direction == Direction::Up && f.version > current_version)
            .collect();

        Ok(MigrationStatus {
            installed: true,
            current_version,
            max_known,
            applied,
            pending,
            modified,
        })
    }

    /// Work out the versions a run would visit
    ///
    /// # Arguments
    ///
    /// * `executor` - The database executor
    /// * `direction` - Which way to move
    /// * `target` - Version to end at; `None` means all the way (`max_known` up, `0` down)
    pub fn plan(
        &self,
        executor: &dyn SqlExecutor,
        direction: Direction,
        target: Option<i64>,
    ) -> Result<Plan, MigrationError> {
        self.repository.check_unique()?;
        let current = self.current_version(executor)?;
        let max_known = self.repository.max_version()?;
        let target = target.unwrap_or(match direction {
            Direction::Up => max_known,
            Direction::Down => 0,
        });
        plan(current, max_known, target, direction)
    }

    /// Resolve each planned version to the script that will run
    pub fn preview(&self, plan: &Plan) -> Result<Preview, MigrationError> {
        let mut entries = Vec::with_capacity(plan.len());
        for &version in plan.versions() {
            let label = match self.repository.find(version, plan.direction) {
                Ok(file) => file.file_name(),
                Err(MigrationError::NotFound { .. }) if plan.direction.is_down() => {
                    format!("{version} (down script stored in `{}`)", self.table)
                }
                Err(e) => return Err(e),
            };
            entries.push(PreviewEntry { version, label });
        }
        Ok(Preview {
            direction: plan.direction,
            entries,
        })
    }

    /// Plan a run without touching the database beyond reading the current version
    pub fn begin_run<'a>(
        &'a self,
        executor: &'a dyn SqlExecutor,
        direction: Direction,
        target: Option<i64>,
    ) -> Result<MigrationRun<'a>, MigrationError> {
        let mut state = RunState::Idle;
        let plan = self.plan(executor, direction, target)?;
        state.advance(RunState::Planned);
        Ok(MigrationRun {
            migrator: self,
            executor,
            plan,
            state,
        })
    }

    /// Move the database to `target`
    ///
    /// With `confirm`, the resolved migration list is shown first and the run
    /// only proceeds on an explicit yes.
    ///
    /// # Returns
    ///
    /// The committed steps in order, or [`RunOutcome::Aborted`] when declined.
    pub fn migrate(
        &self,
        executor: &dyn SqlExecutor,
        direction: Direction,
        target: Option<i64>,
        confirm: Option<&mut dyn Confirm>,
    ) -> Result<RunOutcome, MigrationError> {
        let mut run = self.begin_run(executor, direction, target)?;
        if let Some(confirm) = confirm {
            if !run.confirm(confirm)? {
                log::info!("Action canceled.");
                return Ok(RunOutcome::Aborted);
            }
        }
        run.apply()
    }

    /// Apply or revert exactly one version in its own transaction
    ///
    /// The version must be the next one up (`current + 1`) when advancing, or the
    /// current one when reverting; otherwise nothing runs and
    /// [`MigrationError::VersionMismatch`] is returned.
    pub fn apply_step(
        &self,
        executor: &dyn SqlExecutor,
        version: i64,
        direction: Direction,
    ) -> Result<AppliedStep, MigrationError> {
        let forward = match direction {
            Direction::Up => Some(self.repository.load(version)?),
            Direction::Down => None,
        };
        let reverse = match direction {
            Direction::Up => None,
            Direction::Down => Some(self.reverse_script(version)?),
        };

        let tx = Transaction::begin(executor)?;
        let store = VersionStore::new(&tx, &self.table)?;

        let current = store.current_version()?;
        let expected = match direction {
            Direction::Up => current + 1,
            Direction::Down => current,
        };
        if version != expected {
            tx.rollback()?;
            return Err(MigrationError::VersionMismatch {
                actual: version,
                expected,
            });
        }

        let run_script = |sql: &str| {
            log::debug!("executing {direction} script for version {version}");
            tx.batch_execute(&prepare_script(sql, tx.placeholder_style()))
                .map_err(|source| MigrationError::MigrationExecutionFailed {
                    version,
                    direction,
                    source,
                })
        };

        let tag = match (forward, reverse) {
            (Some(migration), _) => {
                run_script(&migration.forward_sql)?;
                store.insert(&AppliedVersion::new(
                    version,
                    migration.tag.clone(),
                    migration.forward_sql,
                    migration.reverse_sql,
                ))?;
                migration.tag
            }
            (None, Some(ReverseScript::OnDisk { tag, sql })) => {
                run_script(&sql)?;
                store.delete(version)?;
                tag
            }
            (None, _) => {
                let record = store.get(version)?.ok_or(MigrationError::NotFound {
                    key: LookupKey::Version(version),
                    direction,
                })?;
                log::warn!(
                    "down script for version {version} not found on disk, \
                     using the copy stored in `{}`",
                    self.table
                );
                run_script(&record.down_sql)?;
                store.delete(version)?;
                record.tag
            }
        };

        // Deferred constraints surface at COMMIT; that is still the script failing.
        tx.commit()
            .map_err(|source| MigrationError::MigrationExecutionFailed {
                version,
                direction,
                source,
            })?;
        log::info!("{tag} - {direction}");
        Ok(AppliedStep {
            version,
            tag,
            direction,
        })
    }

    fn reverse_script(&self, version: i64) -> Result<ReverseScript, MigrationError> {
        match self.repository.read(version, Direction::Down) {
            Ok((file, sql)) => Ok(ReverseScript::OnDisk {
                tag: crate::migration::file::tag_from_filename(&file.file_name())?,
                sql,
            }),
            Err(MigrationError::NotFound { .. }) => Ok(ReverseScript::Stored),
            Err(e) => Err(e),
        }
    }

    /// Run arbitrary SQL files in one transaction, in the given order
    ///
    /// Every file must exist before anything is executed. Bookkeeping is not touched.
    pub fn apply_files(
        &self,
        executor: &dyn SqlExecutor,
        paths: &[PathBuf],
    ) -> Result<usize, MigrationError> {
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(MigrationError::io(
                missing,
                io::Error::new(io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        let tx = Transaction::begin(executor)?;
        for path in paths {
            let sql =
                fs::read_to_string(path).map_err(|e| MigrationError::io(path, e))?;
            log::info!("applying {}", path.display());
            tx.batch_execute(&prepare_script(&sql, tx.placeholder_style()))?;
        }
        tx.commit()?;
        Ok(paths.len())
    }

    /// Drop `schema` and everything in it
    ///
    /// The caller is responsible for asking first.
    pub fn wipe_schema(
        &self,
        executor: &dyn SqlExecutor,
        schema: &str,
    ) -> Result<(), MigrationError> {
        if !SCHEMA_NAME_RE.is_match(schema) {
            return Err(MigrationError::InvalidIdentifier(schema.to_string()));
        }
        executor.batch_execute(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))?;
        log::warn!("schema `{schema}` wiped");
        Ok(())
    }
}

/// A planned run moving through its states
pub struct MigrationRun<'a> {
    migrator: &'a Migrator,
    executor: &'a dyn SqlExecutor,
    plan: Plan,
    state: RunState,
}

impl<'a> MigrationRun<'a> {
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Show the preview and ask; a decline moves the run to `Aborted`
    pub fn confirm(&mut self, confirm: &mut dyn Confirm) -> Result<bool, MigrationError> {
        let preview = self.migrator.preview(&self.plan)?;
        if confirm.confirm(&preview.to_string())? {
            self.state.advance(RunState::Previewed);
            Ok(true)
        } else {
            self.state.advance(RunState::Aborted);
            Ok(false)
        }
    }

    /// Apply every planned step in order, stopping at the first failure
    ///
    /// Steps committed before a failure stay applied.
    pub fn apply(mut self) -> Result<RunOutcome, MigrationError> {
        if self.state == RunState::Aborted {
            return Ok(RunOutcome::Aborted);
        }

        self.state.advance(RunState::Applying);
        let mut steps = Vec::with_capacity(self.plan.len());
        for &version in self.plan.versions() {
            steps.push(self.migrator.apply_step(self.executor, version, self.plan.direction)?);
        }
        self.state.advance(RunState::Done);
        Ok(RunOutcome::Completed(steps))
    }
}

/// Double every `%` so the script survives a `%s`-style driver
pub fn escape_percent(sql: &str) -> String {
    sql.replace('%', "%%")
}

fn prepare_script(sql: &str, style: PlaceholderStyle) -> Cow<'_, str> {
    if style.escapes_percent() {
        Cow::Owned(escape_percent(sql))
    } else {
        Cow::Borrowed(sql)
    }
}
