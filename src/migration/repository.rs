//! Migration repository
//!
//! Resolves versions and slugs to script files in the migrations directory.
//! Version numbers are unique per direction; a second file claiming the same
//! `(version, direction)` makes every lookup for it fail as ambiguous.

use crate::migration::file::{file_name, tag_from_filename, Direction, MigrationFile};
use crate::migration::error::LookupKey;
use crate::migration::MigrationError;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("valid slug regex"));

/// A migration resolved from disk: both scripts plus their label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub slug: String,
    /// Tag recorded in the bookkeeping table
    pub tag: String,
    pub forward_sql: String,
    pub reverse_sql: String,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// File-backed migration source
#[derive(Debug, Clone)]
pub struct MigrationRepository {
    migrations_dir: PathBuf,
}

impl MigrationRepository {
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            migrations_dir: migrations_dir.as_ref().to_path_buf(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Every script following the naming convention, sorted by version then direction
    ///
    /// Other files in the directory are ignored.
    pub fn scan(&self) -> Result<Vec<MigrationFile>, MigrationError> {
        if !self.migrations_dir.is_dir() {
            return Err(MigrationError::MigrationsDirMissing(self.migrations_dir.clone()));
        }

        let entries = fs::read_dir(&self.migrations_dir)
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::io(&self.migrations_dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match MigrationFile::from_path(&path) {
                Ok(file) => files.push(file),
                Err(_) => log::trace!("ignoring {}", path.display()),
            }
        }

        files.sort_by(|a, b| {
            (a.version, a.direction.is_down(), &a.path).cmp(&(
                b.version,
                b.direction.is_down(),
                &b.path,
            ))
        });
        Ok(files)
    }

    /// Locate the single script for `version` in `direction`
    pub fn find(
        &self,
        version: i64,
        direction: Direction,
    ) -> Result<MigrationFile, MigrationError> {
        let matches = self
            .scan()?
            .into_iter()
            .filter(|f| f.version == version && f.direction == direction)
            .collect();
        single(matches, LookupKey::Version(version), direction)
    }

    /// Locate the single script for `slug` in `direction`
    pub fn find_by_slug(
        &self,
        slug: &str,
        direction: Direction,
    ) -> Result<MigrationFile, MigrationError> {
        let matches = self
            .scan()?
            .into_iter()
            .filter(|f| f.slug == slug && f.direction == direction)
            .collect();
        single(matches, LookupKey::Slug(slug.to_string()), direction)
    }

    /// Resolve `version` to its up script, tag, and sibling down script
    pub fn load(&self, version: i64) -> Result<Migration, MigrationError> {
        let up = self.find(version, Direction::Up)?;
        let up_name = up.file_name();
        let tag = tag_from_filename(&up_name)?;

        // The down script shares the up script's stem, whatever its spelling.
        let stem = up_name.strip_suffix(".up.sql").ok_or_else(|| {
            MigrationError::InvalidFormat(format!("Expected .up.sql file but got: {up_name}"))
        })?;
        let down_path = up.path.with_file_name(format!("{stem}.down.sql"));
        if !down_path.is_file() {
            return Err(MigrationError::NotFound {
                key: LookupKey::Version(version),
                direction: Direction::Down,
            });
        }

        Ok(Migration {
            version,
            slug: up.slug.clone(),
            tag,
            forward_sql: read_script(&up.path)?,
            reverse_sql: read_script(&down_path)?,
            up_path: up.path,
            down_path,
        })
    }

    /// Read the script for `version` in `direction`
    pub fn read(
        &self,
        version: i64,
        direction: Direction,
    ) -> Result<(MigrationFile, String), MigrationError> {
        let file = self.find(version, direction)?;
        let sql = read_script(&file.path)?;
        Ok((file, sql))
    }

    /// Highest version present on disk, `0` when there are no migrations
    pub fn max_version(&self) -> Result<i64, MigrationError> {
        let files = self.scan()?;
        match files.iter().map(|f| f.version).max() {
            Some(max) => Ok(max),
            None => {
                log::warn!(
                    "No migration files found in {}. \
                     Perhaps you are running migrate in the wrong directory?",
                    self.migrations_dir.display()
                );
                Ok(0)
            }
        }
    }

    /// Version a newly created migration would get
    pub fn next_version(&self) -> Result<i64, MigrationError> {
        Ok(self.max_version()? + 1)
    }

    /// Fail if any `(version, direction)` pair resolves to more than one file
    pub fn check_unique(&self) -> Result<(), MigrationError> {
        let mut seen: BTreeMap<(i64, bool), Vec<PathBuf>> = BTreeMap::new();
        for file in self.scan()? {
            seen.entry((file.version, file.direction.is_down()))
                .or_default()
                .push(file.path);
        }

        match seen.into_iter().find(|(_, paths)| paths.len() > 1) {
            Some(((version, is_down), paths)) => Err(MigrationError::AmbiguousMigration {
                key: LookupKey::Version(version),
                direction: if is_down { Direction::Down } else { Direction::Up },
                paths,
            }),
            None => Ok(()),
        }
    }

    /// Create an empty up/down pair for `slug` at the next free version
    ///
    /// Returns the paths of the up and down files.
    pub fn create(&self, slug: &str) -> Result<(PathBuf, PathBuf), MigrationError> {
        if !SLUG_RE.is_match(slug) {
            return Err(MigrationError::InvalidSlug(slug.to_string()));
        }

        fs::create_dir_all(&self.migrations_dir)
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))?;
        let version = self.next_version()?;

        let up_path = self
            .migrations_dir
            .join(file_name(version, slug, Direction::Up));
        let down_path = self
            .migrations_dir
            .join(file_name(version, slug, Direction::Down));
        for path in [&up_path, &down_path] {
            if path.exists() {
                return Err(MigrationError::AlreadyExists(path.clone()));
            }
        }

        let generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        for (path, direction) in [(&up_path, Direction::Up), (&down_path, Direction::Down)] {
            let template = format!(
                "-- Migration {version}: {slug} ({direction})\n-- Generated: {generated}\n\n"
            );
            fs::write(path, template).map_err(|e| MigrationError::io(path, e))?;
        }

        log::info!("created migration {version} ({slug})");
        Ok((up_path, down_path))
    }
}

fn single(
    mut matches: Vec<MigrationFile>,
    key: LookupKey,
    direction: Direction,
) -> Result<MigrationFile, MigrationError> {
    match matches.len() {
        0 => Err(MigrationError::NotFound { key, direction }),
        1 => Ok(matches.remove(0)),
        _ => Err(MigrationError::AmbiguousMigration {
            key,
            direction,
            paths: matches.into_iter().map(|f| f.path).collect(),
        }),
    }
}

fn read_script(path: &Path) -> Result<String, MigrationError> {
    fs::read_to_string(path).map_err(|e| MigrationError::io(path, e))
}
