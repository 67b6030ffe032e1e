//! Migration file naming and parsing
//!
//! A migration is a pair of files named `<version>.<slug>.up.sql` and
//! `<version>.<slug>.down.sql`. File content is opaque SQL.

use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

// Pattern: {digits}.{slug}.{up|down}.sql
static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(.+)\.(up|down)\.sql$").expect("valid filename regex"));

/// Which way a migration moves the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The tag used in file names and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, Direction::Down)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a discovered migration script file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path to the script
    pub path: PathBuf,

    /// Migration version (position in the sequence, ≥ 1)
    pub version: i64,

    /// Human-readable label between the version and the direction
    pub slug: String,

    pub direction: Direction,
}

impl MigrationFile {
    /// Parse a path whose file name follows the naming convention
    pub fn from_path(path: &Path) -> Result<Self, MigrationError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MigrationError::InvalidFormat(format!("Invalid filename: {}", path.display()))
            })?;
        let (version, slug, direction) = parse_filename(filename)?;
        Ok(Self {
            path: path.to_path_buf(),
            version,
            slug,
            direction,
        })
    }

    /// The file name as found on disk, e.g. `3.add-index.up.sql`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name(self.version, &self.slug, self.direction))
    }
}

/// Build the file name for a migration script
pub fn file_name(version: i64, slug: &str, direction: Direction) -> String {
    format!("{version}.{slug}.{direction}.sql")
}

/// Parse a migration file name into `(version, slug, direction)`
///
/// # Example
/// - `12.create-users.up.sql` → version: 12, slug: "create-users", direction: Up
pub fn parse_filename(filename: &str) -> Result<(i64, String, Direction), MigrationError> {
    let caps = FILENAME_RE.captures(filename).ok_or_else(|| {
        MigrationError::InvalidFormat(format!(
            "Migration file name '{filename}' does not match expected pattern: \
             {{version}}.{{slug}}.{{up|down}}.sql"
        ))
    })?;

    let version_str = &caps[1];
    let version = version_str.parse::<i64>().map_err(|e| {
        MigrationError::InvalidFormat(format!(
            "Invalid version '{version_str}' in '{filename}': {e}"
        ))
    })?;
    if version < 1 {
        return Err(MigrationError::InvalidFormat(format!(
            "Migration versions start at 1, got {version} in '{filename}'"
        )));
    }

    let direction = match &caps[3] {
        "up" => Direction::Up,
        _ => Direction::Down,
    };

    Ok((version, caps[2].to_string(), direction))
}

/// Derive the tag stored in the bookkeeping table from a file name
///
/// Strips the leading version segment and the trailing `.<direction>.sql`;
/// whatever is in between (dots included) is the tag.
///
/// # Example
/// - `7.users.add-email.up.sql` → `users.add-email`
pub fn tag_from_filename(filename: &str) -> Result<String, MigrationError> {
    let invalid =
        || MigrationError::InvalidFormat(format!("Cannot derive a tag from '{filename}'"));

    let left = filename.find('.').ok_or_else(invalid)? + 1;
    let last = filename.rfind('.').ok_or_else(invalid)?;
    let right = filename[..last].rfind('.').ok_or_else(invalid)?;
    if right <= left {
        return Err(invalid());
    }
    Ok(filename[left..right].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filename() {
        assert_eq!(
            parse_filename("12.create-users.up.sql").unwrap(),
            (12, "create-users".to_string(), Direction::Up)
        );
        assert_eq!(
            parse_filename("3.drop.down.sql").unwrap(),
            (3, "drop".to_string(), Direction::Down)
        );
    }

    #[test]
    fn test_parse_filename_rejects_other_names() {
        for name in [
            "README.md",
            "abc.slug.up.sql",
            "1.slug.sideways.sql",
            "1.up.sql",
            "1.slug.up.sql.bak",
            "0.zero.up.sql",
        ] {
            assert!(parse_filename(name).is_err(), "Should reject: {name}");
        }
    }

    #[test]
    fn test_tag_from_filename() {
        assert_eq!(tag_from_filename("1.create-users.up.sql").unwrap(), "create-users");
        assert_eq!(tag_from_filename("1.create-users.down.sql").unwrap(), "create-users");
        assert_eq!(tag_from_filename("7.users.add-email.up.sql").unwrap(), "users.add-email");
    }

    #[test]
    fn test_tag_is_symmetric_between_directions() {
        for slug in ["a", "add-index", "multi.part.slug"] {
            let up = file_name(4, slug, Direction::Up);
            let down = file_name(4, slug, Direction::Down);
            assert_eq!(tag_from_filename(&up).unwrap(), slug);
            assert_eq!(tag_from_filename(&up).unwrap(), tag_from_filename(&down).unwrap());
        }
    }

    #[test]
    fn test_tag_from_malformed_filename() {
        assert!(tag_from_filename("nodots").is_err());
        assert!(tag_from_filename("1.up.sql").is_err());
    }

    #[test]
    fn test_from_path_round_trips_file_name() {
        let file = MigrationFile::from_path(Path::new("migrations/5.seed-data.down.sql")).unwrap();
        assert_eq!(file.version, 5);
        assert_eq!(file.slug, "seed-data");
        assert_eq!(file.direction, Direction::Down);
        assert_eq!(file.file_name(), "5.seed-data.down.sql");
    }
}
