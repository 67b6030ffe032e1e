//! `AppliedVersion` - Represents rows in the bookkeeping table

use crate::executor::{ExecutorError, SqlRow};

/// One applied migration as recorded in the bookkeeping table
///
/// Both scripts are stored so a later revert does not depend on the
/// migrations directory still holding the original files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedVersion {
    pub version: i64,

    /// Label derived from the up file name
    pub tag: String,

    /// Forward script text as applied
    pub up_sql: String,

    /// Reverse script text captured at apply time
    pub down_sql: String,
}

impl AppliedVersion {
    #[must_use]
    pub fn new(version: i64, tag: String, up_sql: String, down_sql: String) -> Self {
        Self {
            version,
            tag,
            up_sql,
            down_sql,
        }
    }

    /// Create an `AppliedVersion` from a database row
    ///
    /// Expected column order: `version`, `tag`, `up_sql`, `down_sql`
    pub fn from_row(row: &SqlRow) -> Result<Self, ExecutorError> {
        if row.len() != 4 {
            return Err(ExecutorError::Parse(format!(
                "expected 4 columns (version, tag, up_sql, down_sql), got {}",
                row.len()
            )));
        }
        let version = row[0]
            .as_i64()?
            .ok_or_else(|| ExecutorError::Parse("version is NULL".to_string()))?;

        Ok(Self {
            version,
            tag: row[1].as_text()?,
            up_sql: row[2].as_text()?,
            down_sql: row[3].as_text()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqlValue;

    #[test]
    fn test_from_row() {
        let row = vec![
            SqlValue::Int(2),
            SqlValue::from("add-index"),
            SqlValue::from("CREATE INDEX i ON t (c);"),
            SqlValue::from("DROP INDEX i;"),
        ];
        let record = AppliedVersion::from_row(&row).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.tag, "add-index");
        assert_eq!(record.down_sql, "DROP INDEX i;");
    }

    #[test]
    fn test_from_row_rejects_short_rows() {
        let row = vec![SqlValue::Int(2), SqlValue::from("add-index")];
        assert!(AppliedVersion::from_row(&row).is_err());
    }

    #[test]
    fn test_from_row_rejects_null_version() {
        let row = vec![
            SqlValue::Null,
            SqlValue::from("t"),
            SqlValue::from(""),
            SqlValue::from(""),
        ];
        assert!(AppliedVersion::from_row(&row).is_err());
    }
}
