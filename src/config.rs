//! Runner configuration.
//!
//! [`MigratorConfig`] is read from `config/migrator.toml` (optional) and
//! `MIGRATOR__*` environment variables, e.g. `MIGRATOR__DATABASE_URL` or
//! `MIGRATOR__MIGRATIONS_DIR`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Default location of the optional configuration file
pub const CONFIG_FILE: &str = "config/migrator.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MigratorConfig {
    /// Database connection string; `None` defers to `DATABASE_URL`
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    /// Name of the bookkeeping table, optionally schema-qualified
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_table() -> String {
    crate::migration::DEFAULT_TABLE.to_string()
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: default_migrations_dir(),
            table: default_table(),
        }
    }
}

impl MigratorConfig {
    /// Load the configuration from `config/migrator.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load the configuration from `path` (optional) and the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("MIGRATOR").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // The file existed but could not be parsed; keep going on env alone.
                if std::path::Path::new(path).exists() {
                    log::warn!("failed to load config file {path}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("MIGRATOR").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, \
                             then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        // Values may live under a `[migrator]` table in the file or at the top level (env).
        match settings.get::<MigratorConfig>("migrator") {
            Ok(mut cfg) => {
                // Environment keys land at the top level and win over the file section.
                if let Ok(url) = settings.get_string("database_url") {
                    cfg.database_url = Some(url);
                }
                if let Ok(dir) = settings.get_string("migrations_dir") {
                    cfg.migrations_dir = PathBuf::from(dir);
                }
                if let Ok(table) = settings.get_string("table") {
                    cfg.table = table;
                }
                Ok(cfg)
            }
            Err(ConfigError::NotFound(_)) => settings.try_deserialize::<MigratorConfig>(),
            Err(e) => Err(ConfigError::Message(format!(
                "Migrator configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    /// Resolve the connection string: explicit override, then config, then `DATABASE_URL`
    pub fn resolve_database_url(&self, override_url: Option<&str>) -> Option<String> {
        override_url
            .map(str::to_string)
            .or_else(|| self.database_url.clone())
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = MigratorConfig::default();
        assert_eq!(cfg.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(cfg.table, "migrations");
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn test_load_from_file_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrator.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[migrator]\n\
             database_url = \"sqlite::memory:\"\n\
             migrations_dir = \"db/migrations\"\n\
             table = \"public.schema_versions\""
        )
        .unwrap();

        let cfg = MigratorConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(cfg.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(cfg.table, "public.schema_versions");
    }

    #[test]
    fn test_override_wins() {
        let cfg = MigratorConfig {
            database_url: Some("sqlite:from-config.db".to_string()),
            ..MigratorConfig::default()
        };
        assert_eq!(
            cfg.resolve_database_url(Some("sqlite:flag.db")).as_deref(),
            Some("sqlite:flag.db")
        );
        assert_eq!(
            cfg.resolve_database_url(None).as_deref(),
            Some("sqlite:from-config.db")
        );
    }
}
