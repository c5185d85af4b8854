//! sqlpipe configuration
//!
//! Read from `<config dir>/sqlpipe/config.toml` unless a path is given:
//!
//! ```toml
//! database_url = "postgres://localhost/sales"
//! dialect = "postgres"
//! schema_path = "schema.json"
//! schema_cache_ttl_secs = 600
//!
//! [pipeline]
//! row_limit = 500
//! use_transaction = true
//! return_mode = "merge"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SqlPipeError, SqlPipeResult};
use crate::pipeline::PipelineConfig;
use crate::schema_cache::DEFAULT_SCHEMA_TTL;
use crate::transpiler::Dialect;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlPipeConfig {
    /// Database connection URL
    pub database_url: Option<String>,

    /// Dialect override; derived from the URL when absent
    pub dialect: Option<Dialect>,

    /// Path to a JSON schema document (optional)
    pub schema_path: Option<PathBuf>,

    pub schema_cache_ttl_secs: u64,

    pub pipeline: PipelineConfig,
}

impl Default for SqlPipeConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            dialect: None,
            schema_path: None,
            schema_cache_ttl_secs: DEFAULT_SCHEMA_TTL.as_secs(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl SqlPipeConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlpipe").join("config.toml"))
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> SqlPipeResult<Self> {
        toml::from_str(text).map_err(|e| SqlPipeError::Config(e.to_string()))
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> SqlPipeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from `path` if given, else from the default location. A missing
    /// default file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> SqlPipeResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Effective dialect: the explicit one, else the URL's, else Db2.
    pub fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or_else(|| {
            self.database_url
                .as_deref()
                .map(Dialect::from_url)
                .unwrap_or_default()
        })
    }

    pub fn schema_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ReturnMode;

    #[test]
    fn test_defaults() {
        let config = SqlPipeConfig::from_toml("").unwrap();
        assert_eq!(config, SqlPipeConfig::default());
        assert_eq!(config.dialect(), Dialect::Db2);
        assert_eq!(config.schema_cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.pipeline.row_limit, 200);
    }

    #[test]
    fn test_full_document() {
        let config = SqlPipeConfig::from_toml(
            r#"
            database_url = "mysql://root@localhost/shop"
            schema_cache_ttl_secs = 30

            [pipeline]
            row_limit = 50
            stop_on_error = true
            return_mode = "last"
            "#,
        )
        .unwrap();
        assert_eq!(config.dialect(), Dialect::MySql);
        assert_eq!(config.pipeline.row_limit, 50);
        assert!(config.pipeline.stop_on_error);
        assert_eq!(config.pipeline.return_mode, ReturnMode::Last);
    }

    #[test]
    fn test_explicit_dialect_wins() {
        let config = SqlPipeConfig::from_toml(
            "database_url = \"postgres://x\"\ndialect = \"sqlite\"",
        )
        .unwrap();
        assert_eq!(config.dialect(), Dialect::Sqlite);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            SqlPipeConfig::from_toml("row_limit = ["),
            Err(SqlPipeError::Config(_))
        ));
    }
}
