//! Backup sweep configuration.
//!
//! # Example
//!
//! ```toml
//! [backup]
//! retention_days = 7
//! table_pattern = ".*"
//! dry_run = false
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::sweep::RetentionWindow;

/// Environment variable overriding [`BackupConfig::retention_days`].
pub const ENV_BACKUP_RETENTION: &str = "BACKUP_RETENTION_IN_DAYS";

/// Environment variable overriding [`BackupConfig::table_pattern`].
pub const ENV_TABLE_PATTERN: &str = "TABLE_PATTERN";

/// Backup sweep configuration.
///
/// These values are the defaults for every sweep; each one can be
/// overridden per invocation from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Days to keep a snapshot before it is deleted.
    /// Default: 7
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Regular expression selecting the tables to back up.
    /// Matched anywhere in the table name (not anchored).
    /// Default: ".*" (every table)
    #[serde(default = "default_table_pattern")]
    pub table_pattern: String,

    /// If true, log what would be created and deleted without doing it.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            table_pattern: default_table_pattern(),
            dry_run: false,
        }
    }
}

fn default_retention_days() -> u32 {
    7
}

fn default_table_pattern() -> String {
    ".*".to_string()
}

impl BackupConfig {
    /// Apply `BACKUP_RETENTION_IN_DAYS` and `TABLE_PATTERN` from the
    /// environment on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var(ENV_BACKUP_RETENTION) {
            let window: RetentionWindow = raw.parse()?;
            self.retention_days = window.as_days();
        }

        if let Ok(pattern) = std::env::var(ENV_TABLE_PATTERN) {
            self.table_pattern = pattern;
        }

        Ok(())
    }

    /// Compile the table pattern.
    pub fn compiled_pattern(&self) -> Result<Regex, ConfigError> {
        compile_table_pattern(&self.table_pattern)
    }

    pub fn retention(&self) -> RetentionWindow {
        RetentionWindow::days(self.retention_days)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.compiled_pattern().map(|_| ())
    }
}

/// Compile a table-name filter, mapping failures to [`ConfigError::InvalidPattern`].
pub fn compile_table_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
