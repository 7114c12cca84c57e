//! Configuration module for the backup sweeper.
//!
//! The sweeper is configured via an optional TOML file, with support for
//! environment variable interpolation using `${VAR_NAME}` syntax. Every
//! section is optional; a missing file means "all defaults".
//!
//! # Example
//!
//! ```toml
//! [backup]
//! retention_days = 14
//! table_pattern = "^prod-"
//!
//! [aws]
//! region = "${AWS_REGION}"
//! ```
//!
//! The two sweep parameters can additionally be overridden from the
//! environment (`BACKUP_RETENTION_IN_DAYS`, `TABLE_PATTERN`), which is how
//! scheduled deployments usually configure them.

mod aws;
mod backup;
mod observability;
mod policy;
mod server;

use std::path::Path;

pub use aws::*;
pub use backup::*;
pub use observability::*;
pub use policy::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the sweeper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweeperConfig {
    /// Backup and retention settings for the sweep.
    #[serde(default)]
    pub backup: BackupConfig,

    /// AWS client settings shared by the DynamoDB and IAM backends.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Paths used by the `update-role` deployment helper.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// HTTP landing endpoint configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl SweeperConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Load configuration from `path` if given, otherwise start from defaults.
    /// Environment overrides are applied and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.backup.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let mut config: SweeperConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.backup.validate()?;
        self.aws.validate()?;

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid table pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid retention '{0}': expected a non-negative whole number of days")]
    InvalidRetention(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips variables inside TOML comments; a `#` within a quoted string does
/// not start a comment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid");
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = comment_start(line);

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

/// Byte offset of the `#` starting a comment on `line`, ignoring any `#`
/// inside basic (`"..."`) or literal (`'...'`) strings.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '#' => return Some(i),
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
    }

    None
}
