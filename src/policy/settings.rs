use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ConfigurationError, PolicyError};

/// Key naming the parent stage whose values a stage inherits.
const EXTENDS_KEY: &str = "extends";

/// Per-stage deployment settings, keyed by stage name.
///
/// A stage may name a parent stage under `extends`; keys missing from the
/// stage are looked up in the parent, recursively.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DeploymentSettings {
    stages: BTreeMap<String, Map<String, Value>>,
}

impl DeploymentSettings {
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Resolve `key` for `stage`, following `extends` links.
    pub fn value(&self, stage: &str, key: &str) -> Result<&Value, ConfigurationError> {
        let mut chain = vec![stage.to_string()];
        let mut current = stage;

        loop {
            let values = self
                .stages
                .get(current)
                .ok_or_else(|| ConfigurationError::UnknownStage(current.to_string()))?;

            if let Some(value) = values.get(key) {
                return Ok(value);
            }

            let Some(parent) = values.get(EXTENDS_KEY).and_then(Value::as_str) else {
                return Err(ConfigurationError::MissingKey {
                    stage: stage.to_string(),
                    key: key.to_string(),
                });
            };

            if chain.iter().any(|seen| seen == parent) {
                chain.push(parent.to_string());
                return Err(ConfigurationError::ExtendsCycle {
                    stage: stage.to_string(),
                    chain,
                });
            }

            chain.push(parent.to_string());
            current = parent;
        }
    }

    /// Like [`value`](Self::value), but the value must be a string.
    pub fn string_value(&self, stage: &str, key: &str) -> Result<&str, ConfigurationError> {
        self.value(stage, key)?
            .as_str()
            .ok_or_else(|| ConfigurationError::NotAString {
                stage: stage.to_string(),
                key: key.to_string(),
            })
    }
}
