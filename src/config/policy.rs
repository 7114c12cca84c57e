use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Paths for the `update-role` deployment helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Deployment settings document (JSON, keyed by stage).
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Policy document template (JSON).
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,

    /// Name of the inline policy attached to the role.
    #[serde(default = "default_policy_name")]
    pub policy_name: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            template_path: default_template_path(),
            policy_name: default_policy_name(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("deploy_settings.json")
}

fn default_template_path() -> PathBuf {
    PathBuf::from("policy.template.json")
}

fn default_policy_name() -> String {
    "deployment-permissions".to_string()
}
