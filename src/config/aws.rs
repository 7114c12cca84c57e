use serde::{Deserialize, Serialize};

use super::ConfigError;

/// AWS client configuration.
///
/// Credentials always come from the standard provider chain (environment,
/// shared profile, instance or task role).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// AWS region (e.g., "us-east-1"). Uses the default region chain if omitted.
    #[serde(default)]
    pub region: Option<String>,

    /// Endpoint override for DynamoDB, e.g. DynamoDB Local or localstack.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(region) = &self.region
            && region.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "aws.region must not be empty when set".into(),
            ));
        }

        if let Some(url) = &self.endpoint_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "aws.endpoint_url must be an http(s) URL, got '{url}'"
            )));
        }

        Ok(())
    }
}
