//! Deployment role helper.
//!
//! Renders the deployment permissions policy for a stage and attaches it to
//! the stage's execution role, creating the role first if it is missing.

#[cfg(feature = "aws-sdk")]
mod aws;
mod identity;
mod settings;
mod template;

use std::path::PathBuf;

#[cfg(feature = "aws-sdk")]
pub use aws::AwsIdentity;
pub use identity::{IdentityService, MemoryIdentity, MemoryRole};
use serde_json::{Value, json};
pub use settings::DeploymentSettings;
pub use template::{Placeholders, PolicyTemplate, render_resource};
use thiserror::Error;

use crate::dynamo::ServiceError;

/// Settings key holding the stage's execution role name.
pub const ROLE_NAME_KEY: &str = "role_name";
/// Settings key holding the stage's deployment bucket.
pub const BUCKET_KEY: &str = "s3_bucket";

/// Problems with the deployment settings document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Stage does not exist: {0}")]
    UnknownStage(String),

    #[error("'{key}' has not been configured for stage '{stage}' or any stage it extends")]
    MissingKey { stage: String, key: String },

    #[error("'{key}' for stage '{stage}' must be a string")]
    NotAString { stage: String, key: String },

    #[error("Stage '{stage}' has an extends cycle: {}", chain.join(" -> "))]
    ExtendsCycle { stage: String, chain: Vec<String> },
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid policy template: {0}")]
    Template(String),

    #[error("Identity service call failed: {0}")]
    Identity(#[from] ServiceError),
}

/// Outcome of [`update_role`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoleUpdate {
    pub role_name: String,
    pub account_id: String,
    pub policy_name: String,
    /// Whether the role had to be created.
    pub created: bool,
    /// The rendered policy document that was attached.
    pub document: Value,
}

/// Trust policy letting the Lambda service assume a newly created role.
pub fn assume_role_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {
                    "Service": "lambda.amazonaws.com"
                },
                "Action": "sts:AssumeRole"
            }
        ]
    })
}

/// Create or update the execution role for `stage`.
///
/// Resolves `role_name` and `s3_bucket` from the settings (following
/// `extends`), renders the template with the caller's account id, creates
/// the role if it does not exist, then replaces the inline policy
/// `policy_name` with the rendered document.
#[tracing::instrument(skip(settings, template, identity))]
pub async fn update_role(
    stage: &str,
    settings: &DeploymentSettings,
    template: &PolicyTemplate,
    identity: &dyn IdentityService,
    policy_name: &str,
) -> Result<RoleUpdate, PolicyError> {
    let role_name = settings.string_value(stage, ROLE_NAME_KEY)?.to_string();
    let bucket = settings.string_value(stage, BUCKET_KEY)?.to_string();
    let account_id = identity.caller_account_id().await?;

    let document = template.render(&Placeholders {
        bucket: &bucket,
        role_name: &role_name,
        account_id: &account_id,
    });

    let created = if identity.role_exists(&role_name).await? {
        false
    } else {
        tracing::info!(role_name = %role_name, "Role does not exist, creating");
        identity
            .create_role(&role_name, &assume_role_policy().to_string())
            .await?;
        true
    };

    identity
        .put_role_policy(&role_name, policy_name, &serde_json::to_string(&document)?)
        .await?;

    tracing::info!(
        role_name = %role_name,
        policy_name,
        created,
        "IAM policy has been updated"
    );

    Ok(RoleUpdate {
        role_name,
        account_id,
        policy_name: policy_name.to_string(),
        created,
        document,
    })
}
