//! IAM and STS implementation.

use async_trait::async_trait;

use super::IdentityService;
use crate::{
    aws::{load_sdk_config, map_sdk_error},
    config::AwsConfig,
    dynamo::{ServiceError, ServiceResult},
};

/// Identity service backed by IAM (roles) and STS (caller identity).
pub struct AwsIdentity {
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsIdentity {
    /// IAM is a global service, so the endpoint override is not applied.
    pub async fn new(config: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(config).await;

        Self {
            iam: aws_sdk_iam::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl IdentityService for AwsIdentity {
    async fn caller_account_id(&self) -> ServiceResult<String> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| map_sdk_error("GetCallerIdentity", e))?;

        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Internal("GetCallerIdentity returned no account".into()))
    }

    async fn role_exists(&self, role_name: &str) -> ServiceResult<bool> {
        match self.iam.get_role().role_name(role_name).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = map_sdk_error("GetRole", err);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_role(&self, role_name: &str, assume_role_policy: &str) -> ServiceResult<()> {
        self.iam
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(assume_role_policy)
            .send()
            .await
            .map_err(|e| map_sdk_error("CreateRole", e))?;

        Ok(())
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> ServiceResult<()> {
        self.iam
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| map_sdk_error("PutRolePolicy", e))?;

        Ok(())
    }
}
