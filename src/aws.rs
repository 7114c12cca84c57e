//! Shared AWS SDK plumbing.
//!
//! Uses the AWS SDK for Rust with the standard credential chain
//! (environment, shared profile, instance or task role).

use std::fmt::Debug;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::{config::AwsConfig, dynamo::ServiceError};

/// Load the shared SDK configuration, applying the configured region.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }

    loader.load().await
}

/// Map an SDK failure onto the service error taxonomy.
///
/// Classification goes by the service's error code, so the same mapping
/// serves DynamoDB, IAM and STS operations.
pub(crate) fn map_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    let code = err.code().map(str::to_string);
    let message = format!("{operation}: {}", DisplayErrorContext(&err));

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            return ServiceError::Unavailable(message);
        }
        _ => {}
    }

    classify_error_code(code.as_deref(), message)
}

fn classify_error_code(code: Option<&str>, message: String) -> ServiceError {
    match code {
        Some(
            "ResourceNotFoundException"
            | "TableNotFoundException"
            | "BackupNotFoundException"
            | "NoSuchEntity",
        ) => ServiceError::NotFound(message),
        Some(
            "AccessDeniedException"
            | "AccessDenied"
            | "UnrecognizedClientException"
            | "InvalidClientTokenId"
            | "ExpiredTokenException",
        ) => ServiceError::AccessDenied(message),
        Some(
            "ThrottlingException"
            | "Throttling"
            | "LimitExceededException"
            | "RequestLimitExceeded"
            | "ProvisionedThroughputExceededException",
        ) => ServiceError::Throttled(message),
        Some(
            "BackupInUseException"
            | "TableInUseException"
            | "EntityAlreadyExists"
            | "ConcurrentModification",
        ) => ServiceError::Conflict(message),
        Some("ServiceUnavailable" | "ServiceUnavailableException") => {
            ServiceError::Unavailable(message)
        }
        _ => ServiceError::Internal(message),
    }
}
