//! Scheduled DynamoDB backup rotation.
//!
//! A [`sweep::Sweeper`] snapshots every table matching a name pattern and
//! deletes snapshots older than the retention window. The [`policy`] module
//! holds the helper that keeps the deployment role's permissions in sync.

#[cfg(feature = "aws-sdk")]
pub mod aws;
pub mod config;
pub mod dynamo;
#[cfg(feature = "server")]
pub mod observability;
pub mod policy;
pub mod server;
pub mod sweep;
