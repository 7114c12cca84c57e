//! Table catalog and snapshot service capabilities.
//!
//! The sweeper never talks to DynamoDB directly; it is handed a
//! [`TableCatalog`] and a [`SnapshotService`]. Supported backends:
//! - In-memory (for tests and local dry runs)
//! - AWS DynamoDB on-demand backups - requires `aws-sdk` feature

#[cfg(feature = "aws-sdk")]
mod aws;
mod memory;

use std::future::Future;

use async_trait::async_trait;
#[cfg(feature = "aws-sdk")]
pub use aws::AwsDynamo;
use chrono::{DateTime, Utc};
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
pub use memory::{MemoryDynamo, MutatingCall};
use thiserror::Error;

/// Errors returned by the external service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// An on-demand backup of a table, as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Opaque identifier (the backup ARN on AWS).
    pub id: String,
    pub table_name: String,
    pub name: String,
    /// Creation time, normalized to UTC.
    pub created_at: DateTime<Utc>,
}

/// Lazy stream of table names. Pages are fetched as the stream is polled.
pub type TableStream<'a> = BoxStream<'a, ServiceResult<String>>;

/// Lists the tables owned by the account.
pub trait TableCatalog: Send + Sync {
    /// Start a fresh listing from the first page.
    fn list_tables(&self) -> TableStream<'_>;
}

/// Creates, lists and deletes table snapshots.
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Trigger a snapshot of `table` named `name`. Returns the snapshot id.
    async fn create_snapshot(&self, table: &str, name: &str) -> ServiceResult<String>;

    /// List every snapshot of `table`, across all result pages.
    async fn list_snapshots(&self, table: &str) -> ServiceResult<Vec<Snapshot>>;

    async fn delete_snapshot(&self, id: &str) -> ServiceResult<()>;
}

/// One page of a table listing.
#[derive(Debug, Clone, Default)]
pub struct TablePage {
    pub names: Vec<String>,
    /// Last name of this page when more pages follow.
    pub last_evaluated: Option<String>,
}

enum Cursor {
    Start,
    After(String),
    Done,
}

/// Turn a page fetcher into a lazy [`TableStream`].
///
/// `fetch` receives the exclusive start name (`None` for the first page).
/// The stream ends after a page with no `last_evaluated` name.
pub fn paginate_tables<'a, F, Fut>(fetch: F) -> TableStream<'a>
where
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = ServiceResult<TablePage>> + Send + 'a,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let start = match cursor {
            Cursor::Done => return Ok::<_, ServiceError>(None),
            Cursor::Start => None,
            Cursor::After(name) => Some(name),
        };

        let page = fetch(start).await?;
        let next = page.last_evaluated.map_or(Cursor::Done, Cursor::After);

        Ok(Some((page.names, (next, fetch))))
    })
    .map_ok(|names| stream::iter(names.into_iter().map(Ok::<String, ServiceError>)))
    .try_flatten()
    .boxed()
}
