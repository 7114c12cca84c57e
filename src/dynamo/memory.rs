//! In-memory table catalog and snapshot service.
//!
//! Mirrors the observable behavior of DynamoDB on-demand backups closely
//! enough to exercise the sweeper: table names are listed in sorted order
//! across pages, snapshots are stamped with the injected clock, and every
//! mutating call is recorded so dry runs can be verified.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};

use super::{
    ServiceError, ServiceResult, Snapshot, SnapshotService, TableCatalog, TablePage,
    TableStream, paginate_tables,
};
use crate::sweep::Clock;

/// DynamoDB's own `ListTables` page limit.
const DEFAULT_PAGE_SIZE: usize = 100;

/// A mutating call received by [`MemoryDynamo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutatingCall {
    CreateSnapshot { table: String, name: String },
    DeleteSnapshot { id: String },
}

/// In-memory DynamoDB stand-in (for testing and local dry runs).
pub struct MemoryDynamo {
    clock: Arc<dyn Clock>,
    tables: DashSet<String>,
    snapshots: DashMap<String, Snapshot>,
    create_failures: DashMap<String, ServiceError>,
    calls: Mutex<Vec<MutatingCall>>,
    page_size: usize,
    pages_fetched: AtomicUsize,
    next_id: AtomicU64,
}

impl MemoryDynamo {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: DashSet::new(),
            snapshots: DashMap::new(),
            create_failures: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            page_size: DEFAULT_PAGE_SIZE,
            pages_fetched: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Set how many table names are returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn add_table(&self, name: impl Into<String>) {
        self.tables.insert(name.into());
    }

    /// Seed an existing snapshot. Returns its id.
    pub fn add_snapshot(
        &self,
        table: &str,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> String {
        let id = self.allocate_id(table);
        self.snapshots.insert(
            id.clone(),
            Snapshot {
                id: id.clone(),
                table_name: table.to_string(),
                name: name.to_string(),
                created_at,
            },
        );
        id
    }

    /// Make every `create_snapshot` call for `table` fail with `error`.
    pub fn fail_create_for(&self, table: impl Into<String>, error: ServiceError) {
        self.create_failures.insert(table.into(), error);
    }

    /// Mutating calls received so far, in order.
    pub fn mutating_calls(&self) -> Vec<MutatingCall> {
        self.lock_calls().clone()
    }

    /// Number of listing pages served so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::SeqCst)
    }

    /// Snapshot ids currently held for `table`, oldest first.
    pub fn snapshot_ids(&self, table: &str) -> Vec<String> {
        let mut snapshots: Vec<Snapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.table_name == table)
            .map(|s| s.value().clone())
            .collect();
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snapshots.into_iter().map(|s| s.id).collect()
    }

    fn allocate_id(&self, table: &str) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("arn:aws:dynamodb:local:000000000000:table/{table}/backup/{seq:020}")
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<MutatingCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn table_page(&self, start: Option<String>) -> ServiceResult<TablePage> {
        self.pages_fetched.fetch_add(1, Ordering::SeqCst);

        let mut names: Vec<String> = self
            .tables
            .iter()
            .map(|t| t.key().clone())
            .filter(|name| start.as_ref().is_none_or(|s| name > s))
            .collect();
        names.sort();

        let has_more = names.len() > self.page_size;
        names.truncate(self.page_size);
        let last_evaluated = if has_more { names.last().cloned() } else { None };

        Ok(TablePage {
            names,
            last_evaluated,
        })
    }
}

impl TableCatalog for MemoryDynamo {
    fn list_tables(&self) -> TableStream<'_> {
        paginate_tables(move |start| {
            let page = self.table_page(start);
            async move { page }
        })
    }
}

#[async_trait]
impl SnapshotService for MemoryDynamo {
    async fn create_snapshot(&self, table: &str, name: &str) -> ServiceResult<String> {
        self.lock_calls().push(MutatingCall::CreateSnapshot {
            table: table.to_string(),
            name: name.to_string(),
        });

        if let Some(error) = self.create_failures.get(table) {
            return Err(error.value().clone());
        }

        if !self.tables.contains(table) {
            return Err(ServiceError::NotFound(format!("Table not found: {table}")));
        }

        let id = self.allocate_id(table);
        self.snapshots.insert(
            id.clone(),
            Snapshot {
                id: id.clone(),
                table_name: table.to_string(),
                name: name.to_string(),
                created_at: self.clock.now(),
            },
        );

        Ok(id)
    }

    async fn list_snapshots(&self, table: &str) -> ServiceResult<Vec<Snapshot>> {
        let mut snapshots: Vec<Snapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.table_name == table)
            .map(|s| s.value().clone())
            .collect();
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: &str) -> ServiceResult<()> {
        self.lock_calls().push(MutatingCall::DeleteSnapshot { id: id.to_string() });

        match self.snapshots.remove(id) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("Backup not found: {id}"))),
        }
    }
}
