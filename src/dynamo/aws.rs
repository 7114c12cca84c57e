//! DynamoDB on-demand backups implementation.

use async_trait::async_trait;
use aws_sdk_dynamodb::{Client, types::BackupTypeFilter};
use chrono::{DateTime, Utc};

use super::{
    ServiceError, ServiceResult, Snapshot, SnapshotService, TableCatalog, TablePage,
    TableStream, paginate_tables,
};
use crate::{
    aws::{load_sdk_config, map_sdk_error},
    config::AwsConfig,
};

/// DynamoDB-backed table catalog and snapshot service.
pub struct AwsDynamo {
    client: Client,
}

impl AwsDynamo {
    /// Create a DynamoDB client from the configured region and endpoint.
    pub async fn new(config: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(config).await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        tracing::debug!(
            region = ?sdk_config.region(),
            endpoint_url = ?config.endpoint_url,
            "Initialized DynamoDB client"
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    async fn table_page(&self, start: Option<String>) -> ServiceResult<TablePage> {
        let output = self
            .client
            .list_tables()
            .set_exclusive_start_table_name(start)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListTables", e))?;

        Ok(TablePage {
            names: output.table_names().to_vec(),
            last_evaluated: output.last_evaluated_table_name().map(str::to_string),
        })
    }
}

impl TableCatalog for AwsDynamo {
    fn list_tables(&self) -> TableStream<'_> {
        paginate_tables(move |start| self.table_page(start))
    }
}

#[async_trait]
impl SnapshotService for AwsDynamo {
    async fn create_snapshot(&self, table: &str, name: &str) -> ServiceResult<String> {
        let output = self
            .client
            .create_backup()
            .table_name(table)
            .backup_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error("CreateBackup", e))?;

        output
            .backup_details()
            .map(|details| details.backup_arn().to_string())
            .ok_or_else(|| {
                ServiceError::Internal(format!(
                    "CreateBackup for table '{table}' returned no backup details"
                ))
            })
    }

    async fn list_snapshots(&self, table: &str) -> ServiceResult<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let output = self
                .client
                .list_backups()
                .table_name(table)
                .backup_type(BackupTypeFilter::User)
                .set_exclusive_start_backup_arn(start.take())
                .send()
                .await
                .map_err(|e| map_sdk_error("ListBackups", e))?;

            for summary in output.backup_summaries() {
                let (Some(id), Some(created)) =
                    (summary.backup_arn(), summary.backup_creation_date_time())
                else {
                    tracing::warn!(table, "Skipping backup summary without ARN or creation time");
                    continue;
                };

                let Some(created_at) =
                    DateTime::<Utc>::from_timestamp(created.secs(), created.subsec_nanos())
                else {
                    tracing::warn!(table, backup_arn = id, "Skipping backup with out-of-range creation time");
                    continue;
                };

                snapshots.push(Snapshot {
                    id: id.to_string(),
                    table_name: summary.table_name().unwrap_or(table).to_string(),
                    name: summary.backup_name().unwrap_or_default().to_string(),
                    created_at,
                });
            }

            match output.last_evaluated_backup_arn() {
                Some(arn) => start = Some(arn.to_string()),
                None => break,
            }
        }

        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: &str) -> ServiceResult<()> {
        self.client
            .delete_backup()
            .backup_arn(id)
            .send()
            .await
            .map_err(|e| map_sdk_error("DeleteBackup", e))?;

        Ok(())
    }
}
