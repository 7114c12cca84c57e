//! Backup sweeper for rotating DynamoDB on-demand backups.
//!
//! One sweep makes a single sequential pass over every table in the account:
//! 1. Skips tables whose name does not match the table pattern
//! 2. Triggers a snapshot of each matching table
//! 3. Lists the table's snapshots and deletes those older than the retention window
//!
//! Every call is awaited before the next one is issued, so at most one
//! request is in flight against the service at any time. Dry-run mode makes
//! the same decisions and logs them, but issues no create or delete calls.

mod clock;
pub mod naming;
mod retention;

use std::sync::Arc;

use chrono::{DateTime, Utc};
pub use clock::{Clock, FixedClock, SystemClock};
use futures::TryStreamExt;
use regex::Regex;
pub use retention::RetentionWindow;
use thiserror::Error;

use crate::{
    config::{BackupConfig, ConfigError, compile_table_pattern},
    dynamo::{ServiceError, SnapshotService, TableCatalog},
};

/// Errors that abort a sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Backup service call failed: {0}")]
    Service(#[from] ServiceError),
}

/// Parameters of a single sweep.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Tables are included when this matches anywhere in the name.
    pub table_pattern: Regex,
    pub retention: RetentionWindow,
    pub dry_run: bool,
}

impl SweepOptions {
    pub fn new(table_pattern: &str, retention: RetentionWindow, dry_run: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            table_pattern: compile_table_pattern(table_pattern)?,
            retention,
            dry_run,
        })
    }

    pub fn from_config(config: &BackupConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            table_pattern: config.compiled_pattern()?,
            retention: config.retention(),
            dry_run: config.dry_run,
        })
    }
}

/// Results from a single sweep.
///
/// Snapshot counters record decisions: in a dry run they count what would
/// have been created or deleted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Number of tables backed up.
    pub tables_processed: u64,
    /// Number of tables skipped by the table pattern.
    pub tables_skipped: u64,
    /// Number of matching tables that disappeared before their snapshot was taken.
    pub tables_vanished: u64,
    /// Number of snapshots created.
    pub snapshots_created: u64,
    /// Number of expired snapshots deleted.
    pub snapshots_deleted: u64,
    pub dry_run: bool,
}

/// Runs backup-then-prune sweeps against the injected services.
pub struct Sweeper {
    catalog: Arc<dyn TableCatalog>,
    snapshots: Arc<dyn SnapshotService>,
    clock: Arc<dyn Clock>,
}

impl Sweeper {
    pub fn new(
        catalog: Arc<dyn TableCatalog>,
        snapshots: Arc<dyn SnapshotService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            snapshots,
            clock,
        }
    }

    /// Run one sweep over all tables.
    ///
    /// Any service failure other than a table vanishing mid-sweep aborts the
    /// run; tables handled before the failure stay handled.
    #[tracing::instrument(
        name = "sweep",
        skip_all,
        fields(
            table_pattern = %options.table_pattern,
            retention_days = options.retention.as_days(),
            dry_run = options.dry_run,
        )
    )]
    pub async fn sweep(&self, options: &SweepOptions) -> Result<SweepReport, SweepError> {
        let dry_run_msg = if options.dry_run { " (DRY RUN)" } else { "" };
        let cutoff = options.retention.cutoff(self.clock.now());

        tracing::info!(cutoff = %cutoff, "Starting backup sweep{}", dry_run_msg);

        let mut report = SweepReport {
            dry_run: options.dry_run,
            ..Default::default()
        };

        let mut tables = self.catalog.list_tables();
        while let Some(table) = tables.try_next().await? {
            if !options.table_pattern.is_match(&table) {
                tracing::info!(
                    table = %table,
                    table_pattern = %options.table_pattern,
                    "Skipping table because it does not match the table pattern"
                );
                report.tables_skipped += 1;
                continue;
            }

            if !self.backup_table(&table, options, &mut report).await? {
                continue;
            }

            self.prune_table(&table, cutoff, options, &mut report).await?;
        }

        if options.dry_run {
            tracing::info!(
                tables_processed = report.tables_processed,
                tables_skipped = report.tables_skipped,
                tables_vanished = report.tables_vanished,
                snapshots_deleted = report.snapshots_deleted,
                "Would have run {} backups",
                report.tables_processed
            );
        } else {
            tracing::info!(
                tables_processed = report.tables_processed,
                tables_skipped = report.tables_skipped,
                tables_vanished = report.tables_vanished,
                snapshots_deleted = report.snapshots_deleted,
                "Ran {} backups",
                report.tables_processed
            );
        }

        Ok(report)
    }

    /// Trigger a snapshot of `table`. Returns `false` if the table no longer exists.
    async fn backup_table(
        &self,
        table: &str,
        options: &SweepOptions,
        report: &mut SweepReport,
    ) -> Result<bool, SweepError> {
        let snapshot_name = naming::snapshot_name(table, self.clock.now());

        if options.dry_run {
            tracing::debug!(table, snapshot_name = %snapshot_name, "DRY RUN: Would create backup");
        } else {
            tracing::debug!(table, snapshot_name = %snapshot_name, "Creating backup");
            match self.snapshots.create_snapshot(table, &snapshot_name).await {
                Ok(snapshot_id) => {
                    tracing::debug!(table, snapshot_id = %snapshot_id, "Backup requested");
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        table,
                        error = %e,
                        "Table disappeared before it could be backed up, skipping"
                    );
                    report.tables_vanished += 1;
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }

        report.tables_processed += 1;
        report.snapshots_created += 1;

        Ok(true)
    }

    /// Delete every snapshot of `table` created strictly before `cutoff`.
    async fn prune_table(
        &self,
        table: &str,
        cutoff: DateTime<Utc>,
        options: &SweepOptions,
        report: &mut SweepReport,
    ) -> Result<(), SweepError> {
        let snapshots = self.snapshots.list_snapshots(table).await?;

        for snapshot in snapshots {
            if !RetentionWindow::is_expired(snapshot.created_at, cutoff) {
                continue;
            }

            if options.dry_run {
                tracing::debug!(
                    table,
                    snapshot_id = %snapshot.id,
                    created_at = %snapshot.created_at,
                    cutoff = %cutoff,
                    "DRY RUN: Would remove old snapshot"
                );
            } else {
                tracing::debug!(
                    table,
                    snapshot_id = %snapshot.id,
                    created_at = %snapshot.created_at,
                    cutoff = %cutoff,
                    "Removing old snapshot"
                );
                self.snapshots.delete_snapshot(&snapshot.id).await?;
            }

            report.snapshots_deleted += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;
    use crate::dynamo::{MemoryDynamo, MutatingCall};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    fn setup(tables: &[&str]) -> (Arc<FixedClock>, Arc<MemoryDynamo>, Sweeper) {
        let clock = Arc::new(FixedClock::new(start()));
        let dynamo = Arc::new(MemoryDynamo::new(clock.clone()));
        for table in tables {
            dynamo.add_table(*table);
        }
        let sweeper = Sweeper::new(dynamo.clone(), dynamo.clone(), clock.clone());
        (clock, dynamo, sweeper)
    }

    fn options(pattern: &str, days: u32, dry_run: bool) -> SweepOptions {
        SweepOptions::new(pattern, RetentionWindow::days(days), dry_run).unwrap()
    }

    fn created_tables(dynamo: &MemoryDynamo) -> Vec<String> {
        dynamo
            .mutating_calls()
            .into_iter()
            .filter_map(|call| match call {
                MutatingCall::CreateSnapshot { table, .. } => Some(table),
                MutatingCall::DeleteSnapshot { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_filter_scenario() {
        let (_, dynamo, sweeper) = setup(&["orders", "orders-archive", "sessions"]);

        let report = sweeper.sweep(&options("orders", 7, false)).await.unwrap();

        assert_eq!(report.tables_processed, 2);
        assert_eq!(report.tables_skipped, 1);
        assert_eq!(created_tables(&dynamo), vec!["orders", "orders-archive"]);
        assert!(dynamo.snapshot_ids("sessions").is_empty());
    }

    #[rstest]
    #[case::exact("orders", "orders", true)]
    #[case::prefix("orders", "orders-archive", true)]
    #[case::infix("orders", "legacy-orders-2019", true)]
    #[case::suffix("archive", "orders-archive", true)]
    #[case::partial_name_only("orders", "ord", false)]
    #[case::anchored_excludes("^orders$", "orders-archive", false)]
    #[case::anchored_start("^prod-", "staging-prod-users", false)]
    #[case::match_all(".*", "anything", true)]
    #[tokio::test]
    async fn test_unanchored_filter(
        #[case] pattern: &str,
        #[case] table: &str,
        #[case] processed: bool,
    ) {
        let (_, dynamo, sweeper) = setup(&[table]);

        let report = sweeper.sweep(&options(pattern, 7, false)).await.unwrap();

        assert_eq!(report.tables_processed, u64::from(processed));
        assert_eq!(report.tables_skipped, u64::from(!processed));
        assert_eq!(dynamo.snapshot_ids(table).len(), usize::from(processed));
    }

    #[tokio::test]
    async fn test_retention_scenario() {
        let (_, dynamo, sweeper) = setup(&["orders"]);
        let old = dynamo.add_snapshot("orders", "orders-old", start() - Duration::days(10));
        let recent = dynamo.add_snapshot("orders", "orders-recent", start() - Duration::days(3));

        let report = sweeper.sweep(&options(".*", 7, false)).await.unwrap();

        assert_eq!(report.snapshots_deleted, 1);
        let remaining = dynamo.snapshot_ids("orders");
        assert!(!remaining.contains(&old));
        assert!(remaining.contains(&recent));
        // recent + the one created by this sweep
        assert_eq!(remaining.len(), 2);
        assert!(
            dynamo
                .mutating_calls()
                .contains(&MutatingCall::DeleteSnapshot { id: old })
        );
    }

    #[tokio::test]
    async fn test_snapshot_exactly_at_cutoff_is_kept() {
        let (_, dynamo, sweeper) = setup(&["orders"]);
        let at_cutoff = dynamo.add_snapshot("orders", "at-cutoff", start() - Duration::days(7));
        let just_past = dynamo.add_snapshot(
            "orders",
            "just-past",
            start() - Duration::days(7) - Duration::microseconds(1),
        );

        let report = sweeper.sweep(&options(".*", 7, false)).await.unwrap();

        assert_eq!(report.snapshots_deleted, 1);
        let remaining = dynamo.snapshot_ids("orders");
        assert!(remaining.contains(&at_cutoff));
        assert!(!remaining.contains(&just_past));
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_run_without_mutations() {
        let seed = |dynamo: &MemoryDynamo| {
            dynamo.add_snapshot("orders", "o-10d", start() - Duration::days(10));
            dynamo.add_snapshot("orders", "o-3d", start() - Duration::days(3));
            dynamo.add_snapshot("orders-archive", "a-30d", start() - Duration::days(30));
            dynamo.add_snapshot("sessions", "s-30d", start() - Duration::days(30));
        };
        let tables = ["orders", "orders-archive", "sessions"];

        let (_, dry_dynamo, dry_sweeper) = setup(&tables);
        seed(&dry_dynamo);
        let dry = dry_sweeper.sweep(&options("orders", 7, true)).await.unwrap();

        let (_, real_dynamo, real_sweeper) = setup(&tables);
        seed(&real_dynamo);
        let real = real_sweeper.sweep(&options("orders", 7, false)).await.unwrap();

        assert!(dry.dry_run);
        assert!(!real.dry_run);
        assert_eq!(dry.tables_processed, 2);
        assert_eq!(
            SweepReport {
                dry_run: false,
                ..dry.clone()
            },
            real
        );

        assert!(dry_dynamo.mutating_calls().is_empty());
        assert_eq!(dry_dynamo.snapshot_ids("orders").len(), 2);
        assert_eq!(dry_dynamo.snapshot_ids("orders-archive").len(), 1);
        assert!(!real_dynamo.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_immediate_sweep_keeps_new_snapshots() {
        let (_, dynamo, sweeper) = setup(&["orders", "sessions"]);
        let opts = options(".*", 7, false);

        let first = sweeper.sweep(&opts).await.unwrap();
        let after_first: Vec<String> = ["orders", "sessions"]
            .iter()
            .flat_map(|t| dynamo.snapshot_ids(t))
            .collect();

        let second = sweeper.sweep(&opts).await.unwrap();

        assert_eq!(first.snapshots_deleted, 0);
        assert_eq!(second.snapshots_deleted, 0);
        for id in after_first {
            assert!(
                dynamo.snapshot_ids("orders").contains(&id)
                    || dynamo.snapshot_ids("sessions").contains(&id),
                "snapshot {id} from the first sweep was deleted"
            );
        }
    }

    #[tokio::test]
    async fn test_zero_retention_keeps_snapshot_taken_now() {
        let (_, dynamo, sweeper) = setup(&["orders"]);
        let older = dynamo.add_snapshot("orders", "older", start() - Duration::seconds(1));

        let report = sweeper.sweep(&options(".*", 0, false)).await.unwrap();

        assert_eq!(report.snapshots_deleted, 1);
        let remaining = dynamo.snapshot_ids("orders");
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains(&older));
    }

    #[tokio::test]
    async fn test_snapshots_expire_as_time_passes() {
        let (clock, dynamo, sweeper) = setup(&["orders"]);
        let opts = options(".*", 7, false);

        sweeper.sweep(&opts).await.unwrap();
        let first_ids = dynamo.snapshot_ids("orders");

        clock.advance(Duration::days(8));
        let report = sweeper.sweep(&opts).await.unwrap();

        assert_eq!(report.snapshots_deleted, 1);
        let remaining = dynamo.snapshot_ids("orders");
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains(&first_ids[0]));
    }

    #[tokio::test]
    async fn test_vanished_table_is_skipped() {
        // The listing still reports a table the backup service no longer has.
        let clock = Arc::new(FixedClock::new(start()));
        let listing = Arc::new(MemoryDynamo::new(clock.clone()));
        let dynamo = Arc::new(MemoryDynamo::new(clock.clone()));
        for table in ["orders", "orders-archive", "orders-ledger"] {
            listing.add_table(table);
        }
        dynamo.add_table("orders");
        dynamo.add_table("orders-ledger");
        let sweeper = Sweeper::new(listing, dynamo.clone(), clock);

        let report = sweeper.sweep(&options("orders", 7, false)).await.unwrap();

        assert_eq!(report.tables_processed, 2);
        assert_eq!(report.tables_vanished, 1);
        assert_eq!(dynamo.snapshot_ids("orders").len(), 1);
        assert_eq!(dynamo.snapshot_ids("orders-ledger").len(), 1);
        assert!(dynamo.snapshot_ids("orders-archive").is_empty());
        assert!(dynamo.mutating_calls().contains(&MutatingCall::CreateSnapshot {
            table: "orders-archive".into(),
            name: "orders-archive-2024-06-15-10-30-00-000000".into(),
        }));
    }

    #[rstest]
    #[case::dry_run(true)]
    #[case::real(false)]
    #[tokio::test]
    async fn test_window_beyond_date_range_deletes_nothing(#[case] dry_run: bool) {
        let (_, dynamo, sweeper) = setup(&["orders"]);
        let ancient = dynamo.add_snapshot("orders", "ancient", start() - Duration::days(36_500));
        let retention: RetentionWindow = "100000000".parse().unwrap();
        let opts = SweepOptions::new(".*", retention, dry_run).unwrap();

        let report = sweeper.sweep(&opts).await.unwrap();

        assert_eq!(report.tables_processed, 1);
        assert_eq!(report.snapshots_deleted, 0);
        assert!(dynamo.snapshot_ids("orders").contains(&ancient));
    }

    #[tokio::test]
    async fn test_service_failure_aborts_sweep() {
        let (_, dynamo, sweeper) = setup(&["a-orders", "b-orders"]);
        dynamo.fail_create_for("a-orders", ServiceError::AccessDenied("dynamodb:CreateBackup".into()));

        let err = sweeper.sweep(&options(".*", 7, false)).await.unwrap_err();

        assert!(matches!(
            err,
            SweepError::Service(ServiceError::AccessDenied(_))
        ));
        assert_eq!(created_tables(&dynamo), vec!["a-orders"]);
        assert!(dynamo.snapshot_ids("b-orders").is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reads_every_page() {
        let clock = Arc::new(FixedClock::new(start()));
        let dynamo = Arc::new(MemoryDynamo::new(clock.clone()).with_page_size(2));
        for table in ["t1", "t2", "t3", "t4", "t5"] {
            dynamo.add_table(table);
        }
        let sweeper = Sweeper::new(dynamo.clone(), dynamo.clone(), clock);

        let report = sweeper.sweep(&options(".*", 7, false)).await.unwrap();

        assert_eq!(report.tables_processed, 5);
        assert_eq!(dynamo.pages_fetched(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_names_are_sanitized() {
        let (_, dynamo, sweeper) = setup(&["app.orders"]);

        sweeper.sweep(&options(".*", 7, false)).await.unwrap();

        let names: Vec<String> = dynamo
            .mutating_calls()
            .into_iter()
            .filter_map(|call| match call {
                MutatingCall::CreateSnapshot { name, .. } => Some(name),
                MutatingCall::DeleteSnapshot { .. } => None,
            })
            .collect();
        assert_eq!(names, vec!["app-orders-2024-06-15-10-30-00-000000"]);
    }

    #[test]
    fn test_options_from_config() {
        let config = BackupConfig {
            retention_days: 14,
            table_pattern: "^prod-".into(),
            dry_run: true,
        };
        let opts = SweepOptions::from_config(&config).unwrap();
        assert_eq!(opts.retention, RetentionWindow::days(14));
        assert!(opts.dry_run);
        assert!(opts.table_pattern.is_match("prod-orders"));
    }

    #[test]
    fn test_options_invalid_pattern() {
        let err = SweepOptions::new("(", RetentionWindow::default(), false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
