//! Snapshot run orchestration
//!
//! One run of one definition is a strict sequence: resolve columns, load
//! active rows, load source rows, classify, plan, then apply every statement
//! in a single transaction. Many definitions run concurrently, bounded by the
//! configured thread count, and one definition's failure never stops another.

use crate::clock::RunTimestamp;
use crate::columns::{self, ColumnSet};
use crate::error::{ErrorKind, SnapshotError, SnapshotResult};
use crate::lock::{CancelFlag, TargetLocks};
use crate::planner::{plan_merge, InvalidationReason};
use crate::sql;
use crate::strategy::{classify, ActiveRow, SourceRow, Strategy};
use serde::Serialize;
use sf_core::snapshot::{OnSchemaChange, SnapshotConfig, SnapshotDefaults, SnapshotDefinition};
use sf_core::Value;
use sf_db::{Database, DatabaseCore, DatabaseSchema};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;

/// Executor settings for one invocation
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Maximum definitions processed concurrently
    pub threads: usize,
    /// Plan and render without writing
    pub dry_run: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            dry_run: false,
        }
    }
}

/// Outcome of one definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run completed (or was planned, in dry-run mode)
    Success,
    /// Run failed; nothing was written
    Error,
    /// Run was cancelled before apply; nothing was written
    Skipped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error => write!(f, "error"),
            RunStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Timestamp of the run
    pub run_at: RunTimestamp,
    /// Keys seen for the first time
    pub new: usize,
    /// Keys with a new version
    pub changed: usize,
    /// Keys missing from the source
    pub deleted: usize,
    /// Keys left as they were
    pub unchanged: usize,
    /// Rows inserted
    pub rows_inserted: usize,
    /// Active rows closed
    pub rows_invalidated: usize,
    /// Columns added to the target
    pub columns_added: Vec<String>,
    /// Columns dropped from the target
    pub columns_dropped: Vec<String>,
    /// Statements applied, or that would be applied in dry-run mode
    pub statements: Vec<String>,
    /// Whether the statements were applied
    pub applied: bool,
}

/// Per-definition result record
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRunResult {
    /// Snapshot name
    pub snapshot: String,
    /// Qualified target table
    pub target: String,
    /// Outcome
    pub status: RunStatus,
    /// Run timestamp, when the run got that far
    pub run_at: Option<String>,
    /// Rows inserted
    pub rows_inserted: usize,
    /// Active rows closed
    pub rows_invalidated: usize,
    /// Keys seen for the first time
    pub new: usize,
    /// Keys with a new version
    pub changed: usize,
    /// Keys missing from the source
    pub deleted: usize,
    /// Keys left as they were
    pub unchanged: usize,
    /// Columns added to the target
    pub columns_added: Vec<String>,
    /// Columns dropped from the target
    pub columns_dropped: Vec<String>,
    /// Rendered statements
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<String>,
    /// Wall time
    pub duration_secs: f64,
    /// Failure detail
    pub error: Option<String>,
    /// Failure class
    pub error_kind: Option<ErrorKind>,
}

impl SnapshotRunResult {
    fn succeeded(definition: &SnapshotDefinition, report: RunReport, started: Instant) -> Self {
        Self {
            snapshot: definition.name.clone(),
            target: definition.qualified_name(),
            status: RunStatus::Success,
            run_at: Some(report.run_at.canonical()),
            rows_inserted: report.rows_inserted,
            rows_invalidated: report.rows_invalidated,
            new: report.new,
            changed: report.changed,
            deleted: report.deleted,
            unchanged: report.unchanged,
            columns_added: report.columns_added,
            columns_dropped: report.columns_dropped,
            statements: report.statements,
            duration_secs: started.elapsed().as_secs_f64(),
            error: None,
            error_kind: None,
        }
    }

    fn failed(snapshot: &str, target: String, err: &SnapshotError, started: Instant) -> Self {
        let kind = err.kind();
        Self {
            snapshot: snapshot.to_string(),
            target,
            status: if kind == ErrorKind::Cancelled {
                RunStatus::Skipped
            } else {
                RunStatus::Error
            },
            run_at: None,
            rows_inserted: 0,
            rows_invalidated: 0,
            new: 0,
            changed: 0,
            deleted: 0,
            unchanged: 0,
            columns_added: Vec::new(),
            columns_dropped: Vec::new(),
            statements: Vec::new(),
            duration_secs: started.elapsed().as_secs_f64(),
            error: Some(err.to_string()),
            error_kind: Some(kind),
        }
    }
}

/// Results of one invocation over many definitions
#[derive(Debug, Clone, Serialize)]
pub struct InvocationSummary {
    /// One result per definition, in input order
    pub results: Vec<SnapshotRunResult>,
    /// Definitions that succeeded
    pub success_count: usize,
    /// Definitions that failed
    pub failure_count: usize,
    /// Definitions skipped by cancellation
    pub skipped_count: usize,
}

impl InvocationSummary {
    fn from_results(results: Vec<SnapshotRunResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            success_count: count(RunStatus::Success),
            failure_count: count(RunStatus::Error),
            skipped_count: count(RunStatus::Skipped),
            results,
        }
    }

    /// Whether any definition failed
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}

/// Runs snapshot definitions against a database
#[derive(Clone)]
pub struct SnapshotExecutor {
    db: Arc<dyn Database>,
    options: ExecutorOptions,
    locks: TargetLocks,
    cancel: CancelFlag,
}

impl SnapshotExecutor {
    /// Create an executor with its own lock registry and cancel flag
    pub fn new(db: Arc<dyn Database>, options: ExecutorOptions) -> Self {
        Self {
            db,
            options,
            locks: TargetLocks::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// Share a lock registry with other executors on the same database
    pub fn with_locks(mut self, locks: TargetLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Use an externally controlled cancel flag
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The flag that cancels this executor's runs
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Resolve a definition against project defaults and run it.
    ///
    /// Invalid definitions fail here, before any database access.
    pub async fn run(&self, config: &SnapshotConfig, defaults: &SnapshotDefaults) -> SnapshotRunResult {
        let started = Instant::now();
        match config.resolve(defaults) {
            Ok(definition) => self.run_definition(&definition).await,
            Err(e) => {
                let err = SnapshotError::from(e);
                log::warn!("{}", err);
                let schema = config
                    .target_schema
                    .as_ref()
                    .or(defaults.target_schema.as_ref());
                let target = match schema {
                    Some(s) => format!("{}.{}", s, config.name),
                    None => config.name.clone(),
                };
                SnapshotRunResult::failed(&config.name, target, &err, started)
            }
        }
    }

    /// Run a resolved definition, capturing any failure in the result
    pub async fn run_definition(&self, definition: &SnapshotDefinition) -> SnapshotRunResult {
        let started = Instant::now();
        match self.execute(definition).await {
            Ok(report) => SnapshotRunResult::succeeded(definition, report, started),
            Err(e) => {
                log::warn!("{}", e);
                SnapshotRunResult::failed(&definition.name, definition.qualified_name(), &e, started)
            }
        }
    }

    /// Run a resolved definition with the run timestamp taken from the clock
    pub async fn execute(&self, definition: &SnapshotDefinition) -> SnapshotResult<RunReport> {
        self.execute_with(definition, RunTimestamp::now).await
    }

    /// Run a resolved definition, reading the run timestamp from `clock`
    /// once the target lock is held
    pub async fn execute_with<F>(
        &self,
        definition: &SnapshotDefinition,
        clock: F,
    ) -> SnapshotResult<RunReport>
    where
        F: FnOnce() -> RunTimestamp + Send,
    {
        self.ensure_not_cancelled(definition)?;

        let target = definition.qualified_name();
        let _guard = self.locks.acquire(&target).await;
        let run_at = clock();
        log::debug!("Snapshot '{}': run started at {}", definition.name, run_at);

        let source_schema = self.db.get_table_schema(&definition.source).await?;
        if source_schema.is_empty() {
            return Err(SnapshotError::SourceNotFound {
                snapshot: definition.name.clone(),
                relation: definition.source.clone(),
            });
        }
        let target_schema = self.db.get_table_schema(&target).await?;

        let (column_set, mut migration) =
            columns::resolve(definition, &source_schema, &target_schema)?;
        columns::check_policy(definition, &migration)?;
        if definition.on_schema_change == OnSchemaChange::SyncAllColumns
            && !migration.retained.is_empty()
        {
            self.ensure_no_history(definition, &migration.retained)
                .await?;
            migration.drop_removed();
        }

        let strategy = Strategy::bind(&definition.name, &definition.strategy, &column_set)?;

        let active = if migration.create_table {
            Vec::new()
        } else {
            self.load_active(definition, &column_set).await?
        };
        let source = self.load_source(definition, &column_set).await?;

        let classification = classify(&definition.name, &strategy, &source, &active)?;
        let plan = plan_merge(
            &classification,
            &strategy,
            definition.invalidate_hard_deletes,
            run_at,
        );
        let statements = sql::render_statements(definition, &column_set, &migration, &plan);

        self.ensure_not_cancelled(definition)?;

        let applied = !self.options.dry_run && !statements.is_empty();
        if applied {
            self.db.execute_atomic(&statements).await?;
        }

        let report = RunReport {
            run_at,
            new: classification.new_count(),
            changed: classification.changed_count(),
            deleted: classification.missing_count(),
            unchanged: classification.unchanged_count(),
            rows_inserted: plan.inserts.len(),
            rows_invalidated: plan.invalidations.len(),
            columns_added: migration.added.iter().map(|c| c.name.clone()).collect(),
            columns_dropped: migration.dropped.clone(),
            statements,
            applied,
        };

        log::info!(
            "Snapshot '{}': {} new, {} changed, {} deleted, {} unchanged; inserted {}, closed {} ({} superseded, {} hard-deleted){}",
            definition.name,
            report.new,
            report.changed,
            report.deleted,
            report.unchanged,
            report.rows_inserted,
            report.rows_invalidated,
            plan.invalidated(InvalidationReason::Superseded),
            plan.invalidated(InvalidationReason::HardDeleted),
            if self.options.dry_run { " [dry run]" } else { "" }
        );

        Ok(report)
    }

    /// Run many definitions concurrently, at most `threads` at a time
    pub async fn run_all(
        &self,
        configs: &[SnapshotConfig],
        defaults: &SnapshotDefaults,
    ) -> InvocationSummary {
        let semaphore = Arc::new(Semaphore::new(self.options.threads.max(1)));
        let results: Arc<Mutex<Vec<(usize, SnapshotRunResult)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(configs.len())));

        let mut handles = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let executor = self.clone();
            let config = config.clone();
            let defaults = defaults.clone();
            let semaphore = Arc::clone(&semaphore);
            let results = Arc::clone(&results);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let result = executor.run(&config, &defaults).await;
                results
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push((index, result));
            });
            handles.push((index, handle));
        }

        for (index, handle) in handles {
            if let Err(e) = handle.await {
                log::warn!("Snapshot task join error: {}", e);
                let config = &configs[index];
                let err = SnapshotError::Execution(sf_db::DbError::Internal(e.to_string()));
                results
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push((
                        index,
                        SnapshotRunResult::failed(
                            &config.name,
                            config.name.clone(),
                            &err,
                            Instant::now(),
                        ),
                    ));
            }
        }

        let mut collected = std::mem::take(&mut *results.lock().unwrap_or_else(|p| p.into_inner()));
        collected.sort_by_key(|(index, _)| *index);
        InvocationSummary::from_results(collected.into_iter().map(|(_, r)| r).collect())
    }

    fn ensure_not_cancelled(&self, definition: &SnapshotDefinition) -> SnapshotResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SnapshotError::Cancelled {
                snapshot: definition.name.clone(),
            });
        }
        Ok(())
    }

    /// Refuse to drop columns that still hold historical values
    async fn ensure_no_history(
        &self,
        definition: &SnapshotDefinition,
        removed: &[String],
    ) -> SnapshotResult<()> {
        let target = definition.qualified_name();
        for column in removed {
            let rows = self
                .db
                .query_count(&sql::select_non_null(&target, column))
                .await?;
            if rows > 0 {
                return Err(SnapshotError::SchemaDrift {
                    snapshot: definition.name.clone(),
                    message: format!(
                        "column '{}' is no longer in the source but {} historical row(s) hold values in it; \
                         sync_all_columns will not drop it",
                        column, rows
                    ),
                });
            }
        }
        Ok(())
    }

    async fn load_source(
        &self,
        definition: &SnapshotDefinition,
        columns: &ColumnSet,
    ) -> SnapshotResult<Vec<SourceRow>> {
        let relation = self
            .db
            .query_relation(&sql::select_source(definition, columns))
            .await?;
        log::debug!(
            "Snapshot '{}': loaded {} source row(s)",
            definition.name,
            relation.len()
        );

        relation
            .into_iter()
            .map(|row| {
                let (key, values) = split_key(row);
                let key = key.ok_or_else(|| SnapshotError::NullUniqueKey {
                    snapshot: definition.name.clone(),
                    relation: definition.source.clone(),
                })?;
                Ok(SourceRow { key, values })
            })
            .collect()
    }

    async fn load_active(
        &self,
        definition: &SnapshotDefinition,
        columns: &ColumnSet,
    ) -> SnapshotResult<Vec<ActiveRow>> {
        let relation = self
            .db
            .query_relation(&sql::select_active(definition, columns))
            .await?;
        log::debug!(
            "Snapshot '{}': loaded {} active row(s)",
            definition.name,
            relation.len()
        );

        relation
            .into_iter()
            .map(|row| {
                let (key, rest) = split_key(row);
                let key = key.ok_or_else(|| SnapshotError::NullUniqueKey {
                    snapshot: definition.name.clone(),
                    relation: definition.qualified_name(),
                })?;
                let mut rest = rest.into_iter();
                let scd_id = rest.next().flatten().ok_or_else(|| SnapshotError::MissingScdId {
                    snapshot: definition.name.clone(),
                    key: key.clone(),
                })?;
                let updated_at = rest.next().flatten();
                Ok(ActiveRow {
                    key,
                    scd_id,
                    updated_at,
                    check_values: rest.collect(),
                })
            })
            .collect()
    }
}

/// Split a loaded row into its leading key and the remaining values
fn split_key(mut row: Vec<Value>) -> (Value, Vec<Value>) {
    if row.is_empty() {
        return (None, row);
    }
    let key = row.remove(0);
    (key, row)
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
