//! sf-snapshot - SCD Type 2 snapshot engine for Snapflow
//!
//! Captures the current state of a source relation into a history table.
//! Each run compares the source with the active versions in the target,
//! closes versions that changed or disappeared, and inserts new ones, all
//! within a single transaction.

pub mod clock;
pub mod columns;
pub mod error;
pub mod executor;
pub mod lock;
pub mod planner;
pub mod sql;
pub mod strategy;

pub use clock::RunTimestamp;
pub use columns::{ColumnSet, SchemaMigration, TypeChange};
pub use error::{ErrorKind, SnapshotError, SnapshotResult};
pub use executor::{
    ExecutorOptions, InvocationSummary, RunReport, RunStatus, SnapshotExecutor, SnapshotRunResult,
};
pub use lock::{CancelFlag, TargetLocks};
pub use planner::{plan_merge, Invalidation, InvalidationReason, MergePlan};
pub use strategy::{classify, ChangeDetector, Classification, RowChange, Strategy};
