//! Merge planning: turn a classification into rows to insert and versions to close

use crate::clock::RunTimestamp;
use crate::strategy::{ChangeDetector, Classification, RowChange, SourceRow, Strategy};
use sf_core::checksum::compute_checksum;
use sf_core::relation::Value;

/// Surrogate id of the version of `key` that becomes active at `valid_from`
pub fn scd_id(key: &str, valid_from: RunTimestamp) -> String {
    compute_checksum(&format!("{}|{}", key, valid_from.canonical()))
}

/// A new version to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRow {
    /// Unique key
    pub key: String,
    /// Surrogate id of the new version
    pub scd_id: String,
    /// Source values aligned with the run's column set
    pub values: Vec<Value>,
    /// Value for `dbt_updated_at`
    pub updated_at: Value,
}

/// Why an active version is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A new version of the key replaces it in the same run
    Superseded,
    /// The key disappeared from the source
    HardDeleted,
}

/// An active version to close
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Unique key
    pub key: String,
    /// Surrogate id of the version being closed
    pub scd_id: String,
    /// Why it is closed
    pub reason: InvalidationReason,
}

/// Rows one run writes to the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// Run timestamp used for every `valid_from` and `valid_to` in the plan
    pub run_at: RunTimestamp,
    /// New versions
    pub inserts: Vec<InsertRow>,
    /// Versions to close
    pub invalidations: Vec<Invalidation>,
}

impl MergePlan {
    /// Whether the plan writes nothing
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.invalidations.is_empty()
    }

    /// Number of versions closed for the given reason
    pub fn invalidated(&self, reason: InvalidationReason) -> usize {
        self.invalidations
            .iter()
            .filter(|i| i.reason == reason)
            .count()
    }
}

/// Build the merge plan for a classification.
///
/// New and changed keys get a new version starting at `run_at`. Changed keys
/// close their active version at the same instant. Missing keys are closed
/// only when `invalidate_hard_deletes` is set.
pub fn plan_merge(
    classification: &Classification<'_>,
    strategy: &Strategy,
    invalidate_hard_deletes: bool,
    run_at: RunTimestamp,
) -> MergePlan {
    let mut inserts = Vec::new();
    let mut invalidations = Vec::new();

    for change in &classification.changes {
        match change {
            RowChange::New(source) => {
                inserts.push(new_version(source, strategy, run_at));
            }
            RowChange::Changed { source, active } => {
                invalidations.push(Invalidation {
                    key: active.key.clone(),
                    scd_id: active.scd_id.clone(),
                    reason: InvalidationReason::Superseded,
                });
                inserts.push(new_version(source, strategy, run_at));
            }
            RowChange::Missing(active) if invalidate_hard_deletes => {
                invalidations.push(Invalidation {
                    key: active.key.clone(),
                    scd_id: active.scd_id.clone(),
                    reason: InvalidationReason::HardDeleted,
                });
            }
            RowChange::Unchanged { .. } | RowChange::Missing(_) => {}
        }
    }

    log::debug!(
        "Planned {} insert(s) and {} invalidation(s) at {}",
        inserts.len(),
        invalidations.len(),
        run_at
    );

    MergePlan {
        run_at,
        inserts,
        invalidations,
    }
}

fn new_version(source: &SourceRow, strategy: &Strategy, run_at: RunTimestamp) -> InsertRow {
    InsertRow {
        key: source.key.clone(),
        scd_id: scd_id(&source.key, run_at),
        values: source.values.clone(),
        updated_at: strategy.change_marker(source, run_at),
    }
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
