//! Change detection strategies and per-key row classification
//!
//! Both strategies answer the same two questions through [`ChangeDetector`]:
//! did the row change since its active version, and what goes into
//! `dbt_updated_at` for a new version. Values are compared with NULL-safe
//! equality: two NULLs are equal, NULL and a value are not.

use crate::clock::RunTimestamp;
use crate::columns::ColumnSet;
use crate::error::{SnapshotError, SnapshotResult};
use sf_core::checksum::checksum_values;
use sf_core::relation::{values_match, Value};
use sf_core::snapshot::{SnapshotStrategy, StrategyConfig};
use std::collections::HashMap;

/// A source row with its materialized unique key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Unique key rendered as text
    pub key: String,
    /// Values aligned with [`ColumnSet::columns`]
    pub values: Vec<Value>,
}

/// The active version of a key in the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRow {
    /// Unique key rendered as text
    pub key: String,
    /// Surrogate id of this version
    pub scd_id: String,
    /// Stored change marker
    pub updated_at: Value,
    /// Stored values aligned with [`ColumnSet::check_columns`]
    pub check_values: Vec<Value>,
}

/// Change predicate contract shared by all strategies
pub trait ChangeDetector {
    /// Whether the source row differs from its active version
    fn has_changed(&self, source: &SourceRow, active: &ActiveRow) -> bool;

    /// Value stored in `dbt_updated_at` for a new version of `source`
    fn change_marker(&self, source: &SourceRow, run_at: RunTimestamp) -> Value;
}

/// Compares the source `updated_at` column with the stored marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampStrategy {
    updated_at: usize,
}

impl ChangeDetector for TimestampStrategy {
    fn has_changed(&self, source: &SourceRow, active: &ActiveRow) -> bool {
        !values_match(&source.values[self.updated_at], &active.updated_at)
    }

    fn change_marker(&self, source: &SourceRow, _run_at: RunTimestamp) -> Value {
        source.values[self.updated_at].clone()
    }
}

/// Compares a signature over the checked columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStrategy {
    check: Vec<usize>,
    updated_at: Option<usize>,
}

impl CheckStrategy {
    /// Signature of a source row's checked values
    pub fn source_signature(&self, source: &SourceRow) -> String {
        checksum_values(self.check.iter().map(|&i| &source.values[i]))
    }

    /// Signature of an active row's stored checked values
    pub fn active_signature(&self, active: &ActiveRow) -> String {
        checksum_values(&active.check_values)
    }
}

impl ChangeDetector for CheckStrategy {
    fn has_changed(&self, source: &SourceRow, active: &ActiveRow) -> bool {
        self.source_signature(source) != self.active_signature(active)
    }

    fn change_marker(&self, source: &SourceRow, run_at: RunTimestamp) -> Value {
        match self.updated_at {
            Some(i) => source.values[i].clone(),
            None => Some(run_at.canonical()),
        }
    }
}

/// A strategy bound to a resolved column set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Timestamp comparison
    Timestamp(TimestampStrategy),
    /// Checked-column signature comparison
    Check(CheckStrategy),
}

impl Strategy {
    /// Bind a validated strategy config to the run's column positions
    pub fn bind(
        snapshot: &str,
        config: &StrategyConfig,
        columns: &ColumnSet,
    ) -> SnapshotResult<Self> {
        let position = |role: &'static str, name: &str| {
            columns
                .index_of(name)
                .ok_or_else(|| SnapshotError::UnknownColumn {
                    snapshot: snapshot.to_string(),
                    role,
                    column: name.to_string(),
                })
        };
        let strategy = match config {
            StrategyConfig::Timestamp { updated_at } => Strategy::Timestamp(TimestampStrategy {
                updated_at: position("updated_at", updated_at)?,
            }),
            StrategyConfig::Check { .. } => Strategy::Check(CheckStrategy {
                check: columns
                    .check_columns
                    .iter()
                    .map(|c| position("check_cols", c))
                    .collect::<SnapshotResult<Vec<_>>>()?,
                updated_at: columns
                    .updated_at
                    .as_deref()
                    .map(|c| position("updated_at", c))
                    .transpose()?,
            }),
        };
        Ok(strategy)
    }

    /// The strategy kind
    pub fn kind(&self) -> SnapshotStrategy {
        match self {
            Strategy::Timestamp(_) => SnapshotStrategy::Timestamp,
            Strategy::Check(_) => SnapshotStrategy::Check,
        }
    }
}

impl ChangeDetector for Strategy {
    fn has_changed(&self, source: &SourceRow, active: &ActiveRow) -> bool {
        match self {
            Strategy::Timestamp(s) => s.has_changed(source, active),
            Strategy::Check(s) => s.has_changed(source, active),
        }
    }

    fn change_marker(&self, source: &SourceRow, run_at: RunTimestamp) -> Value {
        match self {
            Strategy::Timestamp(s) => s.change_marker(source, run_at),
            Strategy::Check(s) => s.change_marker(source, run_at),
        }
    }
}

/// Classification of one unique key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange<'a> {
    /// Key has no active version
    New(&'a SourceRow),
    /// Key's active version differs from the source
    Changed {
        source: &'a SourceRow,
        active: &'a ActiveRow,
    },
    /// Key's active version matches the source
    Unchanged {
        source: &'a SourceRow,
        active: &'a ActiveRow,
    },
    /// Key has an active version but no source row
    Missing(&'a ActiveRow),
}

/// Per-key classification of one run, in deterministic order:
/// source order first, then missing keys sorted
#[derive(Debug, Clone, Default)]
pub struct Classification<'a> {
    /// One entry per key
    pub changes: Vec<RowChange<'a>>,
}

impl Classification<'_> {
    /// Keys with no active version
    pub fn new_count(&self) -> usize {
        self.count(|c| matches!(c, RowChange::New(_)))
    }

    /// Keys whose active version changed
    pub fn changed_count(&self) -> usize {
        self.count(|c| matches!(c, RowChange::Changed { .. }))
    }

    /// Keys whose active version matches
    pub fn unchanged_count(&self) -> usize {
        self.count(|c| matches!(c, RowChange::Unchanged { .. }))
    }

    /// Keys missing from the source
    pub fn missing_count(&self) -> usize {
        self.count(|c| matches!(c, RowChange::Missing(_)))
    }

    fn count(&self, pred: impl Fn(&RowChange<'_>) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }
}

/// Classify every key of the source and the active target rows.
///
/// Fails if a key occurs more than once in the source or has more than one
/// active row.
pub fn classify<'a>(
    snapshot: &str,
    strategy: &Strategy,
    source: &'a [SourceRow],
    active: &'a [ActiveRow],
) -> SnapshotResult<Classification<'a>> {
    let source_index = index_unique(source, |r| &r.key).map_err(|(key, occurrences)| {
        SnapshotError::DuplicateKey {
            snapshot: snapshot.to_string(),
            key,
            occurrences,
        }
    })?;
    let active_index = index_unique(active, |r| &r.key).map_err(|(key, count)| {
        SnapshotError::ActiveRowConflict {
            snapshot: snapshot.to_string(),
            key,
            count,
        }
    })?;

    let mut changes = Vec::with_capacity(source.len() + active.len());
    for row in source {
        let change = match active_index.get(row.key.as_str()) {
            None => RowChange::New(row),
            Some(&i) if strategy.has_changed(row, &active[i]) => RowChange::Changed {
                source: row,
                active: &active[i],
            },
            Some(&i) => RowChange::Unchanged {
                source: row,
                active: &active[i],
            },
        };
        changes.push(change);
    }

    let mut missing: Vec<&ActiveRow> = active
        .iter()
        .filter(|a| !source_index.contains_key(a.key.as_str()))
        .collect();
    missing.sort_by(|a, b| a.key.cmp(&b.key));
    changes.extend(missing.into_iter().map(RowChange::Missing));

    Ok(Classification { changes })
}

/// Index rows by key; on a repeated key, report the first repeated key in
/// row order with its total count
fn index_unique<'a, T>(
    rows: &'a [T],
    key: impl Fn(&'a T) -> &'a String,
) -> Result<HashMap<&'a str, usize>, (String, usize)> {
    let mut index: HashMap<&'a str, usize> = HashMap::with_capacity(rows.len());
    let mut first_duplicate: Option<&'a str> = None;
    for (i, row) in rows.iter().enumerate() {
        let k = key(row).as_str();
        if index.insert(k, i).is_some() && first_duplicate.is_none() {
            first_duplicate = Some(k);
        }
    }
    match first_duplicate {
        Some(dup) => {
            let occurrences = rows.iter().filter(|r| key(*r) == dup).count();
            Err((dup.to_string(), occurrences))
        }
        None => Ok(index),
    }
}

#[cfg(test)]
#[path = "strategy_test.rs"]
mod tests;
