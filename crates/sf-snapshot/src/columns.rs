//! Column set resolution and schema migration planning
//!
//! Resolution runs once per snapshot run, before any rows are read. The
//! resulting [`ColumnSet`] is the fixed column list used by every later step
//! of that run, so a source that changes shape mid-run cannot produce
//! inconsistent rows.

use crate::error::{SnapshotError, SnapshotResult};
use sf_core::relation::{find_column, Column};
use sf_core::snapshot::{
    is_meta_column, CheckCols, OnSchemaChange, SnapshotDefinition, StrategyConfig, SCD_ID,
    UPDATED_AT, VALID_FROM, VALID_TO,
};

const TIMESTAMP_TYPE: &str = "TIMESTAMP";

/// Columns participating in one snapshot run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    /// Source columns in source order, typed as the target declares them
    pub columns: Vec<Column>,
    /// Checked column names, in source casing; empty for the timestamp strategy
    pub check_columns: Vec<String>,
    /// Source column feeding `dbt_updated_at`, if the strategy has one
    pub updated_at: Option<String>,
    /// Declared type of `dbt_updated_at`
    pub updated_at_type: String,
    /// Check columns the target does not have yet; active rows read NULL for them
    pub pending_check_columns: Vec<String>,
}

impl ColumnSet {
    /// Position of a column in [`ColumnSet::columns`]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        find_column(&self.columns, name).map(|(i, _)| i)
    }

    /// The four metadata columns with their declared types
    pub fn meta_columns(&self) -> Vec<Column> {
        vec![
            Column::new(SCD_ID, "VARCHAR"),
            Column::new(UPDATED_AT, self.updated_at_type.clone()),
            Column::new(VALID_FROM, TIMESTAMP_TYPE),
            Column::new(VALID_TO, TIMESTAMP_TYPE),
        ]
    }

    /// Full target schema: source columns followed by metadata columns
    pub fn target_schema(&self) -> Vec<Column> {
        let mut schema = self.columns.clone();
        schema.extend(self.meta_columns());
        schema
    }

    /// Whether a check column exists in the target before migration
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending_check_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// A column whose declared type differs between source and target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeChange {
    /// Column name
    pub column: String,
    /// Type declared in the target
    pub target_type: String,
    /// Type declared in the source
    pub source_type: String,
}

/// Differences between the source schema and an existing target table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMigration {
    /// The target table does not exist yet
    pub create_table: bool,
    /// Source columns missing from the target
    pub added: Vec<Column>,
    /// Target columns no longer in the source, kept untouched
    pub retained: Vec<String>,
    /// Target columns no longer in the source, to be dropped
    pub dropped: Vec<String>,
    /// Columns whose types differ; reported, never rewritten
    pub type_changes: Vec<TypeChange>,
}

impl SchemaMigration {
    /// Whether the target needs no DDL
    pub fn is_empty(&self) -> bool {
        !self.create_table && self.added.is_empty() && self.dropped.is_empty()
    }

    /// Whether columns were added or removed relative to the target
    pub fn has_column_drift(&self) -> bool {
        !self.added.is_empty() || !self.retained.is_empty() || !self.dropped.is_empty()
    }

    /// Mark every removed column for dropping
    pub fn drop_removed(&mut self) {
        self.dropped.append(&mut self.retained);
    }
}

/// Resolve the run's column set and compare the target with the source.
///
/// `target` is empty when the target table does not exist. The migration's
/// removed columns start out as `retained`; dropping them under
/// `sync_all_columns` needs a history check the caller performs.
pub fn resolve(
    definition: &SnapshotDefinition,
    source: &[Column],
    target: &[Column],
) -> SnapshotResult<(ColumnSet, SchemaMigration)> {
    let snapshot = definition.name.as_str();

    if let Some(reserved) = source.iter().find(|c| is_meta_column(&c.name)) {
        return Err(SnapshotError::ReservedColumn {
            snapshot: snapshot.to_string(),
            column: reserved.name.clone(),
        });
    }

    let updated_at = match definition.strategy.updated_at() {
        Some(name) => Some(source_column(snapshot, source, "updated_at", name)?),
        None => None,
    };

    let check_columns = match &definition.strategy {
        StrategyConfig::Timestamp { .. } => Vec::new(),
        StrategyConfig::Check {
            check_cols: CheckCols::All,
            ..
        } => source
            .iter()
            .filter(|c| updated_at.map_or(true, |u| !u.is_named(&c.name)))
            .map(|c| c.name.clone())
            .collect(),
        StrategyConfig::Check {
            check_cols: CheckCols::Columns(cols),
            ..
        } => cols
            .iter()
            .map(|name| source_column(snapshot, source, "check_cols", name).map(|c| c.name.clone()))
            .collect::<SnapshotResult<Vec<_>>>()?,
    };

    let target_exists = !target.is_empty();
    if target_exists {
        for meta in [SCD_ID, UPDATED_AT, VALID_FROM, VALID_TO] {
            if find_column(target, meta).is_none() {
                return Err(SnapshotError::SchemaDrift {
                    snapshot: snapshot.to_string(),
                    message: format!(
                        "target '{}' exists but has no '{}' column",
                        definition.qualified_name(),
                        meta
                    ),
                });
            }
        }
    }

    let mut migration = SchemaMigration {
        create_table: !target_exists,
        ..Default::default()
    };

    let mut columns = Vec::with_capacity(source.len());
    for col in source {
        match find_column(target, &col.name) {
            Some((_, existing)) => {
                if !existing.data_type.eq_ignore_ascii_case(&col.data_type) {
                    migration.type_changes.push(TypeChange {
                        column: col.name.clone(),
                        target_type: existing.data_type.clone(),
                        source_type: col.data_type.clone(),
                    });
                }
                columns.push(Column::new(col.name.clone(), existing.data_type.clone()));
            }
            None => {
                if target_exists {
                    migration.added.push(col.clone());
                }
                columns.push(col.clone());
            }
        }
    }

    if target_exists {
        migration.retained = target
            .iter()
            .filter(|c| !is_meta_column(&c.name) && find_column(source, &c.name).is_none())
            .map(|c| c.name.clone())
            .collect();
    }

    let updated_at_type = match (find_column(target, UPDATED_AT), updated_at) {
        (Some((_, existing)), _) => existing.data_type.clone(),
        (None, Some(col)) => col.data_type.clone(),
        (None, None) => TIMESTAMP_TYPE.to_string(),
    };

    let pending_check_columns = if target_exists {
        check_columns
            .iter()
            .filter(|name| find_column(target, name).is_none())
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let column_set = ColumnSet {
        columns,
        check_columns,
        updated_at: updated_at.map(|c| c.name.clone()),
        updated_at_type,
        pending_check_columns,
    };

    log::debug!(
        "Snapshot '{}': {} column(s), check columns [{}], {} added, {} removed",
        snapshot,
        column_set.columns.len(),
        column_set.check_columns.join(", "),
        migration.added.len(),
        migration.retained.len()
    );

    Ok((column_set, migration))
}

/// Apply the schema-change policy that needs no I/O.
///
/// `fail` rejects any added or removed column. `sync_all_columns` is left to
/// the caller, which must confirm the removed columns hold no history before
/// calling [`SchemaMigration::drop_removed`].
pub fn check_policy(
    definition: &SnapshotDefinition,
    migration: &SchemaMigration,
) -> SnapshotResult<()> {
    for change in &migration.type_changes {
        log::warn!(
            "Snapshot '{}': column '{}' is {} in the source but {} in the target; keeping {}",
            definition.name,
            change.column,
            change.source_type,
            change.target_type,
            change.target_type
        );
    }

    match definition.on_schema_change {
        OnSchemaChange::Fail if migration.has_column_drift() => {
            let mut parts = Vec::new();
            if !migration.added.is_empty() {
                let names: Vec<&str> = migration.added.iter().map(|c| c.name.as_str()).collect();
                parts.push(format!("added columns [{}]", names.join(", ")));
            }
            if !migration.retained.is_empty() {
                parts.push(format!("removed columns [{}]", migration.retained.join(", ")));
            }
            Err(SnapshotError::SchemaDrift {
                snapshot: definition.name.clone(),
                message: format!("{} with on_schema_change: fail", parts.join(" and ")),
            })
        }
        OnSchemaChange::AppendNewColumns if !migration.retained.is_empty() => {
            log::warn!(
                "Snapshot '{}': columns [{}] are no longer in the source; keeping them in the target",
                definition.name,
                migration.retained.join(", ")
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

fn source_column<'a>(
    snapshot: &str,
    source: &'a [Column],
    role: &'static str,
    name: &str,
) -> SnapshotResult<&'a Column> {
    find_column(source, name)
        .map(|(_, c)| c)
        .ok_or_else(|| SnapshotError::UnknownColumn {
            snapshot: snapshot.to_string(),
            role,
            column: name.to_string(),
        })
}

#[cfg(test)]
#[path = "columns_test.rs"]
mod tests;
