//! SQL rendering for snapshot loads, migrations, and merge application
//!
//! Loads cast every projected column to `VARCHAR` so values reach the engine
//! in the store's canonical text form. Source columns pass through the type
//! the target declares first, so a retyped source column renders the same
//! text as the stored history. Writes cast text literals back to the
//! declared column types.

use crate::clock::RunTimestamp;
use crate::columns::{ColumnSet, SchemaMigration};
use crate::planner::{InsertRow, MergePlan};
use sf_core::relation::Column;
use sf_core::snapshot::{SnapshotDefinition, SCD_ID, UPDATED_AT, VALID_TO};
use sf_core::sql_utils::{quote_ident, quote_literal, quote_qualified, typed_literal};

/// Rows per INSERT statement
pub const INSERT_CHUNK_SIZE: usize = 500;

/// Surrogate ids per invalidation UPDATE
pub const INVALIDATE_CHUNK_SIZE: usize = 1000;

fn as_text(expr: &str) -> String {
    format!("CAST({} AS VARCHAR)", expr)
}

fn declared(column: &Column) -> String {
    format!("CAST({} AS {})", quote_ident(&column.name), column.data_type)
}

/// Query reading the unique key followed by every column of the column set,
/// each rendered through its declared type
pub fn select_source(definition: &SnapshotDefinition, columns: &ColumnSet) -> String {
    let key = definition.unique_key.render(|name| match columns.index_of(name) {
        Some(i) => declared(&columns.columns[i]),
        None => quote_ident(name),
    });
    let mut projection = vec![as_text(&format!("({})", key))];
    projection.extend(columns.columns.iter().map(|c| as_text(&declared(c))));
    format!(
        "SELECT {} FROM {}",
        projection.join(", "),
        definition.quoted_source()
    )
}

/// Query reading the active rows: key, scd id, change marker, then the
/// stored check columns (NULL for check columns the target lacks)
pub fn select_active(definition: &SnapshotDefinition, columns: &ColumnSet) -> String {
    let mut projection = vec![
        as_text(&format!("({})", definition.unique_key.to_sql())),
        as_text(&quote_ident(SCD_ID)),
        as_text(&quote_ident(UPDATED_AT)),
    ];
    projection.extend(columns.check_columns.iter().map(|c| {
        if columns.is_pending(c) {
            "NULL".to_string()
        } else {
            as_text(&quote_ident(c))
        }
    }));
    format!(
        "SELECT {} FROM {} WHERE {} IS NULL",
        projection.join(", "),
        definition.quoted_target(),
        quote_ident(VALID_TO)
    )
}

/// Query selecting target rows that hold a value in `column`
pub fn select_non_null(target: &str, column: &str) -> String {
    format!(
        "SELECT 1 FROM {} WHERE {} IS NOT NULL",
        quote_qualified(target),
        quote_ident(column)
    )
}

/// `CREATE SCHEMA IF NOT EXISTS`
pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// `CREATE TABLE` with the given columns, all nullable
pub fn create_table(target: &str, columns: &[Column]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.data_type))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_qualified(target),
        defs.join(", ")
    )
}

/// `ALTER TABLE … ADD COLUMN`
pub fn add_column(target: &str, column: &Column) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_qualified(target),
        quote_ident(&column.name),
        column.data_type
    )
}

/// `ALTER TABLE … DROP COLUMN`
pub fn drop_column(target: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_qualified(target),
        quote_ident(column)
    )
}

/// Close the active versions with the given surrogate ids at `run_at`
pub fn invalidate(target: &str, scd_ids: &[&str], run_at: RunTimestamp) -> Vec<String> {
    scd_ids
        .chunks(INVALIDATE_CHUNK_SIZE)
        .map(|chunk| {
            let ids: Vec<String> = chunk.iter().map(|id| quote_literal(id)).collect();
            format!(
                "UPDATE {} SET {} = {} WHERE {} IS NULL AND {} IN ({})",
                quote_qualified(target),
                quote_ident(VALID_TO),
                run_at.to_sql(),
                quote_ident(VALID_TO),
                quote_ident(SCD_ID),
                ids.join(", ")
            )
        })
        .collect()
}

/// Insert new versions, valid from `run_at` and open-ended
pub fn insert(
    target: &str,
    columns: &ColumnSet,
    rows: &[InsertRow],
    run_at: RunTimestamp,
) -> Vec<String> {
    let column_list: Vec<String> = columns
        .target_schema()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect();
    let valid_from = run_at.to_sql();

    rows.chunks(INSERT_CHUNK_SIZE)
        .map(|chunk| {
            let tuples: Vec<String> = chunk
                .iter()
                .map(|row| {
                    let mut values: Vec<String> = row
                        .values
                        .iter()
                        .zip(&columns.columns)
                        .map(|(v, c)| typed_literal(v, &c.data_type))
                        .collect();
                    values.push(quote_literal(&row.scd_id));
                    values.push(typed_literal(&row.updated_at, &columns.updated_at_type));
                    values.push(valid_from.clone());
                    values.push("NULL".to_string());
                    format!("({})", values.join(", "))
                })
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                quote_qualified(target),
                column_list.join(", "),
                tuples.join(", ")
            )
        })
        .collect()
}

/// Every statement of one run, in apply order: DDL, invalidations, inserts
pub fn render_statements(
    definition: &SnapshotDefinition,
    columns: &ColumnSet,
    migration: &SchemaMigration,
    plan: &MergePlan,
) -> Vec<String> {
    let target = definition.qualified_name();
    let mut statements = Vec::new();

    if migration.create_table {
        if let Some(schema) = &definition.target_schema {
            statements.push(create_schema(schema));
        }
        statements.push(create_table(&target, &columns.target_schema()));
    } else {
        statements.extend(migration.added.iter().map(|c| add_column(&target, c)));
        statements.extend(migration.dropped.iter().map(|c| drop_column(&target, c)));
    }

    let ids: Vec<&str> = plan
        .invalidations
        .iter()
        .map(|i| i.scd_id.as_str())
        .collect();
    statements.extend(invalidate(&target, &ids, plan.run_at));
    statements.extend(insert(&target, columns, &plan.inserts, plan.run_at));

    statements
}

#[cfg(test)]
#[path = "sql_test.rs"]
mod tests;
