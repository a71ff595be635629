//! Relation, column and cell types shared by the adapter and the snapshot engine
//!
//! Cells are carried in the store's canonical text rendering: loads cast every
//! column to `VARCHAR` and writes cast back to the declared column type. A
//! `None` value is SQL `NULL`.

use serde::{Deserialize, Serialize};

/// A single cell: the store's text rendering, or `None` for SQL `NULL`
pub type Value = Option<String>;

/// NULL-safe equality, the `IS NOT DISTINCT FROM` rule.
///
/// Two NULLs match; NULL never matches a non-NULL value.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// A named, typed column of a relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as reported by the store
    pub name: String,

    /// Declared SQL type (e.g. `INTEGER`, `TIMESTAMP`)
    pub data_type: String,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Case-insensitive name comparison, matching how the store resolves identifiers
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Find a column by case-insensitive name
pub fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<(usize, &'a Column)> {
    columns.iter().enumerate().find(|(_, c)| c.is_named(name))
}

/// A query result: ordered columns and the records read under them.
///
/// Every record has one value per column, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relation {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Relation {
    /// Build a relation from its columns and records
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Columns in result order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Records in result order
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the relation holds no records
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for Relation {
    type Item = Vec<Value>;
    type IntoIter = std::vec::IntoIter<Vec<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
