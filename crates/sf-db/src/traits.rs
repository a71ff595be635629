//! Database trait definitions
//!
//! The snapshot engine talks to storage only through these traits. Every
//! value crosses the boundary as canonical text (`Option<String>`), so the
//! engine never depends on a driver's native types.

use crate::error::DbResult;
use async_trait::async_trait;
use sf_core::relation::{Column, Relation};

/// Statement execution and row retrieval
#[async_trait]
pub trait DatabaseCore: Send + Sync {
    /// Execute SQL that modifies data, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute multiple SQL statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query whose every column is VARCHAR, returning its result as a
    /// text relation.
    ///
    /// Callers cast non-text columns themselves so the text form is the
    /// database's own canonical rendering.
    async fn query_relation(&self, sql: &str) -> DbResult<Relation>;

    /// Execute query returning row count
    async fn query_count(&self, sql: &str) -> DbResult<usize>;

    /// Apply statements in order inside one transaction.
    ///
    /// Either all statements take effect or none do.
    async fn execute_atomic(&self, statements: &[String]) -> DbResult<()>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// Catalog inspection
#[async_trait]
pub trait DatabaseSchema: Send + Sync {
    /// Check if a table or view exists
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Columns of a table in ordinal order; empty if the table does not exist
    async fn get_table_schema(&self, name: &str) -> DbResult<Vec<Column>>;
}

/// Full adapter surface used by the snapshot engine
pub trait Database: DatabaseCore + DatabaseSchema {}

impl<T: DatabaseCore + DatabaseSchema> Database for T {}
