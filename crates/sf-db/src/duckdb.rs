//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{DatabaseCore, DatabaseSchema};
use async_trait::async_trait;
use duckdb::Connection;
use sf_core::relation::{Column, Relation, Value};
use sf_core::sql_utils::{escape_sql_string, split_qualified_name};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    /// Execute batch SQL synchronously
    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(DbError::from)
    }

    /// Query a text relation synchronously
    fn query_relation_sync(&self, sql: &str) -> DbResult<Relation> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let columns: Vec<Column> = rows
            .as_ref()
            .map(|s| {
                s.column_names()
                    .into_iter()
                    .map(|name| Column::new(name.to_string(), "VARCHAR"))
                    .collect()
            })
            .unwrap_or_default();

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values: Vec<Value> = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(row.get::<_, Option<String>>(i)?);
            }
            records.push(values);
        }
        Ok(Relation::new(columns, records))
    }

    /// Query count synchronously
    fn query_count_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM ({})", sql), [], |row| {
                row.get(0)
            })
            .map_err(DbError::from)?;
        Ok(count as usize)
    }

    /// Apply statements in one transaction; dropping an uncommitted
    /// transaction rolls it back
    fn execute_atomic_sync(&self, statements: &[String]) -> DbResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        for (i, sql) in statements.iter().enumerate() {
            log::debug!("Applying statement {}/{}", i + 1, statements.len());
            tx.execute_batch(sql).map_err(|e| {
                DbError::TransactionError(format!(
                    "statement {} of {} failed, rolled back: {}",
                    i + 1,
                    statements.len(),
                    e
                ))
            })?;
        }

        tx.commit()
            .map_err(|e| DbError::TransactionError(format!("commit failed: {}", e)))
    }

    /// Check if relation exists synchronously
    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.lock()?;
        let (schema, table) = split_qualified_name(name);

        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE lower(table_schema) = lower('{}') AND lower(table_name) = lower('{}')",
            escape_sql_string(schema),
            escape_sql_string(table)
        );

        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(DbError::from)?;

        Ok(count > 0)
    }

    /// Read column names and declared types synchronously
    fn get_table_schema_sync(&self, name: &str) -> DbResult<Vec<Column>> {
        let conn = self.lock()?;
        let (schema, table) = split_qualified_name(name);

        let sql = format!(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE lower(table_schema) = lower('{}') AND lower(table_name) = lower('{}') \
             ORDER BY ordinal_position",
            escape_sql_string(schema),
            escape_sql_string(table)
        );

        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(Column::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

#[async_trait]
impl DatabaseCore for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql)
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn query_relation(&self, sql: &str) -> DbResult<Relation> {
        self.query_relation_sync(sql)
    }

    async fn query_count(&self, sql: &str) -> DbResult<usize> {
        self.query_count_sync(sql)
    }

    async fn execute_atomic(&self, statements: &[String]) -> DbResult<()> {
        self.execute_atomic_sync(statements)
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[async_trait]
impl DatabaseSchema for DuckDbBackend {
    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    async fn get_table_schema(&self, name: &str) -> DbResult<Vec<Column>> {
        self.get_table_schema_sync(name)
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
