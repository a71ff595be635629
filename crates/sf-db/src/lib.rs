//! sf-db - Database abstraction layer for Snapflow
//!
//! This crate provides the `Database` adapter traits the snapshot engine is
//! written against, and their DuckDB implementation.

pub mod duckdb;
pub mod error;
pub mod traits;

pub use self::duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{Database, DatabaseCore, DatabaseSchema};
