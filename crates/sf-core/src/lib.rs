//! sf-core - Core library for Snapflow
//!
//! This crate provides project configuration, snapshot definition parsing and
//! validation, definition discovery, and the text-canonical relation types
//! shared by the database adapter and the snapshot engine.

pub mod checksum;
pub mod config;
pub mod error;
pub mod project;
pub mod relation;
pub mod snapshot;
pub mod sql_utils;
pub mod template;

pub use checksum::{checksum_values, compute_checksum};
pub use config::{Config, DatabaseConfig, DbType};
pub use error::{CoreError, CoreResult};
pub use project::Project;
pub use relation::{values_match, Column, Relation, Value};
pub use snapshot::{
    CheckCols, OnSchemaChange, Snapshot, SnapshotConfig, SnapshotDefaults, SnapshotDefinition,
    SnapshotStrategy, StrategyConfig, UniqueKey,
};
pub use template::TemplateRenderer;
