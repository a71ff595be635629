//! Error types for sf-snapshot

use serde::Serialize;
use sf_core::CoreError;
use sf_db::DbError;
use thiserror::Error;

/// Coarse error class reported per snapshot definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid definition; raised before any I/O
    Config,
    /// Unique key precondition violated
    DuplicateKey,
    /// Target schema cannot follow the source without losing history
    SchemaDrift,
    /// Target store failure during load or apply
    Execution,
    /// Run cancelled before apply
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::DuplicateKey => write!(f, "duplicate_key"),
            ErrorKind::SchemaDrift => write!(f, "schema_drift"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Snapshot run errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// S001: Definition failed validation
    #[error("[S001] {0}")]
    Config(#[from] CoreError),

    /// S002: A configured column does not exist in the source
    #[error("[S002] Snapshot '{snapshot}': {role} column '{column}' not found in source")]
    UnknownColumn {
        snapshot: String,
        role: &'static str,
        column: String,
    },

    /// S003: Source column collides with a snapshot metadata column
    #[error("[S003] Snapshot '{snapshot}': source column '{column}' uses a reserved snapshot column name")]
    ReservedColumn { snapshot: String, column: String },

    /// S004: Unique key appears more than once in the source
    #[error("[S004] Snapshot '{snapshot}': unique key '{key}' appears {occurrences} times in source")]
    DuplicateKey {
        snapshot: String,
        key: String,
        occurrences: usize,
    },

    /// S005: More than one active target row for one key
    #[error("[S005] Snapshot '{snapshot}': unique key '{key}' has {count} active rows in target")]
    ActiveRowConflict {
        snapshot: String,
        key: String,
        count: usize,
    },

    /// S006: Unique key expression evaluated to NULL
    #[error("[S006] Snapshot '{snapshot}': unique key is NULL for a row of '{relation}'")]
    NullUniqueKey { snapshot: String, relation: String },

    /// S007: Target schema cannot follow the source under the configured policy
    #[error("[S007] Snapshot '{snapshot}': schema drift: {message}")]
    SchemaDrift { snapshot: String, message: String },

    /// S008: Source relation does not exist
    #[error("[S008] Snapshot '{snapshot}': source relation '{relation}' not found")]
    SourceNotFound { snapshot: String, relation: String },

    /// S009: Target store failure
    #[error("[S009] {0}")]
    Execution(#[from] DbError),

    /// S010: Run cancelled before apply
    #[error("[S010] Snapshot '{snapshot}' cancelled before apply")]
    Cancelled { snapshot: String },

    /// S011: Active target row without a surrogate id
    #[error("[S011] Snapshot '{snapshot}': active row for key '{key}' has no dbt_scd_id")]
    MissingScdId { snapshot: String, key: String },
}

impl SnapshotError {
    /// Error class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapshotError::Config(_)
            | SnapshotError::UnknownColumn { .. }
            | SnapshotError::ReservedColumn { .. } => ErrorKind::Config,
            SnapshotError::DuplicateKey { .. }
            | SnapshotError::ActiveRowConflict { .. }
            | SnapshotError::MissingScdId { .. }
            | SnapshotError::NullUniqueKey { .. } => ErrorKind::DuplicateKey,
            SnapshotError::SchemaDrift { .. } => ErrorKind::SchemaDrift,
            SnapshotError::SourceNotFound { .. } | SnapshotError::Execution(_) => {
                ErrorKind::Execution
            }
            SnapshotError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Result type alias for SnapshotError
pub type SnapshotResult<T> = Result<T, SnapshotError>;
