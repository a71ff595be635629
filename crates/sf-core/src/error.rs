//! Error types for sf-core

use thiserror::Error;

/// Core error type for Snapflow
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Project directory not found
    #[error("[E003] Project directory not found: {path}")]
    ProjectNotFound { path: String },

    /// E004: Snapshot definition is missing a field or combines fields incorrectly
    #[error("[E004] Invalid snapshot '{name}': {message}")]
    SnapshotInvalid { name: String, message: String },

    /// E005: Two snapshot definitions share a name
    #[error("[E005] Duplicate snapshot name '{name}' in {path1} and {path2}")]
    DuplicateSnapshot {
        name: String,
        path1: String,
        path2: String,
    },

    /// E006: Snapshot file failed to render through the template engine
    #[error("[E006] Failed to render '{path}': {message}")]
    TemplateError { path: String, message: String },

    /// E007: Selector could not be parsed
    #[error("[E007] Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// E009: Snapshot definition file is not valid YAML for its schema
    #[error("[E009] Failed to parse '{path}': {source}")]
    SnapshotParse {
        path: String,
        source: serde_yaml::Error,
    },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E016: IO error with file path context
    #[error("[E016] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E015: YAML parse error
    #[error("[E015] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
