//! Snapshot definitions for SCD Type 2 tracking
//!
//! Snapshots track historical changes to mutable source data, creating a
//! slowly changing dimension (SCD Type 2) table that preserves the history
//! of changes over time.
//!
//! Definitions are read from YAML in two steps. [`SnapshotConfig`] is the
//! file shape, where every setting is optional so project-level
//! [`SnapshotDefaults`] can fill the gaps. [`SnapshotConfig::resolve`] merges
//! the defaults and validates the result into a [`SnapshotDefinition`]. That
//! step does no I/O, so configuration errors surface before any database
//! work starts.

use crate::error::{CoreError, CoreResult};
use crate::sql_utils::{quote_ident, quote_qualified};
use crate::template::TemplateRenderer;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Surrogate id of one version of a key
pub const SCD_ID: &str = "dbt_scd_id";
/// Change marker compared between runs
pub const UPDATED_AT: &str = "dbt_updated_at";
/// Start of a version's validity window
pub const VALID_FROM: &str = "dbt_valid_from";
/// End of a version's validity window; NULL while the version is active
pub const VALID_TO: &str = "dbt_valid_to";

/// All metadata columns, in the order they are appended to the target
pub const META_COLUMNS: [&str; 4] = [SCD_ID, UPDATED_AT, VALID_FROM, VALID_TO];

/// Whether a column name is one of the snapshot metadata columns
pub fn is_meta_column(name: &str) -> bool {
    META_COLUMNS.iter().any(|m| m.eq_ignore_ascii_case(name))
}

/// Strategy for detecting changes in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStrategy {
    /// Detect changes using a timestamp column
    Timestamp,
    /// Detect changes by comparing specific columns
    Check,
}

impl std::fmt::Display for SnapshotStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStrategy::Timestamp => write!(f, "timestamp"),
            SnapshotStrategy::Check => write!(f, "check"),
        }
    }
}

/// Columns compared by the check strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckCols {
    /// Every non-metadata source column, resolved against the live schema
    All,
    /// An explicit column list
    Columns(Vec<String>),
}

impl Serialize for CheckCols {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CheckCols::All => serializer.serialize_str("all"),
            CheckCols::Columns(cols) => cols.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CheckCols {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyword(String),
            Columns(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Keyword(k) if k.eq_ignore_ascii_case("all") => Ok(CheckCols::All),
            Raw::Keyword(k) => Err(de::Error::custom(format!(
                "check_cols must be 'all' or a list of columns, found '{}'",
                k
            ))),
            Raw::Columns(cols) => Ok(CheckCols::Columns(cols)),
        }
    }
}

impl std::fmt::Display for CheckCols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckCols::All => write!(f, "all"),
            CheckCols::Columns(cols) => write!(f, "{}", cols.join(", ")),
        }
    }
}

/// Expression identifying one logical entity across versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniqueKey {
    /// A SQL expression evaluated per row, e.g. `id || '-' || first_name`
    Expression(String),
    /// Columns combined into one key
    Columns(Vec<String>),
}

impl UniqueKey {
    /// Render the key as a SQL expression over the relation's columns.
    pub fn to_sql(&self) -> String {
        self.render(quote_ident)
    }

    /// Render the key, producing each listed column's expression with
    /// `column`. Expressions are used verbatim.
    ///
    /// Column lists become `<len>:<text>` parts joined with `|`, where
    /// `<len>` is the byte length of the part's text, so values containing
    /// `|` cannot make two keys collide. A NULL part makes the key NULL.
    pub fn render(&self, column: impl Fn(&str) -> String) -> String {
        match self {
            UniqueKey::Expression(expr) => expr.clone(),
            UniqueKey::Columns(cols) if cols.len() == 1 => column(&cols[0]),
            UniqueKey::Columns(cols) => cols
                .iter()
                .map(|c| {
                    let text = format!("CAST({} AS VARCHAR)", column(c));
                    format!("CAST(strlen({}) AS VARCHAR) || ':' || {}", text, text)
                })
                .collect::<Vec<_>>()
                .join(" || '|' || "),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            UniqueKey::Expression(expr) => expr.trim().is_empty(),
            UniqueKey::Columns(cols) => cols.is_empty() || cols.iter().any(|c| c.is_empty()),
        }
    }
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueKey::Expression(expr) => write!(f, "{}", expr),
            UniqueKey::Columns(cols) => write!(f, "{}", cols.join(", ")),
        }
    }
}

/// How a run reacts when the source schema drifts from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnSchemaChange {
    /// Add new source columns to the target, never drop (default)
    #[default]
    AppendNewColumns,
    /// Abort the run on any added or removed column
    Fail,
    /// Add new columns and drop obsolete ones that hold no history
    SyncAllColumns,
}

impl std::fmt::Display for OnSchemaChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnSchemaChange::AppendNewColumns => write!(f, "append_new_columns"),
            OnSchemaChange::Fail => write!(f, "fail"),
            OnSchemaChange::SyncAllColumns => write!(f, "sync_all_columns"),
        }
    }
}

/// Project-wide snapshot settings from `snapshot_defaults` in snapflow.yml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SnapshotDefaults {
    /// Schema for snapshot tables
    #[serde(default)]
    pub target_schema: Option<String>,

    /// Unique key expression or columns
    #[serde(default)]
    pub unique_key: Option<UniqueKey>,

    /// Change detection strategy
    #[serde(default)]
    pub strategy: Option<SnapshotStrategy>,

    /// Timestamp column for the timestamp strategy
    #[serde(default)]
    pub updated_at: Option<String>,

    /// Columns for the check strategy
    #[serde(default)]
    pub check_cols: Option<CheckCols>,

    /// Whether to close out rows that disappear from the source
    #[serde(default)]
    pub invalidate_hard_deletes: Option<bool>,

    /// Schema drift policy
    #[serde(default)]
    pub on_schema_change: Option<OnSchemaChange>,
}

/// Snapshot configuration from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Snapshot name, also the target table name
    pub name: String,

    /// Source table to snapshot (can be schema.table format)
    pub source: String,

    /// Expression or column(s) that uniquely identify a record
    #[serde(default)]
    pub unique_key: Option<UniqueKey>,

    /// Strategy for detecting changes
    #[serde(default)]
    pub strategy: Option<SnapshotStrategy>,

    /// Column containing update timestamp (required for timestamp strategy)
    #[serde(default)]
    pub updated_at: Option<String>,

    /// Columns to compare for changes (required for check strategy)
    #[serde(default)]
    pub check_cols: Option<CheckCols>,

    /// Whether to invalidate hard deletes (records missing from source)
    #[serde(default)]
    pub invalidate_hard_deletes: Option<bool>,

    /// Target schema for the snapshot table
    #[serde(default, alias = "schema")]
    pub target_schema: Option<String>,

    /// Schema drift policy
    #[serde(default)]
    pub on_schema_change: Option<OnSchemaChange>,

    /// Description of the snapshot
    #[serde(default)]
    pub description: Option<String>,

    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Validated strategy settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyConfig {
    /// Compare the source `updated_at` column with the stored change marker
    Timestamp {
        /// Source column holding the row's last-modified time
        updated_at: String,
    },
    /// Compare a signature over the checked columns
    Check {
        /// Columns to compare
        check_cols: CheckCols,
        /// Optional source column stored as the change marker
        updated_at: Option<String>,
    },
}

impl StrategyConfig {
    /// The strategy kind
    pub fn kind(&self) -> SnapshotStrategy {
        match self {
            StrategyConfig::Timestamp { .. } => SnapshotStrategy::Timestamp,
            StrategyConfig::Check { .. } => SnapshotStrategy::Check,
        }
    }

    /// The configured `updated_at` column, if any
    pub fn updated_at(&self) -> Option<&str> {
        match self {
            StrategyConfig::Timestamp { updated_at } => Some(updated_at),
            StrategyConfig::Check { updated_at, .. } => updated_at.as_deref(),
        }
    }
}

/// A fully resolved, validated snapshot definition
#[derive(Debug, Clone)]
pub struct SnapshotDefinition {
    /// Snapshot name
    pub name: String,
    /// Source relation
    pub source: String,
    /// Unique key
    pub unique_key: UniqueKey,
    /// Strategy and its columns
    pub strategy: StrategyConfig,
    /// Whether rows missing from the source are closed out
    pub invalidate_hard_deletes: bool,
    /// Target schema
    pub target_schema: Option<String>,
    /// Schema drift policy
    pub on_schema_change: OnSchemaChange,
    /// Description
    pub description: Option<String>,
    /// Tags
    pub tags: Vec<String>,
}

impl SnapshotDefinition {
    /// Get the qualified name for the snapshot table
    pub fn qualified_name(&self) -> String {
        match &self.target_schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Quoted qualified target name
    pub fn quoted_target(&self) -> String {
        quote_qualified(&self.qualified_name())
    }

    /// Quoted source relation name
    pub fn quoted_source(&self) -> String {
        quote_qualified(&self.source)
    }
}

impl SnapshotConfig {
    /// Merge project defaults into this config and validate the result
    pub fn resolve(&self, defaults: &SnapshotDefaults) -> CoreResult<SnapshotDefinition> {
        let invalid = |message: String| CoreError::SnapshotInvalid {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name cannot be empty".to_string()));
        }
        if self.source.trim().is_empty() {
            return Err(invalid("source cannot be empty".to_string()));
        }

        let unique_key = self
            .unique_key
            .clone()
            .or_else(|| defaults.unique_key.clone())
            .ok_or_else(|| invalid("missing required 'unique_key'".to_string()))?;
        if unique_key.is_blank() {
            return Err(invalid("'unique_key' cannot be empty".to_string()));
        }

        let strategy_kind = self
            .strategy
            .or(defaults.strategy)
            .ok_or_else(|| invalid("missing required 'strategy'".to_string()))?;
        let updated_at = self
            .updated_at
            .clone()
            .or_else(|| defaults.updated_at.clone());

        let strategy = match strategy_kind {
            SnapshotStrategy::Timestamp => {
                let updated_at = updated_at.ok_or_else(|| {
                    invalid("timestamp strategy requires 'updated_at' column".to_string())
                })?;
                if self.check_cols.is_some() {
                    log::warn!(
                        "Snapshot '{}': 'check_cols' is ignored by the timestamp strategy",
                        self.name
                    );
                }
                StrategyConfig::Timestamp { updated_at }
            }
            SnapshotStrategy::Check => {
                let check_cols = self
                    .check_cols
                    .clone()
                    .or_else(|| defaults.check_cols.clone())
                    .ok_or_else(|| {
                        invalid("check strategy requires 'check_cols' list or 'all'".to_string())
                    })?;
                validate_check_cols(&check_cols).map_err(invalid)?;
                StrategyConfig::Check {
                    check_cols,
                    updated_at,
                }
            }
        };

        if let Some(col) = strategy.updated_at() {
            if col.trim().is_empty() {
                return Err(invalid("'updated_at' cannot be empty".to_string()));
            }
            if is_meta_column(col) {
                return Err(invalid(format!(
                    "'updated_at' cannot be the metadata column '{}'",
                    col
                )));
            }
        }

        Ok(SnapshotDefinition {
            name: self.name.clone(),
            source: self.source.clone(),
            unique_key,
            strategy,
            invalidate_hard_deletes: self
                .invalidate_hard_deletes
                .or(defaults.invalidate_hard_deletes)
                .unwrap_or(false),
            target_schema: self
                .target_schema
                .clone()
                .or_else(|| defaults.target_schema.clone()),
            on_schema_change: self
                .on_schema_change
                .or(defaults.on_schema_change)
                .unwrap_or_default(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        })
    }
}

/// Reject empty, duplicated, or metadata columns in an explicit list
fn validate_check_cols(check_cols: &CheckCols) -> Result<(), String> {
    let CheckCols::Columns(cols) = check_cols else {
        return Ok(());
    };
    if cols.is_empty() {
        return Err("'check_cols' list cannot be empty".to_string());
    }
    let mut seen: Vec<String> = Vec::with_capacity(cols.len());
    for col in cols {
        if col.trim().is_empty() {
            return Err("'check_cols' contains an empty column name".to_string());
        }
        if is_meta_column(col) {
            return Err(format!(
                "'check_cols' cannot include the metadata column '{}'",
                col
            ));
        }
        let lower = col.to_lowercase();
        if seen.contains(&lower) {
            return Err(format!("'check_cols' lists '{}' more than once", col));
        }
        seen.push(lower);
    }
    Ok(())
}

/// A snapshot file containing one or more snapshot configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotFile {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// List of snapshots defined in this file
    #[serde(default)]
    pub snapshots: Vec<SnapshotConfig>,
}

fn default_version() -> u32 {
    1
}

impl SnapshotFile {
    /// Render a snapshot file through the template engine and parse it
    pub fn load(path: &Path, renderer: &TemplateRenderer) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let rendered = renderer.render(&content, path)?;
        serde_yaml::from_str(&rendered).map_err(|e| CoreError::SnapshotParse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Represents a discovered snapshot, not yet resolved against defaults
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Snapshot name
    pub name: String,

    /// Path to the snapshot YAML file
    pub path: PathBuf,

    /// Snapshot configuration
    pub config: SnapshotConfig,
}

impl Snapshot {
    /// Create a new snapshot from config
    pub fn new(config: SnapshotConfig, path: PathBuf) -> Self {
        Self {
            name: config.name.clone(),
            path,
            config,
        }
    }

    /// Whether the snapshot carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.config.tags.iter().any(|t| t == tag)
    }
}

/// Discover snapshots from snapshot paths, recursing into subdirectories
pub fn discover_snapshots(
    project_root: &Path,
    snapshot_paths: &[String],
    renderer: &TemplateRenderer,
) -> CoreResult<Vec<Snapshot>> {
    let mut snapshots = Vec::new();

    for snapshot_path in snapshot_paths {
        let dir = project_root.join(snapshot_path);
        if !dir.exists() {
            log::debug!("Snapshot path {} does not exist, skipping", dir.display());
            continue;
        }
        discover_recursive(&dir, renderer, &mut snapshots)?;
    }

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for snapshot in &snapshots {
        if let Some(first) = seen.insert(&snapshot.name, &snapshot.path) {
            return Err(CoreError::DuplicateSnapshot {
                name: snapshot.name.clone(),
                path1: first.display().to_string(),
                path2: snapshot.path.display().to_string(),
            });
        }
    }

    Ok(snapshots)
}

fn discover_recursive(
    dir: &Path,
    renderer: &TemplateRenderer,
    snapshots: &mut Vec<Snapshot>,
) -> CoreResult<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| CoreError::IoWithPath {
            path: dir.display().to_string(),
            source: e,
        })?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            discover_recursive(&path, renderer, snapshots)?;
        } else if path.extension().is_some_and(|e| e == "yml" || e == "yaml") {
            let file = SnapshotFile::load(&path, renderer)?;
            for config in file.snapshots {
                snapshots.push(Snapshot::new(config, path.clone()));
            }
        }
    }

    Ok(())
}

/// Filter snapshots by a comma-separated selector of names and `tag:<tag>` terms.
///
/// `None` selects everything. Order follows discovery order.
pub fn select_snapshots<'a>(
    snapshots: &'a [Snapshot],
    selector: Option<&str>,
) -> CoreResult<Vec<&'a Snapshot>> {
    let Some(selector) = selector else {
        return Ok(snapshots.iter().collect());
    };

    let mut names: Vec<&str> = Vec::new();
    let mut tags: Vec<&str> = Vec::new();
    for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match term.strip_prefix("tag:") {
            Some("") => {
                return Err(CoreError::InvalidSelector {
                    selector: term.to_string(),
                    reason: "tag selector needs a tag name".to_string(),
                })
            }
            Some(tag) => tags.push(tag),
            None => names.push(term),
        }
    }

    Ok(snapshots
        .iter()
        .filter(|s| names.contains(&s.name.as_str()) || tags.iter().any(|t| s.has_tag(t)))
        .collect())
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
