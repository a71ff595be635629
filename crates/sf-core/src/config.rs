//! Configuration types and parsing for snapflow.yml

use crate::error::{CoreError, CoreResult};
use crate::snapshot::SnapshotDefaults;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no `--target` flag is given
pub const TARGET_ENV_VAR: &str = "SF_TARGET";

/// Main project configuration from snapflow.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// Directories containing snapshot definition files
    #[serde(default = "default_snapshot_paths")]
    pub snapshot_paths: Vec<String>,

    /// Output directory for run results and rendered SQL
    #[serde(default = "default_target_path")]
    pub target_path: String,

    /// Maximum number of snapshot definitions processed concurrently
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Named target configurations (e.g., dev, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,

    /// Variables available to `var()` in snapshot definition files
    #[serde(default)]
    pub vars: HashMap<String, serde_yaml::Value>,

    /// Settings applied to every snapshot definition that does not set them itself
    #[serde(default)]
    pub snapshot_defaults: SnapshotDefaults,
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Database configuration override
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Variable overrides (merged over base vars)
    #[serde(default)]
    pub vars: HashMap<String, serde_yaml::Value>,
}

/// Database type selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// DuckDB (default)
    #[default]
    DuckDb,
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database type
    #[serde(rename = "type", default)]
    pub db_type: DbType,

    /// Database path (file path or `:memory:`)
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::default(),
            path: default_db_path(),
        }
    }
}

const DEFAULT_DB_PATH: &str = ":memory:";

const DEFAULT_THREADS: usize = 4;

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_snapshot_paths() -> Vec<String> {
    vec!["snapshots".to_string()]
}

fn default_target_path() -> String {
    "target".to_string()
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for snapflow.yml or snapflow.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("snapflow.yml");
        let yaml_path = dir.join("snapflow.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }

        if self.snapshot_paths.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one snapshot_paths entry must be specified".to_string(),
            });
        }

        if self.threads == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "threads must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Get absolute target path relative to a project root
    pub fn target_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.target_path)
    }

    /// Get database configuration, optionally applying target overrides
    pub fn get_database_config(&self, target: Option<&str>) -> CoreResult<DatabaseConfig> {
        match target {
            Some(name) => {
                let target_config = self.get_target(name)?;
                Ok(target_config
                    .database
                    .clone()
                    .unwrap_or_else(|| self.database.clone()))
            }
            None => Ok(self.database.clone()),
        }
    }

    /// Get merged variables, with target overrides taking precedence.
    ///
    /// Borrows the base vars when the target adds nothing.
    pub fn get_merged_vars(
        &self,
        target: Option<&str>,
    ) -> CoreResult<Cow<'_, HashMap<String, serde_yaml::Value>>> {
        let Some(name) = target else {
            return Ok(Cow::Borrowed(&self.vars));
        };
        let target_config = self.get_target(name)?;
        if target_config.vars.is_empty() {
            return Ok(Cow::Borrowed(&self.vars));
        }
        let mut vars = self.vars.clone();
        for (key, value) in &target_config.vars {
            vars.insert(key.clone(), value.clone());
        }
        Ok(Cow::Owned(vars))
    }

    /// Look up a named target, listing the available ones on failure
    fn get_target(&self, name: &str) -> CoreResult<&TargetConfig> {
        self.targets.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.targets.keys().map(|k| k.as_str()).collect();
            available.sort_unstable();
            CoreError::ConfigInvalid {
                message: format!(
                    "Target '{}' not found. Available targets: {}",
                    name,
                    available.join(", ")
                ),
            }
        })
    }

    /// Resolve target from CLI flag or SF_TARGET environment variable
    ///
    /// Priority: CLI flag > SF_TARGET env var > None
    pub fn resolve_target(cli_target: Option<&str>) -> Option<String> {
        cli_target
            .map(String::from)
            .or_else(|| std::env::var(TARGET_ENV_VAR).ok())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
