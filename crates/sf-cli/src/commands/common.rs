//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use serde::Serialize;
use sf_core::{Config, Project};
use sf_db::{Database, DuckDbBackend};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main maps it to the process exit code.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Parse `--vars` as a YAML mapping (JSON objects parse as YAML too)
pub(crate) fn parse_vars(raw: Option<&str>) -> Result<HashMap<String, serde_yaml::Value>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(HashMap::new());
    };
    serde_yaml::from_str(raw).context("Failed to parse --vars: expected a YAML or JSON mapping")
}

/// Load the project with the resolved target and `--vars` overrides
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let target = Config::resolve_target(global.target.as_deref());
    let vars = parse_vars(global.vars.as_deref())?;
    Project::load(Path::new(&global.project_dir), target.as_deref(), &vars)
        .context("Failed to load project")
}

/// Open the database configured for the project's target.
///
/// Relative file paths resolve against the project root.
pub(crate) fn create_database_connection(project: &Project) -> Result<Arc<dyn Database>> {
    let db_config = project
        .config
        .get_database_config(project.target.as_deref())
        .context("Failed to get database configuration")?;
    let path = database_path(&project.root, &db_config.path);
    log::debug!("Opening {} database at {}", db_config.db_type, path);
    let db: Arc<dyn Database> =
        Arc::new(DuckDbBackend::new(&path).context("Failed to connect to database")?);
    Ok(db)
}

fn database_path(root: &Path, configured: &str) -> String {
    if configured == ":memory:" || Path::new(configured).is_absolute() {
        configured.to_string()
    } else {
        root.join(configured).display().to_string()
    }
}

/// Write a value as pretty JSON, creating parent directories
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize results")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
