//! Validate command implementation
//!
//! Resolves every selected definition against the project defaults and
//! checks cross-definition constraints. Never opens the database.

use anyhow::{Context, Result};
use sf_core::{Project, Snapshot, SnapshotDefinition};
use std::collections::HashMap;

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common::{self, ExitCode};

/// A single validation issue
#[derive(Debug)]
struct ValidationIssue {
    snapshot: String,
    message: String,
    file: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[ERROR] {}: {} ({})", self.snapshot, self.message, self.file)
    }
}

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let project = common::load_project(global)?;
    let selected = project
        .select(args.select.as_deref())
        .context("Invalid selector")?;

    let issues = validate_snapshots(&project, &selected);
    for issue in &issues {
        println!("{}", issue);
    }

    println!();
    if issues.is_empty() {
        println!("{} snapshots validated, no issues found", selected.len());
        Ok(())
    } else {
        println!(
            "{} snapshots validated, {} issue(s) found",
            selected.len(),
            issues.len()
        );
        Err(ExitCode(1).into())
    }
}

fn validate_snapshots(project: &Project, snapshots: &[&Snapshot]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut targets: HashMap<String, &str> = HashMap::new();

    for snapshot in snapshots {
        let file = snapshot.path.display().to_string();
        let def: SnapshotDefinition = match project.resolve(snapshot) {
            Ok(def) => def,
            Err(e) => {
                issues.push(ValidationIssue {
                    snapshot: snapshot.name.clone(),
                    message: e.to_string(),
                    file,
                });
                continue;
            }
        };

        let target = def.qualified_name().to_lowercase();
        if target == def.source.to_lowercase() {
            issues.push(ValidationIssue {
                snapshot: def.name.clone(),
                message: format!("target '{}' is the snapshot's own source", def.qualified_name()),
                file: file.clone(),
            });
        }
        if let Some(other) = targets.insert(target, snapshot.name.as_str()) {
            issues.push(ValidationIssue {
                snapshot: def.name.clone(),
                message: format!(
                    "target '{}' is also written by snapshot '{}'",
                    def.qualified_name(),
                    other
                ),
                file,
            });
        }
    }

    issues
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
