//! List command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use sf_core::{Project, Snapshot, StrategyConfig};

use crate::cli::{GlobalArgs, LsArgs, LsOutput};

/// Snapshot information for display
#[derive(Debug, Serialize)]
struct SnapshotInfo {
    name: String,
    source: String,
    target: String,
    strategy: Option<String>,
    unique_key: Option<String>,
    check_cols: Option<String>,
    updated_at: Option<String>,
    invalidate_hard_deletes: Option<bool>,
    on_schema_change: Option<String>,
    tags: Vec<String>,
    path: String,
    /// Set when the definition does not resolve
    error: Option<String>,
}

impl SnapshotInfo {
    fn new(project: &Project, snapshot: &Snapshot) -> Self {
        let path = snapshot
            .path
            .strip_prefix(&project.root)
            .unwrap_or(&snapshot.path)
            .display()
            .to_string();

        match project.resolve(snapshot) {
            Ok(def) => {
                let check_cols = match &def.strategy {
                    StrategyConfig::Check { check_cols, .. } => Some(check_cols.to_string()),
                    StrategyConfig::Timestamp { .. } => None,
                };
                Self {
                    name: def.name.clone(),
                    source: def.source.clone(),
                    target: def.qualified_name(),
                    strategy: Some(def.strategy.kind().to_string()),
                    unique_key: Some(def.unique_key.to_string()),
                    check_cols,
                    updated_at: def.strategy.updated_at().map(String::from),
                    invalidate_hard_deletes: Some(def.invalidate_hard_deletes),
                    on_schema_change: Some(def.on_schema_change.to_string()),
                    tags: def.tags.clone(),
                    path,
                    error: None,
                }
            }
            Err(e) => Self {
                name: snapshot.name.clone(),
                source: snapshot.config.source.clone(),
                target: "-".to_string(),
                strategy: None,
                unique_key: None,
                check_cols: None,
                updated_at: None,
                invalidate_hard_deletes: None,
                on_schema_change: None,
                tags: snapshot.config.tags.clone(),
                path,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let project = crate::commands::common::load_project(global)?;
    let selected = project
        .select(args.select.as_deref())
        .context("Invalid selector")?;

    let infos: Vec<SnapshotInfo> = selected
        .into_iter()
        .map(|s| SnapshotInfo::new(&project, s))
        .collect();

    match args.output {
        LsOutput::Table => print_table(&infos),
        LsOutput::Json => print_json(&infos)?,
    }

    Ok(())
}

/// Print snapshots in table format
fn print_table(snapshots: &[SnapshotInfo]) {
    let name_width = column_width(snapshots, "NAME", |s| s.name.len());
    let source_width = column_width(snapshots, "SOURCE", |s| s.source.len());
    let target_width = column_width(snapshots, "TARGET", |s| s.target.len());
    let strategy_width = 9;

    println!(
        "{:<name_width$}  {:<source_width$}  {:<target_width$}  {:<strategy_width$}  UNIQUE_KEY",
        "NAME", "SOURCE", "TARGET", "STRATEGY",
    );
    println!(
        "{:-<name_width$}  {:-<source_width$}  {:-<target_width$}  {:-<strategy_width$}  {}",
        "",
        "",
        "",
        "",
        "-".repeat(30),
    );

    for snapshot in snapshots {
        let detail = match &snapshot.error {
            Some(err) => format!("INVALID: {}", err),
            None => snapshot.unique_key.clone().unwrap_or_default(),
        };
        println!(
            "{:<name_width$}  {:<source_width$}  {:<target_width$}  {:<strategy_width$}  {}",
            snapshot.name,
            snapshot.source,
            snapshot.target,
            snapshot.strategy.as_deref().unwrap_or("-"),
            detail,
        );
    }

    println!();
    println!("{} snapshots", snapshots.len());
}

fn column_width(snapshots: &[SnapshotInfo], header: &str, len: impl Fn(&SnapshotInfo) -> usize) -> usize {
    snapshots
        .iter()
        .map(len)
        .max()
        .unwrap_or(0)
        .max(header.len())
}

/// Print snapshots as JSON
fn print_json(snapshots: &[SnapshotInfo]) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshots).context("Failed to serialize snapshots")?;
    println!("{}", json);
    Ok(())
}
