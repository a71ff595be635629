//! Snapshot command implementation - SCD Type 2 tracking

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sf_core::{Project, SnapshotConfig};
use sf_snapshot::{ExecutorOptions, InvocationSummary, RunStatus, SnapshotExecutor, SnapshotRunResult};
use std::time::Instant;

use crate::cli::{GlobalArgs, SnapshotArgs};
use crate::commands::common::{self, ExitCode};

/// Snapshot results output file format
#[derive(Debug, Serialize)]
struct SnapshotResults<'a> {
    invocation_id: String,
    timestamp: DateTime<Utc>,
    elapsed_secs: f64,
    dry_run: bool,
    success_count: usize,
    failure_count: usize,
    skipped_count: usize,
    results: &'a [SnapshotRunResult],
}

/// Execute the snapshot command
pub async fn execute(args: &SnapshotArgs, global: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let project = common::load_project(global)?;

    let selected = project
        .select(args.select.as_deref())
        .context("Invalid selector")?;
    if selected.is_empty() {
        println!("No matching snapshots found");
        return Ok(());
    }
    let configs: Vec<SnapshotConfig> = selected.iter().map(|s| s.config.clone()).collect();

    let db = common::create_database_connection(&project)?;
    let options = ExecutorOptions {
        threads: args.threads.unwrap_or(project.config.threads),
        dry_run: args.dry_run,
    };
    let executor = SnapshotExecutor::new(db, options);

    let cancel = executor.cancel_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; snapshots that have not started writing will be skipped");
            cancel.cancel();
        }
    });

    println!(
        "Running {} snapshots{}...\n",
        configs.len(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let summary = executor
        .run_all(&configs, &project.config.snapshot_defaults)
        .await;
    interrupt.abort();

    for result in &summary.results {
        print_result(result);
    }

    if args.dry_run {
        write_rendered_sql(&project, &summary)?;
    }
    write_snapshot_results(&project, &summary, start_time, args.dry_run)?;

    println!();
    println!(
        "Completed: {} succeeded, {} failed, {} skipped",
        summary.success_count, summary.failure_count, summary.skipped_count
    );
    println!("Total time: {}ms", start_time.elapsed().as_millis());

    if summary.has_failures() {
        return Err(ExitCode(4).into());
    }

    Ok(())
}

fn print_result(result: &SnapshotRunResult) {
    let millis = (result.duration_secs * 1000.0).round() as u64;
    match result.status {
        RunStatus::Success => {
            println!(
                "  ✓ {} (new: {}, changed: {}, deleted: {}, unchanged: {}; inserted: {}, invalidated: {}) [{}ms]",
                result.snapshot,
                result.new,
                result.changed,
                result.deleted,
                result.unchanged,
                result.rows_inserted,
                result.rows_invalidated,
                millis
            );
            if !result.columns_added.is_empty() {
                println!("      added columns: {}", result.columns_added.join(", "));
            }
            if !result.columns_dropped.is_empty() {
                println!("      dropped columns: {}", result.columns_dropped.join(", "));
            }
        }
        RunStatus::Error => println!(
            "  ✗ {} - {} [{}ms]",
            result.snapshot,
            result.error.as_deref().unwrap_or("unknown error"),
            millis
        ),
        RunStatus::Skipped => println!("  - {} skipped", result.snapshot),
    }
}

/// Write each planned run's statements to `target/snapshots/<name>.sql`
fn write_rendered_sql(project: &Project, summary: &InvocationSummary) -> Result<()> {
    let dir = project.target_dir().join("snapshots");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    for result in &summary.results {
        if result.status != RunStatus::Success {
            continue;
        }
        let path = dir.join(format!("{}.sql", result.snapshot));
        std::fs::write(&path, render_sql_file(&result.statements))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Wrote {}", path.display());
    }
    Ok(())
}

fn render_sql_file(statements: &[String]) -> String {
    if statements.is_empty() {
        return "-- no changes\n".to_string();
    }
    let mut out = statements.join(";\n\n");
    out.push_str(";\n");
    out
}

/// Write snapshot results to JSON file
fn write_snapshot_results(
    project: &Project,
    summary: &InvocationSummary,
    start_time: Instant,
    dry_run: bool,
) -> Result<()> {
    let results = SnapshotResults {
        invocation_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        elapsed_secs: start_time.elapsed().as_secs_f64(),
        dry_run,
        success_count: summary.success_count,
        failure_count: summary.failure_count,
        skipped_count: summary.skipped_count,
        results: &summary.results,
    };
    common::write_json(&project.target_dir().join("snapshot_results.json"), &results)
}
