//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Snapflow - SCD Type 2 snapshots of DuckDB relations
#[derive(Parser, Debug)]
#[command(name = "sf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override target (database connection and vars); falls back to SF_TARGET
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Override/add variables as YAML or JSON, e.g. '{seed_name: people}'
    #[arg(long, global = true)]
    pub vars: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run snapshots
    Snapshot(SnapshotArgs),

    /// List snapshot definitions
    Ls(LsArgs),

    /// Validate snapshot definitions without touching the database
    Validate(ValidateArgs),
}

/// Arguments for the snapshot command
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Snapshots to run: comma-separated names and `tag:<tag>` selectors
    #[arg(short, long)]
    pub select: Option<String>,

    /// Maximum snapshots run concurrently (default: `threads` in snapflow.yml)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Render the statements without writing to the database
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: LsOutput,

    /// Comma-separated names and `tag:<tag>` selectors
    #[arg(short, long)]
    pub select: Option<String>,
}

/// List output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Comma-separated names and `tag:<tag>` selectors
    #[arg(short, long)]
    pub select: Option<String>,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
