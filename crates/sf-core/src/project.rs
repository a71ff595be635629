//! Project discovery and loading

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{discover_snapshots, select_snapshots, Snapshot, SnapshotDefinition};
use crate::template::TemplateRenderer;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Represents a Snapflow project
#[derive(Debug)]
pub struct Project {
    /// Project root directory
    pub root: PathBuf,

    /// Project configuration
    pub config: Config,

    /// Target the project was loaded for, if any
    pub target: Option<String>,

    /// Snapshot definitions discovered in the project, in discovery order
    pub snapshots: Vec<Snapshot>,
}

impl Project {
    /// Load a project from a directory.
    ///
    /// Definition files are rendered with the project vars, then target vars,
    /// then `cli_vars`, each layer overriding the previous one.
    pub fn load(
        path: &Path,
        target: Option<&str>,
        cli_vars: &HashMap<String, serde_yaml::Value>,
    ) -> CoreResult<Self> {
        let root = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        if !root.exists() {
            return Err(CoreError::ProjectNotFound {
                path: root.display().to_string(),
            });
        }

        let config = Config::load_from_dir(&root)?;

        let mut vars = config.get_merged_vars(target)?.into_owned();
        vars.extend(cli_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        let renderer = TemplateRenderer::new(&vars);

        let snapshots = discover_snapshots(&root, &config.snapshot_paths, &renderer)?;
        log::debug!(
            "Loaded project '{}' with {} snapshot(s)",
            config.name,
            snapshots.len()
        );

        Ok(Self {
            root,
            config,
            target: target.map(String::from),
            snapshots,
        })
    }

    /// Output directory for run results and rendered SQL
    pub fn target_dir(&self) -> PathBuf {
        self.config.target_path_absolute(&self.root)
    }

    /// Look up a snapshot by name
    pub fn get_snapshot(&self, name: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.name == name)
    }

    /// Snapshots matching a selector, in discovery order
    pub fn select(&self, selector: Option<&str>) -> CoreResult<Vec<&Snapshot>> {
        select_snapshots(&self.snapshots, selector)
    }

    /// Resolve a snapshot against the project's `snapshot_defaults`
    pub fn resolve(&self, snapshot: &Snapshot) -> CoreResult<SnapshotDefinition> {
        snapshot.config.resolve(&self.config.snapshot_defaults)
    }
}
