use super::*;
use crate::snapshot::{OnSchemaChange, SnapshotStrategy};

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("name: test_project").unwrap();
    assert_eq!(config.name, "test_project");
    assert_eq!(config.threads, 4);
    assert_eq!(config.database.path, ":memory:");

    let root = PathBuf::from("/tmp/test");
    assert_eq!(config.snapshot_paths, vec!["snapshots"]);
    assert_eq!(config.target_path_absolute(&root), root.join("target"));
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
name: analytics
snapshot_paths: [snapshots, legacy_snapshots]
threads: 8
database:
  type: duckdb
  path: ./warehouse.duckdb
vars:
  seed_name: seed
snapshot_defaults:
  target_schema: snapshots
  unique_key: "id || '-' || first_name"
  strategy: check
  check_cols: all
  invalidate_hard_deletes: true
  on_schema_change: fail
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.snapshot_paths.len(), 2);
    assert_eq!(config.threads, 8);
    assert_eq!(config.database.path, "./warehouse.duckdb");

    let defaults = &config.snapshot_defaults;
    assert_eq!(defaults.target_schema.as_deref(), Some("snapshots"));
    assert_eq!(defaults.strategy, Some(SnapshotStrategy::Check));
    assert_eq!(defaults.invalidate_hard_deletes, Some(true));
    assert_eq!(defaults.on_schema_change, Some(OnSchemaChange::Fail));
}

#[test]
fn test_unknown_field_is_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("name: t\nmodel_paths: [models]");
    assert!(result.is_err());
}

#[test]
fn test_get_database_config_by_target() {
    let yaml = r#"
name: test_project
database:
  path: ./dev.duckdb
targets:
  prod:
    database:
      path: ./prod.duckdb
  ci: {}
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        config.get_database_config(None).unwrap().path,
        "./dev.duckdb"
    );
    assert_eq!(
        config.get_database_config(Some("prod")).unwrap().path,
        "./prod.duckdb"
    );
    // A target without a database block falls back to the base connection
    assert_eq!(
        config.get_database_config(Some("ci")).unwrap().path,
        "./dev.duckdb"
    );
}

#[test]
fn test_get_database_config_invalid_target() {
    let yaml = r#"
name: test_project
targets:
  prod: {}
  staging: {}
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let err = config
        .get_database_config(Some("nonexistent"))
        .unwrap_err()
        .to_string();
    assert!(err.contains("nonexistent"));
    assert!(err.contains("prod, staging"));
}

#[test]
fn test_get_merged_vars() {
    let yaml = r#"
name: test_project
vars:
  seed_name: seed
  invalidate_hard_deletes: false
targets:
  prod:
    vars:
      invalidate_hard_deletes: true
  plain: {}
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();

    let base = config.get_merged_vars(None).unwrap();
    assert!(matches!(base, Cow::Borrowed(_)));

    let plain = config.get_merged_vars(Some("plain")).unwrap();
    assert!(matches!(plain, Cow::Borrowed(_)));

    let prod = config.get_merged_vars(Some("prod")).unwrap();
    assert_eq!(
        prod.get("invalidate_hard_deletes"),
        Some(&serde_yaml::Value::Bool(true))
    );
    assert_eq!(
        prod.get("seed_name"),
        Some(&serde_yaml::Value::String("seed".to_string()))
    );
}

#[test]
fn test_load_rejects_zero_threads() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("snapflow.yml"), "name: t\nthreads: 0\n").unwrap();
    let err = Config::load_from_dir(temp.path()).unwrap_err();
    assert!(err.to_string().contains("threads"));
}

#[test]
fn test_load_from_dir_accepts_yaml_extension() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("snapflow.yaml"), "name: alt\n").unwrap();
    let config = Config::load_from_dir(temp.path()).unwrap();
    assert_eq!(config.name, "alt");
}

#[test]
fn test_load_from_dir_missing() {
    let temp = tempfile::TempDir::new().unwrap();
    let err = Config::load_from_dir(temp.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
fn test_resolve_target_prefers_cli_flag() {
    assert_eq!(
        Config::resolve_target(Some("prod")),
        Some("prod".to_string())
    );
}
