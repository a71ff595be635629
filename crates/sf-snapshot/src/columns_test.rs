use super::*;
use sf_core::snapshot::{SnapshotConfig, SnapshotDefaults};

fn definition(extra: &str) -> SnapshotDefinition {
    let yaml = format!("name: snap\nsource: src\nunique_key: id\n{}", extra);
    let config: SnapshotConfig = serde_yaml::from_str(&yaml).unwrap();
    config.resolve(&SnapshotDefaults::default()).unwrap()
}

fn cols(spec: &[(&str, &str)]) -> Vec<Column> {
    spec.iter().map(|(n, t)| Column::new(*n, *t)).collect()
}

fn source() -> Vec<Column> {
    cols(&[
        ("id", "INTEGER"),
        ("first_name", "VARCHAR"),
        ("email", "VARCHAR"),
        ("updated_at", "TIMESTAMP"),
    ])
}

fn snapshot_target(extra: &[(&str, &str)], updated_at_type: &str) -> Vec<Column> {
    let mut target = cols(extra);
    target.extend(cols(&[
        ("dbt_scd_id", "VARCHAR"),
        ("dbt_updated_at", updated_at_type),
        ("dbt_valid_from", "TIMESTAMP"),
        ("dbt_valid_to", "TIMESTAMP"),
    ]));
    target
}

#[test]
fn test_check_all_first_run() {
    let def = definition("strategy: check\ncheck_cols: all");
    let (set, migration) = resolve(&def, &source(), &[]).unwrap();

    assert_eq!(
        set.check_columns,
        vec!["id", "first_name", "email", "updated_at"]
    );
    assert_eq!(set.updated_at, None);
    assert_eq!(set.updated_at_type, "TIMESTAMP");
    assert!(migration.create_table);
    assert!(migration.added.is_empty());
    assert!(!migration.is_empty());

    let names: Vec<String> = set.target_schema().into_iter().map(|c| c.name).collect();
    assert_eq!(
        names,
        vec![
            "id",
            "first_name",
            "email",
            "updated_at",
            "dbt_scd_id",
            "dbt_updated_at",
            "dbt_valid_from",
            "dbt_valid_to"
        ]
    );
}

#[test]
fn test_check_all_excludes_updated_at_when_configured() {
    let def = definition("strategy: check\ncheck_cols: all\nupdated_at: updated_at");
    let (set, _) = resolve(&def, &source(), &[]).unwrap();
    assert_eq!(set.check_columns, vec!["id", "first_name", "email"]);
    assert_eq!(set.updated_at.as_deref(), Some("updated_at"));
}

#[test]
fn test_explicit_check_cols_use_source_casing() {
    let def = definition("strategy: check\ncheck_cols: [EMAIL, first_name]");
    let (set, _) = resolve(&def, &source(), &[]).unwrap();
    assert_eq!(set.check_columns, vec!["email", "first_name"]);
}

#[test]
fn test_unknown_check_column() {
    let def = definition("strategy: check\ncheck_cols: [email, nope]");
    let err = resolve(&def, &source(), &[]).unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::UnknownColumn { role: "check_cols", ref column, .. } if column == "nope"
    ));
    assert_eq!(err.kind(), crate::error::ErrorKind::Config);
}

#[test]
fn test_unknown_updated_at_column() {
    let def = definition("strategy: timestamp\nupdated_at: modified");
    let err = resolve(&def, &source(), &[]).unwrap_err();
    assert!(matches!(err, SnapshotError::UnknownColumn { role: "updated_at", .. }));
}

#[test]
fn test_timestamp_strategy_types_marker_like_source() {
    let source = cols(&[("id", "INTEGER"), ("changed_on", "DATE")]);
    let def = definition("strategy: timestamp\nupdated_at: changed_on");
    let (set, _) = resolve(&def, &source, &[]).unwrap();
    assert!(set.check_columns.is_empty());
    assert_eq!(set.updated_at_type, "DATE");
    assert_eq!(set.meta_columns()[1], Column::new("dbt_updated_at", "DATE"));
}

#[test]
fn test_reserved_source_column() {
    let mut source = source();
    source.push(Column::new("dbt_valid_to", "TIMESTAMP"));
    let def = definition("strategy: check\ncheck_cols: all");
    let err = resolve(&def, &source, &[]).unwrap_err();
    assert!(matches!(err, SnapshotError::ReservedColumn { .. }));
}

#[test]
fn test_added_and_removed_columns() {
    let def = definition("strategy: check\ncheck_cols: all");
    let target = snapshot_target(
        &[
            ("id", "INTEGER"),
            ("first_name", "VARCHAR"),
            ("updated_at", "TIMESTAMP"),
            ("legacy_code", "VARCHAR"),
        ],
        "TIMESTAMP",
    );
    let (set, migration) = resolve(&def, &source(), &target).unwrap();

    assert!(!migration.create_table);
    assert_eq!(migration.added, vec![Column::new("email", "VARCHAR")]);
    assert_eq!(migration.retained, vec!["legacy_code"]);
    assert!(migration.dropped.is_empty());
    assert!(migration.has_column_drift());
    assert_eq!(set.pending_check_columns, vec!["email"]);
    assert!(set.is_pending("EMAIL"));
    assert!(!set.is_pending("id"));
}

#[test]
fn test_type_change_keeps_target_type() {
    let def = definition("strategy: check\ncheck_cols: all");
    let target = snapshot_target(
        &[
            ("id", "BIGINT"),
            ("first_name", "VARCHAR"),
            ("email", "VARCHAR"),
            ("updated_at", "TIMESTAMP"),
        ],
        "TIMESTAMP",
    );
    let (set, migration) = resolve(&def, &source(), &target).unwrap();
    assert_eq!(set.columns[0], Column::new("id", "BIGINT"));
    assert_eq!(migration.type_changes.len(), 1);
    assert_eq!(migration.type_changes[0].source_type, "INTEGER");
    assert!(migration.is_empty());
    assert!(!migration.has_column_drift());
}

#[test]
fn test_target_missing_meta_columns() {
    let def = definition("strategy: check\ncheck_cols: all");
    let target = cols(&[("id", "INTEGER")]);
    let err = resolve(&def, &source(), &target).unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::SchemaDrift);
}

#[test]
fn test_fail_policy_rejects_drift() {
    let def = definition("strategy: check\ncheck_cols: all\non_schema_change: fail");
    let target = snapshot_target(&[("id", "INTEGER"), ("first_name", "VARCHAR")], "TIMESTAMP");
    let (_, migration) = resolve(&def, &source(), &target).unwrap();
    let err = check_policy(&def, &migration).unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::SchemaDrift);
    assert!(err.to_string().contains("email"));
}

#[test]
fn test_fail_policy_allows_first_run() {
    let def = definition("strategy: check\ncheck_cols: all\non_schema_change: fail");
    let (_, migration) = resolve(&def, &source(), &[]).unwrap();
    check_policy(&def, &migration).unwrap();
}

#[test]
fn test_drop_removed_moves_columns() {
    let mut migration = SchemaMigration {
        retained: vec!["a".to_string()],
        ..Default::default()
    };
    migration.drop_removed();
    assert!(migration.retained.is_empty());
    assert_eq!(migration.dropped, vec!["a"]);
    assert!(!migration.is_empty());
}
