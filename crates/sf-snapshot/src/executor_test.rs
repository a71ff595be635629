use super::*;
use chrono::NaiveDate;
use sf_db::DuckDbBackend;

fn at(hour: u32) -> RunTimestamp {
    RunTimestamp::from_naive(
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap(),
    )
}

fn config(yaml: &str) -> SnapshotConfig {
    serde_yaml::from_str(yaml).unwrap()
}

fn orders_config() -> SnapshotConfig {
    config(
        "name: orders_snapshot\nsource: orders\nunique_key: id\nstrategy: timestamp\nupdated_at: updated_at\n",
    )
}

async fn setup(options: ExecutorOptions) -> (Arc<DuckDbBackend>, SnapshotExecutor) {
    let db = Arc::new(DuckDbBackend::in_memory().unwrap());
    db.execute_batch(
        "CREATE TABLE orders (id INTEGER, status VARCHAR, updated_at TIMESTAMP);
         INSERT INTO orders VALUES
           (1, 'open', TIMESTAMP '2024-01-01 00:00:00'),
           (2, 'open', TIMESTAMP '2024-01-01 00:00:00');",
    )
    .await
    .unwrap();
    let executor = SnapshotExecutor::new(db.clone(), options);
    (db, executor)
}

#[tokio::test]
async fn test_first_run_report() {
    let (db, executor) = setup(ExecutorOptions::default()).await;
    let def = orders_config().resolve(&SnapshotDefaults::default()).unwrap();

    let report = executor.execute_with(&def, || at(9)).await.unwrap();

    assert_eq!(report.run_at, at(9));
    assert_eq!(report.new, 2);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.rows_invalidated, 0);
    assert!(report.applied);
    assert!(report.statements[0].starts_with("CREATE TABLE"));
    assert_eq!(
        db.query_count("SELECT * FROM orders_snapshot").await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_dry_run_renders_without_writing() {
    let (db, executor) = setup(ExecutorOptions {
        dry_run: true,
        ..Default::default()
    })
    .await;
    let def = orders_config().resolve(&SnapshotDefaults::default()).unwrap();

    let report = executor.execute_with(&def, || at(9)).await.unwrap();

    assert!(!report.applied);
    assert_eq!(report.rows_inserted, 2);
    assert!(!report.statements.is_empty());
    assert!(!db.relation_exists("orders_snapshot").await.unwrap());
}

#[tokio::test]
async fn test_run_reports_config_error_with_target() {
    let (_db, executor) = setup(ExecutorOptions::default()).await;
    let bad = config("name: broken\nsource: orders\nstrategy: timestamp\nupdated_at: updated_at\n");
    let defaults = SnapshotDefaults {
        target_schema: Some("snaps".to_string()),
        ..Default::default()
    };

    let result = executor.run(&bad, &defaults).await;

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::Config));
    assert_eq!(result.target, "snaps.broken");
    assert!(result.run_at.is_none());
}

#[tokio::test]
async fn test_missing_source_is_execution_error() {
    let (db, executor) = setup(ExecutorOptions::default()).await;
    let def = config("name: ghost_snapshot\nsource: ghost\nunique_key: id\nstrategy: check\ncheck_cols: all\n")
        .resolve(&SnapshotDefaults::default())
        .unwrap();

    let err = executor.execute_with(&def, || at(9)).await.unwrap_err();

    assert!(matches!(err, SnapshotError::SourceNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(!db.relation_exists("ghost_snapshot").await.unwrap());
}

#[tokio::test]
async fn test_cancelled_run_is_skipped() {
    let (db, executor) = setup(ExecutorOptions::default()).await;
    executor.cancel_flag().cancel();

    let result = executor
        .run(&orders_config(), &SnapshotDefaults::default())
        .await;

    assert_eq!(result.status, RunStatus::Skipped);
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert!(!db.relation_exists("orders_snapshot").await.unwrap());
}

#[tokio::test]
async fn test_run_all_keeps_input_order() {
    let (_db, executor) = setup(ExecutorOptions {
        threads: 2,
        dry_run: false,
    })
    .await;
    let configs = vec![
        config("name: a_snapshot\nsource: orders\nunique_key: id\nstrategy: check\ncheck_cols: [status]\n"),
        config("name: b_snapshot\nsource: missing\nunique_key: id\nstrategy: check\ncheck_cols: all\n"),
        orders_config(),
    ];

    let summary = executor
        .run_all(&configs, &SnapshotDefaults::default())
        .await;

    let names: Vec<&str> = summary.results.iter().map(|r| r.snapshot.as_str()).collect();
    assert_eq!(names, vec!["a_snapshot", "b_snapshot", "orders_snapshot"]);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.skipped_count, 0);
    assert!(summary.has_failures());
}

#[test]
fn test_result_serializes_status_and_kind() {
    let err = SnapshotError::SchemaDrift {
        snapshot: "s".to_string(),
        message: "column 'x' removed".to_string(),
    };
    let result = SnapshotRunResult::failed("s", "s".to_string(), &err, Instant::now());
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["status"], "error");
    assert_eq!(json["error_kind"], "schema_drift");
    assert!(json.get("statements").is_none());
}
