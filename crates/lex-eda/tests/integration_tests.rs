//! Integration tests for loading, analysis and preprocessing.
//!
//! These tests exercise the public API end to end against the CSV files in
//! `tests/fixtures`.

use lex_eda::analysis::{
    Frequency, TrendDirection, analyze_correlation, analyze_timeseries, detect_datetime_columns,
};
use lex_eda::preprocessing::{DuplicateKeep, MissingValueMethod, Operation, OperationKind};
use lex_eda::reporting::{export_history_report, export_table_csv};
use lex_eda::{
    AppConfig, CorrelationMethod, DataProfiler, Delimiter, EdaError, SemanticType, Session,
    load_file,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lex-eda-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

fn session_with(fixture: &str) -> Session {
    let mut session = Session::new();
    session
        .load_file(fixtures_path().join(fixture), &AppConfig::default())
        .expect("Failed to load fixture");
    session
}

fn f64_values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    df.column(column)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_people_csv() {
    let table = load_file(fixtures_path().join("people.csv"), &AppConfig::default()).unwrap();
    assert_eq!(table.delimiter, Some(Delimiter::Comma));
    assert_eq!(table.df.shape(), (10, 5));
    assert_eq!(table.df.column("age").unwrap().null_count(), 2);

    let city = table.inferences.iter().find(|i| i.column == "city").unwrap();
    assert_eq!(city.semantic_type, SemanticType::Categorical);
    let name = table.inferences.iter().find(|i| i.column == "name").unwrap();
    assert_eq!(name.semantic_type, SemanticType::Text);
}

#[test]
fn test_load_semicolon_csv() {
    let table = load_file(fixtures_path().join("semicolon.csv"), &AppConfig::default()).unwrap();
    assert_eq!(table.delimiter, Some(Delimiter::Semicolon));
    assert_eq!(table.df.get_column_names_str(), vec!["product", "price", "qty"]);
    assert_eq!(table.df.column("price").unwrap().dtype(), &DataType::Float64);
}

#[test]
fn test_load_latin1_csv() {
    let table = load_file(fixtures_path().join("latin1.csv"), &AppConfig::default()).unwrap();
    let cities: Vec<Option<String>> = table
        .df
        .column("ville")
        .unwrap()
        .cast(&DataType::String)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    assert_eq!(cities[0].as_deref(), Some("Zürich"));
    assert_eq!(cities[1].as_deref(), Some("Genève"));
    assert_ne!(table.encoding.unwrap().name, "utf-8");
}

#[test]
fn test_load_rejects_unsupported_extension() {
    let err = load_file(fixtures_path().join("people.json"), &AppConfig::default()).unwrap_err();
    assert!(matches!(err, EdaError::UnsupportedExtension(_)));
    assert!(err.is_ingestion_error());
}

#[test]
fn test_config_falls_back_on_invalid_yaml() {
    let dir = scratch_dir("config");
    let path = dir.join("broken.yaml");
    std::fs::write(&path, "general: [not, a, mapping\n").unwrap();
    assert_eq!(AppConfig::load(&path), AppConfig::default());
}

// ============================================================================
// Profiling & Analysis
// ============================================================================

#[test]
fn test_profile_people() {
    let session = session_with("people.csv");
    let profile = DataProfiler::profile(session.current().unwrap()).unwrap();
    assert_eq!(profile.shape.rows, 10);
    assert_eq!(profile.missing.total_missing, 2);
    assert_eq!(profile.missing.per_column[0].column, "age");
    assert_eq!(profile.duplicates.duplicate_count, 0);
}

#[test]
fn test_correlation_people() {
    let session = session_with("people.csv");
    let analysis =
        analyze_correlation(session.current().unwrap(), CorrelationMethod::Pearson, 0.5).unwrap();
    assert!(analysis.columns.contains(&"age".to_string()));
    assert!(analysis.columns.contains(&"income".to_string()));
    // Rows with a missing age are excluded listwise.
    assert_eq!(analysis.rows_used, 8);
    for (idx, row) in analysis.matrix.iter().enumerate() {
        assert!((row[idx] - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_correlation_needs_two_numeric_columns() {
    let mut session = Session::new();
    session.load_table(
        df!["x" => [1.0, 2.0, 3.0], "label" => ["a", "b", "c"]].unwrap(),
        "memory",
    );
    let err = analyze_correlation(session.current().unwrap(), CorrelationMethod::Pearson, 0.5)
        .unwrap_err();
    assert!(matches!(err, EdaError::InsufficientColumns { .. }));
}

#[test]
fn test_timeseries_sales() {
    let session = session_with("sales.csv");
    let df = session.current().unwrap();
    assert_eq!(detect_datetime_columns(df), vec!["month".to_string()]);

    let config = AppConfig::default();
    let analysis = analyze_timeseries(df, "month", "sales", &config).unwrap();
    assert_eq!(analysis.observations, 24);
    assert_eq!(analysis.frequency, Frequency::Monthly);
    assert_eq!(analysis.trend.direction, TrendDirection::Increasing);

    let forecast = analysis.forecast.expect("24 points are enough to forecast");
    let periods = config.timeseries.forecast_periods;
    assert_eq!(forecast.points.len(), 24 + periods);
    assert!(forecast.points[..24].iter().all(|p| !p.is_prediction));
    assert!(forecast.points[24..].iter().all(|p| p.is_prediction));
    assert_eq!(analysis.periodicity.monthly.len(), 12);
}

// ============================================================================
// Preprocessing
// ============================================================================

#[test]
fn test_mean_imputation_on_people() {
    let mut session = session_with("people.csv");
    let before = f64_values(session.current().unwrap(), "age");

    let record = session
        .apply(&Operation::HandleMissing {
            column: "age".to_string(),
            method: MissingValueMethod::Mean,
        })
        .unwrap();

    let after = f64_values(session.current().unwrap(), "age");
    assert!(after.iter().all(Option::is_some));
    for (old, new) in before.iter().zip(&after) {
        if old.is_some() {
            assert_eq!(old, new);
        }
    }
    match record.kind {
        OperationKind::MissingValueHandling {
            processed_count, ..
        } => assert_eq!(processed_count, 2),
        other => panic!("unexpected record {other:?}"),
    }
}

#[test]
fn test_history_undo_and_reset() {
    let mut session = session_with("people.csv");
    let original = session.current().unwrap().clone();

    let operations = [
        Operation::HandleMissing {
            column: "age".to_string(),
            method: MissingValueMethod::Median,
        },
        Operation::RemoveDuplicates {
            keep: DuplicateKeep::First,
        },
        Operation::HandleMissing {
            column: "city".to_string(),
            method: MissingValueMethod::Mode,
        },
    ];
    let mut snapshots = vec![original.clone()];
    for operation in &operations {
        session.apply(operation).unwrap();
        snapshots.push(session.current().unwrap().clone());
    }
    assert_eq!(session.history().unwrap().len(), operations.len() + 1);

    session.undo().unwrap();
    assert_eq!(session.history().unwrap().len(), operations.len());
    assert!(session.current().unwrap().equals_missing(&snapshots[2]));

    session.reset().unwrap();
    assert!(session.current().unwrap().equals_missing(&original));
}

#[test]
fn test_duplicate_removal_is_idempotent() {
    let mut session = Session::new();
    session.load_table(
        df!["a" => [1i64, 1, 2], "b" => ["x", "x", "y"]].unwrap(),
        "memory",
    );
    let dedupe = Operation::RemoveDuplicates {
        keep: DuplicateKeep::First,
    };
    let removed = |kind: OperationKind| match kind {
        OperationKind::DuplicateRemoval { rows_removed, .. } => rows_removed,
        other => panic!("unexpected record {other:?}"),
    };
    assert_eq!(removed(session.apply(&dedupe).unwrap().kind), 1);
    assert_eq!(removed(session.apply(&dedupe).unwrap().kind), 0);
}

#[test]
fn test_duplicates_profile_and_keep_last() {
    let mut session = Session::new();
    session.load_table(
        df![
            "reading" => [0.0f64, 2.5, -0.0, f64::NAN, 2.5, f64::NAN],
            "sensor" => ["a", "b", "a", "c", "b", "c"],
        ]
        .unwrap(),
        "memory",
    );

    let profile = DataProfiler::profile(session.current().unwrap()).unwrap();
    assert_eq!(profile.duplicates.duplicate_count, 3);
    assert_eq!(profile.duplicates.unique_count, 3);

    let record = session
        .apply(&Operation::RemoveDuplicates {
            keep: DuplicateKeep::Last,
        })
        .unwrap();
    match record.kind {
        OperationKind::DuplicateRemoval { rows_removed, .. } => assert_eq!(rows_removed, 3),
        other => panic!("unexpected record {other:?}"),
    }

    // Last occurrences sit at rows 2, 4 and 5 and keep that order.
    let sensors: Vec<String> = session
        .current()
        .unwrap()
        .column("sensor")
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(sensors, vec!["a", "b", "c"]);
    let profile = DataProfiler::profile(session.current().unwrap()).unwrap();
    assert_eq!(profile.duplicates.duplicate_count, 0);
}

#[test]
fn test_exports() {
    let mut session = session_with("people.csv");
    session
        .apply(&Operation::HandleMissing {
            column: "age".to_string(),
            method: MissingValueMethod::DropRows,
        })
        .unwrap();

    let dir = scratch_dir("exports");
    let table_path = dir.join("out/clean.csv");
    export_table_csv(session.current().unwrap(), &table_path).unwrap();
    let text = std::fs::read_to_string(&table_path).unwrap();
    assert!(text.starts_with("id,name,age,city,income\n"));
    assert_eq!(text.lines().count(), 9);

    let report_path = dir.join("history.txt");
    export_history_report(session.history().unwrap(), &report_path).unwrap();
    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("Step 1: missing_value_handling"));
    assert!(report.contains("Rows removed: 2"));
}
