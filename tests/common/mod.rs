//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use std::path::{Path, PathBuf};
use surveyprep::study::Study;
use tempfile::TempDir;

/// Sleep and mental-health study used by the end-to-end tests
///
/// - `year` + `seqn`: record identity
/// - `age`: key field with plausible range [18, 80]
/// - `phq9`: depression score [0, 27] with refusal codes 77/99
/// - `drinks`: count field, winsorized at p1/p99 and log1p-transformed
pub const SLEEP_STUDY_JSON: &str = r#"{
    "name": "sleep_mental_health",
    "description": "Sleep duration and depressive symptoms",
    "fields": [
        {"name": "year", "kind": "identifier"},
        {"name": "seqn", "kind": "identifier"},
        {"name": "age", "kind": "numeric", "range": [18, 80], "key": true, "label": "Age (years)"},
        {"name": "sleep_hours", "kind": "numeric", "range": [2, 14], "label": "Sleep (hours)"},
        {"name": "phq9", "kind": "numeric", "range": [0, 27], "missing_codes": ["77", "99"]},
        {"name": "drinks", "kind": "numeric", "count": true},
        {"name": "sex", "kind": "categorical", "allowed": ["F", "M"]}
    ],
    "dedup_keys": ["year", "seqn"],
    "winsorize": [{"field": "drinks", "lower": 1, "upper": 99}],
    "completeness": {"required_all": [], "required_any": []},
    "transforms": [
        {"field": "sleep_hours", "transforms": ["z_score", "min_max"]},
        {"field": "drinks", "transforms": ["log1p"]}
    ],
    "correlations": [
        {"x": "sleep_hours", "y": "phq9", "label": "Sleep vs PHQ-9"},
        {"x": "age", "y": "drinks"}
    ]
}"#;

pub fn sleep_study() -> Study {
    Study::from_json_str(SLEEP_STUDY_JSON).unwrap()
}

/// Ten raw records: two exact duplicates (2017/1 and 2019/1) and three
/// out-of-range ages (12, 95, 150).
pub fn create_scenario_a_raw() -> DataFrame {
    df! {
        "year" => ["2017", "2017", "2017", "2017", "2017", "2019", "2019", "2019", "2019", "2019"],
        "seqn" => ["1", "2", "3", "4", "1", "1", "2", "3", "1", "4"],
        "age" => ["30", "45", "12", "61", "30", "25", "95", "150", "25", "52"],
        "sleep_hours" => ["7", "6.5", "8", "5", "7", "9", "7.5", "6", "9", "4"],
        "phq9" => ["3", "10", "2", "77", "3", "1", "8", "4", "1", "15"],
        "drinks" => ["0", "2", "1", "4", "0", "1", "3", "2", "1", "6"],
        "sex" => ["F", "M", "F", "M", "F", "F", "M", "X", "F", "M"],
    }
    .unwrap()
}

/// Raw text table with random numeric columns `x0..x{cols}`
pub fn create_random_raw(rows: usize, cols: usize) -> DataFrame {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let columns: Vec<Column> = (0..cols)
        .map(|i| {
            let values: Vec<Option<String>> = (0..rows)
                .map(|_| {
                    if rng.gen_bool(0.1) {
                        None
                    } else {
                        Some(format!("{:.4}", rng.gen_range(-50.0..150.0)))
                    }
                })
                .collect();
            Column::new(format!("x{}", i).into(), values)
        })
        .collect();

    DataFrame::new(columns).unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Write a study definition next to other test files
pub fn write_study(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("study.json");
    std::fs::write(&path, json).unwrap();
    path
}

pub fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

pub fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::String)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}
