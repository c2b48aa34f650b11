//! Integration tests for the full cleaning pipeline

use polars::prelude::*;
use surveyprep::pipeline::*;
use surveyprep::report::{Condition, Treatment};
use surveyprep::study::Study;
use surveyprep::PipelineError;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_scenario_duplicates_and_implausible_ages() {
    let study = sleep_study();
    let outcome = run_study(&study, &create_scenario_a_raw()).unwrap();
    let report = &outcome.report;

    // 10 - 2 duplicates - 3 ages outside [18, 80]
    assert_eq!(outcome.table.height(), 5);
    assert_eq!(report.rows.initial, 10);
    assert_eq!(report.rows.removed_by_dedup, 2);
    assert_eq!(report.rows.removed_by_completeness, 3);
    assert_eq!(report.rows.final_rows, 5);

    let ages: Vec<f64> = floats(&outcome.table, "age").into_iter().flatten().collect();
    assert_eq!(ages, vec![30.0, 45.0, 61.0, 25.0, 52.0]);
    // refusal code read as missing, not as a score of 77
    assert_eq!(floats(&outcome.table, "phq9")[2], None);

    assert_has_columns(
        &outcome.table,
        &["year", "seqn", "sleep_hours_z", "sleep_hours_minmax", "drinks_log1p"],
    );
    assert!(report.is_finalized());
    assert_eq!(report.final_stage(), Stage::Reported);
}

#[test]
fn test_report_stages_chain() {
    let outcome = run_study(&sleep_study(), &create_scenario_a_raw()).unwrap();
    let stages = &outcome.report.stages;

    let visited: Vec<Stage> = stages.iter().map(|e| e.stage).collect();
    assert_eq!(visited, Stage::ALL[1..].to_vec());
    for pair in stages.windows(2) {
        assert_eq!(pair[0].rows_after, pair[1].rows_before);
    }
    assert_eq!(stages[0].rows_before, 10);
    assert_eq!(stages.last().unwrap().rows_after, 5);
}

#[test]
fn test_report_treatments_and_correlations() {
    let outcome = run_study(&sleep_study(), &create_scenario_a_raw()).unwrap();
    let report = &outcome.report;

    assert!(report.treatments.iter().any(|t| matches!(
        t,
        Treatment::Coerced(c) if c.field == "phq9" && c.na_coded == 1
    )));
    assert!(report.treatments.iter().any(|t| matches!(
        t,
        Treatment::RuleApplied(r) if r.field == "age" && r.invalidated == 3
    )));
    assert!(report
        .treatments
        .iter()
        .any(|t| matches!(t, Treatment::Winsorized(w) if w.field == "drinks")));

    assert_eq!(report.correlations.len(), 2);
    let sleep = &report.correlations[0];
    assert_eq!(sleep.name, "Sleep vs PHQ-9");
    assert_eq!(sleep.n, 4);
    assert!(sleep.pearson_r.is_some());
    assert_eq!(report.correlations[1].name, "age ~ drinks");
    assert_eq!(report.correlations[1].n, 5);

    let derived: Vec<&str> = report
        .variables
        .iter()
        .filter(|v| v.derived_from.is_some())
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(derived, vec!["sleep_hours_z", "sleep_hours_minmax", "drinks_log1p"]);
}

#[test]
fn test_too_few_rows_for_correlation_is_a_condition() {
    let study = Study::from_json_str(
        r#"{
            "name": "tiny",
            "fields": [
                {"name": "a", "kind": "numeric"},
                {"name": "b", "kind": "numeric"}
            ],
            "correlations": [{"x": "a", "y": "b"}]
        }"#,
    )
    .unwrap();
    let raw = df! {
        "a" => ["1", "2", "", "4"],
        "b" => ["3", "NA", "5", ""],
    }
    .unwrap();

    let outcome = run_study(&study, &raw).unwrap();
    let result = &outcome.report.correlations[0];

    assert_eq!(result.n, 1);
    assert!(result.pearson_r.is_none());
    assert!(outcome.report.conditions.iter().any(|c| matches!(
        c,
        Condition::InsufficientData { stage: Stage::Reported, available: 1, .. }
    )));
}

#[test]
fn test_missing_declared_field_fails_fast() {
    let raw = create_scenario_a_raw().drop("phq9").unwrap();

    match run_study(&sleep_study(), &raw) {
        Err(PipelineError::SchemaMismatch { missing }) => {
            assert_eq!(missing, vec!["phq9".to_string()])
        }
        other => panic!("expected schema mismatch, got {:?}", other.map(|o| o.table.height())),
    }
}

#[test]
fn test_headers_normalized_before_matching() {
    let study = Study::from_json_str(
        r#"{
            "name": "headers",
            "normalize_headers": true,
            "fields": [
                {"name": "seqn", "kind": "identifier"},
                {"name": "sleep_hours", "kind": "numeric"}
            ]
        }"#,
    )
    .unwrap();
    let raw = df! {
        "SEQN" => ["1", "2"],
        " Sleep Hours " => ["7", "8"],
        "Extra.Column" => ["a", "b"],
    }
    .unwrap();

    let outcome = run_study(&study, &raw).unwrap();

    let columns: Vec<String> = outcome
        .table
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(columns, vec!["seqn", "sleep_hours"]);
    assert_eq!(floats(&outcome.table, "sleep_hours"), vec![Some(7.0), Some(8.0)]);
}

#[test]
fn test_pipeline_does_not_modify_input() {
    let raw = create_scenario_a_raw();
    let snapshot = raw.clone();

    run_study(&sleep_study(), &raw).unwrap();

    assert!(raw.equals_missing(&snapshot));
}
