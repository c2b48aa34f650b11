//! Integration tests for the correlator

use polars::prelude::*;
use rand::Rng;
use surveyprep::pipeline::{correlate, correlate_all, MIN_CORRELATION_N};
use surveyprep::report::Condition;
use surveyprep::study::CorrelationPair;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_two_overlapping_rows_is_undefined() {
    let df = df! {
        "a" => [Some(1.0f64), Some(2.0), None, Some(4.0)],
        "b" => [Some(3.0f64), None, Some(5.0), Some(1.0)],
    }
    .unwrap();

    let (result, conditions) = correlate(&df, &CorrelationPair::new("a", "b")).unwrap();

    assert_eq!(result.n, 2);
    assert_eq!(result.pearson_r, None);
    assert_eq!(result.pearson_p, None);
    assert_eq!(result.spearman_rho, None);
    assert_eq!(result.spearman_p, None);
    assert!(matches!(
        conditions.as_slice(),
        [Condition::InsufficientData { available: 2, required, .. }] if *required == MIN_CORRELATION_N
    ));
}

#[test]
fn test_coefficients_and_p_values_in_range() {
    let raw = create_random_raw(200, 6);
    let df = raw
        .get_columns()
        .iter()
        .map(|c| c.cast(&DataType::Float64))
        .collect::<PolarsResult<Vec<_>>>()
        .and_then(DataFrame::new)
        .unwrap();

    let pairs: Vec<CorrelationPair> = (0..5)
        .map(|i| CorrelationPair::new(format!("x{}", i), format!("x{}", i + 1)))
        .collect();
    let (results, conditions) = correlate_all(&df, &pairs).unwrap();

    assert!(conditions.is_empty());
    assert_eq!(results.len(), pairs.len());
    for (result, pair) in results.iter().zip(&pairs) {
        assert_eq!(result.x, pair.x);
        assert_eq!(result.y, pair.y);

        let x = floats(&df, &pair.x);
        let y = floats(&df, &pair.y);
        let complete = x.iter().zip(&y).filter(|(a, b)| a.is_some() && b.is_some()).count();
        assert_eq!(result.n, complete);

        for coefficient in [result.pearson_r, result.spearman_rho] {
            let c = coefficient.unwrap();
            assert!((-1.0..=1.0).contains(&c));
        }
        for p in [result.pearson_p, result.spearman_p] {
            let p = p.unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }
}

#[test]
fn test_monotonic_nonlinear_relation() {
    let mut rng = rand::thread_rng();
    let x: Vec<f64> = (0..60).map(|_| rng.gen_range(0.0..5.0)).collect();
    let y: Vec<f64> = x.iter().map(|v| v.exp()).collect();
    let df = DataFrame::new(vec![
        Column::new("x".into(), x),
        Column::new("y".into(), y),
    ])
    .unwrap();

    let (result, _) = correlate(&df, &CorrelationPair::new("x", "y")).unwrap();

    assert!((result.spearman_rho.unwrap() - 1.0).abs() < 1e-9);
    assert!(result.pearson_r.unwrap() < result.spearman_rho.unwrap());
    assert!(result.spearman_p.unwrap() < 1e-6);
}

#[test]
fn test_constant_column_reports_degenerate() {
    let df = df! {
        "x" => [1.0f64, 2.0, 3.0, 4.0],
        "y" => [5.0f64, 5.0, 5.0, 5.0],
    }
    .unwrap();

    let (result, conditions) = correlate(&df, &CorrelationPair::new("x", "y")).unwrap();

    assert_eq!(result.n, 4);
    assert!(result.pearson_r.is_none());
    assert!(conditions
        .iter()
        .all(|c| matches!(c, Condition::DegenerateDistribution { .. })));
    assert!(!conditions.is_empty());
}
