//! Integration tests for the winsorizer

use polars::prelude::*;
use rand::Rng;
use surveyprep::pipeline::{percentile, winsorize};
use surveyprep::study::WinsorizeSpec;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn spec(lower: f64, upper: f64) -> WinsorizeSpec {
    WinsorizeSpec {
        field: "x".to_string(),
        lower,
        upper,
    }
}

#[test]
fn test_extreme_value_clipped_not_removed() {
    let df = df! { "x" => [1.0f64, 2.0, 3.0, 4.0, 100.0] }.unwrap();

    let (out, outcome) = winsorize(&df, &spec(1.0, 99.0)).unwrap();

    assert_eq!(out.height(), 5);
    let values: Vec<f64> = floats(&out, "x").into_iter().flatten().collect();
    assert!(values[4] < 100.0);
    assert!((values[4] - 96.16).abs() < 1e-9);
    assert_eq!(outcome.upper_bound, Some(values[4]));
}

#[test]
fn test_values_within_original_percentiles_and_bounds_stable() {
    let mut rng = rand::thread_rng();
    let values: Vec<Option<f64>> = (0..200)
        .map(|_| {
            if rng.gen_bool(0.05) {
                None
            } else {
                Some(rng.gen_range(-100.0..100.0) * rng.gen_range(0.0..5.0f64).exp())
            }
        })
        .collect();
    let df = DataFrame::new(vec![Column::new("x".into(), values.clone())]).unwrap();

    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let lo = percentile(&sorted, 5.0).unwrap();
    let hi = percentile(&sorted, 95.0).unwrap();

    let (once, first) = winsorize(&df, &spec(5.0, 95.0)).unwrap();
    for v in floats(&once, "x").into_iter().flatten() {
        assert!(v >= lo && v <= hi);
    }
    assert_eq!(once.column("x").unwrap().null_count(), df.column("x").unwrap().null_count());

    // Applying the same bounds again leaves the column unchanged
    let (_, second) = winsorize(&once, &spec(5.0, 95.0)).unwrap();
    let second_lo = second.lower_bound.unwrap();
    let second_hi = second.upper_bound.unwrap();
    assert!(second_lo >= first.lower_bound.unwrap() - 1e-9);
    assert!(second_hi <= first.upper_bound.unwrap() + 1e-9);
    let (clamped, low, high) = surveyprep::pipeline::clamp_to_bounds(
        &floats(&once, "x"),
        first.lower_bound.unwrap(),
        first.upper_bound.unwrap(),
    );
    assert_eq!(clamped, floats(&once, "x"));
    assert_eq!((low, high), (0, 0));
}

#[test]
fn test_single_value_is_skipped() {
    let df = df! { "x" => [Some(5.0f64), None] }.unwrap();
    let (out, outcome) = winsorize(&df, &spec(1.0, 99.0)).unwrap();
    assert!(outcome.skipped());
    assert!(out.equals_missing(&df));
}
