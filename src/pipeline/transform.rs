//! Per-field transforms producing derived columns
//!
//! Each declared (field, transform) pair adds one column named
//! `<field>_<suffix>`; the source field is never modified. Missing inputs map
//! to missing outputs.

use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::pipeline::columns::{numeric_values, with_column};
use crate::pipeline::Stage;
use crate::report::Condition;
use crate::study::{TransformKind, TransformSpec};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformOutcome {
    pub field: String,
    pub transform: TransformKind,
    pub output: String,
    /// Zero variance or zero range; outputs fell back to 0
    pub degenerate: bool,
    /// Inputs outside the transform's domain, mapped to missing
    pub invalid_inputs: usize,
}

/// Result of transforming one column
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedColumn {
    pub values: Vec<Option<f64>>,
    pub degenerate: bool,
    /// `(row, value)` for inputs outside the domain
    pub invalid: Vec<(usize, f64)>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); `None` below two values
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|x| (x - m) * (x - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Apply `f` to every present value. Non-finite inputs or results become
/// missing and are returned as `(row, input)` pairs.
fn map_finite(values: &[Option<f64>], f: impl Fn(f64) -> f64) -> (Vec<Option<f64>>, Vec<(usize, f64)>) {
    let mut invalid = Vec::new();
    let out = values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            let x = (*v)?;
            let y = if x.is_finite() { f(x) } else { f64::NAN };
            if y.is_finite() {
                Some(y)
            } else {
                invalid.push((row, x));
                None
            }
        })
        .collect();
    (out, invalid)
}

fn finite_values(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().filter(|x| x.is_finite()).collect()
}

/// `(x - mean) / sd` over the non-missing values.
///
/// Statistics are computed on values divided by their largest magnitude, so
/// inputs near `f64::MAX` do not overflow. z-scores do not depend on that scale.
pub fn z_score(values: &[Option<f64>]) -> TransformedColumn {
    let present = finite_values(values);
    let magnitude = present.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    let unit = if magnitude > 0.0 { magnitude } else { 1.0 };
    let scaled: Vec<f64> = present.iter().map(|x| x / unit).collect();

    let sd = sample_std(&scaled).filter(|sd| *sd > 0.0);
    let center = if scaled.is_empty() { 0.0 } else { mean(&scaled) };

    let (out, invalid) = map_finite(values, |x| sd.map_or(0.0, |sd| (x / unit - center) / sd));
    TransformedColumn {
        values: out,
        degenerate: !present.is_empty() && sd.is_none(),
        invalid,
    }
}

/// `(x - min) / (max - min)` over the non-missing values.
///
/// Differences are taken on halved values so the range stays finite.
pub fn min_max(values: &[Option<f64>]) -> TransformedColumn {
    let present = finite_values(values);
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let half_range = max / 2.0 - min / 2.0;
    let degenerate = !present.is_empty() && half_range <= 0.0;

    let (out, invalid) = map_finite(values, |x| {
        if degenerate {
            0.0
        } else {
            ((x / 2.0 - min / 2.0) / half_range).clamp(0.0, 1.0)
        }
    });
    TransformedColumn {
        values: out,
        degenerate,
        invalid,
    }
}

/// `ln(1 + x)`; inputs whose result is not finite (x <= -1) become missing
pub fn log1p(values: &[Option<f64>]) -> TransformedColumn {
    let (out, invalid) = map_finite(values, f64::ln_1p);
    TransformedColumn {
        values: out,
        degenerate: false,
        invalid,
    }
}

pub fn transform_values(kind: TransformKind, values: &[Option<f64>]) -> TransformedColumn {
    match kind {
        TransformKind::ZScore => z_score(values),
        TransformKind::MinMax => min_max(values),
        TransformKind::Log1p => log1p(values),
    }
}

/// Apply every declared transform, appending derived columns in declaration order
pub fn apply_transforms(
    df: &DataFrame,
    specs: &[TransformSpec],
) -> Result<(DataFrame, Vec<TransformOutcome>, Vec<Condition>)> {
    let mut out = df.clone();
    let mut outcomes = Vec::new();
    let mut conditions = Vec::new();

    for spec in specs {
        let values = numeric_values(df, &spec.field)?;

        for &kind in &spec.transforms {
            let output = kind.output_name(&spec.field);
            let result = transform_values(kind, &values);

            if result.degenerate {
                warn!(field = %spec.field, transform = %kind, "degenerate distribution, outputs set to 0");
                conditions.push(Condition::DegenerateDistribution {
                    stage: Stage::Transformed,
                    subject: output.clone(),
                    detail: match kind {
                        TransformKind::MinMax => "zero range; outputs set to 0".to_string(),
                        _ => "zero variance; outputs set to 0".to_string(),
                    },
                });
            }
            for &(row, value) in &result.invalid {
                warn!(field = %spec.field, transform = %kind, row, value, "invalid transform input");
                conditions.push(Condition::InvalidTransformInput {
                    field: spec.field.clone(),
                    transform: kind,
                    row,
                    value,
                });
            }

            outcomes.push(TransformOutcome {
                field: spec.field.clone(),
                transform: kind,
                output: output.clone(),
                degenerate: result.degenerate,
                invalid_inputs: result.invalid.len(),
            });
            out = with_column(&out, Column::new(output.as_str().into(), result.values))?;
        }
    }

    Ok((out, outcomes, conditions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(values: &[Option<f64>]) -> (f64, f64) {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        (mean(&present), sample_std(&present).unwrap())
    }

    #[test]
    fn test_z_score_standardizes() {
        let input = vec![Some(2.0), Some(4.0), None, Some(4.0), Some(4.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0)];
        let result = z_score(&input);
        let (m, sd) = stats(&result.values);
        assert!(m.abs() < 1e-12);
        assert!((sd - 1.0).abs() < 1e-12);
        assert_eq!(result.values[2], None);
        assert!(!result.degenerate);
    }

    #[test]
    fn test_z_score_zero_variance() {
        let result = z_score(&[Some(3.0), None, Some(3.0)]);
        assert!(result.degenerate);
        assert_eq!(result.values, vec![Some(0.0), None, Some(0.0)]);
    }

    #[test]
    fn test_min_max_range() {
        let result = min_max(&[Some(10.0), Some(20.0), None, Some(15.0)]);
        assert_eq!(result.values, vec![Some(0.0), Some(1.0), None, Some(0.5)]);
        assert!(!result.degenerate);
    }

    #[test]
    fn test_min_max_degenerate() {
        let result = min_max(&[Some(4.0), Some(4.0)]);
        assert!(result.degenerate);
        assert_eq!(result.values, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_extreme_magnitudes_stay_finite() {
        let result = min_max(&[Some(-1e308), Some(0.0), Some(1e308)]);
        assert_eq!(result.values, vec![Some(0.0), Some(0.5), Some(1.0)]);
        assert!(result.invalid.is_empty());

        let result = z_score(&[Some(-1e308), Some(1e308), Some(1e308)]);
        assert!(!result.degenerate);
        let (m, sd) = stats(&result.values);
        assert!(m.abs() < 1e-12);
        assert!((sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_input_becomes_missing() {
        let result = z_score(&[Some(1.0), Some(2.0), Some(f64::INFINITY), Some(3.0)]);
        assert_eq!(result.values[2], None);
        assert_eq!(result.invalid, vec![(2, f64::INFINITY)]);
        assert!(result.values.iter().flatten().all(|v| v.is_finite()));

        let result = min_max(&[Some(4.0), Some(f64::NEG_INFINITY), Some(4.0)]);
        assert!(result.degenerate);
        assert_eq!(result.values, vec![Some(0.0), None, Some(0.0)]);
        assert_eq!(result.invalid.len(), 1);
    }

    #[test]
    fn test_log1p_domain() {
        let result = log1p(&[Some(0.0), Some(-2.0), None, Some(std::f64::consts::E - 1.0)]);
        assert_eq!(result.values[0], Some(0.0));
        assert_eq!(result.values[1], None);
        assert_eq!(result.values[2], None);
        assert!((result.values[3].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(result.invalid, vec![(1, -2.0)]);
    }

    #[test]
    fn test_apply_transforms_adds_columns_and_keeps_source() {
        let df = df! { "partners" => [Some(0.0f64), Some(3.0), None, Some(-2.0)] }.unwrap();
        let specs = vec![TransformSpec {
            field: "partners".to_string(),
            transforms: vec![TransformKind::Log1p, TransformKind::MinMax],
        }];

        let (out, outcomes, conditions) = apply_transforms(&df, &specs).unwrap();

        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["partners", "partners_log1p", "partners_minmax"]);
        assert!(out.column("partners").unwrap().equals_missing(df.column("partners").unwrap()));
        assert_eq!(outcomes[0].invalid_inputs, 1);
        assert_eq!(
            conditions,
            vec![Condition::InvalidTransformInput {
                field: "partners".to_string(),
                transform: TransformKind::Log1p,
                row: 3,
                value: -2.0,
            }]
        );
    }
}
