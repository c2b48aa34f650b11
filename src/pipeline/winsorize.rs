//! Percentile-based winsorization of numeric columns

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::columns::{numeric_values, with_column};
use crate::study::WinsorizeSpec;

/// Bounds used and values clipped for one field.
///
/// `lower_bound`/`upper_bound` are `None` when the stage was skipped for lack
/// of data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinsorizeOutcome {
    pub field: String,
    pub lower_pct: f64,
    pub upper_pct: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub clipped_low: usize,
    pub clipped_high: usize,
    pub non_missing: usize,
}

impl WinsorizeOutcome {
    pub fn skipped(&self) -> bool {
        self.lower_bound.is_none() || self.upper_bound.is_none()
    }
}

/// Minimum number of non-missing values needed to define percentiles
pub const MIN_WINSORIZE_VALUES: usize = 2;

/// Percentile of sorted data with linear interpolation between order statistics.
///
/// `pct` is in `[0, 100]`; the position is `(n - 1) * pct / 100`.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let h = (n - 1) as f64 * pct.clamp(0.0, 100.0) / 100.0;
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
        }
    }
}

/// Clamp non-missing values to `[lower, upper]`, counting low and high clips
pub fn clamp_to_bounds(
    values: &[Option<f64>],
    lower: f64,
    upper: f64,
) -> (Vec<Option<f64>>, usize, usize) {
    let mut clipped_low = 0;
    let mut clipped_high = 0;
    let clamped = values
        .iter()
        .map(|v| {
            v.map(|x| {
                if x < lower {
                    clipped_low += 1;
                    lower
                } else if x > upper {
                    clipped_high += 1;
                    upper
                } else {
                    x
                }
            })
        })
        .collect();
    (clamped, clipped_low, clipped_high)
}

/// Winsorize one column at the percentiles in `spec`.
///
/// Bounds are recomputed from the column on every call. Clamping the output
/// again with the returned `lower_bound`/`upper_bound` (see
/// [`clamp_to_bounds`]) changes nothing, but a second `winsorize` call derives
/// new, possibly narrower, bounds from the already clipped values and may move
/// them further.
pub fn winsorize(df: &DataFrame, spec: &WinsorizeSpec) -> Result<(DataFrame, WinsorizeOutcome)> {
    let values = numeric_values(df, &spec.field)?;

    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut outcome = WinsorizeOutcome {
        field: spec.field.clone(),
        lower_pct: spec.lower,
        upper_pct: spec.upper,
        lower_bound: None,
        upper_bound: None,
        clipped_low: 0,
        clipped_high: 0,
        non_missing: sorted.len(),
    };

    if sorted.len() < MIN_WINSORIZE_VALUES {
        debug!(field = %spec.field, non_missing = sorted.len(), "winsorization skipped");
        return Ok((df.clone(), outcome));
    }

    let (Some(lower), Some(upper)) = (percentile(&sorted, spec.lower), percentile(&sorted, spec.upper)) else {
        return Ok((df.clone(), outcome));
    };

    let (clamped, clipped_low, clipped_high) = clamp_to_bounds(&values, lower, upper);
    outcome.lower_bound = Some(lower);
    outcome.upper_bound = Some(upper);
    outcome.clipped_low = clipped_low;
    outcome.clipped_high = clipped_high;

    debug!(
        field = %spec.field,
        lower,
        upper,
        clipped_low,
        clipped_high,
        "winsorized"
    );

    let out = with_column(df, Column::new(spec.field.as_str().into(), clamped))?;
    Ok((out, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(field: &str, lower: f64, upper: f64) -> WinsorizeSpec {
        WinsorizeSpec {
            field: field.to_string(),
            lower,
            upper,
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(percentile(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile(&sorted, 50.0), Some(3.0));
        assert_eq!(percentile(&sorted, 100.0), Some(100.0));
        // h = 4 * 0.99 = 3.96 -> 4 + 0.96 * 96
        assert!((percentile(&sorted, 99.0).unwrap() - 96.16).abs() < 1e-9);
        // h = 0.04 -> 1 + 0.04 * 1
        assert!((percentile(&sorted, 1.0).unwrap() - 1.04).abs() < 1e-9);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_clips_extreme_value_without_dropping_row() {
        let df = df! { "drinks" => [1.0f64, 2.0, 3.0, 4.0, 100.0] }.unwrap();

        let (out, outcome) = winsorize(&df, &spec("drinks", 1.0, 99.0)).unwrap();

        assert_eq!(out.height(), 5);
        let values: Vec<f64> = out.column("drinks").unwrap().f64().unwrap().into_iter().flatten().collect();
        assert!((values[4] - 96.16).abs() < 1e-9);
        assert!((values[0] - 1.04).abs() < 1e-9);
        assert_eq!(outcome.clipped_high, 1);
        assert_eq!(outcome.clipped_low, 1);
    }

    #[test]
    fn test_missing_values_untouched() {
        let df = df! { "x" => [Some(1.0f64), None, Some(50.0), Some(3.0)] }.unwrap();
        let (out, _) = winsorize(&df, &spec("x", 5.0, 95.0)).unwrap();
        assert_eq!(out.column("x").unwrap().null_count(), 1);
        let second = out.column("x").unwrap().f64().unwrap().get(1);
        assert_eq!(second, None);
    }

    #[test]
    fn test_insufficient_data_is_noop() {
        let df = df! { "x" => [Some(7.0f64), None, None] }.unwrap();
        let (out, outcome) = winsorize(&df, &spec("x", 1.0, 99.0)).unwrap();
        assert!(outcome.skipped());
        assert_eq!(outcome.non_missing, 1);
        assert!(out.equals_missing(&df));
    }

    #[test]
    fn test_reapplying_bounds_is_idempotent() {
        let values = vec![Some(-40.0), Some(2.0), None, Some(5.0), Some(300.0)];
        let (once, _, _) = clamp_to_bounds(&values, 0.0, 10.0);
        let (twice, low, high) = clamp_to_bounds(&once, 0.0, 10.0);
        assert_eq!(once, twice);
        assert_eq!((low, high), (0, 0));
    }

    #[test]
    fn test_second_winsorize_recomputes_bounds() {
        let df = df! { "drinks" => [1.0f64, 2.0, 3.0, 4.0, 100.0] }.unwrap();
        let (once, first) = winsorize(&df, &spec("drinks", 1.0, 99.0)).unwrap();
        let (twice, second) = winsorize(&once, &spec("drinks", 1.0, 99.0)).unwrap();

        let (first_lo, first_hi) = (first.lower_bound.unwrap(), first.upper_bound.unwrap());
        assert!(second.upper_bound.unwrap() < first_hi);
        assert!(second.lower_bound.unwrap() >= first_lo);
        for v in twice.column("drinks").unwrap().f64().unwrap().into_iter().flatten() {
            assert!(v >= first_lo && v <= first_hi);
        }
        // Re-clamping with the first bounds is what leaves the column unchanged
        let once_values: Vec<Option<f64>> = once.column("drinks").unwrap().f64().unwrap().into_iter().collect();
        let (reclamped, _, _) = clamp_to_bounds(&once_values, first_lo, first_hi);
        assert_eq!(reclamped, once_values);
    }
}
