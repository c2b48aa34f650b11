//! Pairwise Pearson and Spearman correlation with significance tests

use rayon::prelude::*;
use polars::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::columns::numeric_values;
use crate::pipeline::Stage;
use crate::report::Condition;
use crate::study::CorrelationPair;

/// Smallest listwise sample for which a correlation is reported
pub const MIN_CORRELATION_N: usize = 3;

/// Correlation statistics for one declared pair.
///
/// Every coefficient and p-value is `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub name: String,
    pub x: String,
    pub y: String,
    pub n: usize,
    pub pearson_r: Option<f64>,
    pub pearson_p: Option<f64>,
    pub spearman_rho: Option<f64>,
    pub spearman_p: Option<f64>,
}

impl CorrelationResult {
    fn undefined(pair: &CorrelationPair, n: usize) -> Self {
        Self {
            name: pair.name(),
            x: pair.x.clone(),
            y: pair.y.clone(),
            n,
            pearson_r: None,
            pearson_p: None,
            spearman_rho: None,
            spearman_p: None,
        }
    }
}

/// Pearson correlation using Welford's single-pass algorithm.
///
/// Returns `None` for fewer than two values or when either side has zero
/// variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mut count = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (&a, &b) in x.iter().zip(y) {
        count += 1.0;
        let dx = a - mean_x;
        let dy = b - mean_y;
        mean_x += dx / count;
        mean_y += dy / count;
        var_x += dx * (a - mean_x);
        var_y += dy * (b - mean_y);
        cov_xy += dx * (b - mean_y);
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    let r = cov_xy / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// 1-based ranks where tied values share the mean of their positions
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Two-sided p-value for a correlation coefficient under the t approximation
/// with `n - 2` degrees of freedom.
pub fn t_test_p_value(r: f64, n: usize) -> Option<f64> {
    if n < MIN_CORRELATION_N {
        return None;
    }
    if r.abs() >= 1.0 {
        return Some(0.0);
    }

    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p = 2.0 * dist.sf(t.abs());
    p.is_finite().then(|| p.clamp(0.0, 1.0))
}

/// Complete cases of the two fields, in row order
fn listwise(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter_map(|pair| match pair {
            (Some(a), Some(b)) => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

fn degenerate(pair: &CorrelationPair, detail: &str) -> Condition {
    Condition::DegenerateDistribution {
        stage: Stage::Reported,
        subject: pair.name(),
        detail: detail.to_string(),
    }
}

/// Correlate one declared pair with listwise deletion
pub fn correlate(df: &DataFrame, pair: &CorrelationPair) -> Result<(CorrelationResult, Vec<Condition>)> {
    let (x, y) = listwise(&numeric_values(df, &pair.x)?, &numeric_values(df, &pair.y)?);
    let n = x.len();
    let mut result = CorrelationResult::undefined(pair, n);
    let mut conditions = Vec::new();

    if n < MIN_CORRELATION_N {
        warn!(pair = %pair.name(), n, "too few complete cases for correlation");
        conditions.push(Condition::InsufficientData {
            stage: Stage::Reported,
            subject: pair.name(),
            available: n,
            required: MIN_CORRELATION_N,
        });
        return Ok((result, conditions));
    }

    result.pearson_r = pearson(&x, &y);
    result.pearson_p = result.pearson_r.and_then(|r| t_test_p_value(r, n));
    if result.pearson_r.is_none() {
        warn!(pair = %pair.name(), "constant column, pearson undefined");
        conditions.push(degenerate(pair, "zero variance; pearson undefined"));
    }

    result.spearman_rho = pearson(&average_ranks(&x), &average_ranks(&y));
    result.spearman_p = result.spearman_rho.and_then(|rho| t_test_p_value(rho, n));
    if result.spearman_rho.is_none() {
        warn!(pair = %pair.name(), "zero rank variance, spearman undefined");
        conditions.push(degenerate(pair, "zero rank variance; spearman undefined"));
    }

    debug!(
        pair = %pair.name(),
        n,
        pearson_r = ?result.pearson_r,
        spearman_rho = ?result.spearman_rho,
        "correlated"
    );
    Ok((result, conditions))
}

/// Correlate all pairs in parallel; results keep declaration order
pub fn correlate_all(
    df: &DataFrame,
    pairs: &[CorrelationPair],
) -> Result<(Vec<CorrelationResult>, Vec<Condition>)> {
    let computed = pairs
        .par_iter()
        .map(|pair| correlate(df, pair))
        .collect::<Result<Vec<_>>>()?;

    let mut results = Vec::with_capacity(computed.len());
    let mut conditions = Vec::new();
    for (result, mut pair_conditions) in computed {
        results.push(result);
        conditions.append(&mut pair_conditions);
    }
    Ok((results, conditions))
}
