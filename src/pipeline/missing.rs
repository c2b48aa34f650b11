//! Missing value profile of a raw extract

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::pipeline::columns::text_values;
use crate::pipeline::schema::is_na;
use crate::study::{default_na_values, Study};

/// Missing counts for one raw column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingProfile {
    pub column: String,
    /// Declared in the study (when one was given)
    pub declared: bool,
    pub missing: usize,
    pub ratio: f64,
}

/// Analyze missing values of every column of a raw text table.
///
/// A value is missing when it is null, matches one of the NA tokens, or
/// (for declared fields) matches the field's missing codes. Without a study
/// the default NA tokens apply. Results are sorted by ratio, highest first.
pub fn analyze_missing_values(df: &DataFrame, study: Option<&Study>) -> Result<Vec<MissingProfile>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let defaults = default_na_values();
    let na_values = study.map(|s| s.na_values.as_slice()).unwrap_or(&defaults);

    let mut profiles = Vec::with_capacity(df.width());
    for col_name in df.get_column_names() {
        let field = study.and_then(|s| s.field(col_name.as_str()));
        let missing = text_values(df, col_name.as_str())?
            .iter()
            .filter(|v| match v.as_deref().map(str::trim) {
                None => true,
                Some(value) => match field {
                    Some(field) => is_na(value, field, na_values),
                    None => na_values.iter().any(|na| na.eq_ignore_ascii_case(value)),
                },
            })
            .count();

        profiles.push(MissingProfile {
            column: col_name.to_string(),
            declared: field.is_some(),
            missing,
            ratio: missing as f64 / df.height() as f64,
        });
    }

    profiles.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    Ok(profiles)
}

/// Columns whose missing ratio exceeds `threshold`
pub fn columns_above_threshold(profiles: &[MissingProfile], threshold: f64) -> Vec<String> {
    profiles
        .iter()
        .filter(|p| p.ratio > threshold)
        .map(|p| p.column.clone())
        .collect()
}
