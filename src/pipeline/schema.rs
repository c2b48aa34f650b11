//! Schema check and typing of a raw table against the study definition

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::pipeline::columns::{parse_bool, text_values};
use crate::pipeline::loader::normalize_headers;
use crate::study::{FieldKind, FieldSchema, Study};

/// How many raw values of a field were read as missing during typing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionOutcome {
    pub field: String,
    /// Values matching an NA token or a field missing code
    pub na_coded: usize,
    /// Values that could not be parsed as the declared kind
    pub unparseable: usize,
}

/// Fail fast when declared fields are absent from the input
pub fn check_schema(df: &DataFrame, study: &Study) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = study
        .field_names()
        .into_iter()
        .filter(|name| !present.iter().any(|p| p == name))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaMismatch { missing })
    }
}

/// Normalize headers (if requested), check the schema and type every declared field.
///
/// The result holds undeclared dedup key columns (as text) followed by the
/// declared fields in declaration order. Other raw columns are dropped.
pub fn prepare_table(raw: &DataFrame, study: &Study) -> Result<(DataFrame, Vec<CoercionOutcome>)> {
    let raw = if study.normalize_headers {
        normalize_headers(raw)?
    } else {
        raw.clone()
    };

    check_schema(&raw, study)?;

    let mut columns: Vec<Column> = Vec::with_capacity(study.fields.len());
    for key in &study.dedup_keys {
        if study.field(key).is_none() {
            if let Ok(col) = raw.column(key) {
                columns.push(col.cast(&DataType::String)?);
            }
        }
    }

    let mut outcomes = Vec::with_capacity(study.fields.len());
    for field in &study.fields {
        let (column, outcome) = coerce_field(&raw, field, &study.na_values)?;
        if outcome.unparseable > 0 {
            debug!(
                "{} value(s) in '{}' could not be read as {}",
                outcome.unparseable, field.name, field.kind
            );
        }
        columns.push(column);
        outcomes.push(outcome);
    }

    Ok((DataFrame::new(columns)?, outcomes))
}

pub(crate) fn is_na(value: &str, field: &FieldSchema, na_values: &[String]) -> bool {
    if na_values.iter().any(|na| na.eq_ignore_ascii_case(value)) {
        return true;
    }
    field.missing_codes.iter().any(|code| {
        code == value
            || (field.kind == FieldKind::Numeric
                && matches!(
                    (code.trim().parse::<f64>(), value.parse::<f64>()),
                    (Ok(a), Ok(b)) if a == b
                ))
    })
}

fn coerce_field(
    raw: &DataFrame,
    field: &FieldSchema,
    na_values: &[String],
) -> Result<(Column, CoercionOutcome)> {
    let mut outcome = CoercionOutcome {
        field: field.name.clone(),
        na_coded: 0,
        unparseable: 0,
    };

    // Trimmed text, with NA tokens and missing codes turned into None
    let cleaned: Vec<Option<String>> = text_values(raw, &field.name)?
        .into_iter()
        .map(|v| {
            let value = v?;
            let trimmed = value.trim();
            if is_na(trimmed, field, na_values) {
                outcome.na_coded += 1;
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect();

    let name: PlSmallStr = field.name.as_str().into();
    let column = match field.kind {
        FieldKind::Numeric => {
            let values: Vec<Option<f64>> = cleaned
                .iter()
                .map(|v| {
                    let text = v.as_deref()?;
                    match text.parse::<f64>() {
                        Ok(x) if x.is_finite() => Some(x),
                        _ => {
                            outcome.unparseable += 1;
                            None
                        }
                    }
                })
                .collect();
            Column::new(name, values)
        }
        FieldKind::Boolean => {
            let values: Vec<Option<bool>> = cleaned
                .iter()
                .map(|v| {
                    let text = v.as_deref()?;
                    let parsed = parse_bool(text);
                    if parsed.is_none() {
                        outcome.unparseable += 1;
                    }
                    parsed
                })
                .collect();
            Column::new(name, values)
        }
        FieldKind::Categorical | FieldKind::Identifier => Column::new(name, cleaned),
    };

    Ok((column, outcome))
}
