//! Column access helpers shared by the pipeline stages
//!
//! Polars nulls are the missing marker. These helpers expose a column as a
//! plain `Vec<Option<T>>` so every stage tests missingness with a match on
//! `None`, and build replacement columns the same way.

use polars::prelude::*;

use crate::error::Result;

/// Numeric values of a column; non-finite values are treated as missing
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?;
    let float_col = column.cast(&DataType::Float64)?;
    let values = float_col
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// Values of any column rendered as text
pub(crate) fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    let string_col = column.cast(&DataType::String)?;
    let values = string_col
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Boolean values; text columns are parsed with [`parse_bool`]
pub(crate) fn bool_values(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    let column = df.column(name)?;
    if column.dtype() == &DataType::Boolean {
        return Ok(column.bool()?.into_iter().collect());
    }
    Ok(text_values(df, name)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_bool))
        .collect())
}

/// Per-row presence flags (`true` = non-missing)
pub(crate) fn presence(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let column = df.column(name)?;
    let mut present: Vec<bool> = column
        .as_materialized_series()
        .is_not_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect();

    // NaN in a float column counts as missing too
    if column.dtype().is_float() {
        for (flag, value) in present.iter_mut().zip(numeric_values(df, name)?) {
            *flag &= value.is_some();
        }
    }
    Ok(present)
}

/// Replace (or append) a column, returning a new table
pub(crate) fn with_column(df: &DataFrame, column: Column) -> Result<DataFrame> {
    let mut out = df.clone();
    out.with_column(column)?;
    Ok(out)
}

/// Keep only rows whose flag is `true`
pub(crate) fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Copy of `column` with flagged rows set to missing
pub(crate) fn null_out(df: &DataFrame, name: &str, invalid: &[bool]) -> Result<Column> {
    let column = df.column(name)?;
    let out_name = column.name().clone();

    let masked = match column.dtype() {
        DataType::Boolean => {
            let values: Vec<Option<bool>> = bool_values(df, name)?
                .into_iter()
                .zip(invalid)
                .map(|(v, &bad)| if bad { None } else { v })
                .collect();
            Column::new(out_name, values)
        }
        dtype if dtype.is_primitive_numeric() => {
            let values: Vec<Option<f64>> = numeric_values(df, name)?
                .into_iter()
                .zip(invalid)
                .map(|(v, &bad)| if bad { None } else { v })
                .collect();
            Column::new(out_name, values)
        }
        _ => {
            let values: Vec<Option<String>> = text_values(df, name)?
                .into_iter()
                .zip(invalid)
                .map(|(v, &bad)| if bad { None } else { v })
                .collect();
            Column::new(out_name, values)
        }
    };
    Ok(masked)
}

/// Lenient boolean parser for survey codings
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}
