//! Dataset loading and saving for CSV and Parquet files
//!
//! Raw extracts are read with every column as text. Typing happens later,
//! against the study schema, so inference never rewrites a survey code.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::error::PipelineError;

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a raw extract (CSV or Parquet based on extension) with all columns as text
pub fn load_raw_table(path: &Path) -> Result<DataFrame> {
    let extension = file_extension(path);

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => return Err(PipelineError::UnsupportedFormat(extension).into()),
    };

    let df = lf
        .collect()
        .with_context(|| format!("Failed to read rows from {}", path.display()))?;

    let text_columns = df
        .get_columns()
        .iter()
        .map(|col| col.cast(&DataType::String))
        .collect::<PolarsResult<Vec<Column>>>()?;

    Ok(DataFrame::new(text_columns)?)
}

/// Rows, columns and estimated memory (MB) of a loaded table
pub fn dataset_stats(df: &DataFrame) -> (usize, usize, f64) {
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    (rows, cols, memory_mb)
}

/// Turn a raw header into a lower-case identifier made of `[a-z0-9_]`
pub fn safe_column_name(raw: &str) -> String {
    let spaced: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if matches!(ch, '/' | '-' | '.') { ' ' } else { ch })
        .collect();

    let mut safe = String::with_capacity(spaced.len());
    for ch in spaced.chars() {
        let next = if ch.is_alphanumeric() { ch } else { '_' };
        if next == '_' && safe.ends_with('_') {
            continue;
        }
        safe.push(next);
    }

    let trimmed = safe.trim_matches('_');
    if trimmed.is_empty() {
        "col".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Rename every column with [`safe_column_name`]; collisions get `_2`, `_3`, ...
pub fn normalize_headers(df: &DataFrame) -> crate::error::Result<DataFrame> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let base = safe_column_name(col.name());
        let mut name = base.clone();
        let mut suffix = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        taken.insert(name.clone());
        columns.push(col.clone().with_name(name.into()));
    }

    Ok(DataFrame::new(columns)?)
}

/// Save dataset to file (CSV or Parquet based on extension)
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = file_extension(path);

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => return Err(PipelineError::UnsupportedFormat(extension).into()),
    }

    Ok(())
}
