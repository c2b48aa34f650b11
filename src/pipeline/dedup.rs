//! Record deduplication on a declared identity key

use std::collections::HashSet;

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::pipeline::columns::{filter_rows, text_values};

/// What the deduplicator did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupOutcome {
    pub keys: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    /// Key columns not present in the table; non-empty means the stage was skipped
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub absent_keys: Vec<String>,
}

impl DedupOutcome {
    pub fn removed(&self) -> usize {
        self.rows_before - self.rows_after
    }

    pub fn applied(&self) -> bool {
        !self.keys.is_empty() && self.absent_keys.is_empty()
    }
}

/// Keep the first record for every fully present key tuple.
///
/// Records with a missing key component are never treated as duplicates.
/// When no keys are declared or a key column is absent, the table is
/// returned unchanged.
pub fn deduplicate(df: &DataFrame, keys: &[String]) -> Result<(DataFrame, DedupOutcome)> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let absent_keys: Vec<String> = keys
        .iter()
        .filter(|k| !present.contains(k))
        .cloned()
        .collect();

    let mut outcome = DedupOutcome {
        keys: keys.to_vec(),
        rows_before: df.height(),
        rows_after: df.height(),
        absent_keys,
    };

    if !outcome.applied() {
        return Ok((df.clone(), outcome));
    }

    let key_columns = keys
        .iter()
        .map(|k| text_values(df, k))
        .collect::<Result<Vec<_>>>()?;

    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(df.height());
    let keep: Vec<bool> = (0..df.height())
        .map(|row| {
            let key: Option<Vec<String>> = key_columns.iter().map(|col| col[row].clone()).collect();
            match key {
                Some(key) => seen.insert(key),
                None => true,
            }
        })
        .collect();

    let out = filter_rows(df, &keep)?;
    outcome.rows_after = out.height();
    Ok((out, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_keeps_first_occurrence() {
        let df = df! {
            "year" => ["2017", "2017", "2019", "2017"],
            "seqn" => ["1", "2", "1", "1"],
            "score" => [10.0f64, 20.0, 30.0, 99.0],
        }
        .unwrap();

        let (out, outcome) = deduplicate(&df, &keys(&["year", "seqn"])).unwrap();

        assert_eq!(out.height(), 3);
        assert_eq!(outcome.removed(), 1);
        let scores: Vec<Option<f64>> = out.column("score").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(scores, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn test_missing_key_component_is_unique() {
        let df = df! {
            "seqn" => [None, None, Some("7"), Some("7")],
        }
        .unwrap();

        let (out, outcome) = deduplicate(&df, &keys(&["seqn"])).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(outcome.removed(), 1);
    }

    #[test]
    fn test_absent_key_column_is_noop() {
        let df = df! { "seqn" => ["1", "1"] }.unwrap();

        let (out, outcome) = deduplicate(&df, &keys(&["year", "seqn"])).unwrap();
        assert_eq!(out.height(), 2);
        assert!(!outcome.applied());
        assert_eq!(outcome.absent_keys, vec!["year"]);
    }

    #[test]
    fn test_no_keys_is_noop() {
        let df = df! { "a" => [1i32, 1] }.unwrap();
        let (out, outcome) = deduplicate(&df, &[]).unwrap();
        assert_eq!(out.height(), 2);
        assert!(!outcome.applied());
    }
}
