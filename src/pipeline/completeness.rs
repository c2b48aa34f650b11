//! Completeness filtering on required fields

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::pipeline::columns::{filter_rows, presence};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub required_all: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_any: Vec<Vec<String>>,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl FilterOutcome {
    pub fn removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// Keep records where every `required_all` field is present and every
/// `required_any` group has at least one present field.
pub fn filter_complete(
    df: &DataFrame,
    required_all: &[String],
    required_any: &[Vec<String>],
) -> Result<(DataFrame, FilterOutcome)> {
    let mut keep = vec![true; df.height()];

    for name in required_all {
        for (flag, present) in keep.iter_mut().zip(presence(df, name)?) {
            *flag &= present;
        }
    }

    for group in required_any {
        let mut any_present = vec![false; df.height()];
        for name in group {
            for (flag, present) in any_present.iter_mut().zip(presence(df, name)?) {
                *flag |= present;
            }
        }
        for (flag, present) in keep.iter_mut().zip(any_present) {
            *flag &= present;
        }
    }

    let out = filter_rows(df, &keep)?;
    let outcome = FilterOutcome {
        required_all: required_all.to_vec(),
        required_any: required_any.to_vec(),
        rows_before: df.height(),
        rows_after: out.height(),
    };
    Ok((out, outcome))
}
