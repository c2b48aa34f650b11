//! Plausibility rule engine
//!
//! Every rule is evaluated against the table as loaded. Invalid flags are
//! merged per target field and only then are values replaced with missing,
//! so cross-field rules always compare values from the unmodified record.

use std::collections::HashMap;

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::columns::{
    bool_values, null_out, numeric_values, parse_bool, presence, text_values, with_column,
};
use crate::study::{FieldKind, Rule, Study};

/// Result of evaluating one rule over the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub field: String,
    /// Non-missing values the rule flagged as implausible
    pub invalidated: usize,
    /// Records where a cross-field rule could not be evaluated
    pub skipped: usize,
}

struct RuleEvaluation {
    invalid: Vec<bool>,
    skipped: usize,
}

/// Apply all schema-implied and explicit rules of `study`, returning a new table
pub fn apply_rules(df: &DataFrame, study: &Study) -> Result<(DataFrame, Vec<RuleOutcome>)> {
    let rules = study.all_rules();
    let height = df.height();

    let mut invalid_by_field: HashMap<String, Vec<bool>> = HashMap::new();
    let mut outcomes = Vec::with_capacity(rules.len());

    for rule in &rules {
        let evaluation = evaluate_rule(df, rule, study)?;
        let invalidated = evaluation.invalid.iter().filter(|&&bad| bad).count();
        debug!(
            rule = %rule,
            invalidated,
            skipped = evaluation.skipped,
            "rule evaluated"
        );

        let merged = invalid_by_field
            .entry(rule.target().to_string())
            .or_insert_with(|| vec![false; height]);
        for (flag, bad) in merged.iter_mut().zip(&evaluation.invalid) {
            *flag |= *bad;
        }

        outcomes.push(RuleOutcome {
            rule: rule.to_string(),
            field: rule.target().to_string(),
            invalidated,
            skipped: evaluation.skipped,
        });
    }

    let mut out = df.clone();
    for field in &study.fields {
        if let Some(mask) = invalid_by_field.get(&field.name) {
            if mask.iter().any(|&bad| bad) {
                out = with_column(&out, null_out(df, &field.name, mask)?)?;
            }
        }
    }

    Ok((out, outcomes))
}

fn evaluate_rule(df: &DataFrame, rule: &Rule, study: &Study) -> Result<RuleEvaluation> {
    let mut skipped = 0;

    let invalid: Vec<bool> = match rule {
        Rule::Range { field, min, max } => numeric_values(df, field)?
            .into_iter()
            .map(|v| matches!(v, Some(x) if x < *min || x > *max))
            .collect(),

        Rule::NonNegative { field } => numeric_values(df, field)?
            .into_iter()
            .map(|v| matches!(v, Some(x) if x < 0.0))
            .collect(),

        Rule::AllowedValues { field, values } => {
            let is_boolean = study
                .field(field)
                .map(|f| f.kind == FieldKind::Boolean)
                .unwrap_or(false);
            if is_boolean {
                let allowed: Vec<bool> = values.iter().filter_map(|v| parse_bool(v)).collect();
                bool_values(df, field)?
                    .into_iter()
                    .map(|v| matches!(v, Some(b) if !allowed.contains(&b)))
                    .collect()
            } else {
                text_values(df, field)?
                    .into_iter()
                    .map(|v| match v {
                        Some(s) => !values.contains(&s),
                        None => false,
                    })
                    .collect()
            }
        }

        Rule::NotGreaterThan { field, reference } => {
            let values = numeric_values(df, field)?;
            let references = numeric_values(df, reference)?;
            values
                .into_iter()
                .zip(references)
                .map(|pair| match pair {
                    (Some(a), Some(b)) => a > b,
                    (Some(_), None) => {
                        skipped += 1;
                        false
                    }
                    (None, _) => false,
                })
                .collect()
        }

        Rule::RequiresFlag {
            field,
            flag,
            expected,
        } => {
            let present = presence(df, field)?;
            let flags = bool_values(df, flag)?;
            present
                .into_iter()
                .zip(flags)
                .map(|pair| match pair {
                    (true, Some(f)) => f != *expected,
                    (true, None) => {
                        skipped += 1;
                        false
                    }
                    (false, _) => false,
                })
                .collect()
        }
    };

    Ok(RuleEvaluation { invalid, skipped })
}
