//! Stage report: the audit trail of one pipeline run
//!
//! The report is append-only while the pipeline runs. The builder tracks the
//! current `Stage` and records one entry per transition; the finished report
//! carries row counts, treatments, non-fatal conditions and correlation results.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{
    CoercionOutcome, CorrelationResult, DedupOutcome, FilterOutcome, RuleOutcome, Stage,
    TransformOutcome, WinsorizeOutcome,
};
use crate::study::{FieldKind, Study, TransformKind};

/// A non-fatal situation the pipeline handled and reported
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Too few non-missing values to compute a statistic
    InsufficientData {
        stage: Stage,
        subject: String,
        available: usize,
        required: usize,
    },
    /// Zero variance or zero range
    DegenerateDistribution {
        stage: Stage,
        subject: String,
        detail: String,
    },
    /// Input outside the domain of a transform; output set to missing
    InvalidTransformInput {
        field: String,
        transform: TransformKind,
        row: usize,
        value: f64,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::InsufficientData {
                stage,
                subject,
                available,
                required,
            } => write!(
                f,
                "{}: insufficient data for {} ({} available, {} required)",
                stage, subject, available, required
            ),
            Condition::DegenerateDistribution {
                stage,
                subject,
                detail,
            } => write!(f, "{}: degenerate distribution for {} ({})", stage, subject, detail),
            Condition::InvalidTransformInput {
                field,
                transform,
                row,
                value,
            } => write!(
                f,
                "{}: {} undefined for {} = {} at row {}; set to missing",
                Stage::Transformed,
                transform,
                field,
                value,
                row
            ),
        }
    }
}

/// One treatment applied to the data, in pipeline order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "treatment", rename_all = "snake_case")]
pub enum Treatment {
    Coerced(CoercionOutcome),
    RuleApplied(RuleOutcome),
    Deduplicated(DedupOutcome),
    Winsorized(WinsorizeOutcome),
    Filtered(FilterOutcome),
    Transformed(TransformOutcome),
}

impl Treatment {
    /// One-line human description
    pub fn describe(&self) -> String {
        match self {
            Treatment::Coerced(c) => format!(
                "{}: {} value(s) coded as missing, {} unparseable",
                c.field, c.na_coded, c.unparseable
            ),
            Treatment::RuleApplied(r) => {
                let mut text = format!("{}: {} value(s) set to missing", r.rule, r.invalidated);
                if r.skipped > 0 {
                    text.push_str(&format!(", {} record(s) skipped", r.skipped));
                }
                text
            }
            Treatment::Deduplicated(d) if !d.applied() => {
                if d.absent_keys.is_empty() {
                    "deduplication skipped: no keys declared".to_string()
                } else {
                    format!(
                        "deduplication skipped: key field(s) absent ({})",
                        d.absent_keys.join(", ")
                    )
                }
            }
            Treatment::Deduplicated(d) => format!(
                "deduplicated on ({}): {} duplicate record(s) removed",
                d.keys.join(", "),
                d.removed()
            ),
            Treatment::Winsorized(w) => match (w.lower_bound, w.upper_bound) {
                (Some(lo), Some(hi)) => format!(
                    "{} winsorized at p{}/p{} = [{:.4}, {:.4}]: {} low, {} high",
                    w.field, w.lower_pct, w.upper_pct, lo, hi, w.clipped_low, w.clipped_high
                ),
                _ => format!(
                    "{} not winsorized: {} non-missing value(s)",
                    w.field, w.non_missing
                ),
            },
            Treatment::Filtered(fo) => {
                let mut parts = Vec::new();
                if !fo.required_all.is_empty() {
                    parts.push(format!("all of ({})", fo.required_all.join(", ")));
                }
                for group in &fo.required_any {
                    parts.push(format!("any of ({})", group.join(", ")));
                }
                let conditions = if parts.is_empty() {
                    "no requirements".to_string()
                } else {
                    parts.join(" and ")
                };
                format!("completeness on {}: {} record(s) removed", conditions, fo.removed())
            }
            Treatment::Transformed(t) => {
                let mut text = format!("{} -> {} ({})", t.field, t.output, t.transform);
                if t.degenerate {
                    text.push_str(", degenerate");
                }
                if t.invalid_inputs > 0 {
                    text.push_str(&format!(", {} invalid input(s)", t.invalid_inputs));
                }
                text
            }
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub surveyprep_version: String,
    pub study: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

/// A column of the cleaned table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableEntry {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    pub non_missing: usize,
    pub missing: usize,
}

/// Rows entering and leaving the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSummary {
    pub initial: usize,
    pub removed_by_dedup: usize,
    pub removed_by_completeness: usize,
    #[serde(rename = "final")]
    pub final_rows: usize,
}

/// One recorded stage transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub rows_before: usize,
    pub rows_after: usize,
    pub elapsed_ms: u64,
}

/// Complete stage report
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub metadata: ReportMetadata,
    pub variables: Vec<VariableEntry>,
    pub rows: RowSummary,
    pub stages: Vec<StageEntry>,
    pub treatments: Vec<Treatment>,
    pub conditions: Vec<Condition>,
    pub correlations: Vec<CorrelationResult>,
    pub total_ms: u64,
}

impl StageReport {
    /// Final stage reached by the run that produced this report
    pub fn final_stage(&self) -> Stage {
        self.stages.last().map(|s| s.stage).unwrap_or(Stage::Loaded)
    }

    pub fn is_finalized(&self) -> bool {
        self.final_stage() == Stage::Reported
    }

    pub fn set_files(&mut self, input_file: impl Into<String>, output_file: impl Into<String>) {
        self.metadata.input_file = Some(input_file.into());
        self.metadata.output_file = Some(output_file.into());
    }
}

/// Builder for the stage report while the pipeline runs
pub struct StageReportBuilder {
    study: String,
    description: Option<String>,
    current: Stage,
    initial_rows: usize,
    stages: Vec<StageEntry>,
    treatments: Vec<Treatment>,
    conditions: Vec<Condition>,
    correlations: Vec<CorrelationResult>,
    variables: Vec<VariableEntry>,
}

impl StageReportBuilder {
    pub fn new(study: &Study, initial_rows: usize) -> Self {
        Self {
            study: study.name.clone(),
            description: study.description.clone(),
            current: Stage::Loaded,
            initial_rows,
            stages: Vec::new(),
            treatments: Vec::new(),
            conditions: Vec::new(),
            correlations: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn last_entry(&self) -> Option<&StageEntry> {
        self.stages.last()
    }

    /// Move to the next stage and record its row counts and duration.
    ///
    /// Returns the stage just entered; advancing past `Reported` is a no-op.
    pub fn advance(&mut self, rows_before: usize, rows_after: usize, elapsed: Duration) -> Stage {
        if let Some(next) = self.current.next() {
            self.current = next;
            self.stages.push(StageEntry {
                stage: next,
                rows_before,
                rows_after,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        self.current
    }

    pub fn add_treatment(&mut self, treatment: Treatment) {
        self.treatments.push(treatment);
    }

    pub fn add_treatments(&mut self, treatments: impl IntoIterator<Item = Treatment>) {
        self.treatments.extend(treatments);
    }

    pub fn add_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }

    pub fn set_correlations(&mut self, correlations: Vec<CorrelationResult>) {
        self.correlations = correlations;
    }

    pub fn set_variables(&mut self, variables: Vec<VariableEntry>) {
        self.variables = variables;
    }

    fn removed_at(&self, stage: Stage) -> usize {
        self.stages
            .iter()
            .filter(|s| s.stage == stage)
            .map(|s| s.rows_before.saturating_sub(s.rows_after))
            .sum()
    }

    /// Build the final report
    pub fn build(self) -> StageReport {
        let final_rows = self
            .stages
            .last()
            .map(|s| s.rows_after)
            .unwrap_or(self.initial_rows);
        let rows = RowSummary {
            initial: self.initial_rows,
            removed_by_dedup: self.removed_at(Stage::Deduplicated),
            removed_by_completeness: self.removed_at(Stage::Filtered),
            final_rows,
        };
        let total_ms = self.stages.iter().map(|s| s.elapsed_ms).sum();

        StageReport {
            metadata: ReportMetadata {
                timestamp: Utc::now().to_rfc3339(),
                surveyprep_version: env!("CARGO_PKG_VERSION").to_string(),
                study: self.study,
                description: self.description,
                input_file: None,
                output_file: None,
            },
            variables: self.variables,
            rows,
            stages: self.stages,
            treatments: self.treatments,
            conditions: self.conditions,
            correlations: self.correlations,
            total_ms,
        }
    }
}
