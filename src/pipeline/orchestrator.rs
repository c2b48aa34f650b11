//! Pipeline orchestrator - drives the cleaning stages in order
//!
//! The orchestrator owns no data logic. It types the raw table, threads it
//! through the stage functions and records every transition in the stage
//! report.

use std::fmt;
use std::time::Instant;

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::columns::presence;
use crate::pipeline::completeness::filter_complete;
use crate::pipeline::correlation::correlate_all;
use crate::pipeline::dedup::deduplicate;
use crate::pipeline::rules::apply_rules;
use crate::pipeline::schema::prepare_table;
use crate::pipeline::transform::apply_transforms;
use crate::pipeline::winsorize::{winsorize, MIN_WINSORIZE_VALUES};
use crate::report::{Condition, StageEntry, StageReport, StageReportBuilder, Treatment, VariableEntry};
use crate::study::{FieldKind, Study};

/// Pipeline state. Transitions are linear with no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loaded,
    RuleChecked,
    Deduplicated,
    Winsorized,
    Filtered,
    Transformed,
    Reported,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Loaded,
        Stage::RuleChecked,
        Stage::Deduplicated,
        Stage::Winsorized,
        Stage::Filtered,
        Stage::Transformed,
        Stage::Reported,
    ];

    /// The following stage, `None` once reported
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Loaded => Some(Stage::RuleChecked),
            Stage::RuleChecked => Some(Stage::Deduplicated),
            Stage::Deduplicated => Some(Stage::Winsorized),
            Stage::Winsorized => Some(Stage::Filtered),
            Stage::Filtered => Some(Stage::Transformed),
            Stage::Transformed => Some(Stage::Reported),
            Stage::Reported => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Loaded => "loaded",
            Stage::RuleChecked => "rule_checked",
            Stage::Deduplicated => "deduplicated",
            Stage::Winsorized => "winsorized",
            Stage::Filtered => "filtered",
            Stage::Transformed => "transformed",
            Stage::Reported => "reported",
        }
    }

    /// What happens on the way into this stage, for progress display
    pub fn activity(self) -> &'static str {
        match self {
            Stage::Loaded => "Typing fields",
            Stage::RuleChecked => "Applying plausibility rules",
            Stage::Deduplicated => "Removing duplicate records",
            Stage::Winsorized => "Winsorizing outliers",
            Stage::Filtered => "Filtering incomplete records",
            Stage::Transformed => "Deriving transformed columns",
            Stage::Reported => "Computing correlations",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hooks for progress display; all methods default to no-ops
pub trait StageObserver {
    fn stage_started(&mut self, _stage: Stage) {}
    fn stage_finished(&mut self, _entry: &StageEntry) {}
}

impl StageObserver for () {}

/// Cleaned table and the report describing how it was produced
#[derive(Debug, Clone)]
pub struct StudyOutcome {
    pub table: DataFrame,
    pub report: StageReport,
}

struct Run<'a> {
    builder: StageReportBuilder,
    observer: &'a mut dyn StageObserver,
}

impl Run<'_> {
    /// Run one stage function and record the transition into the next stage
    fn stage<T>(
        &mut self,
        input: &DataFrame,
        f: impl FnOnce(&DataFrame) -> Result<(DataFrame, T)>,
    ) -> Result<(DataFrame, T)> {
        let Some(stage) = self.builder.current().next() else {
            return f(input);
        };
        self.observer.stage_started(stage);

        let start = Instant::now();
        let (out, value) = f(input)?;
        self.builder.advance(input.height(), out.height(), start.elapsed());

        info!(stage = %stage, rows_before = input.height(), rows_after = out.height(), "stage complete");
        if let Some(entry) = self.builder.last_entry() {
            self.observer.stage_finished(entry);
        }
        Ok((out, value))
    }
}

/// Run the full pipeline on a raw text table
pub fn run_study(study: &Study, raw: &DataFrame) -> Result<StudyOutcome> {
    run_study_with(study, raw, &mut ())
}

/// Run the full pipeline, reporting stage progress to `observer`
pub fn run_study_with(
    study: &Study,
    raw: &DataFrame,
    observer: &mut dyn StageObserver,
) -> Result<StudyOutcome> {
    info!(study = %study.name, rows = raw.height(), "pipeline started");

    let (typed, coercions) = prepare_table(raw, study)?;
    let mut run = Run {
        builder: StageReportBuilder::new(study, typed.height()),
        observer,
    };
    run.builder.add_treatments(
        coercions
            .into_iter()
            .filter(|c| c.na_coded > 0 || c.unparseable > 0)
            .map(Treatment::Coerced),
    );

    let (checked, rule_outcomes) = run.stage(&typed, |df| apply_rules(df, study))?;
    run.builder
        .add_treatments(rule_outcomes.into_iter().map(Treatment::RuleApplied));

    let (unique, dedup_outcome) = run.stage(&checked, |df| deduplicate(df, &study.dedup_keys))?;
    run.builder.add_treatment(Treatment::Deduplicated(dedup_outcome));

    let (winsorized, winsorize_outcomes) = run.stage(&unique, |df| {
        let mut current = df.clone();
        let mut outcomes = Vec::with_capacity(study.winsorize.len());
        for spec in &study.winsorize {
            let (next, outcome) = winsorize(&current, spec)?;
            current = next;
            outcomes.push(outcome);
        }
        Ok((current, outcomes))
    })?;
    for outcome in winsorize_outcomes {
        if outcome.skipped() {
            run.builder.add_conditions([Condition::InsufficientData {
                stage: Stage::Winsorized,
                subject: outcome.field.clone(),
                available: outcome.non_missing,
                required: MIN_WINSORIZE_VALUES,
            }]);
        }
        run.builder.add_treatment(Treatment::Winsorized(outcome));
    }

    let required_all = study.required_all();
    let (complete, filter_outcome) = run.stage(&winsorized, |df| {
        filter_complete(df, &required_all, &study.completeness.required_any)
    })?;
    run.builder.add_treatment(Treatment::Filtered(filter_outcome));

    let (transformed, (transform_outcomes, transform_conditions)) = run.stage(&complete, |df| {
        let (out, outcomes, conditions) = apply_transforms(df, &study.transforms)?;
        Ok((out, (outcomes, conditions)))
    })?;
    run.builder
        .add_treatments(transform_outcomes.into_iter().map(Treatment::Transformed));
    run.builder.add_conditions(transform_conditions);

    let variables = describe_variables(&transformed, study)?;
    run.builder.set_variables(variables);

    let (table, (correlations, correlation_conditions)) = run.stage(&transformed, |df| {
        let results = correlate_all(df, &study.correlations)?;
        Ok((df.clone(), results))
    })?;
    run.builder.set_correlations(correlations);
    run.builder.add_conditions(correlation_conditions);

    let report = run.builder.build();
    debug!(
        treatments = report.treatments.len(),
        conditions = report.conditions.len(),
        "pipeline finished"
    );
    Ok(StudyOutcome { table, report })
}

/// One entry per declared field and derived column of the cleaned table
fn describe_variables(df: &DataFrame, study: &Study) -> Result<Vec<VariableEntry>> {
    let count = |name: &str| -> Result<(usize, usize)> {
        let present = presence(df, name)?;
        let non_missing = present.iter().filter(|&&p| p).count();
        Ok((non_missing, present.len() - non_missing))
    };

    let mut variables = Vec::new();
    for field in &study.fields {
        let (non_missing, missing) = count(&field.name)?;
        variables.push(VariableEntry {
            name: field.name.clone(),
            label: field.display_name().to_string(),
            kind: field.kind,
            derived_from: None,
            non_missing,
            missing,
        });
    }
    for spec in &study.transforms {
        let label = study
            .field(&spec.field)
            .map(|f| f.display_name().to_string())
            .unwrap_or_else(|| spec.field.clone());
        for kind in &spec.transforms {
            let name = kind.output_name(&spec.field);
            let (non_missing, missing) = count(&name)?;
            variables.push(VariableEntry {
                label: format!("{} ({})", label, kind),
                name,
                kind: FieldKind::Numeric,
                derived_from: Some(spec.field.clone()),
                non_missing,
                missing,
            });
        }
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Loaded;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, Stage::ALL.to_vec());
    }

    #[test]
    fn test_stage_labels_match_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, stage.label());
        }
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<Stage>,
        finished: Vec<Stage>,
    }

    impl StageObserver for Recorder {
        fn stage_started(&mut self, stage: Stage) {
            self.started.push(stage);
        }
        fn stage_finished(&mut self, entry: &StageEntry) {
            self.finished.push(entry.stage);
        }
    }

    #[test]
    fn test_observer_sees_every_transition() {
        let study = Study::from_json_str(
            r#"{"name": "tiny", "fields": [{"name": "x", "kind": "numeric"}]}"#,
        )
        .unwrap();
        let raw = df! { "x" => ["1", "2", "3"] }.unwrap();

        let mut recorder = Recorder::default();
        let outcome = run_study_with(&study, &raw, &mut recorder).unwrap();

        assert_eq!(recorder.started, Stage::ALL[1..].to_vec());
        assert_eq!(recorder.finished, recorder.started);
        assert!(outcome.report.is_finalized());
        assert_eq!(outcome.table.height(), 3);
    }
}
