//! surveyprep: survey extract cleaning library
//!
//! Types a raw survey extract against a declarative study definition, applies
//! plausibility rules, deduplication, winsorization, completeness filtering and
//! per-field transforms, and reports Pearson and Spearman correlations for the
//! declared variable pairs together with an audit trail of every treatment.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod study;
pub mod utils;

pub use error::{PipelineError, Result};
pub use pipeline::{run_study, run_study_with, Stage, StudyOutcome};
pub use study::Study;
