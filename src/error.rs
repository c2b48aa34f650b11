//! Error types for study loading and pipeline execution.
//!
//! Only structural problems are errors here. Data-level problems (too few
//! values, zero variance, a bad transform input) are recorded as
//! [`Condition`](crate::report::Condition)s in the stage report instead.

use thiserror::Error;

/// Fatal errors raised while validating a study or running the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input table lacks fields the study declares.
    #[error("Input is missing declared field(s): {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The study definition is internally inconsistent.
    #[error("Invalid study definition: {0}")]
    InvalidStudy(String),

    /// File extension not recognized by the loader or writer.
    #[error("Unsupported file format: '{0}'. Supported formats: csv, parquet")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short machine-readable code, used in JSON log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::InvalidStudy(_) => "INVALID_STUDY",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::Io(_) => "IO",
            Self::Polars(_) => "POLARS",
            Self::Json(_) => "JSON",
        }
    }
}

/// Result alias used across the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
