//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::utils::LogFormat;

/// surveyprep - Clean a survey extract and report bivariate correlations
#[derive(Parser, Debug)]
#[command(name = "surveyprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Study definition file (JSON)
    #[arg(short, long)]
    pub study: Option<PathBuf>,

    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file path (CSV or Parquet, determined by extension).
    /// Defaults to input directory with '_clean' suffix (e.g., nhanes.csv -> nhanes_clean.csv).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON report path. Defaults to '<input>_report.json'.
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Markdown report path. Defaults to '<input>_report.md'.
    #[arg(long)]
    pub report_markdown: Option<PathBuf>,

    /// Package the cleaned table and both reports into a zip archive next to the output
    #[arg(long, default_value = "false")]
    pub bundle: bool,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Diagnostic log format (written to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a study definition and print its contents
    Check {
        /// Study definition file (JSON)
        study: PathBuf,
    },

    /// Show per-column missing ratios of a raw extract
    Profile {
        /// Input file path (CSV or Parquet)
        input: PathBuf,

        /// Apply this study's header normalization and NA coding
        #[arg(long)]
        study: Option<PathBuf>,

        /// Highlight columns whose missing ratio exceeds this value (0.0 to 1.0)
        #[arg(long, default_value = "0.3", value_parser = validate_ratio)]
        threshold: f64,
    },
}

impl Cli {
    pub fn input(&self) -> Option<&PathBuf> {
        self.input.as_ref()
    }

    pub fn study(&self) -> Option<&PathBuf> {
        self.study.as_ref()
    }

    /// Get the output path, deriving from input if not explicitly provided.
    pub fn output_path(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(self.output.clone().unwrap_or_else(|| {
            let extension = input
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("csv");
            sibling_path(input, &format!("_clean.{}", extension))
        }))
    }

    pub fn report_json_path(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(
            self.report_json
                .clone()
                .unwrap_or_else(|| sibling_path(input, "_report.json")),
        )
    }

    pub fn report_markdown_path(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(
            self.report_markdown
                .clone()
                .unwrap_or_else(|| sibling_path(input, "_report.md")),
        )
    }

    /// Zip archive path next to the cleaned table
    pub fn bundle_path(&self) -> Option<PathBuf> {
        let output = self.output_path()?;
        Some(output.with_extension("zip"))
    }
}

/// `<dir>/<stem><suffix>` for a path
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}{}", stem, suffix))
}

/// Validator for ratio parameters
fn validate_ratio(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("ratio must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}
