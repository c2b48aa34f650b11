//! surveyprep: survey extract cleaning CLI
//!
//! Loads a raw extract, runs the study's cleaning pipeline, writes the cleaned
//! table and the stage report (JSON and Markdown).

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::{error, info};

use surveyprep::cli::{self, confirm_overwrite, Cli, Commands};
use surveyprep::pipeline::{dataset_stats, load_raw_table, run_study_with, save_dataset};
use surveyprep::report::{
    display_summary, export_report_json, export_report_markdown, package_outputs,
};
use surveyprep::study::Study;
use surveyprep::utils::{
    create_spinner, finish_with_success, init_logging, print_banner, print_completion,
    print_config, print_info, print_step_header, print_success, print_warning,
    StageSpinner,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format)?;

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Check { study } => cli::check::run_check(study),
            Commands::Profile {
                input,
                study,
                threshold,
            } => cli::profile::run_profile(input, study.as_deref(), *threshold),
        };
    }

    let study_path = cli.study().ok_or_else(|| {
        anyhow::anyhow!("Study definition is required. Use -s/--study to specify a file.")
    })?;
    let input = cli.input().ok_or_else(|| {
        anyhow::anyhow!("Input file is required. Use -i/--input to specify a file.")
    })?;
    let output_path = cli
        .output_path()
        .context("Could not derive the output path from the input path")?;
    let json_path = cli
        .report_json_path()
        .context("Could not derive the JSON report path")?;
    let markdown_path = cli
        .report_markdown_path()
        .context("Could not derive the Markdown report path")?;

    let study = Study::load(study_path)
        .with_context(|| format!("Invalid study definition: {}", study_path.display()))?;

    if !cli.no_confirm && !confirm_overwrite(&[
        output_path.as_path(),
        json_path.as_path(),
        markdown_path.as_path(),
    ])? {
        println!("Cancelled by user.");
        return Ok(());
    }

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&study, input, &output_path);

    // Step 1: Load the raw extract as text
    print_step_header(1, "Load Extract");
    let spinner = create_spinner("Loading dataset...");
    let raw = load_raw_table(input)?;
    finish_with_success(&spinner, "Dataset loaded");

    let (rows, cols, memory_mb) = dataset_stats(&raw);
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);
    println!("      Estimated memory: {:.2} MB", memory_mb);
    info!(path = %input.display(), rows, cols, "extract loaded");

    // Step 2: Cleaning pipeline
    print_step_header(2, "Clean and Correlate");
    let mut observer = StageSpinner::default();
    let outcome = run_study_with(&study, &raw, &mut observer).map_err(|e| {
        error!(code = e.error_code(), "{}", e);
        e
    })?;
    let mut table = outcome.table;
    let mut report = outcome.report;

    if report.conditions.is_empty() {
        print_info("No conditions raised");
    } else {
        print_warning(&format!(
            "{} condition(s) raised; see the report",
            report.conditions.len()
        ));
    }

    // Step 3: Save outputs
    print_step_header(3, "Save Results");
    let save_start = Instant::now();
    let spinner = create_spinner("Writing output files...");
    save_dataset(&mut table, &output_path)?;
    report.set_files(input.display().to_string(), output_path.display().to_string());
    export_report_json(&report, &json_path)?;
    export_report_markdown(&report, &markdown_path)?;
    finish_with_success(
        &spinner,
        &format!("Saved to {}", output_path.display()),
    );
    print_success(&format!("JSON report: {}", json_path.display()));
    print_success(&format!("Markdown report: {}", markdown_path.display()));

    if cli.bundle {
        let zip_path = cli
            .bundle_path()
            .context("Could not derive the bundle path")?;
        package_outputs(
            &output_path,
            &[json_path.as_path(), markdown_path.as_path()],
            &zip_path,
        )?;
        print_success(&format!("Bundled reports into {}", zip_path.display()));
    }
    info!(elapsed_ms = save_start.elapsed().as_millis() as u64, "outputs written");

    display_summary(&report);
    print_completion();

    Ok(())
}
