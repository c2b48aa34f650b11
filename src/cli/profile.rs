//! `profile` subcommand: missing ratios of a raw extract

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::{
    analyze_missing_values, columns_above_threshold, dataset_stats, load_raw_table,
    normalize_headers,
};
use crate::study::Study;
use crate::utils::{create_spinner, finish_with_success, print_count, print_info};

/// Print per-column missing ratios, highest first
pub fn run_profile(input: &Path, study_path: Option<&Path>, threshold: f64) -> Result<()> {
    let study = study_path
        .map(|p| {
            Study::load(p).with_context(|| format!("Invalid study definition: {}", p.display()))
        })
        .transpose()?;

    println!();
    let spinner = create_spinner("Loading dataset...");
    let mut df = load_raw_table(input)?;
    if study.as_ref().is_some_and(|s| s.normalize_headers) {
        df = normalize_headers(&df)?;
    }
    let (rows, cols, memory_mb) = dataset_stats(&df);
    finish_with_success(
        &spinner,
        &format!("Loaded {} rows x {} columns ({:.2} MB)", rows, cols, memory_mb),
    );

    let profiles = analyze_missing_values(&df, study.as_ref())?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Column").add_attribute(Attribute::Bold),
        Cell::new("Declared").add_attribute(Attribute::Bold),
        Cell::new("Missing").add_attribute(Attribute::Bold),
        Cell::new("Ratio").add_attribute(Attribute::Bold),
    ]);
    for p in &profiles {
        let color = if p.ratio > threshold {
            Color::Red
        } else if p.ratio > 0.0 {
            Color::Yellow
        } else {
            Color::Green
        };
        table.add_row(vec![
            Cell::new(&p.column),
            Cell::new(if p.declared { "yes" } else { "" }),
            Cell::new(p.missing).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}%", p.ratio * 100.0))
                .fg(color)
                .set_alignment(CellAlignment::Right),
        ]);
    }

    println!();
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
    println!();

    let high = columns_above_threshold(&profiles, threshold);
    if high.is_empty() {
        print_info(&format!(
            "No column exceeds {:.1}% missing",
            threshold * 100.0
        ));
    } else {
        print_count(
            "column(s) with high missing values",
            high.len(),
            Some(&format!("(>{:.1}%)", threshold * 100.0)),
        );
        println!("      {}", style(high.join(", ")).dim());
    }
    println!();

    Ok(())
}
