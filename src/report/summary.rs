//! Console summary of a pipeline run

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::report::StageReport;

fn indent(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn fmt_opt(value: Option<f64>, precision: usize) -> Cell {
    match value {
        Some(v) => Cell::new(format!("{:.*}", precision, v)).set_alignment(CellAlignment::Right),
        None => Cell::new("n/a").fg(Color::DarkGrey),
    }
}

/// Print the row summary, correlations and conditions of a finished run
pub fn display_summary(report: &StageReport) {
    section("📋", "CLEANING SUMMARY");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    let rows = &report.rows;
    let removed_color = |n: usize| if n == 0 { Color::White } else { Color::Red };
    table.add_row(vec![Cell::new("📁 Records loaded"), Cell::new(rows.initial)]);
    table.add_row(vec![
        Cell::new("🗑️  Removed (duplicates)"),
        Cell::new(rows.removed_by_dedup).fg(removed_color(rows.removed_by_dedup)),
    ]);
    table.add_row(vec![
        Cell::new("🗑️  Removed (incomplete)"),
        Cell::new(rows.removed_by_completeness).fg(removed_color(rows.removed_by_completeness)),
    ]);
    table.add_row(vec![
        Cell::new("✅ Records retained"),
        Cell::new(rows.final_rows)
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("⏱️  Pipeline time"),
        Cell::new(format!("{} ms", report.total_ms)),
    ]);
    indent(&table);

    if !report.correlations.is_empty() {
        section("🔗", "CORRELATIONS");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Pair").add_attribute(Attribute::Bold),
            Cell::new("n").add_attribute(Attribute::Bold),
            Cell::new("Pearson r").add_attribute(Attribute::Bold),
            Cell::new("p").add_attribute(Attribute::Bold),
            Cell::new("Spearman ρ").add_attribute(Attribute::Bold),
            Cell::new("p").add_attribute(Attribute::Bold),
        ]);
        for c in &report.correlations {
            table.add_row(vec![
                Cell::new(&c.name),
                Cell::new(c.n).set_alignment(CellAlignment::Right),
                fmt_opt(c.pearson_r, 3),
                fmt_opt(c.pearson_p, 4),
                fmt_opt(c.spearman_rho, 3),
                fmt_opt(c.spearman_p, 4),
            ]);
        }
        indent(&table);
    }

    if !report.conditions.is_empty() {
        println!();
        println!(
            "    {} {}",
            style("⚠").yellow(),
            style(format!("CONDITIONS ({})", report.conditions.len()))
                .white()
                .bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        for condition in &report.conditions {
            println!("      {} {}", style("•").dim(), condition);
        }
    }
}
