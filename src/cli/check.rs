//! `check` subcommand: validate and describe a study definition

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Table};
use console::style;

use crate::study::Study;
use crate::utils::{print_info, print_success};

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

fn print_table(title: &str, table: &Table) {
    println!();
    println!("    {}", style(title).white().bold());
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

/// Load and validate a study definition, then print its contents
pub fn run_check(path: &Path) -> Result<()> {
    let study =
        Study::load(path).with_context(|| format!("Invalid study definition: {}", path.display()))?;

    println!();
    print_success(&format!("Study '{}' is valid", study.name));
    if let Some(description) = &study.description {
        print_info(description);
    }

    let mut fields = Table::new();
    fields.load_preset(UTF8_FULL_CONDENSED);
    fields.set_header(header(&["Field", "Kind", "Label", "Range", "Key", "Missing codes"]));
    for f in &study.fields {
        fields.add_row(vec![
            Cell::new(&f.name),
            Cell::new(f.kind),
            Cell::new(f.display_name()),
            Cell::new(
                f.range
                    .map(|[lo, hi]| format!("[{}, {}]", lo, hi))
                    .unwrap_or_default(),
            ),
            Cell::new(if f.key { "yes" } else { "" }),
            Cell::new(f.missing_codes.join(", ")),
        ]);
    }
    print_table("Fields", &fields);

    let rules = study.all_rules();
    if !rules.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(header(&["Rule", "Target", "Reads", "Scope"]));
        for rule in &rules {
            table.add_row(vec![
                Cell::new(rule),
                Cell::new(rule.target()),
                Cell::new(rule.fields().join(", ")),
                Cell::new(if rule.is_cross_field() { "cross-field" } else { "single" }),
            ]);
        }
        print_table("Rules", &table);
    }

    if !study.dedup_keys.is_empty() {
        println!();
        print_info(&format!("Deduplication key: {}", study.dedup_keys.join(", ")));
    }
    for spec in &study.winsorize {
        print_info(&format!(
            "Winsorize {} at p{} / p{}",
            spec.field, spec.lower, spec.upper
        ));
    }
    let required = study.required_all();
    if !required.is_empty() {
        print_info(&format!("Required: {}", required.join(", ")));
    }
    for group in &study.completeness.required_any {
        print_info(&format!("At least one of: {}", group.join(", ")));
    }

    if !study.transforms.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(header(&["Field", "Transform", "Output"]));
        for spec in &study.transforms {
            for kind in &spec.transforms {
                table.add_row(vec![
                    Cell::new(&spec.field),
                    Cell::new(kind),
                    Cell::new(kind.output_name(&spec.field)),
                ]);
            }
        }
        print_table("Transforms", &table);
    }

    if !study.correlations.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(header(&["Pair", "x", "y"]));
        for pair in &study.correlations {
            table.add_row(vec![Cell::new(pair.name()), Cell::new(&pair.x), Cell::new(&pair.y)]);
        }
        print_table("Correlation pairs", &table);
    }
    println!();

    Ok(())
}
