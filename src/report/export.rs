//! Report export: JSON, Markdown and the zip bundle

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::report::StageReport;

/// Export the stage report to a JSON file
pub fn export_report_json(report: &StageReport, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize stage report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write stage report to {}", output_path.display()))?;

    Ok(())
}

/// Export the Markdown rendering of the stage report
pub fn export_report_markdown(report: &StageReport, output_path: &Path) -> Result<()> {
    std::fs::write(output_path, render_markdown(report))
        .with_context(|| format!("Failed to write Markdown report to {}", output_path.display()))?;
    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}

/// Pipe characters would break table cells
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Render the report as Markdown for analyst documentation
pub fn render_markdown(report: &StageReport) -> String {
    let meta = &report.metadata;
    let mut md = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(md, "# {}", meta.study);
    md.push('\n');
    if let Some(description) = &meta.description {
        let _ = writeln!(md, "{}\n", description);
    }
    let _ = writeln!(md, "- Generated: {}", meta.timestamp);
    let _ = writeln!(md, "- surveyprep {}", meta.surveyprep_version);
    if let Some(input) = &meta.input_file {
        let _ = writeln!(md, "- Input: `{}`", input);
    }
    if let Some(output) = &meta.output_file {
        let _ = writeln!(md, "- Output: `{}`", output);
    }

    md.push_str("\n## Variables\n\n");
    md.push_str("| Variable | Label | Kind | Non-missing | Missing |\n");
    md.push_str("|---|---|---|---:|---:|\n");
    for v in &report.variables {
        let name = match &v.derived_from {
            Some(source) => format!("{} (from {})", v.name, source),
            None => v.name.clone(),
        };
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} |",
            cell(&name),
            cell(&v.label),
            v.kind,
            v.non_missing,
            v.missing
        );
    }

    let rows = &report.rows;
    md.push_str("\n## Row summary\n\n");
    md.push_str("| Stage | Rows in | Rows out | Time (ms) |\n");
    md.push_str("|---|---:|---:|---:|\n");
    for entry in &report.stages {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            entry.stage, entry.rows_before, entry.rows_after, entry.elapsed_ms
        );
    }
    let _ = writeln!(
        md,
        "\n{} records loaded, {} removed as duplicates, {} removed as incomplete, {} retained.",
        rows.initial, rows.removed_by_dedup, rows.removed_by_completeness, rows.final_rows
    );

    md.push_str("\n## Treatments\n\n");
    if report.treatments.is_empty() {
        md.push_str("None.\n");
    }
    for treatment in &report.treatments {
        let _ = writeln!(md, "- {}", treatment.describe());
    }

    md.push_str("\n## Conditions\n\n");
    if report.conditions.is_empty() {
        md.push_str("None.\n");
    }
    for condition in &report.conditions {
        let _ = writeln!(md, "- {}", condition);
    }

    md.push_str("\n## Correlations\n\n");
    if report.correlations.is_empty() {
        md.push_str("No correlation pairs declared.\n");
    } else {
        md.push_str("| Pair | n | Pearson r | p | Spearman rho | p |\n");
        md.push_str("|---|---:|---:|---:|---:|---:|\n");
        for c in &report.correlations {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} |",
                cell(&c.name),
                c.n,
                fmt_opt(c.pearson_r, 3),
                fmt_opt(c.pearson_p, 4),
                fmt_opt(c.spearman_rho, 3),
                fmt_opt(c.spearman_p, 4)
            );
        }
    }

    md
}

/// Package the cleaned table and report files into a zip archive.
///
/// The individual report files are removed after packaging; the cleaned
/// table stays in place.
pub fn package_outputs(table_path: &Path, report_paths: &[&Path], zip_path: &Path) -> Result<()> {
    use std::io::{Read, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut add_file_to_zip = |path: &Path| -> Result<()> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
        Ok(())
    };

    add_file_to_zip(table_path)?;
    for path in report_paths {
        add_file_to_zip(path)?;
    }

    zip.finish().context("Failed to finalize zip file")?;

    for path in report_paths {
        std::fs::remove_file(path).ok();
    }

    Ok(())
}
