//! Console output for suite reports

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::runner::{Outcome, SuiteReport};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

fn outcome_cell(outcome: Outcome) -> Cell {
    match outcome {
        Outcome::Passed => Cell::new("✓ passed").fg(Color::Green),
        Outcome::Failed => Cell::new("✗ failed").fg(Color::Red),
        Outcome::Skipped => Cell::new("- skipped").fg(Color::Yellow),
    }
}

/// Render the per-unit table
pub fn report_table(report: &SuiteReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Unit", "Outcome", "Time (ms)", "Error"]);

    for result in &report.results {
        table.add_row(vec![
            Cell::new(&result.name),
            outcome_cell(result.outcome),
            Cell::new(result.duration_ms),
            Cell::new(result.error.as_deref().unwrap_or("")),
        ]);
    }
    table
}

/// One-line summary, colored by overall result
pub fn summary_line(report: &SuiteReport) -> String {
    let line = format!(
        "{} passed, {} failed, {} skipped of {} ({} ms)",
        report.passed, report.failed, report.skipped, report.total, report.duration_ms
    );
    if report.success() {
        line.green().to_string()
    } else {
        line.red().bold().to_string()
    }
}

pub fn print_report(report: &SuiteReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if !report.results.is_empty() {
                println!("{}", report_table(report));
            }
            println!("{}", summary_line(report));
            for failure in report.failures() {
                if let Some(diagnostics) = &failure.diagnostics {
                    if let Some(path) = &diagnostics.page_text {
                        println!("  {} {}", failure.name.dimmed(), path.display());
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        }
    }
}

/// Print the units a run would execute
pub fn print_units(units: &[(&str, &[String])], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if units.is_empty() {
                println!("No scenarios found.");
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Unit", "Tags"]);
            for (name, tags) in units {
                table.add_row(vec![name.to_string(), tags.join(", ")]);
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = units
                .iter()
                .map(|(name, tags)| serde_json::json!({ "name": name, "tags": tags }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&items).unwrap_or_default());
        }
    }
}
