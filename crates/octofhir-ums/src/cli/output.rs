//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_ums_diagnostics::{Diagnostic, Severity};
use octofhir_ums_eval::{FinalOutcome, ValidationTrace};
use octofhir_ums_ir::PopulationType;
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tabled::{Table, Tabled, settings::Style};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Table,
    /// Raw generated text
    Text,
}

impl OutputFormat {
    /// Parse a format name, falling back to `default` for unknown names
    pub fn parse_or(name: Option<&str>, default: Self) -> Self {
        match name.map(str::to_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty" | "json-pretty") => Self::JsonPretty,
            Some("table") => Self::Table,
            Some("text" | "raw") => Self::Text,
            _ => default,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stdout().is_terminal()),
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a warning for display
pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    diagnostic.render_colored()
}

/// Print warnings and infos to stderr, one per diagnostic
pub fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", format_diagnostic(diagnostic));
    }
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        print!("{}", content);
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "IP")]
    initial_population: String,
    #[tabled(rename = "Denom")]
    denominator: String,
    #[tabled(rename = "Excl")]
    exclusion: String,
    #[tabled(rename = "Numer")]
    numerator: String,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

fn mark(trace: &ValidationTrace, population_type: PopulationType) -> String {
    match trace.result(population_type) {
        Some(result) if result.met => "yes".to_string(),
        Some(_) => "no".to_string(),
        None => "-".to_string(),
    }
}

/// One summary row per patient
pub fn outcome_table(traces: &[ValidationTrace]) -> String {
    if traces.is_empty() {
        return "(no patients)".to_string();
    }
    let rows: Vec<OutcomeRow> = traces
        .iter()
        .map(|trace| OutcomeRow {
            patient: trace.patient_id.clone(),
            outcome: trace.final_outcome.to_string(),
            initial_population: mark(trace, PopulationType::InitialPopulation),
            denominator: mark(trace, PopulationType::Denominator),
            exclusion: mark(trace, PopulationType::DenominatorExclusion),
            numerator: mark(trace, PopulationType::Numerator),
            warnings: trace.warnings.len(),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// Outcome counts in funnel order
pub fn outcome_summary(traces: &[ValidationTrace]) -> String {
    [
        FinalOutcome::InNumerator,
        FinalOutcome::NotInNumerator,
        FinalOutcome::Excluded,
        FinalOutcome::NotInPopulation,
    ]
    .iter()
    .map(|outcome| {
        let count = traces.iter().filter(|t| t.final_outcome == *outcome).count();
        format!("{} {}", count, outcome)
    })
    .collect::<Vec<_>>()
    .join(", ")
}

#[derive(Tabled)]
struct DiagnosticRow {
    #[tabled(rename = "Severity")]
    severity: Severity,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub fn diagnostics_table(diagnostics: &[Diagnostic]) -> String {
    let rows: Vec<DiagnosticRow> = diagnostics
        .iter()
        .map(|d| DiagnosticRow {
            severity: d.severity,
            code: d.code.to_string(),
            location: d.location.as_ref().map(ToString::to_string).unwrap_or_default(),
            message: d.message.clone(),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}
