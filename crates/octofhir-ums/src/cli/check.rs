//! Check command implementation

use super::output;
use anyhow::Result;
use colored::Colorize;
use octofhir_ums_diagnostics::{Diagnostic, Severity};
use octofhir_ums_ir::{Measure, check_measure};
use std::path::{Path, PathBuf};

/// Configuration for check command
pub struct CheckConfig {
    pub files: Vec<PathBuf>,
    pub strict: bool,
    pub verbose: bool,
    pub output_format: Option<String>,
}

struct CheckResult {
    file: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }
}

/// Check measure documents for structural defects
pub fn check(config: CheckConfig) -> Result<()> {
    if config.files.is_empty() {
        anyhow::bail!("No files specified for checking");
    }

    let results: Vec<CheckResult> = config
        .files
        .iter()
        .map(|file| check_file(file, config.verbose))
        .collect();

    let total_errors: usize = results.iter().map(|r| r.count(Severity::Error)).sum();
    let total_warnings: usize = results.iter().map(|r| r.count(Severity::Warning)).sum();

    let tabular = config.output_format.as_deref() == Some("table");
    for result in &results {
        print_check_result(result, tabular);
    }

    println!();
    if total_errors == 0 && total_warnings == 0 {
        println!(
            "{}",
            output::format_success(&format!("All {} measure(s) checked successfully", results.len()))
        );
        return Ok(());
    }

    let mut summary = Vec::new();
    if total_errors > 0 {
        summary.push(format!("{} error(s)", total_errors).red().to_string());
    }
    if total_warnings > 0 {
        summary.push(format!("{} warning(s)", total_warnings).yellow().to_string());
    }
    eprintln!("{} Found {}", "Check:".bold(), summary.join(", "));

    if total_errors > 0 {
        anyhow::bail!("{} measure error(s)", total_errors);
    }
    if config.strict {
        eprintln!("{}", "Strict mode: treating warnings as errors".yellow());
        anyhow::bail!("{} measure warning(s) in strict mode", total_warnings);
    }
    Ok(())
}

fn check_file(file: &Path, verbose: bool) -> CheckResult {
    if verbose {
        eprintln!("Checking: {}", file.display());
    }
    let diagnostics = match Measure::load(file) {
        Ok(measure) => {
            if verbose {
                eprintln!(
                    "  Loaded {} with {} population(s)",
                    measure.metadata.measure_id,
                    measure.populations.len()
                );
            }
            check_measure(&measure)
        }
        Err(e) => vec![e.to_diagnostic()],
    };
    CheckResult {
        file: file.to_path_buf(),
        diagnostics,
    }
}

fn print_check_result(result: &CheckResult, tabular: bool) {
    let status = if result.count(Severity::Error) > 0 {
        "FAIL".red().bold()
    } else if result.diagnostics.is_empty() {
        "OK".green().bold()
    } else {
        "WARN".yellow().bold()
    };
    println!("{} {}", status, result.file.display());
    if result.diagnostics.is_empty() {
        return;
    }
    if tabular {
        println!("{}", output::diagnostics_table(&result.diagnostics));
    } else {
        for diagnostic in &result.diagnostics {
            println!("  {}", output::format_diagnostic(diagnostic));
        }
    }
}
