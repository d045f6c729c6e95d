//! Evaluate command implementation

use super::output::{self, OutputFormat};
use crate::batch::evaluate_patients;
use crate::config::EngineConfig;
use crate::engine::Engine;
use anyhow::{Context, Result};
use octofhir_ums_eval::load_patients;
use octofhir_ums_ir::Measure;
use std::path::PathBuf;

/// Configuration for evaluate command
pub struct EvaluateConfig {
    pub file: PathBuf,
    pub patients: PathBuf,
    pub engine: EngineConfig,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Evaluate every patient in a file against one measure
pub fn evaluate(config: EvaluateConfig) -> Result<()> {
    let measure = Measure::load(&config.file)
        .with_context(|| format!("Failed to load measure: {}", config.file.display()))?;
    let patients = load_patients(&config.patients)
        .with_context(|| format!("Failed to load patients: {}", config.patients.display()))?;

    if config.verbose {
        eprintln!(
            "Evaluating {} patient(s) against {}",
            patients.len(),
            measure.metadata.measure_id
        );
    }

    let engine = Engine::new(config.engine);
    let traces = evaluate_patients(&engine, &measure, &patients);

    let content = match OutputFormat::parse_or(config.output_format.as_deref(), OutputFormat::JsonPretty) {
        OutputFormat::Json => output::to_json(&traces, false)?,
        OutputFormat::Table => {
            format!("{}\n{}", output::outcome_table(&traces), output::outcome_summary(&traces))
        }
        OutputFormat::JsonPretty | OutputFormat::Text => output::to_json(&traces, true)?,
    };
    output::write_output(&content, config.output_file.as_deref())
}
