//! Generate command implementation

use super::output::{self, OutputFormat};
use crate::config::EngineConfig;
use crate::engine::Engine;
use anyhow::{Context, Result};
use octofhir_ums_ir::Measure;
use octofhir_ums_override::{TargetFormat, load_overrides};
use octofhir_ums_sql::DialectConfig;
use std::path::{Path, PathBuf};

/// Configuration for generate command
pub struct GenerateConfig {
    pub file: PathBuf,
    pub target: TargetFormat,
    /// Dialect preset name or dialect JSON file
    pub dialect: Option<String>,
    pub overrides: Option<PathBuf>,
    pub engine: EngineConfig,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Resolve `--dialect`: a known preset first, then a file path
pub fn resolve_dialect(value: &str) -> Result<DialectConfig> {
    if let Some(preset) = DialectConfig::preset(value) {
        return Ok(preset);
    }
    DialectConfig::load(Path::new(value))
        .with_context(|| format!("Failed to load SQL dialect: {}", value))
}

/// Generate CQL or SQL for one measure
pub fn generate(config: GenerateConfig) -> Result<()> {
    let measure = Measure::load(&config.file)
        .with_context(|| format!("Failed to load measure: {}", config.file.display()))?;

    let mut engine_config = config.engine;
    if let Some(dialect) = &config.dialect {
        engine_config = engine_config.with_dialect(resolve_dialect(dialect)?);
    }

    let overrides = match &config.overrides {
        Some(path) => load_overrides(path)
            .with_context(|| format!("Failed to load overrides: {}", path.display()))?,
        None => Vec::new(),
    };

    if config.verbose {
        eprintln!(
            "Generating {} for {} ({} override record(s))",
            config.target,
            measure.metadata.measure_id,
            overrides.len()
        );
    }

    let engine = Engine::new(engine_config);
    let generated = engine
        .generate(&measure, config.target, &overrides)
        .with_context(|| format!("Generation failed for {}", config.file.display()))?;

    if config.verbose {
        eprintln!("{}", generated.metadata.summary());
    }
    output::report_diagnostics(&generated.warnings);
    if generated.override_count > 0 {
        eprintln!(
            "{}",
            output::format_warning(&format!("{} override(s) applied", generated.override_count))
        );
    }

    let content = match OutputFormat::parse_or(config.output_format.as_deref(), OutputFormat::Text) {
        OutputFormat::Json => output::to_json(&generated, false)?,
        OutputFormat::JsonPretty => output::to_json(&generated, true)?,
        OutputFormat::Table | OutputFormat::Text => generated.text,
    };
    output::write_output(&content, config.output_file.as_deref())
}
