//! One configured engine over every component

use crate::config::EngineConfig;
use octofhir_ums_cql::{CqlGenerator, CqlMetadata};
use octofhir_ums_diagnostics::{Diagnostic, UmsError};
use octofhir_ums_eval::{MeasureEvaluator, PatientRecord, ValidationTrace};
use octofhir_ums_ir::Measure;
use octofhir_ums_override::{Override, TargetFormat, apply_overrides};
use octofhir_ums_sql::{SqlGenerator, SqlMetadata};
use serde::Serialize;

/// Backend description of one generated text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerationMetadata {
    Cql(CqlMetadata),
    Sql(SqlMetadata),
}

impl GenerationMetadata {
    /// One-line description for verbose output
    pub fn summary(&self) -> String {
        match self {
            GenerationMetadata::Cql(m) => format!(
                "{} value set(s), {} population(s), {} definition(s)",
                m.value_set_count, m.population_count, m.definition_count
            ),
            GenerationMetadata::Sql(m) => format!(
                "{} predicate(s) over [{}], {:?} complexity, generated at {}",
                m.predicate_count,
                m.data_models_used.join(", "),
                m.estimated_complexity,
                m.generated_at.to_rfc3339()
            ),
        }
    }
}

/// Generated text of one measure in one format
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated {
    pub measure_id: String,
    pub format: TargetFormat,
    pub text: String,
    pub warnings: Vec<Diagnostic>,
    pub override_count: usize,
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    cql: CqlGenerator,
    sql: SqlGenerator,
    evaluator: MeasureEvaluator,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        config.check_default_years();
        Self {
            cql: CqlGenerator::new(config.cql_options()),
            sql: SqlGenerator::new(config.sql.clone()),
            evaluator: MeasureEvaluator::new(config.evaluator_config()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cql(&self) -> &CqlGenerator {
        &self.cql
    }

    pub fn sql(&self) -> &SqlGenerator {
        &self.sql
    }

    pub fn evaluator(&self) -> &MeasureEvaluator {
        &self.evaluator
    }

    /// Generate text and layer the applicable overrides on top
    pub fn generate(
        &self,
        measure: &Measure,
        format: TargetFormat,
        overrides: &[Override],
    ) -> Result<Generated, UmsError> {
        let (text, warnings, metadata) = match format {
            TargetFormat::Cql => {
                let result = self.cql.generate(measure);
                let warnings = result.warnings.clone();
                let metadata = GenerationMetadata::Cql(result.metadata);
                (result.into_result()?, warnings, metadata)
            }
            TargetFormat::Sql => {
                let result = self.sql.generate(measure);
                let warnings = result.warnings.clone();
                let metadata = GenerationMetadata::Sql(result.metadata.clone());
                (result.into_result()?, warnings, metadata)
            }
        };
        let patched = apply_overrides(&text, measure, format, overrides);
        Ok(Generated {
            measure_id: measure.id.clone(),
            format,
            text: patched.patched_text,
            warnings,
            override_count: patched.override_count,
            metadata,
        })
    }

    pub fn evaluate(&self, patient: &PatientRecord, measure: &Measure) -> ValidationTrace {
        self.evaluator.evaluate(patient, measure)
    }
}
