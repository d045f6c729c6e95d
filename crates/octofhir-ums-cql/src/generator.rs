//! CQL library generation

use crate::expression::{
    Generation, MEASUREMENT_PERIOD, PopulationFolder, conjoin, constraint_conditions,
};
use crate::naming::{comment_text, library_identifier, quoted, string_literal};
use crate::options::CqlOptions;
use crate::writer::{CqlWriter, Definition};
use octofhir_ums_diagnostics::{Diagnostic, NodeLocation, UMS0102, UmsError};
use octofhir_ums_ir::{Measure, PopulationType, blocking_errors, fold_clause};
use serde::{Deserialize, Serialize};

/// Counts describing a generated library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlMetadata {
    pub value_set_count: usize,
    pub population_count: usize,
    pub definition_count: usize,
}

/// Outcome of one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlGenerationResult {
    pub success: bool,
    /// Library text; empty when generation failed
    pub cql: String,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    pub metadata: CqlMetadata,
}

impl CqlGenerationResult {
    fn failed(errors: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            cql: String::new(),
            warnings: Vec::new(),
            errors,
            metadata: CqlMetadata::default(),
        }
    }

    /// The library text, or the first error
    pub fn into_result(self) -> Result<String, UmsError> {
        if self.success {
            return Ok(self.cql);
        }
        let mut errors: Vec<UmsError> = self
            .errors
            .iter()
            .map(|e| UmsError::generation(e.code, e.message.clone(), "cql"))
            .collect();
        Err(match errors.len() {
            1 => errors.remove(0),
            _ => UmsError::Multiple(errors),
        })
    }
}

/// Generates CQL libraries from measures
#[derive(Debug, Clone, Default)]
pub struct CqlGenerator {
    options: CqlOptions,
}

impl CqlGenerator {
    pub fn new(options: CqlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CqlOptions {
        &self.options
    }

    /// Generate a library for a measure
    ///
    /// The output depends only on the measure and the options.
    pub fn generate(&self, measure: &Measure) -> CqlGenerationResult {
        let errors = blocking_errors(measure);
        if !errors.is_empty() {
            for error in &errors {
                log::warn!("{}: {}", error.code, error.message);
            }
            return CqlGenerationResult::failed(errors);
        }

        let mut generation = Generation::new(measure);
        let mut writer = CqlWriter::new();

        if self.options.header {
            self.write_header(&mut writer, measure);
            writer.blank();
        }
        let version = measure
            .metadata
            .version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.options.default_library_version);
        writer.line(&format!(
            "library {} version {}",
            library_identifier(&measure.metadata.measure_id),
            string_literal(version.trim())
        ));
        writer.blank();
        writer.line(&format!(
            "using {} version {}",
            self.options.model,
            string_literal(&self.options.model_version)
        ));
        writer.blank();
        writer.line(&format!(
            "include FHIRHelpers version {} called FHIRHelpers",
            string_literal(&self.options.fhir_helpers_version)
        ));

        log::debug!("declaring {} value sets", measure.value_sets.len());
        if !measure.value_sets.is_empty() {
            writer.blank();
        }
        for vs in &measure.value_sets {
            let name = generation.names.claim(&vs.name);
            if vs.codes.is_empty() {
                writer.comment(&format!("WARNING: value set '{}' has no codes", comment_text(&vs.name)));
                generation.warnings.push(
                    Diagnostic::warning(UMS0102, format!("Value set '{}' has no codes", vs.name))
                        .with_location(NodeLocation::node(vs.id.clone())),
                );
            }
            writer.line(&format!("valueset {}: {}", quoted(&name), string_literal(&vs.canonical())));
            generation.value_set_names.insert(vs.id.clone(), name);
        }

        let period = measure.measurement_period_or(self.options.default_year);
        writer.blank();
        writer.line(&format!("parameter {} Interval<DateTime>", quoted(MEASUREMENT_PERIOD)));
        writer.line(&format!(
            "  default Interval[@{}T00:00:00.000, @{}T23:59:59.999]",
            period.start, period.end
        ));
        writer.blank();
        writer.line("context Patient");

        let population_names: Vec<String> = measure
            .populations
            .iter()
            .map(|p| generation.names.claim(p.population_type.label()))
            .collect();

        let mut population_defs = Vec::with_capacity(measure.populations.len());
        for (population, name) in measure.populations.iter().zip(population_names) {
            log::debug!("rendering population '{}' as {}", population.id, quoted(&name));
            let mut fragment = fold_clause(
                &population.criteria,
                &NodeLocation::population(population.id.clone()),
                &mut PopulationFolder {
                    generation: &mut generation,
                },
            );
            if population.population_type == PopulationType::InitialPopulation {
                if let Some(constraints) = &measure.global_constraints {
                    fragment = conjoin(fragment, &constraint_conditions(constraints));
                }
            }
            let comments = population
                .description
                .as_deref()
                .map(comment_text)
                .filter(|d| !d.is_empty())
                .into_iter()
                .collect();
            population_defs.push(Definition {
                name,
                comments,
                body: fragment.text,
            });
        }

        for definition in generation.element_defs.values() {
            writer.define(definition);
        }
        for definition in &population_defs {
            writer.define(definition);
        }

        let metadata = CqlMetadata {
            value_set_count: measure.value_sets.len(),
            population_count: measure.populations.len(),
            definition_count: generation.element_defs.len() + population_defs.len(),
        };
        log::debug!(
            "generated CQL for '{}': {} definitions, {} warnings",
            measure.id,
            metadata.definition_count,
            generation.warnings.len()
        );

        CqlGenerationResult {
            success: true,
            cql: writer.finish(),
            warnings: generation.warnings,
            errors: Vec::new(),
            metadata,
        }
    }

    fn write_header(&self, writer: &mut CqlWriter, measure: &Measure) {
        let mut lines = vec![measure.title().to_string()];
        lines.push(format!("Measure: {}", measure.metadata.measure_id.trim()));
        if let Some(version) = &measure.metadata.version {
            lines.push(format!("Version: {}", version));
        }
        if let Some(steward) = &measure.metadata.steward {
            lines.push(format!("Steward: {}", steward));
        }
        if let Some(description) = &measure.metadata.description {
            lines.push(comment_text(description));
        }
        lines.push(format!("Generated from UMS measure '{}'", measure.id));
        writer.block_comment(lines.iter().map(String::as_str));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_ums_ir::{Code, DataCategory, DataElement, LogicalClause, Population, ValueSet};
    use pretty_assertions::assert_eq;

    fn small() -> Measure {
        let mut m = Measure::new("m1", "CMS 999", "Small");
        m.value_sets.push(
            ValueSet::new("vs-1", "Office Visit")
                .with_oid("2.16.840.1.113883.3.464.1003.101.12.1001")
                .with_code(Code::new("185349003", "http://snomed.info/sct")),
        );
        m.populations.push(Population::new(
            "ip",
            PopulationType::InitialPopulation,
            LogicalClause::and(
                "ip-root",
                vec![DataElement::new("visit", DataCategory::Encounter, "Office Visit Encounter")
                    .with_value_set("vs-1")
                    .into()],
            ),
        ));
        m
    }

    #[test]
    fn test_full_library_text() {
        let options = CqlOptions {
            header: false,
            ..CqlOptions::default()
        };
        let result = CqlGenerator::new(options).generate(&small());
        assert!(result.success);
        let expected = r#"library CMS_999 version '1.0.000'

using QICore version '4.1.1'

include FHIRHelpers version '4.0.001' called FHIRHelpers

valueset "Office Visit": 'urn:oid:2.16.840.1.113883.3.464.1003.101.12.1001'

parameter "Measurement Period" Interval<DateTime>
  default Interval[@2025-01-01T00:00:00.000, @2025-12-31T23:59:59.999]

context Patient

define "Office Visit Encounter":
  exists (
    [Encounter: "Office Visit"] Enc
      where Enc.period overlaps "Measurement Period"
  )

define "Initial Population":
  "Office Visit Encounter"
"#;
        assert_eq!(result.cql, expected);
        assert_eq!(
            result.metadata,
            CqlMetadata {
                value_set_count: 1,
                population_count: 1,
                definition_count: 2
            }
        );
    }

    #[test]
    fn test_failures_produce_no_text() {
        let result = CqlGenerator::default().generate(&Measure::new("m", "", "Nothing"));
        assert!(!result.success);
        assert!(result.cql.is_empty());
        assert_eq!(result.errors.len(), 2);
        assert!(result.into_result().is_err());
    }
}
