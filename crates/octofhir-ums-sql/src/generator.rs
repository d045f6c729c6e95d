//! SQL generation: predicate CTEs, population CTEs, funnel and result

use crate::dialect::{DialectConfig, sql_literal};
use crate::population::{PopulationFolder, indent, no_patient};
use crate::predicate::{BranchRenderer, MP_END, MP_START, PATIENT_BASE, extract_predicates, predicate_cte_name};
use chrono::{DateTime, Utc};
use octofhir_ums_diagnostics::{Diagnostic, NodeLocation, UMS0202, UmsError};
use octofhir_ums_ir::{GlobalConstraints, Measure, Population, PopulationType, blocking_errors, depth, fold_clause};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rough size of the generated query, for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Bucket a score of `predicates + 2 * max depth`
    pub fn from_score(score: usize) -> Self {
        match score {
            0..10 => Complexity::Low,
            10..25 => Complexity::Medium,
            _ => Complexity::High,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlMetadata {
    pub predicate_count: usize,
    /// Data categories in first-seen order
    pub data_models_used: Vec<String>,
    pub estimated_complexity: Complexity,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of one generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlGenerationResult {
    pub success: bool,
    /// Query text; empty when generation failed
    pub sql: String,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    pub metadata: SqlMetadata,
}

impl SqlGenerationResult {
    fn failed(errors: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            sql: String::new(),
            warnings: Vec::new(),
            errors,
            metadata: SqlMetadata {
                generated_at: Utc::now(),
                ..SqlMetadata::default()
            },
        }
    }

    /// The query text, or the first error
    pub fn into_result(self) -> Result<String, UmsError> {
        if self.success {
            return Ok(self.sql);
        }
        let mut errors: Vec<UmsError> = self
            .errors
            .iter()
            .map(|e| UmsError::generation(e.code, e.message.clone(), "sql"))
            .collect();
        Err(match errors.len() {
            1 => errors.remove(0),
            _ => UmsError::Multiple(errors),
        })
    }
}

/// Named CTEs in definition order
#[derive(Debug, Default)]
struct CteList {
    ctes: Vec<(String, String)>,
}

impl CteList {
    fn push(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.ctes.push((name.into(), body.into()));
    }

    fn render(&self) -> String {
        let defs: Vec<String> = self
            .ctes
            .iter()
            .map(|(name, body)| format!("{} AS (\n{}\n)", name, indent(body, 2)))
            .collect();
        format!("WITH\n{}\nSELECT * FROM MEASURE_RESULT", defs.join(",\n"))
    }
}

/// Generates CTE queries from measures
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    dialect: DialectConfig,
}

impl SqlGenerator {
    pub fn new(dialect: DialectConfig) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &DialectConfig {
        &self.dialect
    }

    /// Generate the query for a measure
    ///
    /// `sql` depends only on the measure and the dialect; `metadata.generated_at`
    /// is the only time-dependent value.
    pub fn generate(&self, measure: &Measure) -> SqlGenerationResult {
        let errors = blocking_errors(measure);
        if !errors.is_empty() {
            for error in &errors {
                log::warn!("{}: {}", error.code, error.message);
            }
            return SqlGenerationResult::failed(errors);
        }

        let d = &self.dialect;
        let mut warnings = Vec::new();
        let mut header = vec![
            format!(
                "-- UMS measure {}: {}",
                measure.metadata.measure_id.trim(),
                single_line(measure.title())
            ),
            format!("-- Dialect: {}", d.name),
            format!(
                "-- Parameters: {} (measurement period start), {} (measurement period end)",
                d.param(MP_START),
                d.param(MP_END)
            ),
        ];
        if let Some(period) = &measure.metadata.measurement_period {
            header.push(format!("-- Measurement period: {} to {}", period.start, period.end));
        }
        for value_set in measure.value_sets.iter().filter(|vs| vs.codes.is_empty()) {
            header.push(format!("-- WARNING: value set '{}' has no codes", single_line(&value_set.name)));
            let diagnostic = Diagnostic::warning(
                UMS0202,
                format!("Value set '{}' has no codes; predicates using it match every patient", value_set.name),
            )
            .with_location(NodeLocation::node(value_set.id.clone()));
            log::warn!("{}: {}", diagnostic.code, diagnostic.message);
            warnings.push(diagnostic);
        }

        let mut ctes = CteList::default();
        ctes.push(
            PATIENT_BASE,
            format!(
                "SELECT {} AS patient_id, {} AS birth_date, {} AS gender\nFROM {} p",
                d.column("p", &d.patient_id_column),
                d.column("p", &d.birth_date_column),
                d.column("p", &d.gender_column),
                d.table(&d.patient_table)
            ),
        );

        let predicates = extract_predicates(measure);
        let mut renderer = BranchRenderer::new(measure, d);
        for (category, group) in &predicates.by_category {
            log::debug!("{} predicates for category {}", group.len(), category);
            let branches: Vec<String> = group
                .iter()
                .map(|predicate| renderer.branch(predicate).join("\n"))
                .collect();
            ctes.push(predicate_cte_name(*category), branches.join("\nUNION ALL\n"));
        }
        warnings.append(&mut renderer.warnings);

        let mut next_alias = 0;
        let mut used_names: HashMap<String, usize> = HashMap::new();
        let mut population_ctes: Vec<(&Population, String)> = Vec::new();
        for population in &measure.populations {
            let base = format!("pop_{}", population.population_type.snake());
            let seen = used_names.entry(base.clone()).or_insert(0);
            *seen += 1;
            let name = if *seen == 1 { base } else { format!("{}_{}", base, seen) };

            let mut folder = PopulationFolder {
                population_id: &population.id,
                placeholders: &renderer.placeholders,
                warnings: &mut warnings,
                next_alias: &mut next_alias,
            };
            let query = fold_clause(
                &population.criteria,
                &NodeLocation::population(population.id.clone()),
                &mut folder,
            );
            log::debug!("population {} as {}", population.id, name);
            let body = match &population.description {
                Some(text) if !text.trim().is_empty() => format!("-- {}\n{}", single_line(text), query.sql),
                _ => query.sql,
            };
            ctes.push(name.clone(), body);
            population_ctes.push((population, name));
        }

        let funnel = Funnel::new(&population_ctes);
        funnel.write(&mut ctes, d, measure.global_constraints.as_ref());

        let max_depth = measure
            .populations
            .iter()
            .map(|p| depth(&p.criteria))
            .max()
            .unwrap_or(0);
        let metadata = SqlMetadata {
            predicate_count: predicates.len(),
            data_models_used: predicates.categories(),
            estimated_complexity: Complexity::from_score(predicates.len() + 2 * max_depth),
            generated_at: Utc::now(),
        };

        let sql = format!("{}\n{}\n", header.join("\n"), ctes.render());
        SqlGenerationResult {
            success: true,
            sql,
            warnings,
            errors: Vec::new(),
            metadata,
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First population CTE of each funnel stage
struct Funnel<'p> {
    by_type: HashMap<PopulationType, &'p str>,
}

impl<'p> Funnel<'p> {
    fn new(population_ctes: &'p [(&Population, String)]) -> Self {
        let mut by_type = HashMap::new();
        for (population, name) in population_ctes {
            by_type.entry(population.population_type).or_insert(name.as_str());
        }
        Self { by_type }
    }

    fn get(&self, population_type: PopulationType) -> Option<&'p str> {
        self.by_type.get(&population_type).copied()
    }

    fn write(&self, ctes: &mut CteList, d: &DialectConfig, constraints: Option<&GlobalConstraints>) {
        let ip = match self.get(PopulationType::InitialPopulation) {
            Some(name) => format!("SELECT DISTINCT patient_id FROM {}", name),
            None => no_patient(),
        };
        let ip = match constraints.and_then(|c| constraint_query(d, c)) {
            Some(constraint) => format!("{}\nINTERSECT\n{}", ip, constraint),
            None => ip,
        };
        ctes.push("ip", ip);

        ctes.push(
            "denom",
            match self.get(PopulationType::Denominator) {
                Some(name) => format!("SELECT patient_id FROM {}\nINTERSECT\nSELECT patient_id FROM ip", name),
                None => "SELECT patient_id FROM ip".to_string(),
            },
        );
        ctes.push("denex", self.within(PopulationType::DenominatorExclusion, "denom"));
        ctes.push(
            "numer",
            match self.get(PopulationType::Numerator) {
                Some(name) => format!(
                    "SELECT patient_id FROM {}\nINTERSECT\nSELECT patient_id FROM denom\nEXCEPT\nSELECT patient_id FROM denex",
                    name
                ),
                None => "SELECT patient_id FROM denom WHERE 1 = 0".to_string(),
            },
        );

        let exception = self.get(PopulationType::DenominatorException).is_some();
        let numerator_exclusion = self.get(PopulationType::NumeratorExclusion).is_some();
        if exception {
            ctes.push("denexcep", self.within(PopulationType::DenominatorException, "denom"));
        }
        if numerator_exclusion {
            ctes.push("numex", self.within(PopulationType::NumeratorExclusion, "numer"));
        }

        let mut stages = vec![
            ("ip", "in_initial_population"),
            ("denom", "in_denominator"),
            ("denex", "in_denominator_exclusion"),
            ("numer", "in_numerator"),
        ];
        if exception {
            stages.push(("denexcep", "in_denominator_exception"));
        }
        if numerator_exclusion {
            stages.push(("numex", "in_numerator_exclusion"));
        }

        let mut lines = vec!["SELECT b.patient_id,".to_string()];
        for (cte, column) in &stages {
            lines.push(format!(
                "  CASE WHEN {}.patient_id IS NULL THEN 0 ELSE 1 END AS {},",
                cte, column
            ));
        }
        lines.push("  CASE".to_string());
        lines.push("    WHEN ip.patient_id IS NULL OR denom.patient_id IS NULL THEN 'not_in_population'".to_string());
        lines.push("    WHEN denex.patient_id IS NOT NULL THEN 'excluded'".to_string());
        if exception {
            lines.push(
                "    WHEN numer.patient_id IS NULL AND denexcep.patient_id IS NOT NULL THEN 'excluded'".to_string(),
            );
        }
        lines.push("    WHEN numer.patient_id IS NULL THEN 'not_in_numerator'".to_string());
        if numerator_exclusion {
            lines.push("    WHEN numex.patient_id IS NOT NULL THEN 'not_in_numerator'".to_string());
        }
        lines.push("    ELSE 'in_numerator'".to_string());
        lines.push("  END AS outcome".to_string());
        lines.push(format!("FROM {} b", PATIENT_BASE));
        for (cte, _) in &stages {
            lines.push(format!("LEFT JOIN {0} ON {0}.patient_id = b.patient_id", cte));
        }
        ctes.push("MEASURE_RESULT", lines.join("\n"));
    }

    /// Stage restricted to the patients of an earlier stage
    fn within(&self, population_type: PopulationType, parent: &str) -> String {
        match self.get(population_type) {
            Some(name) => format!(
                "SELECT patient_id FROM {}\nINTERSECT\nSELECT patient_id FROM {}",
                name, parent
            ),
            None => format!("SELECT patient_id FROM {} WHERE 1 = 0", parent),
        }
    }
}

fn constraint_query(d: &DialectConfig, constraints: &GlobalConstraints) -> Option<String> {
    let age = d.age("b.birth_date", &d.param(MP_END));
    let mut conditions = Vec::new();
    if let Some(min) = constraints.age_min {
        conditions.push(format!("{} >= {}", age, min));
    }
    if let Some(max) = constraints.age_max {
        conditions.push(format!("{} <= {}", age, max));
    }
    if let Some(gender) = constraints.gender.as_deref().filter(|g| !g.trim().is_empty()) {
        conditions.push(format!("LOWER(b.gender) = {}", sql_literal(&gender.trim().to_lowercase())));
    }
    if conditions.is_empty() {
        return None;
    }
    Some(format!(
        "SELECT b.patient_id FROM {} b\nWHERE {}",
        PATIENT_BASE,
        conditions.join("\n  AND ")
    ))
}
