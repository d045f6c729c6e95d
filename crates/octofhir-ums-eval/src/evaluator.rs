//! Measure evaluation
//!
//! Populations are evaluated in funnel order and evaluation stops as soon as
//! the outcome is decided, so a trace only contains the stages that mattered.

use crate::patient::{ClinicalEvent, PatientRecord};
use crate::trace::{
    Fact, FactKind, Facts, FinalOutcome, NodeKind, NodeStatus, PopulationResult, ValidationNode,
    ValidationTrace,
};
use octofhir_ums_diagnostics::{Diagnostic, NodeLocation, UMS0400, UMS0401, UMS0403};
use octofhir_ums_ir::{
    Connective, DataCategory, DataElement, GlobalConstraints, LogicFolder, LogicalClause,
    LogicalOperator, Measure, MeasurementPeriod, Population, PopulationType, Thresholds,
    TimingWindow, ValueSet, fold_clause,
};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

/// Node id of the measure-wide constraints in an initial population result
pub const GLOBAL_CONSTRAINTS_NODE: &str = "global-constraints";

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Calendar year used when a measure has no measurement period
    pub default_year: i32,
    /// Cap on code-match facts recorded per element
    pub max_facts_per_node: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            default_year: 2025,
            max_facts_per_node: 5,
        }
    }
}

/// Evaluates patients against measures
#[derive(Debug, Clone, Default)]
pub struct MeasureEvaluator {
    config: EvaluatorConfig,
}

impl MeasureEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Run the measure funnel for one patient
    pub fn evaluate(&self, patient: &PatientRecord, measure: &Measure) -> ValidationTrace {
        let period = measure.measurement_period_or(self.config.default_year);
        let mut run = FunnelRun {
            evaluator: self,
            patient,
            measure,
            period,
            results: Vec::new(),
            warnings: Vec::new(),
        };
        let final_outcome = run.outcome();
        log::debug!("patient {} -> {}", patient.id, final_outcome);
        ValidationTrace {
            patient_id: patient.id.clone(),
            measure_id: measure.id.clone(),
            final_outcome,
            population_results: run.results,
            warnings: run.warnings,
        }
    }

    /// Evaluate a single population without the funnel
    pub fn evaluate_population(
        &self,
        patient: &PatientRecord,
        measure: &Measure,
        population: &Population,
    ) -> PopulationResult {
        let period = measure.measurement_period_or(self.config.default_year);
        let mut warnings = Vec::new();
        self.population(patient, measure, period, population, &mut warnings)
    }

    fn population(
        &self,
        patient: &PatientRecord,
        measure: &Measure,
        period: MeasurementPeriod,
        population: &Population,
        warnings: &mut Vec<Diagnostic>,
    ) -> PopulationResult {
        let mut folder = NodeEvaluator {
            measure,
            patient,
            period,
            config: &self.config,
            warnings,
        };
        let location = NodeLocation::population(population.id.clone());
        // measure-wide constraints only gate the initial population
        let constraints = match population.population_type {
            PopulationType::InitialPopulation => measure
                .global_constraints
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| folder.global_constraints(c, &location)),
            _ => None,
        };
        let root = fold_clause(&population.criteria, &location, &mut folder);
        log::debug!(
            "population {} ({}) for patient {}: {:?}",
            population.id,
            population.population_type,
            patient.id,
            root.status
        );
        let mut met = root.passed();
        let mut nodes = vec![root];
        if let Some(node) = constraints {
            log::debug!("global constraints for patient {}: {:?}", patient.id, node.status);
            met &= node.passed();
            nodes.push(node);
        }
        PopulationResult {
            population_id: population.id.clone(),
            population_type: population.population_type,
            met,
            nodes,
        }
    }
}

struct FunnelRun<'a> {
    evaluator: &'a MeasureEvaluator,
    patient: &'a PatientRecord,
    measure: &'a Measure,
    period: MeasurementPeriod,
    results: Vec<PopulationResult>,
    warnings: Vec<Diagnostic>,
}

impl FunnelRun<'_> {
    /// Evaluate the first population of a type; `None` when the measure has none
    fn stage(&mut self, population_type: PopulationType) -> Option<bool> {
        let measure = self.measure;
        let mut of_type = measure.populations_of(population_type);
        let population = of_type.next()?;
        if let Some(duplicate) = of_type.next() {
            let diagnostic = Diagnostic::warning(
                UMS0403,
                format!(
                    "Population type '{}' is defined more than once; '{}' is used",
                    population_type, population.id
                ),
            )
            .with_location(NodeLocation::population(duplicate.id.clone()));
            log::warn!("{}: {}", diagnostic.code, diagnostic.message);
            self.warnings.push(diagnostic);
        }
        let result = self.evaluator.population(
            self.patient,
            measure,
            self.period,
            population,
            &mut self.warnings,
        );
        let met = result.met;
        self.results.push(result);
        Some(met)
    }

    fn outcome(&mut self) -> FinalOutcome {
        if !self.stage(PopulationType::InitialPopulation).unwrap_or(false) {
            return FinalOutcome::NotInPopulation;
        }
        // a missing denominator equals the initial population
        if !self.stage(PopulationType::Denominator).unwrap_or(true) {
            return FinalOutcome::NotInPopulation;
        }
        if self.stage(PopulationType::DenominatorExclusion).unwrap_or(false) {
            return FinalOutcome::Excluded;
        }
        if self.stage(PopulationType::Numerator).unwrap_or(false) {
            if self.stage(PopulationType::NumeratorExclusion).unwrap_or(false) {
                FinalOutcome::NotInNumerator
            } else {
                FinalOutcome::InNumerator
            }
        } else if self.stage(PopulationType::DenominatorException).unwrap_or(false) {
            FinalOutcome::Excluded
        } else {
            FinalOutcome::NotInNumerator
        }
    }
}

/// Leaf and clause rules over one patient
struct NodeEvaluator<'a, 'w> {
    measure: &'a Measure,
    patient: &'a PatientRecord,
    period: MeasurementPeriod,
    config: &'a EvaluatorConfig,
    warnings: &'w mut Vec<Diagnostic>,
}

impl<'a> NodeEvaluator<'a, '_> {
    fn usable_value_sets(&self, element: &DataElement) -> Vec<&'a ValueSet> {
        let measure = self.measure;
        let mut found: Vec<&'a ValueSet> = Vec::new();
        for reference in &element.value_set_refs {
            if let Some(vs) = measure.value_set(reference) {
                if !vs.codes.is_empty() && !found.iter().any(|f| f.id == vs.id) {
                    found.push(vs);
                }
            }
        }
        found
    }

    fn leaf(element: &DataElement, passed: bool, facts: Facts) -> ValidationNode {
        ValidationNode {
            node_id: element.id.clone(),
            kind: NodeKind::Element,
            label: element.label().to_string(),
            operator: None,
            status: NodeStatus::from_bool(passed),
            facts,
            children: Vec::new(),
        }
    }

    fn placeholder(&mut self, element: &DataElement, location: &NodeLocation) -> ValidationNode {
        self.warnings.push(
            Diagnostic::info(
                UMS0400,
                format!("'{}' has no usable value set and passes unconditionally", element.label()),
            )
            .with_location(location.clone()),
        );
        Self::leaf(
            element,
            true,
            smallvec![Fact::new(
                FactKind::Placeholder,
                format!("No usable value set for '{}'; treated as met", element.label()),
            )],
        )
    }

    fn demographic(&mut self, element: &DataElement, location: &NodeLocation) -> ValidationNode {
        let thresholds = element.thresholds.clone().unwrap_or_default();
        let genders: Vec<&str> = self
            .usable_value_sets(element)
            .into_iter()
            .flat_map(|vs| vs.codes.iter().map(|c| c.code.as_str()))
            .collect();
        if !thresholds.has_age() && genders.is_empty() {
            return self.placeholder(element, location);
        }
        let (passed, facts) = self.check_demographics(&thresholds, &genders, location);
        Self::leaf(element, passed != element.negation, facts)
    }

    /// Age at the period end and gender, shared by elements and measure-wide constraints
    fn check_demographics(
        &mut self,
        thresholds: &Thresholds,
        genders: &[&str],
        location: &NodeLocation,
    ) -> (bool, Facts) {
        let mut facts = Facts::new();
        let mut passed = true;
        if thresholds.has_age() {
            let as_of = self.period.end;
            match self.patient.age_at(as_of) {
                Some(age) => {
                    let in_range = thresholds.age_min.is_none_or(|min| age >= min)
                        && thresholds.age_max.is_none_or(|max| age <= max);
                    passed &= in_range;
                    facts.push(Fact {
                        date: Some(as_of),
                        value: Some(age.into()),
                        ..Fact::new(
                            FactKind::Demographic,
                            format!("Age {} at {} ({})", age, as_of, describe_age_range(thresholds)),
                        )
                    });
                }
                None => {
                    passed = false;
                    self.warnings.push(
                        Diagnostic::warning(
                            UMS0401,
                            format!("Patient '{}' has no usable birth date", self.patient.id),
                        )
                        .with_location(location.clone()),
                    );
                    facts.push(Fact::new(FactKind::Demographic, "Birth date unknown"));
                }
            }
        }
        if !genders.is_empty() {
            let gender = self.patient.gender.as_deref().unwrap_or("").trim();
            let matches = genders.iter().any(|g| g.trim().eq_ignore_ascii_case(gender));
            passed &= matches;
            facts.push(Fact {
                code: Some(gender.to_string()),
                ..Fact::new(
                    FactKind::Demographic,
                    format!(
                        "Gender {} (required {})",
                        if gender.is_empty() { "unknown" } else { gender },
                        genders.join(" or ")
                    ),
                )
            });
        }
        (passed, facts)
    }

    fn global_constraints(&mut self, constraints: &GlobalConstraints, location: &NodeLocation) -> ValidationNode {
        let thresholds = Thresholds::age(constraints.age_min, constraints.age_max);
        let genders: Vec<&str> = constraints
            .gender
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .into_iter()
            .collect();
        let (passed, facts) =
            self.check_demographics(&thresholds, &genders, &location.child(GLOBAL_CONSTRAINTS_NODE));
        ValidationNode {
            node_id: GLOBAL_CONSTRAINTS_NODE.to_string(),
            kind: NodeKind::Element,
            label: "Global constraints".to_string(),
            operator: None,
            status: NodeStatus::from_bool(passed),
            facts,
            children: Vec::new(),
        }
    }

    fn clinical(&mut self, element: &DataElement, location: &NodeLocation) -> ValidationNode {
        let value_sets = self.usable_value_sets(element);
        let thresholds = element.thresholds.clone().unwrap_or_default();
        if value_sets.is_empty() && !thresholds.has_value() {
            return self.placeholder(element, location);
        }

        let window = element.window();
        let matching: Vec<&ClinicalEvent> = self
            .patient
            .events_of(element.element_kind)
            .filter(|event| {
                value_sets.is_empty() || value_sets.iter().any(|vs| vs.contains(&event.code, &event.system))
            })
            .filter(|event| in_window(event, window, &self.period))
            .filter(|event| satisfies_value(event, &thresholds))
            .collect();

        let matched = !matching.is_empty();
        let facts: Facts = if element.negation && !matched {
            smallvec![Fact::new(
                FactKind::Absence,
                format!("No {} found ({})", element.label(), describe_window(window)),
            )]
        } else {
            matching
                .iter()
                .take(self.config.max_facts_per_node)
                .map(|event| code_match(event))
                .collect()
        };
        Self::leaf(element, matched != element.negation, facts)
    }
}

impl LogicFolder for NodeEvaluator<'_, '_> {
    type Output = ValidationNode;

    fn element(&mut self, element: &DataElement, location: &NodeLocation) -> ValidationNode {
        match element.element_kind {
            DataCategory::Demographic => self.demographic(element, location),
            _ => self.clinical(element, location),
        }
    }

    fn clause(
        &mut self,
        clause: &LogicalClause,
        connective: Connective,
        parts: Vec<ValidationNode>,
        _location: &NodeLocation,
    ) -> ValidationNode {
        let statuses: Vec<bool> = parts.iter().map(ValidationNode::passed).collect();
        let label = match (connective, clause.operator) {
            (Connective::All, _) => "All of",
            (Connective::Any, _) => "Any of",
            (Connective::NotAll, LogicalOperator::Not) if parts.len() <= 1 => "Not",
            (Connective::NotAll, _) => "Not all of",
        };
        ValidationNode {
            node_id: clause.id.clone(),
            kind: NodeKind::Clause,
            label: label.to_string(),
            operator: Some(clause.operator),
            status: NodeStatus::from_bool(connective.apply(&statuses)),
            facts: Facts::new(),
            children: parts,
        }
    }
}

fn in_window(event: &ClinicalEvent, window: TimingWindow, period: &MeasurementPeriod) -> bool {
    let Some(date) = event.date else {
        return window == TimingWindow::Anytime;
    };
    match window {
        TimingWindow::DuringMeasurementPeriod => period.contains(date),
        TimingWindow::BeforeEndOfMeasurementPeriod => date <= period.end,
        TimingWindow::LookbackFromEnd { days } => {
            let start = period.end - chrono::Duration::days(i64::from(days));
            start <= date && date <= period.end
        }
        TimingWindow::Anytime => true,
    }
}

fn satisfies_value(event: &ClinicalEvent, thresholds: &Thresholds) -> bool {
    if !thresholds.has_value() {
        return true;
    }
    let Some(value) = event.value else {
        return false;
    };
    if thresholds.value_min.is_some_and(|min| value < min) || thresholds.value_max.is_some_and(|max| value > max) {
        return false;
    }
    match (thresholds.unit.as_deref(), event.unit.as_deref()) {
        (Some(required), Some(actual)) if !required.trim().is_empty() => {
            required.trim().eq_ignore_ascii_case(actual.trim())
        }
        _ => true,
    }
}

fn code_match(event: &ClinicalEvent) -> Fact {
    let mut description = format!("{} {}", event.category.label(), event.code);
    if let Some(display) = &event.display {
        description.push_str(&format!(" ({})", display));
    }
    if let Some(date) = event.date {
        description.push_str(&format!(" on {}", date));
    }
    if let Some(value) = event.value {
        description.push_str(&format!(" value {}{}", value, event.unit.as_deref().unwrap_or("")));
    }
    Fact {
        code: Some(event.code.clone()),
        system: Some(event.system.clone()).filter(|s| !s.is_empty()),
        display: event.display.clone(),
        date: event.date,
        value: event.value,
        ..Fact::new(FactKind::CodeMatch, description)
    }
}

fn describe_age_range(thresholds: &Thresholds) -> String {
    match (thresholds.age_min, thresholds.age_max) {
        (Some(min), Some(max)) => format!("required {}-{}", min, max),
        (Some(min), None) => format!("required >= {}", min),
        (None, Some(max)) => format!("required <= {}", max),
        (None, None) => "no range".to_string(),
    }
}

fn describe_window(window: TimingWindow) -> String {
    match window {
        TimingWindow::DuringMeasurementPeriod => "during the measurement period".to_string(),
        TimingWindow::BeforeEndOfMeasurementPeriod => "before the end of the measurement period".to_string(),
        TimingWindow::LookbackFromEnd { days } => format!("within {} days before the period end", days),
        TimingWindow::Anytime => "at any time".to_string(),
    }
}
