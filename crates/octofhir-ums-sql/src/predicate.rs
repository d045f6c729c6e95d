//! Predicate extraction and predicate CTE branches
//!
//! Every data element of every population becomes one predicate: a query
//! returning the patients for which the element's positive condition holds.
//! Negation is applied later, when populations combine predicates.

use crate::dialect::{DialectConfig, TableMapping, sql_literal};
use indexmap::IndexMap;
use octofhir_ums_diagnostics::{Diagnostic, NodeLocation, UMS0006, UMS0201, UMS0205};
use octofhir_ums_ir::{
    Connective, DataCategory, DataElement, LogicFolder, LogicalClause, Measure, Thresholds,
    TimingWindow, ValueSet, fold_clause,
};
use std::collections::HashSet;

pub(crate) const MP_START: &str = "mp_start";
pub(crate) const MP_END: &str = "mp_end";
pub(crate) const PATIENT_BASE: &str = "patient_base";

/// One data element as used by one population
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub population_id: String,
    pub element: DataElement,
    pub location: NodeLocation,
}

impl Predicate {
    pub fn predicate_id(&self) -> &str {
        &self.element.id
    }

    pub fn key(&self) -> (String, String) {
        (self.population_id.clone(), self.element.id.clone())
    }
}

/// Predicates grouped by data category in first-seen order
#[derive(Debug, Clone, Default)]
pub struct PredicateSet {
    pub by_category: IndexMap<DataCategory, Vec<Predicate>>,
}

impl PredicateSet {
    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Category names in first-seen order
    pub fn categories(&self) -> Vec<String> {
        self.by_category.keys().map(|c| c.as_str().to_string()).collect()
    }
}

/// CTE holding the predicates of a category
pub fn predicate_cte_name(category: DataCategory) -> String {
    format!("{}_predicates", category.as_str())
}

struct Collector<'s> {
    population_id: &'s str,
    seen: &'s mut HashSet<(String, String)>,
    set: &'s mut PredicateSet,
}

impl LogicFolder for Collector<'_> {
    type Output = ();

    fn element(&mut self, element: &DataElement, location: &NodeLocation) {
        let key = (self.population_id.to_string(), element.id.clone());
        if !self.seen.insert(key) {
            return;
        }
        self.set
            .by_category
            .entry(element.element_kind)
            .or_default()
            .push(Predicate {
                population_id: self.population_id.to_string(),
                element: element.clone(),
                location: location.clone(),
            });
    }

    fn clause(&mut self, _: &LogicalClause, _: Connective, _: Vec<()>, _: &NodeLocation) {}
}

/// Collect the predicates of every population, keyed by population and element id
pub fn extract_predicates(measure: &Measure) -> PredicateSet {
    let mut set = PredicateSet::default();
    let mut seen = HashSet::new();
    for population in &measure.populations {
        let mut collector = Collector {
            population_id: &population.id,
            seen: &mut seen,
            set: &mut set,
        };
        fold_clause(
            &population.criteria,
            &NodeLocation::population(population.id.clone()),
            &mut collector,
        );
    }
    set
}

/// Renders predicate branches for one generation run
pub(crate) struct BranchRenderer<'a> {
    pub measure: &'a Measure,
    pub dialect: &'a DialectConfig,
    pub warnings: Vec<Diagnostic>,
    /// Predicates rendered as "every patient"
    pub placeholders: HashSet<(String, String)>,
}

impl<'a> BranchRenderer<'a> {
    pub fn new(measure: &'a Measure, dialect: &'a DialectConfig) -> Self {
        Self {
            measure,
            dialect,
            warnings: Vec::new(),
            placeholders: HashSet::new(),
        }
    }

    fn warn(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}: {}", diagnostic.code, diagnostic.message);
        self.warnings.push(diagnostic);
    }

    fn usable_value_sets(&mut self, predicate: &Predicate) -> Vec<&'a ValueSet> {
        let measure = self.measure;
        let mut resolved: Vec<&'a ValueSet> = Vec::new();
        for reference in &predicate.element.value_set_refs {
            match measure.value_set(reference) {
                Some(vs) if !resolved.iter().any(|r| r.id == vs.id) => resolved.push(vs),
                Some(_) => {}
                None => self.warn(
                    Diagnostic::warning(
                        UMS0006,
                        format!(
                            "'{}' references value set '{}' which is not declared",
                            predicate.element.label(),
                            reference
                        ),
                    )
                    .with_location(predicate.location.clone()),
                ),
            }
        }
        resolved.retain(|vs| !vs.codes.is_empty());
        resolved
    }

    fn select_head(&self, predicate: &Predicate, patient_column: &str) -> String {
        format!(
            "SELECT {} AS population_id, {} AS predicate_id, {} AS patient_id",
            sql_literal(&predicate.population_id),
            sql_literal(predicate.predicate_id()),
            patient_column
        )
    }

    fn placeholder(&mut self, predicate: &Predicate, reason: &str) -> Vec<String> {
        let message = format!(
            "placeholder predicate for {}/{}: {}",
            predicate.population_id,
            predicate.predicate_id(),
            reason
        );
        self.warn(
            Diagnostic::warning(UMS0201, format!("'{}' {}; every patient matches", predicate.element.label(), reason))
                .with_location(predicate.location.clone()),
        );
        self.placeholders.insert(predicate.key());
        vec![
            format!("-- WARNING: {}", message),
            self.select_head(predicate, "b.patient_id"),
            format!("FROM {} b", PATIENT_BASE),
        ]
    }

    /// Lines of one `UNION ALL` branch
    pub fn branch(&mut self, predicate: &Predicate) -> Vec<String> {
        let mut lines = vec![format!(
            "-- {}/{}: {}",
            predicate.population_id,
            predicate.predicate_id(),
            single_line(predicate.element.label())
        )];
        let value_sets = self.usable_value_sets(predicate);
        let dialect = self.dialect;
        let body = match predicate.element.element_kind {
            DataCategory::Demographic => self.demographic(predicate, &value_sets),
            category => match dialect.table_for(category) {
                Some(mapping) => self.event(predicate, &value_sets, mapping),
                None => {
                    self.warn(
                        Diagnostic::warning(
                            UMS0205,
                            format!("Dialect '{}' has no table for category '{}'", dialect.name, category),
                        )
                        .with_location(predicate.location.clone()),
                    );
                    self.placeholder(predicate, &format!("no table mapping for '{}'", category))
                }
            },
        };
        lines.extend(body);
        lines
    }

    fn demographic(&mut self, predicate: &Predicate, value_sets: &[&ValueSet]) -> Vec<String> {
        let thresholds = predicate.element.thresholds.clone().unwrap_or_default();
        let age = self.dialect.age("b.birth_date", &self.dialect.param(MP_END));
        let mut conditions = Vec::new();
        if let Some(min) = thresholds.age_min {
            conditions.push(format!("{} >= {}", age, min));
        }
        if let Some(max) = thresholds.age_max {
            conditions.push(format!("{} <= {}", age, max));
        }
        let genders = gender_codes(value_sets.iter().flat_map(|vs| vs.codes.iter().map(|c| c.code.as_str())));
        if !genders.is_empty() {
            let genders: Vec<&str> = genders.iter().map(String::as_str).collect();
            conditions.push(format!("LOWER(b.gender) IN ({})", literal_list(&genders)));
        }
        if conditions.is_empty() {
            return self.placeholder(predicate, "no age threshold or gender value set");
        }
        let mut lines = vec![
            self.select_head(predicate, "b.patient_id"),
            format!("FROM {} b", PATIENT_BASE),
        ];
        lines.extend(where_lines(&conditions));
        lines
    }

    fn event(&mut self, predicate: &Predicate, value_sets: &[&ValueSet], mapping: &TableMapping) -> Vec<String> {
        let thresholds = predicate.element.thresholds.clone().unwrap_or_default();
        if value_sets.is_empty() && !thresholds.has_value() {
            return self.placeholder(predicate, "no usable value set");
        }

        let d = self.dialect;
        let values = value_conditions(d, mapping, &thresholds);
        if values.is_err() {
            self.warn(
                Diagnostic::warning(
                    UMS0205,
                    format!(
                        "Table '{}' has no value column; thresholds of '{}' are ignored",
                        mapping.table,
                        predicate.element.label()
                    ),
                )
                .with_location(predicate.location.clone()),
            );
            // thresholds were the only filter
            if value_sets.is_empty() {
                return self.placeholder(predicate, &format!("no value column on '{}'", mapping.table));
            }
        }

        let mut conditions = Vec::new();
        if !value_sets.is_empty() {
            conditions.push(code_condition(d, mapping, value_sets));
        }
        if let Some(timing) = timing_condition(d, mapping, predicate.element.window()) {
            conditions.push(timing);
        }
        conditions.extend(values.unwrap_or_default());

        let mut lines = vec![
            self.select_head(predicate, &d.column("e", &d.patient_id_column)),
            format!("FROM {} e", d.table(&mapping.table)),
        ];
        lines.extend(where_lines(&conditions));
        lines
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cased, trimmed and deduplicated gender codes
pub(crate) fn gender_codes<'c>(codes: impl Iterator<Item = &'c str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for code in codes.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()) {
        if !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

fn literal_list(values: &[&str]) -> String {
    values.iter().map(|v| sql_literal(v)).collect::<Vec<_>>().join(", ")
}

fn where_lines(conditions: &[String]) -> Vec<String> {
    conditions
        .iter()
        .enumerate()
        .map(|(i, c)| if i == 0 { format!("WHERE {}", c) } else { format!("  AND {}", c) })
        .collect()
}

/// Inline code list grouped by code system in first-seen order
fn code_condition(d: &DialectConfig, mapping: &TableMapping, value_sets: &[&ValueSet]) -> String {
    let mut by_system: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for code in value_sets.iter().flat_map(|vs| vs.codes.iter()) {
        let codes = by_system.entry(code.system.as_str()).or_default();
        if !codes.contains(&code.code.as_str()) {
            codes.push(&code.code);
        }
    }
    let code_col = d.column("e", &mapping.code_column);
    let system_col = d.column("e", &mapping.system_column);
    let groups: Vec<String> = by_system
        .iter()
        .map(|(system, codes)| {
            if system.is_empty() {
                format!("{} IN ({})", code_col, literal_list(codes))
            } else {
                format!(
                    "({} = {} AND {} IN ({}))",
                    system_col,
                    sql_literal(system),
                    code_col,
                    literal_list(codes)
                )
            }
        })
        .collect();
    if groups.len() == 1 {
        groups.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", groups.join(" OR "))
    }
}

fn timing_condition(d: &DialectConfig, mapping: &TableMapping, window: TimingWindow) -> Option<String> {
    let date = d.column("e", &mapping.date_column);
    let start = d.param(MP_START);
    let end = d.param(MP_END);
    match window {
        TimingWindow::Anytime => None,
        TimingWindow::DuringMeasurementPeriod => Some(format!("{} BETWEEN {} AND {}", date, start, end)),
        TimingWindow::BeforeEndOfMeasurementPeriod => Some(format!("{} <= {}", date, end)),
        TimingWindow::LookbackFromEnd { days } => Some(format!(
            "{} BETWEEN {} AND {}",
            date,
            d.date_minus_days(&end, days),
            end
        )),
    }
}

/// Value comparisons; `Err` when thresholds exist but the table has no value column
fn value_conditions(d: &DialectConfig, mapping: &TableMapping, thresholds: &Thresholds) -> Result<Vec<String>, ()> {
    if !thresholds.has_value() {
        return Ok(Vec::new());
    }
    let Some(value_column) = &mapping.value_column else {
        return Err(());
    };
    let value = d.column("e", value_column);
    let mut conditions = Vec::new();
    if let Some(min) = thresholds.value_min {
        conditions.push(format!("{} >= {}", value, min));
    }
    if let Some(max) = thresholds.value_max {
        conditions.push(format!("{} <= {}", value, max));
    }
    if let (Some(unit), Some(unit_column)) = (thresholds.unit.as_deref(), &mapping.unit_column) {
        if !unit.trim().is_empty() {
            conditions.push(format!("{} = {}", d.column("e", unit_column), sql_literal(unit.trim())));
        }
    }
    Ok(conditions)
}
