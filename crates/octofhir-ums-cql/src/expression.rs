//! Element and population expressions

use crate::naming::{NameTable, comment_text, quoted, string_literal};
use crate::resource::mapping_for;
use crate::writer::Definition;
use indexmap::IndexMap;
use octofhir_ums_diagnostics::{
    Diagnostic, NodeLocation, UMS0101, UMS0103, UMS0104, UMS0105, UMS0106,
};
use octofhir_ums_ir::{
    Connective, DataCategory, DataElement, GlobalConstraints, LogicFolder, LogicalClause, Measure,
    ShapeIssue, Thresholds, TimingWindow, ValueSet,
};
use std::collections::HashMap;

pub(crate) const MEASUREMENT_PERIOD: &str = "Measurement Period";

/// A rendered piece of a population expression
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub text: String,
    /// Connective of a compound fragment; `None` for atoms
    pub connective: Option<Connective>,
}

impl Fragment {
    fn atom(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            connective: None,
        }
    }

    /// Text usable as an operand of another connective
    fn operand(&self) -> String {
        match self.connective {
            Some(Connective::All) | Some(Connective::Any) => format!("({})", self.text),
            _ => self.text.clone(),
        }
    }
}

/// Mutable state of one generation run
pub(crate) struct Generation<'a> {
    pub measure: &'a Measure,
    pub names: NameTable,
    /// Value set id to declared name
    pub value_set_names: HashMap<String, String>,
    /// Definition key to definition, in first-seen order
    ///
    /// The key is the element id, suffixed `#2`, `#3`... when the id is
    /// reused by elements with different criteria.
    pub element_defs: IndexMap<String, Definition>,
    /// Element id to each distinct element seen under it and its definition key
    element_variants: HashMap<String, Vec<(DataElement, String)>>,
    pub warnings: Vec<Diagnostic>,
}

impl<'a> Generation<'a> {
    pub fn new(measure: &'a Measure) -> Self {
        let mut names = NameTable::new();
        names.claim(MEASUREMENT_PERIOD);
        names.claim("Patient");
        Self {
            measure,
            names,
            value_set_names: HashMap::new(),
            element_defs: IndexMap::new(),
            element_variants: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}: {}", diagnostic.code, diagnostic.message);
        self.warnings.push(diagnostic);
    }

    /// Value sets an element references, in reference order, unresolved ones warned
    fn resolve_value_sets(&mut self, element: &DataElement, location: &NodeLocation) -> Vec<&'a ValueSet> {
        let measure = self.measure;
        let mut resolved: Vec<&'a ValueSet> = Vec::new();
        for reference in &element.value_set_refs {
            match measure.value_set(reference) {
                Some(vs) if !resolved.iter().any(|r| r.id == vs.id) => resolved.push(vs),
                Some(_) => {}
                None => self.warn(
                    Diagnostic::warning(
                        UMS0105,
                        format!(
                            "'{}' references value set '{}' which is not declared",
                            element.label(),
                            reference
                        ),
                    )
                    .with_location(location.clone()),
                ),
            }
        }
        resolved
    }

    fn define_element(&mut self, element: &DataElement, location: &NodeLocation) -> String {
        let variants = self.element_variants.get(&element.id).map(Vec::as_slice).unwrap_or_default();
        if let Some((_, key)) = variants.iter().find(|(seen, _)| seen == element) {
            if let Some(existing) = self.element_defs.get(key) {
                return existing.name.clone();
            }
        }
        let key = match variants.len() {
            0 => element.id.clone(),
            n => {
                self.warn(
                    Diagnostic::warning(
                        UMS0106,
                        format!(
                            "Element id '{}' is reused for different criteria; '{}' gets its own definition",
                            element.id,
                            element.label()
                        ),
                    )
                    .with_location(location.clone()),
                );
                format!("{}#{}", element.id, n + 1)
            }
        };
        self.element_variants
            .entry(element.id.clone())
            .or_default()
            .push((element.clone(), key.clone()));

        let name = self.names.claim(element.label());
        // empty value sets are unusable; such elements fall back to a placeholder
        let value_sets: Vec<&ValueSet> = self
            .resolve_value_sets(element, location)
            .into_iter()
            .filter(|vs| !vs.codes.is_empty())
            .collect();
        let body = match element.element_kind {
            DataCategory::Demographic => demographic_body(element, &value_sets),
            _ => self.retrieve_body(element, &value_sets),
        };

        let definition = match body {
            Some(body) => Definition {
                name: name.clone(),
                comments: Vec::new(),
                body,
            },
            None => {
                let message = format!(
                    "'{}' has no usable value set; placeholder expression 'true' emitted",
                    element.label()
                );
                self.warn(
                    Diagnostic::warning(UMS0101, message.clone())
                        .with_location(location.clone())
                        .with_help("Attach a value set with codes to the element"),
                );
                Definition {
                    name: name.clone(),
                    comments: vec![format!("WARNING: {}", comment_text(&message))],
                    body: "true".to_string(),
                }
            }
        };
        self.element_defs.insert(key, definition);
        name
    }

    fn retrieve_body(&self, element: &DataElement, value_sets: &[&ValueSet]) -> Option<String> {
        let mapping = mapping_for(element.element_kind)?;
        let thresholds = element.thresholds.clone().unwrap_or_default();
        if value_sets.is_empty() && !thresholds.has_value() {
            return None;
        }

        let retrieves: Vec<String> = if value_sets.is_empty() {
            vec![format!("[{}]", mapping.resource)]
        } else {
            value_sets
                .iter()
                .map(|vs| {
                    let name = self
                        .value_set_names
                        .get(&vs.id)
                        .cloned()
                        .unwrap_or_else(|| vs.name.clone());
                    format!("[{}: {}]", mapping.resource, quoted(&name))
                })
                .collect()
        };
        let source = if retrieves.len() == 1 {
            retrieves[0].clone()
        } else {
            format!("({})", retrieves.join(" union "))
        };

        let alias = mapping.alias;
        let mut conditions = Vec::new();
        if let Some(timing) = timing_condition(element.window(), alias, mapping.timing_path, mapping.interval) {
            conditions.push(timing);
        }
        conditions.extend(value_conditions(&thresholds, alias));

        let exists = if element.negation { "not exists" } else { "exists" };
        if conditions.is_empty() {
            return Some(format!("{} {}", exists, source));
        }

        let mut body = format!("{} (\n  {} {}\n    where {}", exists, source, alias, conditions[0]);
        for condition in &conditions[1..] {
            body.push_str(&format!("\n      and {}", condition));
        }
        body.push_str("\n)");
        Some(body)
    }
}

fn age_expression() -> String {
    format!("AgeInYearsAt(date from end of {})", quoted(MEASUREMENT_PERIOD))
}

fn age_conditions(min: Option<u32>, max: Option<u32>) -> Vec<String> {
    let mut conditions = Vec::new();
    if let Some(min) = min {
        conditions.push(format!("{} >= {}", age_expression(), min));
    }
    if let Some(max) = max {
        conditions.push(format!("{} <= {}", age_expression(), max));
    }
    conditions
}

fn demographic_body(element: &DataElement, value_sets: &[&ValueSet]) -> Option<String> {
    let thresholds = element.thresholds.clone().unwrap_or_default();
    let mut conditions = age_conditions(thresholds.age_min, thresholds.age_max);

    // FHIR administrative-gender codes are lower case
    let mut genders: Vec<String> = Vec::new();
    for code in value_sets.iter().flat_map(|vs| vs.codes.iter()) {
        let gender = code.code.trim().to_lowercase();
        if !gender.is_empty() && !genders.contains(&gender) {
            genders.push(gender);
        }
    }
    if !genders.is_empty() {
        let literals: Vec<String> = genders.iter().map(|g| string_literal(g)).collect();
        conditions.push(format!("Patient.gender in {{ {} }}", literals.join(", ")));
    }

    if conditions.is_empty() {
        return None;
    }
    let joined = conditions.join("\n  and ");
    Some(if element.negation {
        format!("not (\n  {}\n)", conditions.join("\n    and "))
    } else {
        joined
    })
}

fn timing_condition(window: TimingWindow, alias: &str, path: &str, interval: bool) -> Option<String> {
    let target = format!("{}.{}", alias, path);
    let period = quoted(MEASUREMENT_PERIOD);
    let relation = if interval { "overlaps" } else { "during" };
    match window {
        TimingWindow::Anytime => None,
        TimingWindow::DuringMeasurementPeriod => Some(format!("{} {} {}", target, relation, period)),
        TimingWindow::BeforeEndOfMeasurementPeriod => {
            let anchor = if interval { " starts" } else { "" };
            Some(format!("{}{} same or before end of {}", target, anchor, period))
        }
        TimingWindow::LookbackFromEnd { days } => Some(format!(
            "{} {} Interval[end of {} - {} days, end of {}]",
            target, relation, period, days, period
        )),
    }
}

fn value_conditions(thresholds: &Thresholds, alias: &str) -> Vec<String> {
    let (operand, suffix) = match thresholds.unit.as_deref() {
        Some(unit) if !unit.trim().is_empty() => {
            (format!("({}.value as Quantity)", alias), format!(" {}", string_literal(unit.trim())))
        }
        _ => (format!("({}.value as Quantity).value", alias), String::new()),
    };
    let mut conditions = Vec::new();
    if let Some(min) = thresholds.value_min {
        conditions.push(format!("{} >= {}{}", operand, min, suffix));
    }
    if let Some(max) = thresholds.value_max {
        conditions.push(format!("{} <= {}{}", operand, max, suffix));
    }
    conditions
}

/// Conditions contributed by measure-wide constraints
pub(crate) fn constraint_conditions(constraints: &GlobalConstraints) -> Vec<String> {
    let mut conditions = age_conditions(constraints.age_min, constraints.age_max);
    if let Some(gender) = constraints.gender.as_deref().filter(|g| !g.trim().is_empty()) {
        conditions.push(format!("Patient.gender = {}", string_literal(&gender.trim().to_lowercase())));
    }
    conditions
}

/// Conjoin extra conditions onto a population fragment
pub(crate) fn conjoin(root: Fragment, conditions: &[String]) -> Fragment {
    if conditions.is_empty() {
        return root;
    }
    let head = match root.connective {
        Some(Connective::Any) => format!("({})", root.text),
        _ => root.text,
    };
    Fragment {
        text: format!("{}\n  and {}", head, conditions.join("\n  and ")),
        connective: Some(Connective::All),
    }
}

/// Renders population criteria, defining elements as they are reached
pub(crate) struct PopulationFolder<'g, 'a> {
    pub generation: &'g mut Generation<'a>,
}

impl LogicFolder for PopulationFolder<'_, '_> {
    type Output = Fragment;

    fn element(&mut self, element: &DataElement, location: &NodeLocation) -> Fragment {
        Fragment::atom(quoted(&self.generation.define_element(element, location)))
    }

    fn clause(
        &mut self,
        _clause: &LogicalClause,
        connective: Connective,
        parts: Vec<Fragment>,
        location: &NodeLocation,
    ) -> Fragment {
        if parts.is_empty() {
            return Fragment::atom(connective.vacuous().to_string());
        }
        // the root clause of a population is laid out one operand per line
        let separator = |word: &str| {
            if location.depth() == 1 {
                format!("\n  {} ", word)
            } else {
                format!(" {} ", word)
            }
        };
        match connective {
            Connective::All | Connective::Any if parts.len() == 1 => {
                parts.into_iter().next().unwrap_or_else(|| Fragment::atom("true"))
            }
            Connective::All | Connective::Any => {
                let word = if connective == Connective::All { "and" } else { "or" };
                let operands: Vec<String> = parts.iter().map(Fragment::operand).collect();
                Fragment {
                    text: operands.join(&separator(word)),
                    connective: Some(connective),
                }
            }
            Connective::NotAll => {
                let text = match parts.as_slice() {
                    [single] if single.connective.is_none() => format!("not {}", single.text),
                    [single] => format!("not ({})", single.text),
                    _ => {
                        let operands: Vec<String> = parts.iter().map(Fragment::operand).collect();
                        format!("not ({})", operands.join(" and "))
                    }
                };
                Fragment {
                    text,
                    connective: Some(Connective::NotAll),
                }
            }
        }
    }

    fn shape_issue(&mut self, clause: &LogicalClause, issue: ShapeIssue, location: &NodeLocation) {
        let diagnostic = match issue {
            ShapeIssue::EmptyClause => Diagnostic::warning(
                UMS0104,
                format!(
                    "{} clause '{}' has no children; rendered as '{}'",
                    clause.operator,
                    clause.id,
                    Connective::of(clause.operator).vacuous()
                ),
            ),
            ShapeIssue::NotWithManyChildren(n) => Diagnostic::warning(
                UMS0103,
                format!(
                    "NOT clause '{}' has {} children; the negation of their conjunction is emitted",
                    clause.id, n
                ),
            ),
        };
        self.generation.warn(diagnostic.with_location(location.clone()));
    }
}
