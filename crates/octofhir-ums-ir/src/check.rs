//! Structural checks over a measure document
//!
//! Errors here are the conditions that make generation abort; everything else
//! is a warning the backends also tolerate.

use crate::fold::{Connective, LogicFolder, ShapeIssue, fold_clause};
use crate::measure::Measure;
use crate::node::{DataCategory, DataElement, LogicalClause};
use octofhir_ums_diagnostics::{
    Diagnostic, NodeLocation, RelatedInfo, UMS0002, UMS0003, UMS0004, UMS0005, UMS0006, UMS0007,
    UMS0008, UMS0009, UMS0010, UMS0011, UMS0012, UMS0013,
};
use std::collections::HashMap;

/// Run every structural check and return the findings in document order
pub fn check_measure(measure: &Measure) -> Vec<Diagnostic> {
    let mut diagnostics = blocking_errors(measure);

    let mut seen_types = HashMap::new();
    for population in &measure.populations {
        if let Some(first) = seen_types.insert(population.population_type, population.id.as_str()) {
            seen_types.insert(population.population_type, first);
            diagnostics.push(
                Diagnostic::warning(
                    UMS0011,
                    format!(
                        "Population type '{}' is defined more than once; '{}' is used",
                        population.population_type, first
                    ),
                )
                .with_location(NodeLocation::population(population.id.clone())),
            );
        }
    }

    for value_set in &measure.value_sets {
        let location = NodeLocation::node(value_set.id.clone());
        if value_set.codes.is_empty() {
            diagnostics.push(
                Diagnostic::warning(UMS0007, format!("Value set '{}' has no codes", value_set.name))
                    .with_location(location.clone()),
            );
        }
        for code in value_set.duplicate_codes() {
            diagnostics.push(
                Diagnostic::info(
                    UMS0008,
                    format!(
                        "Code {}|{} appears more than once in value set '{}'",
                        code.system, code.code, value_set.name
                    ),
                )
                .with_location(location.clone()),
            );
        }
    }

    let mut first_seen: HashMap<String, NodeLocation> = HashMap::new();
    for population in &measure.populations {
        let mut checker = TreeChecker {
            measure,
            diagnostics: &mut diagnostics,
            first_seen: &mut first_seen,
        };
        fold_clause(
            &population.criteria,
            &NodeLocation::population(population.id.clone()),
            &mut checker,
        );
    }

    diagnostics
}

/// Defects that stop both code generators from producing any text
pub fn blocking_errors(measure: &Measure) -> Vec<Diagnostic> {
    let mut errors = Vec::new();
    if measure.metadata.measure_id.trim().is_empty() {
        errors.push(
            Diagnostic::error(UMS0002, format!("Measure '{}' has no measure identifier", measure.id))
                .with_help("Set metadata.measureId"),
        );
    }
    if measure.populations.is_empty() {
        errors.push(
            Diagnostic::error(UMS0003, format!("Measure '{}' defines no population", measure.id))
                .with_help("Add an initial-population with criteria"),
        );
    }
    errors
}

/// Whether any finding is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

struct TreeChecker<'a> {
    measure: &'a Measure,
    diagnostics: &'a mut Vec<Diagnostic>,
    first_seen: &'a mut HashMap<String, NodeLocation>,
}

impl TreeChecker<'_> {
    fn note_id(&mut self, id: &str, location: &NodeLocation) {
        match self.first_seen.get(id) {
            Some(first) => {
                let related = RelatedInfo::new("first defined here").with_location(first.clone());
                self.diagnostics.push(
                    Diagnostic::warning(UMS0009, format!("Node id '{}' is used more than once", id))
                        .with_location(location.clone())
                        .with_related(related),
                );
            }
            None => {
                self.first_seen.insert(id.to_string(), location.clone());
            }
        }
    }
}

impl LogicFolder for TreeChecker<'_> {
    type Output = ();

    fn element(&mut self, element: &DataElement, location: &NodeLocation) {
        self.note_id(&element.id, location);

        for reference in &element.value_set_refs {
            if self.measure.value_set(reference).is_none() {
                self.diagnostics.push(
                    Diagnostic::warning(
                        UMS0006,
                        format!("'{}' references unknown value set '{}'", element.label(), reference),
                    )
                    .with_location(location.clone()),
                );
            }
        }

        let has_thresholds = element
            .thresholds
            .as_ref()
            .is_some_and(|t| t.has_age() || t.has_value());
        if element.element_kind != DataCategory::Demographic
            && element.value_set_refs.is_empty()
            && !has_thresholds
        {
            self.diagnostics.push(
                Diagnostic::warning(UMS0010, format!("'{}' has no value set", element.label()))
                    .with_location(location.clone())
                    .with_help("Attach a value set or the element matches every patient"),
            );
        }

        if let Some(t) = &element.thresholds {
            let age_inverted = matches!((t.age_min, t.age_max), (Some(min), Some(max)) if min > max);
            let value_inverted =
                matches!((t.value_min, t.value_max), (Some(min), Some(max)) if min > max);
            if age_inverted || value_inverted {
                self.diagnostics.push(
                    Diagnostic::warning(
                        UMS0012,
                        format!("'{}' has a threshold minimum above its maximum", element.label()),
                    )
                    .with_location(location.clone()),
                );
            }
        }
    }

    fn clause(
        &mut self,
        clause: &LogicalClause,
        _connective: Connective,
        _parts: Vec<()>,
        location: &NodeLocation,
    ) {
        self.note_id(&clause.id, location);
        if !clause.sibling_overrides.is_empty() {
            self.diagnostics.push(
                Diagnostic::info(
                    UMS0013,
                    format!(
                        "Clause '{}' has {} uncommitted connective edit(s); they are ignored",
                        clause.id,
                        clause.sibling_overrides.len()
                    ),
                )
                .with_location(location.clone()),
            );
        }
    }

    fn shape_issue(&mut self, clause: &LogicalClause, issue: ShapeIssue, location: &NodeLocation) {
        let diagnostic = match issue {
            ShapeIssue::EmptyClause => Diagnostic::warning(
                UMS0004,
                format!("{} clause '{}' has no children", clause.operator, clause.id),
            ),
            ShapeIssue::NotWithManyChildren(n) => Diagnostic::warning(
                UMS0005,
                format!(
                    "NOT clause '{}' has {} children; their conjunction is negated",
                    clause.id, n
                ),
            ),
        };
        self.diagnostics.push(diagnostic.with_location(location.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::{Code, Population, PopulationType, ValueSet};
    use crate::node::{LogicNode, LogicalOperator, SiblingOverride, Thresholds};
    use octofhir_ums_diagnostics::{ErrorCode, Severity};

    fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    fn clean() -> Measure {
        let mut m = Measure::new("m1", "CMS1", "Clean");
        m.value_sets
            .push(ValueSet::new("vs-1", "Visits").with_code(Code::new("1", "http://snomed.info/sct")));
        m.populations.push(Population::new(
            "ip",
            PopulationType::InitialPopulation,
            LogicalClause::and(
                "ip-root",
                vec![
                    DataElement::new("age", DataCategory::Demographic, "Age 18-75")
                        .with_thresholds(Thresholds::age(Some(18), Some(75)))
                        .into(),
                    DataElement::new("visit", DataCategory::Encounter, "Visit")
                        .with_value_set("vs-1")
                        .into(),
                ],
            ),
        ));
        m
    }

    #[test]
    fn test_clean_measure_has_no_findings() {
        assert!(check_measure(&clean()).is_empty());
    }

    #[test]
    fn test_missing_identifier_and_populations_are_errors() {
        let m = Measure::new("m", " ", "Empty");
        let diagnostics = check_measure(&m);
        assert_eq!(codes(&diagnostics), vec![UMS0002, UMS0003]);
        assert!(has_errors(&diagnostics));
    }

    #[test]
    fn test_tree_warnings() {
        let mut m = clean();
        m.value_sets.push(ValueSet::new("vs-empty", "Nothing"));
        m.populations.push(Population::new(
            "num",
            PopulationType::Numerator,
            LogicalClause::and(
                "num-root",
                vec![
                    LogicalClause::or("empty", vec![]).into(),
                    LogicalClause::new(
                        "neg",
                        LogicalOperator::Not,
                        vec![
                            DataElement::new("x", DataCategory::Procedure, "X")
                                .with_value_set("missing")
                                .into(),
                            DataElement::new("visit", DataCategory::Encounter, "Dup").into(),
                        ],
                    )
                    .into(),
                ],
            ),
        ));

        let diagnostics = check_measure(&m);
        let found = codes(&diagnostics);
        for expected in [UMS0007, UMS0004, UMS0005, UMS0006, UMS0009, UMS0010] {
            assert!(found.contains(&expected), "missing {} in {:?}", expected, found);
        }
        assert!(!has_errors(&diagnostics));
        assert!(diagnostics.iter().all(|d| d.severity != Severity::Error));
    }

    #[test]
    fn test_pending_connectives_and_inverted_thresholds() {
        let mut m = clean();
        let criteria = &mut m.populations[0].criteria;
        criteria.sibling_overrides.0.push(SiblingOverride {
            from_index: 0,
            to_index: 1,
            operator: LogicalOperator::Or,
        });
        if let LogicNode::DataElement(age) = &mut criteria.children[0] {
            age.thresholds = Some(Thresholds::age(Some(80), Some(18)));
        }
        let found = codes(&check_measure(&m));
        assert!(found.contains(&UMS0012));
        assert!(found.contains(&UMS0013));
    }

    #[test]
    fn test_duplicate_population_type() {
        let mut m = clean();
        let again = m.populations[0].clone();
        m.populations.push(Population { id: "ip2".into(), ..again });
        let diagnostics = check_measure(&m);
        assert!(codes(&diagnostics).contains(&UMS0011));
    }
}
