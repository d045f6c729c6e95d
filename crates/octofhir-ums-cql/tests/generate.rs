//! CQL Generation Tests
//!
//! End-to-end tests of library generation:
//! - Section order and population definitions
//! - Determinism
//! - Warning completeness for defective input
//! - Hard failures
//! - Value set edits showing up in regenerated text

use octofhir_ums_cql::{CqlGenerator, CqlOptions};
use octofhir_ums_diagnostics::{UMS0003, UMS0102, UMS0103, UMS0106};
use octofhir_ums_ir::{
    Code, DataCategory, DataElement, GlobalConstraints, LogicNode, LogicalClause, LogicalOperator,
    Measure, MeasurementPeriod, Population, PopulationType, Thresholds, TimingWindow, ValueSet,
};
use proptest::prelude::*;
use rstest::rstest;

// ============================================================================
// Test Helpers
// ============================================================================

fn generator() -> CqlGenerator {
    CqlGenerator::new(CqlOptions::default())
}

fn diabetes_measure() -> Measure {
    let mut m = Measure::new("cms122", "CMS122v12", "Diabetes: Hemoglobin A1c Poor Control");
    m.metadata.version = Some("12.0.000".to_string());
    m.metadata.steward = Some("NCQA".to_string());
    m.metadata.measurement_period = Some(MeasurementPeriod::calendar_year(2024));
    m.value_sets = vec![
        ValueSet::new("vs-diabetes", "Diabetes")
            .with_oid("2.16.840.1.113883.3.464.1003.103.12.1001")
            .with_code(Code::new("44054006", "http://snomed.info/sct")),
        ValueSet::new("vs-visit", "Office Visit")
            .with_oid("2.16.840.1.113883.3.464.1003.101.12.1001")
            .with_code(Code::new("185349003", "http://snomed.info/sct")),
        ValueSet::new("vs-hba1c", "HbA1c Laboratory Test")
            .with_code(Code::new("4548-4", "http://loinc.org")),
        ValueSet::new("vs-hospice", "Hospice Care Ambulatory")
            .with_code(Code::new("385763009", "http://snomed.info/sct")),
    ];
    m.global_constraints = Some(GlobalConstraints {
        age_min: Some(18),
        age_max: Some(75),
        gender: None,
    });
    m.populations = vec![
        Population::new(
            "ip",
            PopulationType::InitialPopulation,
            LogicalClause::and(
                "ip-root",
                vec![
                    DataElement::new("dx", DataCategory::Condition, "Diabetes Diagnosis")
                        .with_value_set("vs-diabetes")
                        .into(),
                    DataElement::new("visit", DataCategory::Encounter, "Qualifying Visit")
                        .with_value_set("vs-visit")
                        .into(),
                ],
            ),
        ),
        Population::new("denom", PopulationType::Denominator, LogicalClause::and("denom-root", vec![])),
        Population::new(
            "denex",
            PopulationType::DenominatorExclusion,
            LogicalClause::or(
                "denex-root",
                vec![DataElement::new("hospice", DataCategory::Encounter, "Hospice Services")
                    .with_value_set("vs-hospice")
                    .into()],
            ),
        ),
        Population::new(
            "num",
            PopulationType::Numerator,
            LogicalClause::or(
                "num-root",
                vec![
                    DataElement::new("poor", DataCategory::Observation, "HbA1c Greater Than 9")
                        .with_value_set("vs-hba1c")
                        .with_thresholds(Thresholds::value(
                            Some(rust_decimal::Decimal::new(9, 0)),
                            None,
                            Some("%"),
                        ))
                        .into(),
                    DataElement::new("no-test", DataCategory::Observation, "No HbA1c Test")
                        .with_value_set("vs-hba1c")
                        .with_timing(TimingWindow::DuringMeasurementPeriod)
                        .negated()
                        .into(),
                ],
            ),
        ),
    ];
    m
}

fn section_positions(cql: &str, markers: &[&str]) -> Vec<usize> {
    markers
        .iter()
        .map(|m| cql.find(m).unwrap_or_else(|| panic!("missing {:?} in\n{}", m, cql)))
        .collect()
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_sections_in_fixed_order() {
    let result = generator().generate(&diabetes_measure());
    assert!(result.success, "{:?}", result.errors);
    let positions = section_positions(
        &result.cql,
        &[
            "/*",
            "library CMS122v12 version '12.0.000'",
            "using QICore version '4.1.1'",
            "include FHIRHelpers",
            "valueset \"Diabetes\": 'urn:oid:2.16.840.1.113883.3.464.1003.103.12.1001'",
            "parameter \"Measurement Period\" Interval<DateTime>",
            "default Interval[@2024-01-01T00:00:00.000, @2024-12-31T23:59:59.999]",
            "context Patient",
            "define \"Diabetes Diagnosis\":",
            "define \"Initial Population\":",
            "define \"Denominator\":",
            "define \"Denominator Exclusions\":",
            "define \"Numerator\":",
        ],
    );
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    assert_eq!(result.metadata.value_set_count, 4);
    assert_eq!(result.metadata.population_count, 4);
    assert_eq!(result.metadata.definition_count, 9);
}

#[test]
fn test_global_constraints_join_initial_population() {
    let cql = generator().generate(&diabetes_measure()).cql;
    let ip = cql
        .split("define \"Initial Population\":\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\n").next())
        .unwrap_or_default();
    assert_eq!(
        ip,
        "  \"Diabetes Diagnosis\"\n    and \"Qualifying Visit\"\n    and AgeInYearsAt(date from end of \"Measurement Period\") >= 18\n    and AgeInYearsAt(date from end of \"Measurement Period\") <= 75"
    );
}

#[test]
fn test_numerator_disjunction_and_negation() {
    let cql = generator().generate(&diabetes_measure()).cql;
    assert!(cql.contains("define \"Numerator\":\n  \"HbA1c Greater Than 9\"\n    or \"No HbA1c Test\""));
    assert!(cql.contains("not exists (\n    [Observation: \"HbA1c Laboratory Test\"] Obs"));
    assert!(cql.contains("(Obs.value as Quantity) >= 9 '%'"));
}

#[test]
fn test_empty_denominator_renders_true_with_warning() {
    let result = generator().generate(&diabetes_measure());
    assert!(result.cql.contains("define \"Denominator\":\n  true\n"));
    assert!(result.warnings.iter().any(|w| w.message.contains("denom-root")));
}

#[test]
fn test_header_can_be_disabled() {
    let options = CqlOptions {
        header: false,
        ..CqlOptions::default()
    };
    let cql = CqlGenerator::new(options).generate(&diabetes_measure()).cql;
    assert!(cql.starts_with("library CMS122v12"));
}

// ============================================================================
// Failures and warnings
// ============================================================================

#[test]
fn test_empty_populations_fail() {
    let mut m = diabetes_measure();
    m.populations.clear();
    let result = generator().generate(&m);
    assert!(!result.success);
    assert!(result.cql.is_empty());
    assert_eq!(result.errors[0].code, UMS0003);
    assert!(result.errors[0].message.contains("population"));
}

#[rstest]
#[case("")]
#[case("   ")]
fn test_blank_measure_id_fails(#[case] measure_id: &str) {
    let mut m = diabetes_measure();
    m.metadata.measure_id = measure_id.to_string();
    assert!(!generator().generate(&m).success);
}

#[test]
fn test_every_empty_value_set_is_warned() {
    let mut m = diabetes_measure();
    m.value_sets.push(ValueSet::new("vs-a", "Empty A"));
    m.value_sets.push(ValueSet::new("vs-b", "Empty B"));
    let result = generator().generate(&m);
    assert!(result.success);
    for name in ["Empty A", "Empty B"] {
        assert!(result.cql.contains(&format!("// WARNING: value set '{}' has no codes", name)));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.code == UMS0102 && w.message.contains(name))
        );
    }
}

#[test]
fn test_malformed_not_is_warned() {
    let mut m = diabetes_measure();
    m.populations[3].criteria = LogicalClause::new(
        "num-root",
        LogicalOperator::Not,
        m.populations[3].criteria.children.clone(),
    );
    let result = generator().generate(&m);
    assert!(result.success);
    assert!(result.warnings.iter().any(|w| w.code == UMS0103));
    assert!(result.cql.contains("not (\"HbA1c Greater Than 9\" and \"No HbA1c Test\")"));
}

#[test]
fn test_element_id_shared_across_populations() {
    let mut m = diabetes_measure();
    m.populations[1].criteria = LogicalClause::and(
        "denom-root",
        vec![DataElement::new("visit", DataCategory::Encounter, "Hospice Visit")
            .with_value_set("vs-hospice")
            .into()],
    );
    let result = generator().generate(&m);
    assert!(result.success);
    assert!(result.cql.contains("define \"Qualifying Visit\":\n  exists (\n    [Encounter: \"Office Visit\"]"));
    assert!(result.cql.contains("define \"Hospice Visit\":\n  exists (\n    [Encounter: \"Hospice Care Ambulatory\"]"));
    assert!(result.cql.contains("define \"Denominator\":\n  \"Hospice Visit\"\n"));
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.code == UMS0106 && w.message.contains("'visit'"))
    );
}

#[test]
fn test_value_set_edit_round_trip() {
    let mut m = diabetes_measure();
    let before = generator().generate(&m).cql;
    m.value_sets[0]
        .codes
        .push(Code::new("73211009", "http://snomed.info/sct"));
    let after = generator().generate(&m).cql;
    assert!(after.contains("valueset \"Diabetes\""));
    // codes are not inlined; the declaration is unchanged
    assert_eq!(before, after);
}

// ============================================================================
// Determinism
// ============================================================================

fn leaf_strategy() -> impl Strategy<Value = LogicNode> {
    (0usize..4, any::<bool>()).prop_map(|(i, negated)| {
        let refs = ["vs-diabetes", "vs-visit", "vs-hba1c", "missing"];
        let mut element = DataElement::new(format!("e{}", i), DataCategory::Encounter, format!("Element {}", i))
            .with_value_set(refs[i]);
        element.negation = negated;
        element.into()
    })
}

fn tree_strategy() -> impl Strategy<Value = LogicalClause> {
    let leaf = leaf_strategy();
    let node = leaf.prop_recursive(3, 16, 4, |inner| {
        (
            prop_oneof![
                Just(LogicalOperator::And),
                Just(LogicalOperator::Or),
                Just(LogicalOperator::Not)
            ],
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(op, children)| LogicNode::Clause(LogicalClause::new("c", op, children)))
    });
    prop::collection::vec(node, 0..4).prop_map(|children| LogicalClause::and("root", children))
}

proptest! {
    #[test]
    fn prop_generation_is_deterministic(tree in tree_strategy()) {
        let mut m = diabetes_measure();
        m.populations[3].criteria = tree;
        let first = generator().generate(&m);
        let second = generator().generate(&m);
        prop_assert!(first.success);
        prop_assert_eq!(first.cql, second.cql);
        prop_assert_eq!(first.warnings, second.warnings);
    }
}
