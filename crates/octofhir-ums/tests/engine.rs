//! Engine Facade Tests
//!
//! - Generation through both backends with overrides
//! - Patient evaluation from JSON fixtures
//! - Parallel batch APIs
//! - Configuration files

use octofhir_ums::eval::{GLOBAL_CONSTRAINTS_NODE, parse_patients};
use octofhir_ums::ir::PopulationType;
use octofhir_ums::overrides::{Override, OverrideKey, OverrideNote};
use octofhir_ums::{
    Engine, EngineConfig, FinalOutcome, GenerationMetadata, Measure, TargetFormat, check_all,
    evaluate_patients, generate_all,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;

// ============================================================================
// Test Helpers
// ============================================================================

const MEASURE: &str = include_str!("fixtures/cms122.json");
const PATIENTS: &str = include_str!("fixtures/patients.json");

fn measure() -> Measure {
    Measure::from_json(MEASURE).unwrap()
}

fn hospice_override(format: TargetFormat) -> Override {
    let note = OverrideNote::new(
        "analyst",
        "Hospice window widened after review",
        "hospice",
        "hospice (any time)",
    );
    Override::new(OverrideKey::new("cms122", "hospice", format), note)
}

// ============================================================================
// Generation
// ============================================================================

#[rstest]
#[case(TargetFormat::Cql, "define \"Initial Population\":")]
#[case(TargetFormat::Sql, "MEASURE_RESULT")]
fn test_generate_both_targets(#[case] format: TargetFormat, #[case] marker: &str) {
    let engine = Engine::default();
    let generated = engine.generate(&measure(), format, &[]).unwrap();
    assert_eq!(generated.measure_id, "cms122");
    assert_eq!(generated.format, format);
    assert_eq!(generated.override_count, 0);
    assert!(generated.text.contains(marker), "{}", generated.text);
}

#[rstest]
#[case(TargetFormat::Cql)]
#[case(TargetFormat::Sql)]
fn test_overrides_layer_on_generated_text(#[case] format: TargetFormat) {
    let engine = Engine::default();
    let plain = engine.generate(&measure(), format, &[]).unwrap();
    let patched = engine.generate(&measure(), format, &[hospice_override(format)]).unwrap();

    assert_eq!(patched.override_count, 1);
    assert!(patched.text.contains("[OVERRIDE] component 'hospice'"));
    assert!(patched.text.ends_with(&plain.text));
}

#[test]
fn test_override_for_other_format_is_ignored() {
    let engine = Engine::default();
    let generated = engine
        .generate(&measure(), TargetFormat::Sql, &[hospice_override(TargetFormat::Cql)])
        .unwrap();
    assert_eq!(generated.override_count, 0);
    assert!(!generated.text.contains("UMS OVERRIDES"));
}

#[test]
fn test_generation_is_deterministic() {
    let engine = Engine::default();
    for format in [TargetFormat::Cql, TargetFormat::Sql] {
        let first = engine.generate(&measure(), format, &[]).unwrap();
        let second = engine.generate(&measure(), format, &[]).unwrap();
        assert_eq!(first.text, second.text);
    }
}

#[test]
fn test_generation_metadata_is_forwarded() {
    let engine = Engine::default();
    let cql = engine.generate(&measure(), TargetFormat::Cql, &[]).unwrap();
    match &cql.metadata {
        GenerationMetadata::Cql(m) => assert_eq!(m.population_count, 4),
        other => panic!("expected CQL metadata, got {:?}", other),
    }

    let sql = engine.generate(&measure(), TargetFormat::Sql, &[]).unwrap();
    let GenerationMetadata::Sql(m) = &sql.metadata else {
        panic!("expected SQL metadata, got {:?}", sql.metadata);
    };
    assert!(m.predicate_count > 0);
    let json = serde_json::to_value(&sql).unwrap();
    assert_eq!(json["metadata"]["predicateCount"], m.predicate_count);
    assert_eq!(
        json["metadata"]["estimatedComplexity"],
        serde_json::to_value(m.estimated_complexity).unwrap()
    );
    assert!(sql.metadata.summary().contains("complexity"));
}

#[test]
fn test_measure_without_populations_fails() {
    let empty = Measure::new("empty", "EMPTY1", "No populations");
    let engine = Engine::default();
    for format in [TargetFormat::Cql, TargetFormat::Sql] {
        let err = engine.generate(&empty, format, &[]).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("population"), "{}", err);
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_fixture_patients_outcomes() {
    let patients = parse_patients(PATIENTS).unwrap();
    let traces = evaluate_patients(&Engine::default(), &measure(), &patients);
    let outcomes: Vec<(String, FinalOutcome)> = traces
        .iter()
        .map(|t| (t.patient_id.clone(), t.final_outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("poor-control".to_string(), FinalOutcome::InNumerator),
            ("controlled".to_string(), FinalOutcome::NotInNumerator),
            ("hospice".to_string(), FinalOutcome::Excluded),
            ("too-young".to_string(), FinalOutcome::NotInPopulation),
        ]
    );
}

#[test]
fn test_fixture_global_constraints_gate_initial_population() {
    let m = measure();
    assert_eq!(m.global_constraints.as_ref().and_then(|c| c.age_min), Some(18));
    let patients = parse_patients(PATIENTS).unwrap();
    let engine = Engine::default();

    let constraints_passed = |patient_id: &str| {
        let patient = patients.iter().find(|p| p.id == patient_id).unwrap();
        let trace = engine.evaluate(patient, &m);
        let ip = trace.result(PopulationType::InitialPopulation).unwrap();
        ip.nodes.iter().find_map(|n| n.find(GLOBAL_CONSTRAINTS_NODE)).unwrap().passed()
    };
    assert!(constraints_passed("poor-control"));
    assert!(!constraints_passed("too-young"));
}

#[test]
fn test_batch_matches_single_evaluation() {
    let engine = Engine::default();
    let m = measure();
    let patients = parse_patients(PATIENTS).unwrap();
    let batch = evaluate_patients(&engine, &m, &patients);
    for (patient, trace) in patients.iter().zip(&batch) {
        assert_eq!(&engine.evaluate(patient, &m), trace);
    }
}

// ============================================================================
// Batch generation and checks
// ============================================================================

#[test]
fn test_generate_all_keeps_order_and_failures() {
    let measures = vec![
        measure(),
        Measure::new("empty", "EMPTY1", "No populations"),
        measure(),
    ];
    let results = generate_all(&Engine::default(), &measures, TargetFormat::Cql, &[]);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert_eq!(results[0].as_ref().unwrap().text, results[2].as_ref().unwrap().text);
}

#[test]
fn test_check_all_reports_per_measure() {
    let measures = vec![measure(), Measure::new("empty", "EMPTY1", "No populations")];
    let diagnostics = check_all(&measures);
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[0].iter().all(|d| !d.is_error()));
    assert!(diagnostics[1].iter().any(|d| d.is_error()));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_shared_default_year_reaches_generation_and_evaluation() {
    let config = EngineConfig::from_json(r#"{"defaultYear": 2021}"#).unwrap();
    let engine = Engine::new(config);
    assert_eq!(engine.cql().options().default_year, 2021);
    assert_eq!(engine.evaluator().config().default_year, 2021);

    let mut undated = measure();
    undated.metadata.measurement_period = None;
    let cql = engine.generate(&undated, TargetFormat::Cql, &[]).unwrap();
    assert!(cql.text.contains("Interval[@2021-01-01T00:00:00.000, @2021-12-31T23:59:59.999]"), "{}", cql.text);
}

#[test]
fn test_config_file_selects_dialect_and_year() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let sqlserver = serde_json::to_value(octofhir_ums::sql::DialectConfig::sqlserver()).unwrap();
    let config = serde_json::json!({ "sql": sqlserver, "evaluator": { "defaultYear": 2022 } });
    write!(file, "{}", config).unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.evaluator.default_year, 2022);

    let engine = Engine::new(config);
    let generated = engine.generate(&measure(), TargetFormat::Sql, &[]).unwrap();
    assert!(generated.text.contains("-- Dialect: sqlserver"), "{}", generated.text);
}
