//! Engine benchmarks using divan
//!
//! Generation for both backends, single and batch patient evaluation.

use octofhir_ums::eval::parse_patients;
use octofhir_ums::{Engine, Measure, PatientRecord, TargetFormat, evaluate_patients, generate_all};

fn main() {
    divan::main();
}

const MEASURE: &str = include_str!("../tests/fixtures/cms122.json");
const PATIENTS: &str = include_str!("../tests/fixtures/patients.json");

fn measure() -> Measure {
    Measure::from_json(MEASURE).unwrap()
}

/// Fixture patients repeated `copies` times with distinct ids
fn cohort(copies: usize) -> Vec<PatientRecord> {
    let base = parse_patients(PATIENTS).unwrap();
    (0..copies)
        .flat_map(|i| {
            base.iter().map(move |p| {
                let mut p = p.clone();
                p.id = format!("{}-{}", p.id, i);
                p
            })
        })
        .collect()
}

mod generation {
    use super::*;

    #[divan::bench]
    fn cql(bencher: divan::Bencher) {
        let engine = Engine::default();
        let m = measure();
        bencher.bench_local(|| engine.generate(divan::black_box(&m), TargetFormat::Cql, &[]));
    }

    #[divan::bench]
    fn sql(bencher: divan::Bencher) {
        let engine = Engine::default();
        let m = measure();
        bencher.bench_local(|| engine.generate(divan::black_box(&m), TargetFormat::Sql, &[]));
    }

    #[divan::bench(args = [8, 64])]
    fn batch_sql(bencher: divan::Bencher, count: usize) {
        let engine = Engine::default();
        let measures = vec![measure(); count];
        bencher.bench_local(|| generate_all(&engine, divan::black_box(&measures), TargetFormat::Sql, &[]));
    }
}

mod evaluation {
    use super::*;

    #[divan::bench]
    fn single_patient(bencher: divan::Bencher) {
        let engine = Engine::default();
        let m = measure();
        let patient = cohort(1).remove(0);
        bencher.bench_local(|| engine.evaluate(divan::black_box(&patient), &m));
    }

    #[divan::bench(args = [25, 250])]
    fn cohort_parallel(bencher: divan::Bencher, copies: usize) {
        let engine = Engine::default();
        let m = measure();
        let patients = cohort(copies);
        bencher.bench_local(|| evaluate_patients(&engine, &m, divan::black_box(&patients)));
    }
}
