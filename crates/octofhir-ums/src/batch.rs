//! Parallel batch APIs
//!
//! Every item is an independent call over shared immutable inputs. Results
//! come back in input order.

use crate::engine::{Engine, Generated};
use octofhir_ums_diagnostics::{Diagnostic, UmsError};
use octofhir_ums_eval::{PatientRecord, ValidationTrace};
use octofhir_ums_ir::{Measure, check_measure};
use octofhir_ums_override::{Override, TargetFormat};
use rayon::prelude::*;

/// Generate every measure in one format
pub fn generate_all(
    engine: &Engine,
    measures: &[Measure],
    format: TargetFormat,
    overrides: &[Override],
) -> Vec<Result<Generated, UmsError>> {
    log::debug!("generating {} measures as {}", measures.len(), format);
    measures
        .par_iter()
        .map(|measure| engine.generate(measure, format, overrides))
        .collect()
}

/// Evaluate many patients against one measure
pub fn evaluate_patients(
    engine: &Engine,
    measure: &Measure,
    patients: &[PatientRecord],
) -> Vec<ValidationTrace> {
    log::debug!("evaluating {} patients against {}", patients.len(), measure.id);
    patients
        .par_iter()
        .map(|patient| engine.evaluate(patient, measure))
        .collect()
}

/// Structural diagnostics of many measures
pub fn check_all(measures: &[Measure]) -> Vec<Vec<Diagnostic>> {
    measures.par_iter().map(check_measure).collect()
}
