//! UMS measure evaluator
//!
//! Walks a measure's logic tree against a [`PatientRecord`] and produces a
//! [`ValidationTrace`]: per-population pass/fail trees with the facts behind
//! each decision, plus a [`FinalOutcome`].
//!
//! Funnel order:
//!
//! ```text
//! initial population -> denominator -> denominator exclusion
//!     -> numerator -> numerator exclusion      (numerator met)
//!                  -> denominator exception    (numerator not met)
//! ```
//!
//! The evaluator never fails; malformed input degrades to warnings on the
//! trace.

mod evaluator;
mod patient;
mod trace;

pub use evaluator::{EvaluatorConfig, GLOBAL_CONSTRAINTS_NODE, MeasureEvaluator};
pub use patient::{ClinicalEvent, PatientRecord, load_patients, parse_patients};
pub use trace::{
    Fact, FactKind, Facts, FinalOutcome, NodeKind, NodeStatus, PopulationResult, ValidationNode,
    ValidationTrace,
};
