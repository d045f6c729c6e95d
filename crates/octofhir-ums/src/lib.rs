//! # octofhir-ums
//!
//! Universal Measure Specification engine.
//!
//! A clinical quality measure is described once as a tree of populations,
//! logical clauses and data elements. From that one document the engine
//!
//! - generates a CQL library ([`cql`]),
//! - generates a CTE-based SQL query ([`sql`]),
//! - layers hand-written override snippets onto either output ([`overrides`]),
//! - evaluates patients and explains every decision ([`eval`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_ums::{Engine, EngineConfig, TargetFormat};
//! use octofhir_ums::ir::{DataCategory, DataElement, LogicalClause, Measure, Population, PopulationType};
//!
//! let mut measure = Measure::new("cms122", "CMS122v12", "Diabetes: HbA1c Poor Control");
//! measure.populations.push(Population::new(
//!     "ip",
//!     PopulationType::InitialPopulation,
//!     LogicalClause::and("ip-root", vec![DataElement::new("age", DataCategory::Demographic, "Adults").into()]),
//! ));
//!
//! let engine = Engine::new(EngineConfig::default());
//! let generated = engine.generate(&measure, TargetFormat::Sql, &[]).unwrap();
//! assert!(generated.text.contains("MEASURE_RESULT"));
//! ```

pub use octofhir_ums_cql as cql;
pub use octofhir_ums_diagnostics as diagnostics;
pub use octofhir_ums_eval as eval;
pub use octofhir_ums_ir as ir;
pub use octofhir_ums_override as overrides;
pub use octofhir_ums_sql as sql;

pub mod batch;
pub mod config;
pub mod engine;

#[cfg(feature = "cli")]
pub mod cli;

pub use batch::{check_all, evaluate_patients, generate_all};
pub use config::{CONFIG_ENV, EngineConfig};
pub use engine::{Engine, Generated, GenerationMetadata};

pub use octofhir_ums_diagnostics::{Diagnostic, Result, Severity, UmsError};
pub use octofhir_ums_eval::{FinalOutcome, PatientRecord, ValidationTrace};
pub use octofhir_ums_ir::Measure;
pub use octofhir_ums_override::{Override, OverrideKey, TargetFormat};
