//! CTE-based SQL backend for UMS measures
//!
//! A measure becomes one query of named common table expressions:
//!
//! 1. `patient_base`: one row per patient
//! 2. `<category>_predicates`: one `UNION ALL` branch per data element
//! 3. `pop_<type>`: population criteria as `INTERSECT` / `UNION` / `EXCEPT`
//! 4. funnel stages `ip`, `denom`, `denex`, `numer`
//! 5. `MEASURE_RESULT`: per-patient flags and outcome
//!
//! Vendor differences are described by a [`DialectConfig`].
//!
//! # Example
//!
//! ```
//! use octofhir_ums_ir::{DataCategory, DataElement, LogicalClause, Measure, Population, PopulationType};
//! use octofhir_ums_sql::{DialectConfig, SqlGenerator};
//!
//! let mut measure = Measure::new("m1", "CMS1", "Example");
//! measure.populations.push(Population::new(
//!     "ip",
//!     PopulationType::InitialPopulation,
//!     LogicalClause::and("root", vec![DataElement::new("adult", DataCategory::Demographic, "Adults").into()]),
//! ));
//! let result = SqlGenerator::new(DialectConfig::postgres()).generate(&measure);
//! assert!(result.success);
//! assert!(result.sql.contains("demographic_predicates AS ("));
//! ```

mod dialect;
mod generator;
mod population;
mod predicate;

pub use dialect::{DialectConfig, IdentifierQuote, SqlProvider, TableMapping, sql_literal};
pub use generator::{Complexity, SqlGenerationResult, SqlGenerator, SqlMetadata};
pub use population::SetQuery;
pub use predicate::{Predicate, PredicateSet, extract_predicates, predicate_cte_name};
