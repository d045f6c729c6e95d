//! CQL backend for UMS measures
//!
//! Compiles a measure's logic trees into a CQL library: value set
//! declarations, the measurement period parameter, one definition per data
//! element and one per population. Defects that do not prevent generation are
//! reported as warnings and marked inline with `// WARNING` comments.
//!
//! # Example
//!
//! ```
//! use octofhir_ums_cql::{CqlGenerator, CqlOptions};
//! use octofhir_ums_ir::Measure;
//!
//! let measure = Measure::new("m1", "CMS1", "Example");
//! let result = CqlGenerator::new(CqlOptions::default()).generate(&measure);
//! // a measure needs at least one population
//! assert!(!result.success);
//! ```

mod expression;
mod generator;
mod naming;
mod options;
mod resource;
mod writer;

pub use generator::{CqlGenerationResult, CqlGenerator, CqlMetadata};
pub use naming::library_identifier;
pub use options::CqlOptions;
pub use resource::{ResourceMapping, mapping_for};
