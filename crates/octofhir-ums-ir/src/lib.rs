//! Universal Measure Specification (UMS) logic tree
//!
//! This crate defines the intermediate representation shared by the measure
//! engine: a measure document whose populations each carry a recursive tree
//! of [`LogicalClause`]s and [`DataElement`] leaves. It also provides the
//! pure helpers every other component builds on:
//!
//! - traversal, lookup and copy-on-write replacement ([`walk_data_elements`],
//!   [`find_by_id`], [`replace_by_id`])
//! - the shared operator walk ([`LogicFolder`], [`fold_clause`])
//! - connective edits with auto-nesting ([`set_connective`])
//! - structural diagnostics ([`check_measure`])
//! - JSON document loading ([`load_json`])
//!
//! # Example
//!
//! ```
//! use octofhir_ums_ir::{DataCategory, DataElement, LogicalClause, LogicalOperator, set_connective};
//!
//! let clause = LogicalClause::and(
//!     "root",
//!     vec![
//!         DataElement::new("a", DataCategory::Encounter, "Office visit").into(),
//!         DataElement::new("b", DataCategory::Encounter, "Home visit").into(),
//!     ],
//! );
//! let edited = set_connective(&clause, 0, LogicalOperator::Or).unwrap();
//! assert_eq!(edited.children.len(), 1);
//! ```

mod check;
mod edit;
mod fold;
mod io;
mod measure;
mod node;
mod walk;

pub use check::*;
pub use edit::*;
pub use fold::*;
pub use io::*;
pub use measure::*;
pub use node::*;
pub use walk::*;
