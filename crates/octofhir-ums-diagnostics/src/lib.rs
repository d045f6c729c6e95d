//! UMS diagnostics and error handling
//!
//! This crate provides the error handling infrastructure shared by the measure
//! engine crates: structured error codes, node locations inside a logic tree,
//! warning/error diagnostics and the top-level [`UmsError`] type.

mod error;
mod error_code;
mod location;

pub use error::*;
pub use error_code::*;
pub use location::*;

/// Result type for UMS engine operations
pub type Result<T> = std::result::Result<T, UmsError>;
