//! CLI functionality for the `ums` tool
//!
//! - Generation (CQL or SQL, with overrides)
//! - Patient evaluation
//! - Structural checks
//! - Output formatting

pub mod check;
pub mod evaluate;
pub mod generate;
pub mod output;
