//! UMS error codes following a structured numbering system
//!
//! Error code ranges:
//! - UMS0001-UMS0099: IR/input errors (document structure)
//! - UMS0100-UMS0199: Expression-language backend
//! - UMS0200-UMS0299: SQL backend
//! - UMS0300-UMS0399: Override layer
//! - UMS0400-UMS0499: Evaluation
//! - UMS0500-UMS0599: System errors (I/O, configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is an IR/input error (0001-0099)
    pub const fn is_input_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is an expression backend error (0100-0199)
    pub const fn is_expression_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a SQL backend error (0200-0299)
    pub const fn is_sql_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is an override error (0300-0399)
    pub const fn is_override_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Check if this is an evaluation error (0400-0499)
    pub const fn is_evaluation_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Check if this is a system error (0500-0599)
    pub const fn is_system_error(&self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UMS{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // IR/input errors (0001-0099)
    map.insert(1, ErrorInfo::new("Invalid measure document"));
    map.insert(
        2,
        ErrorInfo::new("Missing measure identifier")
            .with_help("Set metadata.measureId to the external measure identifier"),
    );
    map.insert(
        3,
        ErrorInfo::new("Measure has no populations")
            .with_help("Add at least an initial-population with criteria"),
    );
    map.insert(4, ErrorInfo::new("Clause has no children"));
    map.insert(
        5,
        ErrorInfo::new("NOT clause with more than one child")
            .with_help("Wrap the children in an AND or OR clause and negate that"),
    );
    map.insert(6, ErrorInfo::new("Unresolved value set reference"));
    map.insert(7, ErrorInfo::new("Value set has no codes"));
    map.insert(8, ErrorInfo::new("Duplicate code in value set"));
    map.insert(9, ErrorInfo::new("Duplicate node identifier"));
    map.insert(10, ErrorInfo::new("Data element has no value set"));
    map.insert(11, ErrorInfo::new("Duplicate population type"));
    map.insert(12, ErrorInfo::new("Threshold minimum exceeds maximum"));
    map.insert(
        13,
        ErrorInfo::new("Pending connective edits")
            .with_help("Commit pending connective changes so they are nested explicitly"),
    );

    // Expression backend (0100-0199)
    map.insert(100, ErrorInfo::new("Expression generation failed"));
    map.insert(101, ErrorInfo::new("Placeholder expression emitted"));
    map.insert(102, ErrorInfo::new("Empty value set declaration"));
    map.insert(103, ErrorInfo::new("Malformed negation"));
    map.insert(104, ErrorInfo::new("Empty clause rendered as literal"));
    map.insert(105, ErrorInfo::new("Value set reference not declared"));
    map.insert(
        106,
        ErrorInfo::new("Element id reused for different criteria")
            .with_help("Give each distinct data element its own id"),
    );

    // SQL backend (0200-0299)
    map.insert(200, ErrorInfo::new("SQL generation failed"));
    map.insert(201, ErrorInfo::new("Placeholder predicate emitted"));
    map.insert(202, ErrorInfo::new("Value set has no codes for predicate"));
    map.insert(203, ErrorInfo::new("Malformed negation"));
    map.insert(204, ErrorInfo::new("Empty clause rendered as set literal"));
    map.insert(
        205,
        ErrorInfo::new("Data category has no table mapping")
            .with_help("Add a table mapping for the category to the dialect configuration"),
    );

    // Override layer (0300-0399)
    map.insert(300, ErrorInfo::new("Override not found"));
    map.insert(301, ErrorInfo::new("Malformed override key"));
    map.insert(302, ErrorInfo::new("Override targets unknown component"));
    map.insert(303, ErrorInfo::new("Override snapshot could not be loaded"));

    // Evaluation (0400-0499)
    map.insert(400, ErrorInfo::new("Evaluation degraded"));
    map.insert(401, ErrorInfo::new("Patient has no birth date"));
    map.insert(402, ErrorInfo::new("Population stage missing"));
    map.insert(403, ErrorInfo::new("Population stage defined more than once"));

    // System errors (0500-0599)
    map.insert(500, ErrorInfo::new("Internal error"));
    map.insert(501, ErrorInfo::new("I/O error"));
    map.insert(502, ErrorInfo::new("Configuration error"));
    map.insert(503, ErrorInfo::new("Invalid format"));
    map.insert(504, ErrorInfo::new("File not found"));

    map
});

// Convenient error code constants

// IR/input errors
pub const UMS0001: ErrorCode = ErrorCode::new(1);
pub const UMS0002: ErrorCode = ErrorCode::new(2);
pub const UMS0003: ErrorCode = ErrorCode::new(3);
pub const UMS0004: ErrorCode = ErrorCode::new(4);
pub const UMS0005: ErrorCode = ErrorCode::new(5);
pub const UMS0006: ErrorCode = ErrorCode::new(6);
pub const UMS0007: ErrorCode = ErrorCode::new(7);
pub const UMS0008: ErrorCode = ErrorCode::new(8);
pub const UMS0009: ErrorCode = ErrorCode::new(9);
pub const UMS0010: ErrorCode = ErrorCode::new(10);
pub const UMS0011: ErrorCode = ErrorCode::new(11);
pub const UMS0012: ErrorCode = ErrorCode::new(12);
pub const UMS0013: ErrorCode = ErrorCode::new(13);

// Expression backend
pub const UMS0100: ErrorCode = ErrorCode::new(100);
pub const UMS0101: ErrorCode = ErrorCode::new(101);
pub const UMS0102: ErrorCode = ErrorCode::new(102);
pub const UMS0103: ErrorCode = ErrorCode::new(103);
pub const UMS0104: ErrorCode = ErrorCode::new(104);
pub const UMS0105: ErrorCode = ErrorCode::new(105);
pub const UMS0106: ErrorCode = ErrorCode::new(106);

// SQL backend
pub const UMS0200: ErrorCode = ErrorCode::new(200);
pub const UMS0201: ErrorCode = ErrorCode::new(201);
pub const UMS0202: ErrorCode = ErrorCode::new(202);
pub const UMS0203: ErrorCode = ErrorCode::new(203);
pub const UMS0204: ErrorCode = ErrorCode::new(204);
pub const UMS0205: ErrorCode = ErrorCode::new(205);

// Override layer
pub const UMS0300: ErrorCode = ErrorCode::new(300);
pub const UMS0301: ErrorCode = ErrorCode::new(301);
pub const UMS0302: ErrorCode = ErrorCode::new(302);
pub const UMS0303: ErrorCode = ErrorCode::new(303);

// Evaluation
pub const UMS0400: ErrorCode = ErrorCode::new(400);
pub const UMS0401: ErrorCode = ErrorCode::new(401);
pub const UMS0402: ErrorCode = ErrorCode::new(402);
pub const UMS0403: ErrorCode = ErrorCode::new(403);

// System errors
pub const UMS0500: ErrorCode = ErrorCode::new(500);
pub const UMS0501: ErrorCode = ErrorCode::new(501);
pub const UMS0502: ErrorCode = ErrorCode::new(502);
pub const UMS0503: ErrorCode = ErrorCode::new(503);
pub const UMS0504: ErrorCode = ErrorCode::new(504);
