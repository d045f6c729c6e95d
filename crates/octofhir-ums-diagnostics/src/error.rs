//! UMS error and diagnostic types

use crate::{ErrorCode, NodeLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - generation cannot proceed
    Error,
    /// Warning - output produced but semantically incomplete
    Warning,
    /// Information - informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Node location inside the measure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<NodeLocation>,
    /// Additional context or help
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Related information
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
            help: None,
            related: Vec::new(),
        }
    }

    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    /// Create a new informational diagnostic
    pub fn info(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, code, message)
    }

    /// Set the location
    pub fn with_location(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add related information
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    /// Whether this diagnostic aborts generation
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render with terminal colors
    #[cfg(feature = "colored")]
    pub fn render_colored(&self) -> String {
        use colored::Colorize;

        let severity = match self.severity {
            Severity::Error => self.severity.to_string().red().bold(),
            Severity::Warning => self.severity.to_string().yellow().bold(),
            Severity::Info => self.severity.to_string().cyan().bold(),
        };
        let mut out = format!("{}[{}]: {}", severity, self.code, self.message);
        if let Some(loc) = &self.location {
            out.push_str(&format!("\n  {} {}", "-->".blue(), loc));
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  {} {}", "help:".green(), help));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Related diagnostic information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInfo {
    /// Location of related node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<NodeLocation>,
    /// Message explaining the relationship
    pub message: String,
}

impl RelatedInfo {
    /// Create new related info
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            location: None,
            message: message.into(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Main UMS engine error type
#[derive(Debug, Clone, Error)]
pub enum UmsError {
    /// Structurally unusable measure document
    #[error("{code}: {message}")]
    Input {
        code: ErrorCode,
        message: String,
        location: Option<NodeLocation>,
        context: Option<String>,
    },

    /// Code generation aborted
    #[error("{code}: {message}")]
    Generation {
        code: ErrorCode,
        message: String,
        target: String,
    },

    /// Evaluation error
    #[error("{code}: {message}")]
    Evaluation {
        code: ErrorCode,
        message: String,
        location: Option<NodeLocation>,
    },

    /// Override record error
    #[error("{code}: {message}")]
    Override {
        code: ErrorCode,
        message: String,
        key: Option<String>,
    },

    /// System error
    #[error("{code}: {message}")]
    System {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },

    /// Multiple errors collected
    #[error("Multiple errors: {}", .0.len())]
    Multiple(Vec<UmsError>),
}

impl UmsError {
    /// Create an input error
    pub fn input(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Input {
            code,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    /// Create a generation error for a target format
    pub fn generation(code: ErrorCode, message: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Generation {
            code,
            message: message.into(),
            target: target.into(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Evaluation {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// Create an override error
    pub fn override_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Override {
            code,
            message: message.into(),
            key: None,
        }
    }

    /// Create a system error
    pub fn system(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::System {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Input { code, .. } => *code,
            Self::Generation { code, .. } => *code,
            Self::Evaluation { code, .. } => *code,
            Self::Override { code, .. } => *code,
            Self::System { code, .. } => *code,
            Self::Multiple(errors) => errors.first().map(|e| e.code()).unwrap_or(ErrorCode::new(0)),
        }
    }

    /// Get the location if available
    pub fn location(&self) -> Option<&NodeLocation> {
        match self {
            Self::Input { location, .. } => location.as_ref(),
            Self::Evaluation { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Input { code, message, location, context } => {
                let mut diag = Diagnostic::error(*code, message.clone());
                if let Some(loc) = location {
                    diag = diag.with_location(loc.clone());
                }
                if let Some(ctx) = context {
                    diag = diag.with_help(ctx.clone());
                }
                diag
            }
            Self::Generation { code, message, target } => {
                Diagnostic::error(*code, message.clone())
                    .with_related(RelatedInfo::new(format!("target format: {}", target)))
            }
            Self::Evaluation { code, message, location } => {
                let mut diag = Diagnostic::error(*code, message.clone());
                if let Some(loc) = location {
                    diag = diag.with_location(loc.clone());
                }
                diag
            }
            Self::Override { code, message, key } => {
                let mut diag = Diagnostic::error(*code, message.clone());
                if let Some(key) = key {
                    diag = diag.with_related(RelatedInfo::new(format!("override key: {}", key)));
                }
                diag
            }
            Self::System { code, message, context } => {
                let mut diag = Diagnostic::error(*code, message.clone());
                if let Some(ctx) = context {
                    diag = diag.with_help(ctx.clone());
                }
                diag
            }
            Self::Multiple(errors) => {
                if let Some(first) = errors.first() {
                    first.to_diagnostic()
                } else {
                    Diagnostic::error(ErrorCode::new(0), "Unknown error")
                }
            }
        }
    }
}

/// Builder for creating UMS errors with fluent API
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    location: Option<NodeLocation>,
    context: Option<String>,
}

impl ErrorBuilder {
    /// Create a new error builder
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    /// Set the node location
    pub fn at(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Add context information
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build an input error
    pub fn input(self) -> UmsError {
        UmsError::Input {
            code: self.code,
            message: self.message,
            location: self.location,
            context: self.context,
        }
    }

    /// Build an evaluation error
    pub fn evaluation(self) -> UmsError {
        UmsError::Evaluation {
            code: self.code,
            message: self.message,
            location: self.location,
        }
    }

    /// Build a system error
    pub fn system(self) -> UmsError {
        UmsError::System {
            code: self.code,
            message: self.message,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UMS0003, UMS0004, UMS0502};

    #[test]
    fn test_error_builder() {
        let err = ErrorBuilder::new(UMS0004, "Clause 'c1' has no children")
            .at(NodeLocation::population("ip").child("c1"))
            .context("Add criteria to the clause")
            .input();

        assert!(matches!(err, UmsError::Input { .. }));
        assert_eq!(err.code(), UMS0004);
        assert_eq!(err.location().and_then(|l| l.node_id()), Some("c1"));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::warning(UMS0004, "Clause has no children")
            .with_location(NodeLocation::population("ip").child("c1"));

        let text = diag.to_string();
        assert!(text.starts_with("warning"));
        assert!(text.contains("UMS0004"));
        assert!(text.contains("population 'ip' at c1"));
    }

    #[test]
    fn test_to_diagnostic_keeps_context() {
        let err = ErrorBuilder::new(UMS0502, "Dialect file is not valid JSON")
            .context("expected an object")
            .system();
        let diag = err.to_diagnostic();
        assert!(diag.is_error());
        assert_eq!(diag.help.as_deref(), Some("expected an object"));
    }

    #[test]
    fn test_multiple_uses_first_code() {
        let err = UmsError::Multiple(vec![
            UmsError::input(UMS0003, "no populations"),
            UmsError::system(UMS0502, "bad config"),
        ]);
        assert_eq!(err.code(), UMS0003);
        assert_eq!(err.to_string(), "Multiple errors: 2");
    }
}
