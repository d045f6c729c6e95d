//! Expression backend options

use serde::{Deserialize, Serialize};

/// Options controlling the generated CQL library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CqlOptions {
    /// Data model named in the `using` declaration
    pub model: String,
    /// Data model version
    pub model_version: String,
    /// FHIRHelpers library version
    pub fhir_helpers_version: String,
    /// Library version when the measure has none
    pub default_library_version: String,
    /// Measurement period year when the measure has none
    pub default_year: i32,
    /// Emit the header comment block
    pub header: bool,
}

impl Default for CqlOptions {
    fn default() -> Self {
        Self {
            model: "QICore".to_string(),
            model_version: "4.1.1".to_string(),
            fhir_helpers_version: "4.0.001".to_string(),
            default_library_version: "1.0.000".to_string(),
            default_year: 2025,
            header: true,
        }
    }
}

impl CqlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the data model and version
    pub fn with_model(mut self, model: impl Into<String>, version: impl Into<String>) -> Self {
        self.model = model.into();
        self.model_version = version.into();
        self
    }

    pub fn with_default_year(mut self, year: i32) -> Self {
        self.default_year = year;
        self
    }
}
