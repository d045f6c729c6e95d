//! Engine configuration
//!
//! One JSON document configures every component:
//!
//! ```json
//! {
//!   "defaultYear": 2025,
//!   "cql": { "model": "QICore", "modelVersion": "4.1.1" },
//!   "sql": { "name": "postgres", "provider": "postgres", ... },
//!   "evaluator": { "maxFactsPerNode": 5 }
//! }
//! ```
//!
//! Missing sections fall back to their defaults. A top-level `defaultYear`
//! overrides the per-component ones, so generated code and evaluation agree
//! on the measurement period of measures that declare none. The file is
//! taken from an explicit path, else from the `UMS_CONFIG` environment
//! variable.

use octofhir_ums_cql::CqlOptions;
use octofhir_ums_diagnostics::{ErrorBuilder, UMS0502, UmsError};
use octofhir_ums_eval::EvaluatorConfig;
use octofhir_ums_ir::{LoadError, load_json, parse_json};
use octofhir_ums_sql::DialectConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "UMS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Fallback calendar year shared by generation and evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_year: Option<i32>,
    pub cql: CqlOptions,
    pub sql: DialectConfig,
    pub evaluator: EvaluatorConfig,
}

fn invalid(error: LoadError, origin: &str) -> UmsError {
    match error {
        LoadError::Json(e) => ErrorBuilder::new(UMS0502, format!("Invalid engine configuration: {}", e))
            .context(origin.to_string())
            .system(),
        other => other.into(),
    }
}

impl EngineConfig {
    pub fn from_json(input: &str) -> Result<Self, UmsError> {
        parse_json(input).map_err(|e| invalid(e, "inline configuration"))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, UmsError> {
        let path = path.as_ref();
        let config = load_json(path).map_err(|e| invalid(e, &path.display().to_string()))?;
        log::debug!("engine configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Configuration from an explicit path, else `UMS_CONFIG`, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, UmsError> {
        Self::resolve_from(explicit, std::env::var(CONFIG_ENV).ok())
    }

    /// [`resolve`](Self::resolve) with the environment value passed in
    pub fn resolve_from(explicit: Option<&Path>, env_value: Option<String>) -> Result<Self, UmsError> {
        let from_env = env_value
            .filter(|v| !v.trim().is_empty())
            .map(|v| PathBuf::from(v.trim()));
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_dialect(mut self, dialect: DialectConfig) -> Self {
        self.sql = dialect;
        self
    }

    pub fn with_default_year(mut self, year: i32) -> Self {
        self.default_year = Some(year);
        self
    }

    /// CQL options with the shared default year applied
    pub fn cql_options(&self) -> CqlOptions {
        CqlOptions {
            default_year: self.default_year.unwrap_or(self.cql.default_year),
            ..self.cql.clone()
        }
    }

    /// Evaluator settings with the shared default year applied
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            default_year: self.default_year.unwrap_or(self.evaluator.default_year),
            ..self.evaluator.clone()
        }
    }

    /// Warn when the components would fall back to different years
    pub(crate) fn check_default_years(&self) {
        let (cql, evaluator) = (self.cql_options().default_year, self.evaluator_config().default_year);
        if cql != evaluator {
            log::warn!(
                "CQL default year {} differs from evaluator default year {}; set a top-level defaultYear",
                cql,
                evaluator
            );
        }
    }
}
