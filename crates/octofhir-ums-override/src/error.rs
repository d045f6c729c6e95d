//! Override layer errors

use octofhir_ums_diagnostics::{ErrorBuilder, UMS0300, UMS0301, UMS0303, UmsError};
use octofhir_ums_ir::LoadError;

/// Errors raised while reading or mutating override records
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    /// Key is not `measureId::componentId::targetFormat`
    #[error("malformed override key '{0}'")]
    MalformedKey(String),

    /// Target format is neither `cql` nor `sql`
    #[error("unknown target format '{0}'")]
    UnknownFormat(String),

    /// No record exists for the key
    #[error("no override recorded for '{0}'")]
    NotFound(String),

    /// Snapshot file could not be read or parsed
    #[error("cannot load override snapshot: {0}")]
    Load(#[from] LoadError),
}

impl From<OverrideError> for UmsError {
    fn from(error: OverrideError) -> Self {
        let message = error.to_string();
        match error {
            OverrideError::MalformedKey(key) | OverrideError::UnknownFormat(key) => UmsError::Override {
                code: UMS0301,
                message,
                key: Some(key),
            },
            OverrideError::NotFound(key) => UmsError::Override {
                code: UMS0300,
                message,
                key: Some(key),
            },
            OverrideError::Load(LoadError::NotFound(path)) => {
                ErrorBuilder::new(UMS0303, message).context(path).system()
            }
            OverrideError::Load(_) => UmsError::override_error(UMS0303, message),
        }
    }
}
