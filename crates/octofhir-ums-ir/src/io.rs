//! JSON document loading shared by the engine crates

use octofhir_ums_diagnostics::{ErrorBuilder, UMS0501, UMS0503, UMS0504, UmsError};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

/// Errors that can occur while loading a JSON document
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file does not exist
    #[error("file not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LoadError> for UmsError {
    fn from(error: LoadError) -> Self {
        match &error {
            LoadError::NotFound(path) => ErrorBuilder::new(UMS0504, error.to_string())
                .context(path.clone())
                .system(),
            LoadError::Io(_) => UmsError::system(UMS0501, error.to_string()),
            LoadError::Json(e) => ErrorBuilder::new(UMS0503, error.to_string())
                .context(format!("line {}, column {}", e.line(), e.column()))
                .system(),
        }
    }
}

/// Deserialize a JSON document from a string
pub fn parse_json<T: DeserializeOwned>(input: &str) -> Result<T, LoadError> {
    Ok(serde_json::from_str(input)?)
}

/// Deserialize a JSON document from a reader
pub fn read_json<T: DeserializeOwned, R: Read>(mut reader: R) -> Result<T, LoadError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    parse_json(&content)
}

/// Deserialize a JSON document from a file
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    log::debug!("loaded {} bytes from {}", content.len(), path.display());
    parse_json(&content)
}
