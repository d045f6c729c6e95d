//! Override persistence seam
//!
//! The patch layer never looks records up itself; callers take a
//! point-in-time [`OverrideStore::snapshot`] and pass it to
//! [`apply_overrides`](crate::apply_overrides).

use crate::error::OverrideError;
use crate::key::{OverrideKey, TargetFormat};
use crate::record::{Override, OverrideNote};
use indexmap::IndexMap;
use octofhir_ums_ir::{load_json, parse_json};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Storage of override records
pub trait OverrideStore: Send + Sync {
    /// Records of one measure and format at this moment
    fn snapshot(&self, measure_id: &str, format: TargetFormat) -> Vec<Override>;

    /// Record a manual edit: creates the override or appends a note
    fn record_edit(&self, key: OverrideKey, note: OverrideNote) -> Override;

    /// Drop an override
    fn revert(&self, key: &OverrideKey) -> Result<Override, OverrideError>;
}

/// Parse a JSON array of override records
pub fn parse_overrides(input: &str) -> Result<Vec<Override>, OverrideError> {
    Ok(parse_json(input)?)
}

/// Load a JSON array of override records from a file
pub fn load_overrides(path: impl AsRef<Path>) -> Result<Vec<Override>, OverrideError> {
    Ok(load_json(path)?)
}

/// Thread-safe in-memory store
#[derive(Debug, Clone, Default)]
pub struct InMemoryOverrideStore {
    records: Arc<RwLock<IndexMap<OverrideKey, Override>>>,
}

impl InMemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with records; a later record with the same key wins
    pub fn from_records(records: impl IntoIterator<Item = Override>) -> Self {
        let map = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    /// Store seeded from a JSON snapshot file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OverrideError> {
        Ok(Self::from_records(load_overrides(path)?))
    }

    /// Every record, in insertion order
    pub fn records(&self) -> Vec<Override> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl OverrideStore for InMemoryOverrideStore {
    fn snapshot(&self, measure_id: &str, format: TargetFormat) -> Vec<Override> {
        self.records
            .read()
            .values()
            .filter(|r| r.key.applies_to(measure_id, format))
            .cloned()
            .collect()
    }

    fn record_edit(&self, key: OverrideKey, note: OverrideNote) -> Override {
        let mut records = self.records.write();
        match records.get_mut(&key) {
            Some(existing) => {
                log::debug!("appending note {} to override {}", existing.notes.len() + 1, key);
                existing.append(note);
                existing.clone()
            }
            None => {
                log::debug!("creating override {}", key);
                let created = Override::new(key.clone(), note);
                records.insert(key, created.clone());
                created
            }
        }
    }

    fn revert(&self, key: &OverrideKey) -> Result<Override, OverrideError> {
        self.records
            .write()
            .shift_remove(key)
            .ok_or_else(|| OverrideError::NotFound(key.to_string()))
    }
}
