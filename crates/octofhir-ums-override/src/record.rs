//! Override records and their audit notes

use crate::key::OverrideKey;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One manual edit in an override's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideNote {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub before_text: String,
    pub after_text: String,
    #[serde(default)]
    pub comment: String,
}

impl OverrideNote {
    /// Note stamped with the current time
    pub fn new(
        author: impl Into<String>,
        comment: impl Into<String>,
        before_text: impl Into<String>,
        after_text: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            timestamp: Utc::now(),
            before_text: before_text.into(),
            after_text: after_text.into(),
            comment: comment.into(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Timestamp as rendered in patched output
    pub fn stamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// A persisted manual correction of one generated component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub key: OverrideKey,
    /// Text the generator produced when the override was created
    pub generated_snippet: String,
    /// Current corrected text
    pub patched_snippet: String,
    /// Oldest first
    #[serde(default)]
    pub notes: Vec<OverrideNote>,
}

impl Override {
    /// Override created by a first edit
    pub fn new(key: OverrideKey, note: OverrideNote) -> Self {
        Self {
            key,
            generated_snippet: note.before_text.clone(),
            patched_snippet: note.after_text.clone(),
            notes: vec![note],
        }
    }

    /// Append a later edit; the generated snippet is kept
    pub fn append(&mut self, note: OverrideNote) {
        self.patched_snippet = note.after_text.clone();
        self.notes.push(note);
    }

    pub fn component_id(&self) -> &str {
        &self.key.component_id
    }
}
