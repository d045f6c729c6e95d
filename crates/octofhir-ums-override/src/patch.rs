//! Layering override annotations over generated text
//!
//! Generated text is never edited in place. Every applicable override is
//! rendered as a comment block ahead of the untouched generated text, so
//! reverting an override is just dropping its record.

use crate::key::TargetFormat;
use crate::record::Override;
use octofhir_ums_diagnostics::UMS0302;
use octofhir_ums_ir::Measure;
use serde::{Deserialize, Serialize};

/// Generated text with overrides applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    pub patched_text: String,
    pub override_count: usize,
    /// Overrides whose component is no longer in the measure
    #[serde(default)]
    pub stale_count: usize,
}

/// Apply the overrides recorded for a measure and target format
///
/// Overrides for other measures or formats are ignored. With none applicable
/// the generated text is returned unchanged.
pub fn apply_overrides(
    generated: &str,
    measure: &Measure,
    format: TargetFormat,
    overrides: &[Override],
) -> PatchResult {
    let mut applicable: Vec<&Override> = overrides
        .iter()
        .filter(|o| o.key.applies_to(&measure.id, format))
        .collect();
    if applicable.is_empty() {
        return PatchResult {
            patched_text: generated.to_string(),
            override_count: 0,
            stale_count: 0,
        };
    }
    applicable.sort_by(|a, b| a.component_id().cmp(b.component_id()));

    let c = format.comment_prefix();
    let mut out = Vec::new();
    out.push(format!("{} ==== UMS OVERRIDES ====", c));
    out.push(format!("{} Measure: {} ({})", c, measure.id, measure.metadata.measure_id.trim()));
    out.push(format!("{} Target: {}", c, format));
    out.push(format!("{} Applied overrides: {}", c, applicable.len()));
    let mut stale_count = 0;
    let stale: Vec<bool> = applicable
        .iter()
        .map(|o| !measure.has_component(o.component_id()))
        .collect();
    for (record, is_stale) in applicable.iter().zip(&stale) {
        let notes = record.notes.len();
        out.push(format!(
            "{}   - {} ({} edit note{}){}",
            c,
            record.component_id(),
            notes,
            if notes == 1 { "" } else { "s" },
            if *is_stale { " [component not found]" } else { "" }
        ));
    }
    out.push(format!("{} =====================", c));

    for (record, is_stale) in applicable.iter().zip(&stale) {
        out.push(String::new());
        if *is_stale {
            stale_count += 1;
            log::warn!(
                "{}: override {} targets a component not found in measure '{}'",
                UMS0302,
                record.key,
                measure.id
            );
            out.push(format!(
                "{} [OVERRIDE] component '{}' (not found in current measure)",
                c,
                record.component_id()
            ));
        } else {
            out.push(format!("{} [OVERRIDE] component '{}'", c, record.component_id()));
        }
        for note in &record.notes {
            let comment = note.comment.split_whitespace().collect::<Vec<_>>().join(" ");
            let author = if note.author.trim().is_empty() {
                String::new()
            } else {
                format!(" ({})", note.author.trim())
            };
            out.push(format!("{} [EDIT NOTE] ({}): {}{}", c, note.stamp(), comment, author));
        }
        out.push(format!("{} Before:", c));
        out.extend(snippet_lines(c, &record.generated_snippet));
        out.push(format!("{} After:", c));
        out.extend(snippet_lines(c, &record.patched_snippet));
        out.push(format!("{} [END OVERRIDE]", c));
    }

    log::debug!("applied {} overrides to {}", applicable.len(), measure.id);
    PatchResult {
        patched_text: format!("{}\n\n{}", out.join("\n"), generated),
        override_count: applicable.len(),
        stale_count,
    }
}

fn snippet_lines(prefix: &str, snippet: &str) -> Vec<String> {
    if snippet.is_empty() {
        return vec![format!("{}   (empty)", prefix)];
    }
    snippet
        .lines()
        .map(|line| format!("{}   {}", prefix, line).trim_end().to_string())
        .collect()
}
