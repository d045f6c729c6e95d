//! Validation traces
//!
//! A trace mirrors the logic tree it was evaluated from: every element and
//! clause becomes a [`ValidationNode`] carrying its pass/fail status and the
//! facts that explain it.

use chrono::NaiveDate;
use octofhir_ums_diagnostics::Diagnostic;
use octofhir_ums_ir::{LogicalOperator, PopulationType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Categorical result of the measure funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalOutcome {
    NotInPopulation,
    NotInNumerator,
    Excluded,
    InNumerator,
}

impl FinalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalOutcome::NotInPopulation => "not_in_population",
            FinalOutcome::NotInNumerator => "not_in_numerator",
            FinalOutcome::Excluded => "excluded",
            FinalOutcome::InNumerator => "in_numerator",
        }
    }
}

impl fmt::Display for FinalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pass,
    Fail,
}

impl NodeStatus {
    pub fn from_bool(passed: bool) -> Self {
        if passed { NodeStatus::Pass } else { NodeStatus::Fail }
    }

    pub fn passed(&self) -> bool {
        *self == NodeStatus::Pass
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Element,
    Clause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactKind {
    /// A patient event matched the element
    CodeMatch,
    /// Age or gender comparison
    Demographic,
    /// Nothing matched a negated element
    Absence,
    /// The element had no usable value set
    Placeholder,
}

/// Evidence attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub kind: FactKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
}

impl Fact {
    pub fn new(kind: FactKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            code: None,
            system: None,
            display: None,
            date: None,
            value: None,
        }
    }
}

/// Facts of one node; most nodes carry at most a couple
pub type Facts = SmallVec<[Fact; 2]>;

/// Evaluated counterpart of a logic node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationNode {
    pub node_id: String,
    pub kind: NodeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<LogicalOperator>,
    pub status: NodeStatus,
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub children: Vec<ValidationNode>,
}

impl ValidationNode {
    pub fn passed(&self) -> bool {
        self.status.passed()
    }

    /// Depth-first search by node id
    pub fn find(&self, node_id: &str) -> Option<&ValidationNode> {
        if self.node_id == node_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(node_id))
    }
}

/// One evaluated population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationResult {
    pub population_id: String,
    pub population_type: PopulationType,
    pub met: bool,
    pub nodes: Vec<ValidationNode>,
}

/// Outcome of evaluating one patient against one measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTrace {
    pub patient_id: String,
    pub measure_id: String,
    pub final_outcome: FinalOutcome,
    /// Populations in funnel order; stages never reached are absent
    pub population_results: Vec<PopulationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

impl ValidationTrace {
    /// Result of a population stage, if it was evaluated
    pub fn result(&self, population_type: PopulationType) -> Option<&PopulationResult> {
        self.population_results
            .iter()
            .find(|r| r.population_type == population_type)
    }

    /// Whether a stage was evaluated and met
    pub fn met(&self, population_type: PopulationType) -> bool {
        self.result(population_type).is_some_and(|r| r.met)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
