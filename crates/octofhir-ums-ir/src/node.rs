//! Logic tree nodes: data elements and logical clauses

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of a population criteria tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "camelCase")]
pub enum LogicNode {
    /// Leaf referencing clinical data
    DataElement(DataElement),
    /// Internal node combining children with one connective
    Clause(LogicalClause),
}

impl LogicNode {
    /// Node identifier
    pub fn id(&self) -> &str {
        match self {
            LogicNode::DataElement(element) => &element.id,
            LogicNode::Clause(clause) => &clause.id,
        }
    }

    /// Borrow the data element, if this node is one
    pub fn as_element(&self) -> Option<&DataElement> {
        match self {
            LogicNode::DataElement(element) => Some(element),
            LogicNode::Clause(_) => None,
        }
    }

    /// Borrow the clause, if this node is one
    pub fn as_clause(&self) -> Option<&LogicalClause> {
        match self {
            LogicNode::Clause(clause) => Some(clause),
            LogicNode::DataElement(_) => None,
        }
    }
}

impl From<DataElement> for LogicNode {
    fn from(element: DataElement) -> Self {
        LogicNode::DataElement(element)
    }
}

impl From<LogicalClause> for LogicNode {
    fn from(clause: LogicalClause) -> Self {
        LogicNode::Clause(clause)
    }
}

/// Logical connective of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    /// Every child must hold
    And,
    /// At least one child must hold
    Or,
    /// Negation of the (single) child
    Not,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
            LogicalOperator::Not => write!(f, "NOT"),
        }
    }
}

/// A pending connective change between two siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingOverride {
    pub from_index: usize,
    pub to_index: usize,
    pub operator: LogicalOperator,
}

impl SiblingOverride {
    /// Whether this override describes the pair `(i, j)` in either order
    pub fn is_pair(&self, i: usize, j: usize) -> bool {
        (self.from_index == i && self.to_index == j) || (self.from_index == j && self.to_index == i)
    }
}

/// Editor-only pairwise connective hints.
///
/// The tree editor records uncommitted per-pair connective changes here so it
/// can display mixed AND/OR at one level before the edit is committed through
/// [`crate::set_connective`]. Code generation and evaluation never read this
/// list: every clause they see is treated as uniform in its `operator`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingConnectives(pub Vec<SiblingOverride>);

impl PendingConnectives {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiblingOverride> {
        self.0.iter()
    }

    /// Find the pending operator for a pair
    pub fn get(&self, i: usize, j: usize) -> Option<LogicalOperator> {
        self.0.iter().find(|o| o.is_pair(i, j)).map(|o| o.operator)
    }
}

/// Internal node of the logic tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClause {
    pub id: String,
    pub operator: LogicalOperator,
    #[serde(default)]
    pub children: Vec<LogicNode>,
    #[serde(default, skip_serializing_if = "PendingConnectives::is_empty")]
    pub sibling_overrides: PendingConnectives,
}

impl LogicalClause {
    /// Create a clause with the given children
    pub fn new(id: impl Into<String>, operator: LogicalOperator, children: Vec<LogicNode>) -> Self {
        Self {
            id: id.into(),
            operator,
            children,
            sibling_overrides: PendingConnectives::default(),
        }
    }

    /// Create an AND clause
    pub fn and(id: impl Into<String>, children: Vec<LogicNode>) -> Self {
        Self::new(id, LogicalOperator::And, children)
    }

    /// Create an OR clause
    pub fn or(id: impl Into<String>, children: Vec<LogicNode>) -> Self {
        Self::new(id, LogicalOperator::Or, children)
    }

    /// Create a NOT clause around one child
    pub fn not(id: impl Into<String>, child: LogicNode) -> Self {
        Self::new(id, LogicalOperator::Not, vec![child])
    }
}

/// Clinical data category of a data element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataCategory {
    Demographic,
    Condition,
    Encounter,
    Procedure,
    Medication,
    Observation,
    Assessment,
    Immunization,
    Allergy,
    Device,
    Communication,
    #[default]
    Other,
}

impl DataCategory {
    /// All categories in declaration order
    pub const ALL: [DataCategory; 12] = [
        DataCategory::Demographic,
        DataCategory::Condition,
        DataCategory::Encounter,
        DataCategory::Procedure,
        DataCategory::Medication,
        DataCategory::Observation,
        DataCategory::Assessment,
        DataCategory::Immunization,
        DataCategory::Allergy,
        DataCategory::Device,
        DataCategory::Communication,
        DataCategory::Other,
    ];

    /// Lower-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Demographic => "demographic",
            DataCategory::Condition => "condition",
            DataCategory::Encounter => "encounter",
            DataCategory::Procedure => "procedure",
            DataCategory::Medication => "medication",
            DataCategory::Observation => "observation",
            DataCategory::Assessment => "assessment",
            DataCategory::Immunization => "immunization",
            DataCategory::Allergy => "allergy",
            DataCategory::Device => "device",
            DataCategory::Communication => "communication",
            DataCategory::Other => "other",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            DataCategory::Demographic => "Demographics",
            DataCategory::Condition => "Condition",
            DataCategory::Encounter => "Encounter",
            DataCategory::Procedure => "Procedure",
            DataCategory::Medication => "Medication",
            DataCategory::Observation => "Observation",
            DataCategory::Assessment => "Assessment",
            DataCategory::Immunization => "Immunization",
            DataCategory::Allergy => "Allergy",
            DataCategory::Device => "Device",
            DataCategory::Communication => "Communication",
            DataCategory::Other => "Other",
        }
    }
}

impl From<&str> for DataCategory {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "demographic" | "demographics" | "patient" => DataCategory::Demographic,
            "condition" | "diagnosis" | "problem" => DataCategory::Condition,
            "encounter" | "visit" => DataCategory::Encounter,
            "procedure" | "intervention" => DataCategory::Procedure,
            "medication" | "medicationorder" | "medicationrequest" => DataCategory::Medication,
            "observation" | "lab" | "laboratory" | "labresult" | "vitalsign" => {
                DataCategory::Observation
            }
            "assessment" => DataCategory::Assessment,
            "immunization" | "vaccination" => DataCategory::Immunization,
            "allergy" | "allergyintolerance" => DataCategory::Allergy,
            "device" => DataCategory::Device,
            "communication" => DataCategory::Communication,
            _ => DataCategory::Other,
        }
    }
}

impl From<String> for DataCategory {
    fn from(s: String) -> Self {
        DataCategory::from(s.as_str())
    }
}

impl From<DataCategory> for String {
    fn from(category: DataCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric constraints on a data element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_min: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_max: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Thresholds {
    /// Age range in whole years
    pub fn age(min: Option<u32>, max: Option<u32>) -> Self {
        Self {
            age_min: min,
            age_max: max,
            ..Self::default()
        }
    }

    /// Value range with an optional unit
    pub fn value(min: Option<Decimal>, max: Option<Decimal>, unit: Option<&str>) -> Self {
        Self {
            value_min: min,
            value_max: max,
            unit: unit.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn has_age(&self) -> bool {
        self.age_min.is_some() || self.age_max.is_some()
    }

    pub fn has_value(&self) -> bool {
        self.value_min.is_some() || self.value_max.is_some()
    }
}

/// Temporal window relative to the measurement period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimingWindow {
    #[default]
    DuringMeasurementPeriod,
    BeforeEndOfMeasurementPeriod,
    LookbackFromEnd {
        days: u32,
    },
    Anytime,
}

/// Timing requirement of a data element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    #[serde(default)]
    pub window: TimingWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Timing {
    pub fn new(window: TimingWindow) -> Self {
        Self {
            window,
            description: None,
        }
    }
}

/// Editor review state of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    NeedsRevision,
    Flagged,
}

/// Extraction confidence of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

/// Leaf of the logic tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElement {
    pub id: String,
    #[serde(default)]
    pub element_kind: DataCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value_set_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default)]
    pub negation: bool,
    #[serde(default)]
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub confidence: Confidence,
}

impl DataElement {
    /// Create an element of a category
    pub fn new(id: impl Into<String>, kind: DataCategory, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_kind: kind,
            description: description.into(),
            value_set_refs: Vec::new(),
            thresholds: None,
            timing: None,
            negation: false,
            review_status: ReviewStatus::default(),
            confidence: Confidence::default(),
        }
    }

    /// Attach a value set reference
    pub fn with_value_set(mut self, reference: impl Into<String>) -> Self {
        self.value_set_refs.push(reference.into());
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_timing(mut self, window: TimingWindow) -> Self {
        self.timing = Some(Timing::new(window));
        self
    }

    /// Mark the element as "absence of"
    pub fn negated(mut self) -> Self {
        self.negation = true;
        self
    }

    /// Effective timing window
    pub fn window(&self) -> TimingWindow {
        self.timing.as_ref().map(|t| t.window).unwrap_or_default()
    }

    /// Label used in generated names and traces
    pub fn label(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.id
        } else {
            self.description.trim()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_json_is_tagged() {
        let node: LogicNode = DataElement::new("e1", DataCategory::Condition, "Diabetes")
            .with_value_set("vs-diabetes")
            .into();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["nodeType"], "dataElement");
        assert_eq!(json["elementKind"], "condition");
        assert_eq!(json["valueSetRefs"][0], "vs-diabetes");
    }

    #[test]
    fn test_clause_round_trips_pending_connectives() {
        let mut clause = LogicalClause::and("c1", vec![]);
        clause.sibling_overrides.0.push(SiblingOverride {
            from_index: 0,
            to_index: 1,
            operator: LogicalOperator::Or,
        });
        let json = serde_json::to_string(&LogicNode::Clause(clause.clone())).unwrap();
        assert!(json.contains("\"siblingOverrides\""));
        assert!(json.contains("\"OR\""));
        let back: LogicNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LogicNode::Clause(clause));
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!(DataCategory::from("Diagnosis"), DataCategory::Condition);
        assert_eq!(DataCategory::from("lab_result"), DataCategory::Observation);
        assert_eq!(DataCategory::from("something-else"), DataCategory::Other);
        let parsed: DataCategory = serde_json::from_str("\"medication_request\"").unwrap();
        assert_eq!(parsed, DataCategory::Medication);
    }

    #[test]
    fn test_timing_window_json() {
        let timing: Timing = serde_json::from_str(r#"{"window":{"kind":"lookbackFromEnd","days":365}}"#).unwrap();
        assert_eq!(timing.window, TimingWindow::LookbackFromEnd { days: 365 });
        let element = DataElement::new("e", DataCategory::Encounter, "Visit");
        assert_eq!(element.window(), TimingWindow::DuringMeasurementPeriod);
    }

    #[test]
    fn test_pending_connective_lookup_either_order() {
        let pending = PendingConnectives(vec![SiblingOverride {
            from_index: 2,
            to_index: 1,
            operator: LogicalOperator::Or,
        }]);
        assert_eq!(pending.get(1, 2), Some(LogicalOperator::Or));
        assert_eq!(pending.get(0, 1), None);
    }
}
