//! Measure documents: metadata, populations and value sets

use crate::node::LogicalClause;
use crate::walk::find_by_id;
use chrono::{Datelike, NaiveDate};
use octofhir_ums_diagnostics::{ErrorBuilder, UMS0001, UMS0501, UmsError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A clinical code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    pub code: String,
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Code {
    pub fn new(code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Code equality; a blank system on either side matches any system
    pub fn matches(&self, code: &str, system: &str) -> bool {
        self.code == code && (self.system.is_empty() || system.is_empty() || self.system == system)
    }
}

/// Named collection of clinical codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSet {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub codes: Vec<Code>,
}

impl ValueSet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            oid: None,
            name: name.into(),
            codes: Vec::new(),
        }
    }

    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    pub fn with_code(mut self, code: Code) -> Self {
        self.codes.push(code);
        self
    }

    /// Whether a reference (id or oid) points at this value set
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        self.id == reference || self.oid.as_deref() == Some(reference)
    }

    /// Canonical identifier used in generated output
    pub fn canonical(&self) -> String {
        match &self.oid {
            Some(oid) if oid.starts_with("http") || oid.starts_with("urn:") => oid.clone(),
            Some(oid) => format!("urn:oid:{}", oid),
            None => format!("urn:ums:valueset:{}", self.id),
        }
    }

    /// Membership test over the value set's codes
    pub fn contains(&self, code: &str, system: &str) -> bool {
        self.codes.iter().any(|c| c.matches(code, system))
    }

    /// Codes that appear more than once (by code and system)
    pub fn duplicate_codes(&self) -> Vec<&Code> {
        let mut seen = std::collections::HashSet::new();
        self.codes
            .iter()
            .filter(|c| !seen.insert((c.code.as_str(), c.system.as_str())))
            .collect()
    }
}

/// Stage of the measure funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopulationType {
    InitialPopulation,
    Denominator,
    DenominatorExclusion,
    DenominatorException,
    Numerator,
    NumeratorExclusion,
    MeasurePopulation,
    MeasureObservation,
}

impl PopulationType {
    /// Wire name (kebab-case)
    pub fn as_str(&self) -> &'static str {
        match self {
            PopulationType::InitialPopulation => "initial-population",
            PopulationType::Denominator => "denominator",
            PopulationType::DenominatorExclusion => "denominator-exclusion",
            PopulationType::DenominatorException => "denominator-exception",
            PopulationType::Numerator => "numerator",
            PopulationType::NumeratorExclusion => "numerator-exclusion",
            PopulationType::MeasurePopulation => "measure-population",
            PopulationType::MeasureObservation => "measure-observation",
        }
    }

    /// Definition name used in generated documents
    pub fn label(&self) -> &'static str {
        match self {
            PopulationType::InitialPopulation => "Initial Population",
            PopulationType::Denominator => "Denominator",
            PopulationType::DenominatorExclusion => "Denominator Exclusions",
            PopulationType::DenominatorException => "Denominator Exceptions",
            PopulationType::Numerator => "Numerator",
            PopulationType::NumeratorExclusion => "Numerator Exclusions",
            PopulationType::MeasurePopulation => "Measure Population",
            PopulationType::MeasureObservation => "Measure Observation",
        }
    }

    /// snake_case form for SQL identifiers
    pub fn snake(&self) -> String {
        self.as_str().replace('-', "_")
    }
}

impl fmt::Display for PopulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One funnel stage with its criteria tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Population {
    pub id: String,
    #[serde(rename = "type")]
    pub population_type: PopulationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub criteria: LogicalClause,
}

impl Population {
    pub fn new(id: impl Into<String>, population_type: PopulationType, criteria: LogicalClause) -> Self {
        Self {
            id: id.into(),
            population_type,
            description: None,
            criteria,
        }
    }
}

/// Inclusive date range the measure reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MeasurementPeriod {
    /// Calendar year period
    pub fn calendar_year(year: i32) -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or_default(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }
}

/// Descriptive measure metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureMetadata {
    /// External identifier (e.g. CMS122v12)
    #[serde(default)]
    pub measure_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_period: Option<MeasurementPeriod>,
}

/// Constraints applied on top of the initial population
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl GlobalConstraints {
    pub fn is_empty(&self) -> bool {
        self.age_min.is_none()
            && self.age_max.is_none()
            && self.gender.as_deref().is_none_or(|g| g.trim().is_empty())
    }
}

/// A complete measure document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub id: String,
    #[serde(default)]
    pub metadata: MeasureMetadata,
    #[serde(default)]
    pub populations: Vec<Population>,
    #[serde(default)]
    pub value_sets: Vec<ValueSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_constraints: Option<GlobalConstraints>,
}

impl Measure {
    /// Create an empty measure
    pub fn new(id: impl Into<String>, measure_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: MeasureMetadata {
                measure_id: measure_id.into(),
                title: title.into(),
                ..MeasureMetadata::default()
            },
            populations: Vec::new(),
            value_sets: Vec::new(),
            global_constraints: None,
        }
    }

    /// Parse a measure document from JSON
    pub fn from_json(input: &str) -> Result<Self, UmsError> {
        serde_json::from_str(input).map_err(|e| {
            ErrorBuilder::new(UMS0001, format!("Invalid measure document: {}", e))
                .context(format!("line {}, column {}", e.line(), e.column()))
                .input()
        })
    }

    /// Load a measure document from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, UmsError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ErrorBuilder::new(UMS0501, format!("Cannot read measure document: {}", e))
                .context(path.as_ref().display().to_string())
                .system()
        })?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, UmsError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| UmsError::input(UMS0001, format!("Cannot serialize measure: {}", e)))
    }

    /// Resolve a value set reference by id or oid
    pub fn value_set(&self, reference: &str) -> Option<&ValueSet> {
        self.value_sets.iter().find(|vs| vs.is_referenced_by(reference))
    }

    /// First population of a type
    pub fn population(&self, population_type: PopulationType) -> Option<&Population> {
        self.populations
            .iter()
            .find(|p| p.population_type == population_type)
    }

    /// All populations of a type
    pub fn populations_of(&self, population_type: PopulationType) -> impl Iterator<Item = &Population> {
        self.populations
            .iter()
            .filter(move |p| p.population_type == population_type)
    }

    /// Whether any population, node or value set carries this id
    pub fn has_component(&self, component_id: &str) -> bool {
        self.populations.iter().any(|p| {
            p.id == component_id || find_by_id(&p.criteria, component_id).is_some()
        }) || self.value_sets.iter().any(|vs| vs.id == component_id)
    }

    /// Measurement period of the document, or a calendar year fallback
    pub fn measurement_period_or(&self, default_year: i32) -> MeasurementPeriod {
        self.metadata
            .measurement_period
            .unwrap_or_else(|| MeasurementPeriod::calendar_year(default_year))
    }

    /// Display title falling back to the identifiers
    pub fn title(&self) -> &str {
        if !self.metadata.title.trim().is_empty() {
            self.metadata.title.trim()
        } else if !self.metadata.measure_id.trim().is_empty() {
            self.metadata.measure_id.trim()
        } else {
            &self.id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DataCategory, DataElement};

    fn sample() -> Measure {
        let mut m = Measure::new("m1", "CMS122v12", "Diabetes Control");
        m.value_sets.push(
            ValueSet::new("vs-dm", "Diabetes")
                .with_oid("2.16.840.1.113883.3.464.1003.103.12.1001")
                .with_code(Code::new("44054006", "http://snomed.info/sct")),
        );
        m.populations.push(Population::new(
            "ip",
            PopulationType::InitialPopulation,
            LogicalClause::and(
                "ip-root",
                vec![DataElement::new("e1", DataCategory::Condition, "Diabetes")
                    .with_value_set("vs-dm")
                    .into()],
            ),
        ));
        m
    }

    #[test]
    fn test_value_set_lookup_by_id_and_oid() {
        let m = sample();
        assert!(m.value_set("vs-dm").is_some());
        assert!(m.value_set("2.16.840.1.113883.3.464.1003.103.12.1001").is_some());
        assert!(m.value_set("missing").is_none());
    }

    #[test]
    fn test_canonical_forms() {
        let m = sample();
        assert_eq!(
            m.value_sets[0].canonical(),
            "urn:oid:2.16.840.1.113883.3.464.1003.103.12.1001"
        );
        assert_eq!(ValueSet::new("x", "X").canonical(), "urn:ums:valueset:x");
    }

    #[test]
    fn test_json_round_trip() {
        let m = sample();
        let json = m.to_json().unwrap();
        assert!(json.contains("\"initial-population\""));
        let back = Measure::from_json(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_from_json_reports_position() {
        let err = Measure::from_json("{ \"id\": ").unwrap_err();
        assert_eq!(err.code(), UMS0001);
    }

    #[test]
    fn test_has_component() {
        let m = sample();
        assert!(m.has_component("ip"));
        assert!(m.has_component("e1"));
        assert!(m.has_component("vs-dm"));
        assert!(!m.has_component("gone"));
    }

    #[test]
    fn test_duplicate_codes() {
        let vs = ValueSet::new("v", "V")
            .with_code(Code::new("1", "s"))
            .with_code(Code::new("1", "s"))
            .with_code(Code::new("2", "s"));
        assert_eq!(vs.duplicate_codes().len(), 1);
    }

    #[test]
    fn test_measurement_period_fallback() {
        let m = sample();
        let period = m.measurement_period_or(2025);
        assert_eq!(period.start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(period.contains(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
    }

    #[test]
    fn test_blank_gender_constraint_is_empty() {
        let blank = GlobalConstraints {
            gender: Some("  ".to_string()),
            ..GlobalConstraints::default()
        };
        assert!(blank.is_empty());
        let adults = GlobalConstraints {
            age_min: Some(18),
            ..blank
        };
        assert!(!adults.is_empty());
    }
}
