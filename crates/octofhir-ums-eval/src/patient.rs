//! Patient records evaluated against a measure

use chrono::{Datelike, NaiveDate};
use octofhir_ums_diagnostics::UmsError;
use octofhir_ums_ir::{DataCategory, LoadError, load_json, parse_json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One coded clinical fact about a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalEvent {
    pub category: DataCategory,
    pub code: String,
    #[serde(default)]
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ClinicalEvent {
    pub fn new(category: DataCategory, code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            system: system.into(),
            display: None,
            date: None,
            value: None,
            unit: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_value(mut self, value: Decimal, unit: Option<&str>) -> Self {
        self.value = Some(value);
        self.unit = unit.map(str::to_string);
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// A patient and their clinical events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub events: Vec<ClinicalEvent>,
}

impl PatientRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            birth_date: None,
            gender: None,
            events: Vec::new(),
        }
    }

    pub fn born(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_event(mut self, event: ClinicalEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Whole years between birth and `as_of`; `None` without a birth date or before birth
    pub fn age_at(&self, as_of: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        if as_of < birth {
            return None;
        }
        let mut years = as_of.year() - birth.year();
        if (as_of.month(), as_of.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    pub fn events_of(&self, category: DataCategory) -> impl Iterator<Item = &ClinicalEvent> {
        self.events.iter().filter(move |e| e.category == category)
    }

    pub fn from_json(input: &str) -> Result<Self, UmsError> {
        parse_json(input).map_err(UmsError::from)
    }
}

/// Parse a JSON array of patient records
pub fn parse_patients(input: &str) -> Result<Vec<PatientRecord>, UmsError> {
    parse_json(input).map_err(UmsError::from)
}

/// Load a JSON array of patient records from a file
pub fn load_patients(path: impl AsRef<Path>) -> Result<Vec<PatientRecord>, LoadError> {
    load_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2000, 6, 15), date(2024, 6, 14), Some(23))]
    #[case(date(2000, 6, 15), date(2024, 6, 15), Some(24))]
    #[case(date(2000, 2, 29), date(2024, 12, 31), Some(24))]
    #[case(date(2025, 1, 1), date(2024, 12, 31), None)]
    fn test_age_at(#[case] birth: NaiveDate, #[case] as_of: NaiveDate, #[case] expected: Option<u32>) {
        assert_eq!(PatientRecord::new("p").born(birth).age_at(as_of), expected);
    }

    #[test]
    fn test_age_without_birth_date() {
        assert_eq!(PatientRecord::new("p").age_at(date(2024, 1, 1)), None);
    }

    #[test]
    fn test_parse_patient_json() {
        let patient = PatientRecord::from_json(
            r#"{
                "id": "p1",
                "birthDate": "1960-04-02",
                "gender": "female",
                "events": [
                    {"category": "observation", "code": "4548-4", "system": "http://loinc.org",
                     "date": "2024-03-01", "value": "9.5", "unit": "%"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(patient.events[0].value, Some(Decimal::new(95, 1)));
        assert_eq!(patient.events_of(DataCategory::Observation).count(), 1);
        assert_eq!(patient.events_of(DataCategory::Condition).count(), 0);
    }
}
