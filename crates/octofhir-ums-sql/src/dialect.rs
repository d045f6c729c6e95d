//! SQL dialect configuration
//!
//! Everything the generator needs to know about the target database lives
//! here: table and column names, identifier quoting, the parameter prefix and
//! templates for the handful of date expressions that differ by vendor.
//! Templates use `{name}` placeholders.

use indexmap::IndexMap;
use octofhir_ums_diagnostics::UmsError;
use octofhir_ums_ir::{DataCategory, LoadError, load_json, parse_json};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Database vendor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlProvider {
    Postgres,
    SqlServer,
    Other,
}

/// Where the events of one data category are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMapping {
    pub table: String,
    #[serde(default = "default_code_column")]
    pub code_column: String,
    #[serde(default = "default_system_column")]
    pub system_column: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_column: Option<String>,
}

fn default_code_column() -> String {
    "code".to_string()
}

fn default_system_column() -> String {
    "code_system".to_string()
}

fn default_date_column() -> String {
    "event_date".to_string()
}

impl TableMapping {
    /// Mapping with the default column layout
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            code_column: default_code_column(),
            system_column: default_system_column(),
            date_column: default_date_column(),
            value_column: Some("value_numeric".to_string()),
            unit_column: Some("value_unit".to_string()),
        }
    }
}

/// Identifier delimiters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierQuote {
    pub open: String,
    pub close: String,
}

/// Target database description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialectConfig {
    pub name: String,
    pub provider: SqlProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub patient_table: String,
    pub patient_id_column: String,
    pub birth_date_column: String,
    pub gender_column: String,
    /// Event tables keyed by data category name
    #[serde(default)]
    pub tables: IndexMap<String, TableMapping>,
    pub identifier_quote: IdentifierQuote,
    pub parameter_prefix: String,
    /// Whole years between `{birth_date}` and `{as_of}`
    pub age_template: String,
    /// `{date}` moved back by `{days}` days
    pub date_minus_days_template: String,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::postgres()
    }
}

fn standard_tables() -> IndexMap<String, TableMapping> {
    [
        (DataCategory::Condition, "condition"),
        (DataCategory::Encounter, "encounter"),
        (DataCategory::Procedure, "procedure"),
        (DataCategory::Medication, "medication_request"),
        (DataCategory::Observation, "observation"),
        (DataCategory::Assessment, "assessment"),
        (DataCategory::Immunization, "immunization"),
        (DataCategory::Allergy, "allergy_intolerance"),
        (DataCategory::Device, "device_request"),
        (DataCategory::Communication, "communication"),
        (DataCategory::Other, "clinical_event"),
    ]
    .into_iter()
    .map(|(category, table)| (category.as_str().to_string(), TableMapping::new(table)))
    .collect()
}

impl DialectConfig {
    /// PostgreSQL preset
    pub fn postgres() -> Self {
        Self {
            name: "postgres".to_string(),
            provider: SqlProvider::Postgres,
            schema: None,
            patient_table: "patient".to_string(),
            patient_id_column: "patient_id".to_string(),
            birth_date_column: "birth_date".to_string(),
            gender_column: "gender".to_string(),
            tables: standard_tables(),
            identifier_quote: IdentifierQuote {
                open: "\"".to_string(),
                close: "\"".to_string(),
            },
            parameter_prefix: ":".to_string(),
            age_template: "EXTRACT(YEAR FROM AGE({as_of}, {birth_date}))".to_string(),
            date_minus_days_template: "({date} - INTERVAL '{days} days')".to_string(),
        }
    }

    /// SQL Server preset
    pub fn sqlserver() -> Self {
        Self {
            name: "sqlserver".to_string(),
            provider: SqlProvider::SqlServer,
            schema: Some("dbo".to_string()),
            identifier_quote: IdentifierQuote {
                open: "[".to_string(),
                close: "]".to_string(),
            },
            parameter_prefix: "@".to_string(),
            age_template: "(DATEDIFF(year, {birth_date}, {as_of}) - CASE WHEN DATEADD(year, DATEDIFF(year, {birth_date}, {as_of}), {birth_date}) > {as_of} THEN 1 ELSE 0 END)".to_string(),
            date_minus_days_template: "DATEADD(day, -{days}, {date})".to_string(),
            ..Self::postgres()
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::postgres()),
            "sqlserver" | "mssql" | "tsql" => Some(Self::sqlserver()),
            _ => None,
        }
    }

    /// Parse a dialect from JSON
    pub fn from_json(input: &str) -> Result<Self, UmsError> {
        parse_json(input).map_err(UmsError::from)
    }

    /// Load a dialect from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_json(path)
    }

    /// Table mapping of a category
    pub fn table_for(&self, category: DataCategory) -> Option<&TableMapping> {
        self.tables.get(category.as_str())
    }

    /// Delimited identifier
    pub fn quote(&self, identifier: &str) -> String {
        let close = &self.identifier_quote.close;
        let escaped = identifier.replace(close.as_str(), &format!("{}{}", close, close));
        format!("{}{}{}", self.identifier_quote.open, escaped, close)
    }

    /// Schema-qualified, delimited table name
    pub fn table(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", self.quote(schema), self.quote(table)),
            None => self.quote(table),
        }
    }

    /// Qualified column reference
    pub fn column(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", alias, self.quote(column))
    }

    /// Named query parameter
    pub fn param(&self, name: &str) -> String {
        format!("{}{}", self.parameter_prefix, name)
    }

    pub fn age(&self, birth_date: &str, as_of: &str) -> String {
        self.age_template
            .replace("{birth_date}", birth_date)
            .replace("{as_of}", as_of)
    }

    pub fn date_minus_days(&self, date: &str, days: u32) -> String {
        self.date_minus_days_template
            .replace("{date}", date)
            .replace("{days}", &days.to_string())
    }
}

/// String literal with embedded quotes doubled
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_postgres_preset() {
        let pg = DialectConfig::default();
        assert_eq!(pg.table("patient"), "\"patient\"");
        assert_eq!(pg.param("mp_end"), ":mp_end");
        assert_eq!(
            pg.date_minus_days(":mp_end", 90),
            "(:mp_end - INTERVAL '90 days')"
        );
        assert_eq!(
            pg.table_for(DataCategory::Medication).map(|t| t.table.as_str()),
            Some("medication_request")
        );
        assert!(pg.table_for(DataCategory::Demographic).is_none());
    }

    #[test]
    fn test_sqlserver_preset() {
        let ms = DialectConfig::sqlserver();
        assert_eq!(ms.table("patient"), "[dbo].[patient]");
        assert_eq!(ms.quote("odd]name"), "[odd]]name]");
        assert_eq!(ms.param("mp_start"), "@mp_start");
        assert!(ms.age("b.birth_date", "@mp_end").starts_with("(DATEDIFF(year, b.birth_date, @mp_end)"));
    }

    #[test]
    fn test_json_round_trip_and_partial_tables() {
        let json = serde_json::to_string(&DialectConfig::sqlserver()).unwrap();
        assert_eq!(DialectConfig::from_json(&json).unwrap(), DialectConfig::sqlserver());

        let mut custom: serde_json::Value = serde_json::from_str(&json).unwrap();
        custom["tables"] = serde_json::json!({ "condition": { "table": "dx" } });
        let dialect = DialectConfig::from_json(&custom.to_string()).unwrap();
        let mapping = dialect.table_for(DataCategory::Condition).unwrap();
        assert_eq!(mapping.code_column, "code");
        assert_eq!(mapping.value_column, None);
        assert!(dialect.table_for(DataCategory::Encounter).is_none());
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(DialectConfig::preset("PostgreSQL"), Some(DialectConfig::postgres()));
        assert_eq!(DialectConfig::preset("mssql").map(|d| d.name), Some("sqlserver".to_string()));
        assert!(DialectConfig::preset("oracle").is_none());
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(sql_literal("O'Neil"), "'O''Neil'");
    }
}
