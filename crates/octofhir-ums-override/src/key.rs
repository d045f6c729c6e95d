//! Override keys and target formats

use crate::error::OverrideError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: &str = "::";

/// Generated language an override applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Cql,
    Sql,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Cql => "cql",
            TargetFormat::Sql => "sql",
        }
    }

    /// Line comment prefix of the language
    pub fn comment_prefix(&self) -> &'static str {
        match self {
            TargetFormat::Cql => "//",
            TargetFormat::Sql => "--",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cql" => Ok(TargetFormat::Cql),
            "sql" => Ok(TargetFormat::Sql),
            _ => Err(OverrideError::UnknownFormat(s.to_string())),
        }
    }
}

/// Identity of an override: one component of one measure in one format
///
/// Serialized as the opaque string `measureId::componentId::targetFormat`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OverrideKey {
    pub measure_id: String,
    pub component_id: String,
    pub target_format: TargetFormat,
}

impl OverrideKey {
    pub fn new(
        measure_id: impl Into<String>,
        component_id: impl Into<String>,
        target_format: TargetFormat,
    ) -> Self {
        Self {
            measure_id: measure_id.into(),
            component_id: component_id.into(),
            target_format,
        }
    }

    /// Whether the key belongs to a measure and format
    pub fn applies_to(&self, measure_id: &str, target_format: TargetFormat) -> bool {
        self.measure_id == measure_id && self.target_format == target_format
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.measure_id,
            self.component_id,
            self.target_format,
            sep = SEPARATOR
        )
    }
}

impl FromStr for OverrideKey {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [measure_id, component_id, format] = parts.as_slice() else {
            return Err(OverrideError::MalformedKey(s.to_string()));
        };
        if measure_id.is_empty() || component_id.is_empty() {
            return Err(OverrideError::MalformedKey(s.to_string()));
        }
        Ok(Self::new(*measure_id, *component_id, format.parse()?))
    }
}

impl TryFrom<String> for OverrideKey {
    type Error = OverrideError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OverrideKey> for String {
    fn from(key: OverrideKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_key_display_and_parse() {
        let key = OverrideKey::new("cms122", "ip-root", TargetFormat::Sql);
        assert_eq!(key.to_string(), "cms122::ip-root::sql");
        assert_eq!("cms122::ip-root::sql".parse::<OverrideKey>().unwrap(), key);
    }

    #[rstest]
    #[case("cms122::ip-root")]
    #[case("cms122::ip-root::sql::extra")]
    #[case("::ip-root::sql")]
    #[case("cms122::::cql")]
    fn test_malformed_keys(#[case] input: &str) {
        assert!(matches!(
            input.parse::<OverrideKey>(),
            Err(OverrideError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_unknown_format() {
        let err = "m::c::elm".parse::<OverrideKey>().unwrap_err();
        assert!(matches!(err, OverrideError::UnknownFormat(f) if f == "elm"));
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = OverrideKey::new("m", "c", TargetFormat::Cql);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"m::c::cql\"");
    }

    #[test]
    fn test_comment_prefixes() {
        assert_eq!(TargetFormat::Cql.comment_prefix(), "//");
        assert_eq!(TargetFormat::Sql.comment_prefix(), "--");
    }
}
