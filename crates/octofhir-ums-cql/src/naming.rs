//! Identifier and literal handling for generated CQL

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid identifier pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Library identifier derived from an external measure id
///
/// Runs of characters outside `[A-Za-z0-9_]` collapse to one underscore and a
/// leading digit gets a prefix.
pub fn library_identifier(measure_id: &str) -> String {
    let cleaned = NON_IDENTIFIER.replace_all(measure_id.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    match cleaned.chars().next() {
        None => "UMSMeasure".to_string(),
        Some(c) if c.is_ascii_digit() => format!("UMS_{}", cleaned),
        Some(_) => cleaned.to_string(),
    }
}

/// Quoted (delimited) identifier
pub fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Single-quoted string literal
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Text safe to place on a `//` comment line
pub fn comment_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Allocates unique definition names
#[derive(Debug, Default)]
pub struct NameTable {
    used: HashSet<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `wanted`, suffixing ` (2)`, ` (3)`... when it is taken
    pub fn claim(&mut self, wanted: &str) -> String {
        let base = comment_text(wanted);
        let base = if base.is_empty() { "Unnamed".to_string() } else { base };
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{} ({})", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CMS122v12", "CMS122v12")]
    #[case("CMS 122 v12", "CMS_122_v12")]
    #[case("122-diabetes", "UMS_122_diabetes")]
    #[case("  ", "UMSMeasure")]
    #[case("--x--", "x")]
    fn test_library_identifier(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(library_identifier(input), expected);
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quoted(r#"Say "hi""#), r#""Say \"hi\"""#);
        assert_eq!(string_literal("O'Neil"), r"'O\'Neil'");
    }

    #[test]
    fn test_name_table_suffixes() {
        let mut names = NameTable::new();
        assert_eq!(names.claim("Office Visit"), "Office Visit");
        assert_eq!(names.claim("Office  Visit"), "Office Visit (2)");
        assert_eq!(names.claim("Office Visit"), "Office Visit (3)");
        assert_eq!(names.claim(""), "Unnamed");
    }
}
