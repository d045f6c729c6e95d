//! Population criteria as set operations over predicate CTEs
//!
//! AND becomes `INTERSECT`, OR becomes `UNION` and NOT becomes an `EXCEPT`
//! against `patient_base`. Compound operands are wrapped in aliased derived
//! tables so every dialect parses the nesting the same way.

use crate::predicate::{PATIENT_BASE, predicate_cte_name};
use crate::dialect::sql_literal;
use octofhir_ums_diagnostics::{Diagnostic, NodeLocation, UMS0203, UMS0204};
use octofhir_ums_ir::{Connective, DataElement, LogicFolder, LogicalClause, ShapeIssue};
use std::collections::HashSet;

/// A query returning one `patient_id` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetQuery {
    pub sql: String,
    /// Top level is a set operation
    pub compound: bool,
}

impl SetQuery {
    fn simple(sql: String) -> Self {
        Self { sql, compound: false }
    }

    fn compound(sql: String) -> Self {
        Self { sql, compound: true }
    }
}

pub(crate) fn every_patient() -> String {
    format!("SELECT patient_id FROM {}", PATIENT_BASE)
}

pub(crate) fn no_patient() -> String {
    format!("SELECT patient_id FROM {} WHERE 1 = 0", PATIENT_BASE)
}

pub(crate) fn indent(sql: &str, by: usize) -> String {
    let pad = " ".repeat(by);
    sql.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{}{}", pad, line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Folds one population's criteria into a [`SetQuery`]
pub(crate) struct PopulationFolder<'r> {
    pub population_id: &'r str,
    pub placeholders: &'r HashSet<(String, String)>,
    pub warnings: &'r mut Vec<Diagnostic>,
    /// Shared derived-table alias counter
    pub next_alias: &'r mut usize,
}

impl PopulationFolder<'_> {
    fn alias(&mut self) -> String {
        *self.next_alias += 1;
        format!("g{}", self.next_alias)
    }

    fn operand(&mut self, query: SetQuery) -> String {
        if query.compound {
            format!("SELECT patient_id FROM (\n{}\n) {}", indent(&query.sql, 2), self.alias())
        } else {
            query.sql
        }
    }

    fn combine(&mut self, parts: Vec<SetQuery>, operator: &str) -> SetQuery {
        let operands: Vec<String> = parts.into_iter().map(|p| self.operand(p)).collect();
        SetQuery::compound(operands.join(&format!("\n{}\n", operator)))
    }

    fn warn(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}: {}", diagnostic.code, diagnostic.message);
        self.warnings.push(diagnostic);
    }
}

impl LogicFolder for PopulationFolder<'_> {
    type Output = SetQuery;

    fn element(&mut self, element: &DataElement, _location: &NodeLocation) -> SetQuery {
        let atom = format!(
            "SELECT patient_id FROM {} WHERE population_id = {} AND predicate_id = {}",
            predicate_cte_name(element.element_kind),
            sql_literal(self.population_id),
            sql_literal(&element.id)
        );
        let placeholder = self
            .placeholders
            .contains(&(self.population_id.to_string(), element.id.clone()));
        if element.negation && !placeholder {
            SetQuery::compound(format!("{}\nEXCEPT\n{}", every_patient(), atom))
        } else {
            SetQuery::simple(atom)
        }
    }

    fn clause(
        &mut self,
        _clause: &LogicalClause,
        connective: Connective,
        parts: Vec<SetQuery>,
        _location: &NodeLocation,
    ) -> SetQuery {
        match connective {
            Connective::All | Connective::Any if parts.is_empty() => {
                if connective.vacuous() {
                    SetQuery::simple(every_patient())
                } else {
                    SetQuery::simple(no_patient())
                }
            }
            Connective::All | Connective::Any if parts.len() == 1 => {
                parts.into_iter().next().unwrap_or_else(|| SetQuery::simple(no_patient()))
            }
            Connective::All => self.combine(parts, "INTERSECT"),
            Connective::Any => self.combine(parts, "UNION"),
            Connective::NotAll => {
                if parts.is_empty() {
                    return SetQuery::simple(no_patient());
                }
                let inner = if parts.len() == 1 {
                    parts.into_iter().next().unwrap_or_else(|| SetQuery::simple(no_patient()))
                } else {
                    self.combine(parts, "INTERSECT")
                };
                let operand = self.operand(inner);
                SetQuery::compound(format!("{}\nEXCEPT\n{}", every_patient(), operand))
            }
        }
    }

    fn shape_issue(&mut self, clause: &LogicalClause, issue: ShapeIssue, location: &NodeLocation) {
        let diagnostic = match issue {
            ShapeIssue::EmptyClause => Diagnostic::warning(
                UMS0204,
                format!(
                    "Clause '{}' has no children; {} emitted",
                    clause.id,
                    if Connective::of(clause.operator).vacuous() {
                        "every patient"
                    } else {
                        "no patient"
                    }
                ),
            ),
            ShapeIssue::NotWithManyChildren(n) => Diagnostic::warning(
                UMS0203,
                format!(
                    "NOT clause '{}' has {} children; their conjunction is negated",
                    clause.id, n
                ),
            ),
        };
        self.warn(diagnostic.with_location(location.clone()));
    }
}
