//! The shared operator walk
//!
//! Both code generators and the evaluator interpret a clause through
//! [`fold_clause`], so the three always agree on what a clause means:
//!
//! | operator | children | connective |
//! |----------|----------|------------|
//! | AND      | any      | [`Connective::All`] (empty = vacuously true) |
//! | OR       | any      | [`Connective::Any`] (empty = vacuously false) |
//! | NOT      | one      | [`Connective::NotAll`] (negation of the child) |
//! | NOT      | several  | [`Connective::NotAll`] (negation of their conjunction) |
//!
//! Pending sibling connectives are never consulted.

use crate::node::{DataElement, LogicNode, LogicalClause, LogicalOperator};
use octofhir_ums_diagnostics::NodeLocation;

/// Resolved meaning of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    /// Conjunction of the parts
    All,
    /// Disjunction of the parts
    Any,
    /// Negation of the conjunction of the parts
    NotAll,
}

impl Connective {
    pub fn of(operator: LogicalOperator) -> Self {
        match operator {
            LogicalOperator::And => Connective::All,
            LogicalOperator::Or => Connective::Any,
            LogicalOperator::Not => Connective::NotAll,
        }
    }

    /// Value of the connective over zero parts
    pub fn vacuous(&self) -> bool {
        match self {
            Connective::All => true,
            Connective::Any => false,
            Connective::NotAll => false,
        }
    }

    /// Combine already-evaluated booleans
    pub fn apply(&self, parts: &[bool]) -> bool {
        match self {
            Connective::All => parts.iter().all(|p| *p),
            Connective::Any => parts.iter().any(|p| *p),
            Connective::NotAll => !parts.iter().all(|p| *p),
        }
    }
}

/// Degenerate clause shapes reported before a clause is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeIssue {
    /// The clause has no children
    EmptyClause,
    /// A NOT clause with more than one child
    NotWithManyChildren(usize),
}

/// Callbacks of the shared operator walk
pub trait LogicFolder {
    type Output;

    /// Interpret a leaf
    fn element(&mut self, element: &DataElement, location: &NodeLocation) -> Self::Output;

    /// Combine the already-folded children of a clause
    fn clause(
        &mut self,
        clause: &LogicalClause,
        connective: Connective,
        parts: Vec<Self::Output>,
        location: &NodeLocation,
    ) -> Self::Output;

    /// Observe a degenerate clause shape
    fn shape_issue(&mut self, _clause: &LogicalClause, _issue: ShapeIssue, _location: &NodeLocation) {}
}

/// Fold a clause bottom-up. `base` locates the clause's parent.
pub fn fold_clause<F: LogicFolder>(
    clause: &LogicalClause,
    base: &NodeLocation,
    folder: &mut F,
) -> F::Output {
    let location = base.child(clause.id.clone());
    let connective = Connective::of(clause.operator);

    if clause.children.is_empty() {
        folder.shape_issue(clause, ShapeIssue::EmptyClause, &location);
    } else if clause.operator == LogicalOperator::Not && clause.children.len() > 1 {
        folder.shape_issue(
            clause,
            ShapeIssue::NotWithManyChildren(clause.children.len()),
            &location,
        );
    }

    let parts = clause
        .children
        .iter()
        .map(|child| match child {
            LogicNode::DataElement(element) => {
                folder.element(element, &location.child(element.id.clone()))
            }
            LogicNode::Clause(inner) => fold_clause(inner, &location, folder),
        })
        .collect();

    folder.clause(clause, connective, parts, &location)
}
