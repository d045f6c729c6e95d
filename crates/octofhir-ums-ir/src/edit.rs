//! Editor operations: connective changes with auto-nesting
//!
//! Changing the connective between two adjacent siblings to something other
//! than their clause's operator groups the pair into a new nested clause, so
//! every clause handed to generation and evaluation stays uniform.

use crate::node::{LogicNode, LogicalClause, LogicalOperator, PendingConnectives, SiblingOverride};
use crate::walk::{NodeRef, find_by_id, node_ids, replace_by_id};
use thiserror::Error;

/// Errors raised by tree edits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// No sibling pair at the requested index
    #[error("clause '{clause_id}' has no sibling pair at index {index} ({len} children)")]
    PairOutOfRange {
        clause_id: String,
        index: usize,
        len: usize,
    },

    /// NOT clauses have a single operand
    #[error("clause '{clause_id}' is a NOT clause and has no connectives")]
    NegationHasNoPairs { clause_id: String },

    /// The clause to edit does not exist
    #[error("clause '{clause_id}' not found")]
    ClauseNotFound { clause_id: String },
}

/// Change the connective between children `index` and `index + 1`.
///
/// Setting the clause's own operator is a no-op on the tree (a pending
/// override for the pair is cleared). Any other operator nests the pair into
/// a new clause that replaces both children.
pub fn set_connective(
    clause: &LogicalClause,
    index: usize,
    operator: LogicalOperator,
) -> Result<LogicalClause, EditError> {
    if clause.operator == LogicalOperator::Not {
        return Err(EditError::NegationHasNoPairs {
            clause_id: clause.id.clone(),
        });
    }
    if index >= clause.children.len().saturating_sub(1) {
        return Err(EditError::PairOutOfRange {
            clause_id: clause.id.clone(),
            index,
            len: clause.children.len(),
        });
    }

    if operator == clause.operator {
        let mut unchanged = clause.clone();
        unchanged
            .sibling_overrides
            .0
            .retain(|o| !o.is_pair(index, index + 1));
        return Ok(unchanged);
    }

    let group_id = unique_group_id(clause, index);
    log::debug!(
        "nesting children {} and {} of '{}' into '{}' ({})",
        index,
        index + 1,
        clause.id,
        group_id,
        operator
    );

    let mut children = Vec::with_capacity(clause.children.len() - 1);
    children.extend(clause.children[..index].iter().cloned());
    children.push(LogicNode::Clause(LogicalClause::new(
        group_id,
        operator,
        clause.children[index..=index + 1].to_vec(),
    )));
    children.extend(clause.children[index + 2..].iter().cloned());

    Ok(LogicalClause {
        id: clause.id.clone(),
        operator: clause.operator,
        children,
        sibling_overrides: reindex_pending(&clause.sibling_overrides, index),
    })
}

/// Apply [`set_connective`] to a clause anywhere under `root`
pub fn set_connective_by_id(
    root: &LogicalClause,
    clause_id: &str,
    index: usize,
    operator: LogicalOperator,
) -> Result<LogicalClause, EditError> {
    let target = match find_by_id(root, clause_id) {
        Some(NodeRef::Clause(clause)) => clause,
        _ => {
            return Err(EditError::ClauseNotFound {
                clause_id: clause_id.to_string(),
            });
        }
    };
    let edited = set_connective(target, index, operator)?;
    Ok(replace_by_id(root, clause_id, LogicNode::Clause(edited)))
}

fn unique_group_id(clause: &LogicalClause, index: usize) -> String {
    let taken = node_ids(clause);
    let base = format!("{}-group-{}", clause.id, index);
    if !taken.contains(&base.as_str()) {
        return base;
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or(base)
}

/// Drop overrides touching the merged pair and shift later indices down
fn reindex_pending(pending: &PendingConnectives, index: usize) -> PendingConnectives {
    let shift = |i: usize| if i > index + 1 { i - 1 } else { i };
    PendingConnectives(
        pending
            .iter()
            .filter(|o| {
                let touches = [o.from_index, o.to_index]
                    .iter()
                    .any(|i| *i == index || *i == index + 1);
                !touches
            })
            .map(|o| SiblingOverride {
                from_index: shift(o.from_index),
                to_index: shift(o.to_index),
                operator: o.operator,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DataCategory, DataElement};
    use pretty_assertions::assert_eq;

    fn el(id: &str) -> LogicNode {
        DataElement::new(id, DataCategory::Encounter, id).into()
    }

    fn flat() -> LogicalClause {
        LogicalClause::and("root", vec![el("a"), el("b"), el("c")])
    }

    #[test]
    fn test_same_operator_is_noop() {
        let clause = flat();
        assert_eq!(set_connective(&clause, 0, LogicalOperator::And).unwrap(), clause);
    }

    #[test]
    fn test_different_operator_nests_pair() {
        let edited = set_connective(&flat(), 1, LogicalOperator::Or).unwrap();
        assert_eq!(edited.children.len(), 2);
        assert_eq!(edited.children[0].id(), "a");
        let group = edited.children[1].as_clause().unwrap();
        assert_eq!(group.id, "root-group-1");
        assert_eq!(group.operator, LogicalOperator::Or);
        let ids: Vec<_> = group.children.iter().map(LogicNode::id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_group_id_is_unique() {
        let clause = LogicalClause::and("root", vec![el("root-group-0"), el("b")]);
        let edited = set_connective(&clause, 0, LogicalOperator::Or).unwrap();
        assert_eq!(edited.children[0].id(), "root-group-0-2");
    }

    #[test]
    fn test_pending_overrides_reindexed() {
        let mut clause = LogicalClause::and("root", vec![el("a"), el("b"), el("c"), el("d")]);
        clause.sibling_overrides = PendingConnectives(vec![
            SiblingOverride { from_index: 0, to_index: 1, operator: LogicalOperator::Or },
            SiblingOverride { from_index: 2, to_index: 3, operator: LogicalOperator::Or },
        ]);
        let edited = set_connective(&clause, 0, LogicalOperator::Or).unwrap();
        assert_eq!(
            edited.sibling_overrides,
            PendingConnectives(vec![SiblingOverride {
                from_index: 1,
                to_index: 2,
                operator: LogicalOperator::Or
            }])
        );
    }

    #[test]
    fn test_same_operator_clears_pending_pair() {
        let mut clause = flat();
        clause.sibling_overrides = PendingConnectives(vec![SiblingOverride {
            from_index: 0,
            to_index: 1,
            operator: LogicalOperator::Or,
        }]);
        let edited = set_connective(&clause, 0, LogicalOperator::And).unwrap();
        assert!(edited.sibling_overrides.is_empty());
        assert_eq!(edited.children, clause.children);
    }

    #[test]
    fn test_out_of_range() {
        let err = set_connective(&flat(), 2, LogicalOperator::Or).unwrap_err();
        assert!(matches!(err, EditError::PairOutOfRange { index: 2, len: 3, .. }));
    }

    #[test]
    fn test_index_at_usize_max_is_out_of_range() {
        let err = set_connective(&flat(), usize::MAX, LogicalOperator::Or).unwrap_err();
        assert!(matches!(err, EditError::PairOutOfRange { index: usize::MAX, len: 3, .. }));

        let empty = LogicalClause::and("empty", vec![]);
        let err = set_connective(&empty, 0, LogicalOperator::Or).unwrap_err();
        assert!(matches!(err, EditError::PairOutOfRange { index: 0, len: 0, .. }));
    }

    #[test]
    fn test_not_has_no_pairs() {
        let clause = LogicalClause::not("n", el("a"));
        assert!(matches!(
            set_connective(&clause, 0, LogicalOperator::Or),
            Err(EditError::NegationHasNoPairs { .. })
        ));
    }

    #[test]
    fn test_edit_nested_clause_by_id() {
        let root = LogicalClause::or(
            "root",
            vec![LogicalClause::and("inner", vec![el("a"), el("b"), el("c")]).into(), el("d")],
        );
        let edited = set_connective_by_id(&root, "inner", 0, LogicalOperator::Or).unwrap();
        let inner = edited.children[0].as_clause().unwrap();
        assert_eq!(inner.children.len(), 2);
        assert_eq!(inner.children[0].id(), "inner-group-0");
        assert!(matches!(
            set_connective_by_id(&root, "nope", 0, LogicalOperator::Or),
            Err(EditError::ClauseNotFound { .. })
        ));
    }
}
