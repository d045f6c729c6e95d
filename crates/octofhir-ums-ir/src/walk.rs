//! Pure traversal, lookup and update helpers over the logic tree

use crate::node::{DataElement, LogicNode, LogicalClause, LogicalOperator};

/// Borrowed view of any node, including a root clause
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Element(&'a DataElement),
    Clause(&'a LogicalClause),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            NodeRef::Element(element) => &element.id,
            NodeRef::Clause(clause) => &clause.id,
        }
    }
}

impl<'a> From<&'a LogicNode> for NodeRef<'a> {
    fn from(node: &'a LogicNode) -> Self {
        match node {
            LogicNode::DataElement(element) => NodeRef::Element(element),
            LogicNode::Clause(clause) => NodeRef::Clause(clause),
        }
    }
}

/// Lazy depth-first iterator over the data elements of a clause
pub struct DataElements<'a> {
    stack: Vec<&'a LogicNode>,
}

impl<'a> Iterator for DataElements<'a> {
    type Item = &'a DataElement;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                LogicNode::DataElement(element) => return Some(element),
                LogicNode::Clause(clause) => self.stack.extend(clause.children.iter().rev()),
            }
        }
        None
    }
}

/// Walk the data elements of a clause in document order
pub fn walk_data_elements(clause: &LogicalClause) -> DataElements<'_> {
    DataElements {
        stack: clause.children.iter().rev().collect(),
    }
}

/// Find a node by id (the root clause included)
pub fn find_by_id<'a>(clause: &'a LogicalClause, id: &str) -> Option<NodeRef<'a>> {
    if clause.id == id {
        return Some(NodeRef::Clause(clause));
    }
    clause.children.iter().find_map(|child| match child {
        LogicNode::DataElement(element) if element.id == id => Some(NodeRef::Element(element)),
        LogicNode::DataElement(_) => None,
        LogicNode::Clause(inner) => find_by_id(inner, id),
    })
}

/// Return a copy of `clause` with the node `id` replaced by `patch`.
///
/// The root can only be replaced by another clause; any other request, and an
/// absent id, returns an unchanged copy.
pub fn replace_by_id(clause: &LogicalClause, id: &str, patch: LogicNode) -> LogicalClause {
    if clause.id == id {
        return match patch {
            LogicNode::Clause(replacement) => replacement,
            LogicNode::DataElement(_) => {
                log::warn!("refusing to replace root clause '{}' with a data element", id);
                clause.clone()
            }
        };
    }
    let mut patch = Some(patch);
    replace_in(clause, id, &mut patch)
}

fn replace_in(clause: &LogicalClause, id: &str, patch: &mut Option<LogicNode>) -> LogicalClause {
    let children = clause
        .children
        .iter()
        .map(|child| {
            if patch.is_none() {
                return child.clone();
            }
            match child {
                node if node.id() == id => patch.take().unwrap_or_else(|| node.clone()),
                LogicNode::Clause(inner) => LogicNode::Clause(replace_in(inner, id, patch)),
                LogicNode::DataElement(_) => child.clone(),
            }
        })
        .collect();
    LogicalClause {
        id: clause.id.clone(),
        operator: clause.operator,
        children,
        sibling_overrides: clause.sibling_overrides.clone(),
    }
}

/// Connective displayed between siblings `i` and `j`.
///
/// Consults the editor's pending connectives first; generation never calls this.
pub fn resolve_operator(clause: &LogicalClause, i: usize, j: usize) -> LogicalOperator {
    clause.sibling_overrides.get(i, j).unwrap_or(clause.operator)
}

/// Clause nesting depth (a clause with only leaves has depth 1)
pub fn depth(clause: &LogicalClause) -> usize {
    1 + clause
        .children
        .iter()
        .filter_map(LogicNode::as_clause)
        .map(depth)
        .max()
        .unwrap_or(0)
}

/// Number of data elements under a clause
pub fn element_count(clause: &LogicalClause) -> usize {
    walk_data_elements(clause).count()
}

/// Every node id under a clause, the clause itself included
pub fn node_ids(clause: &LogicalClause) -> Vec<&str> {
    let mut ids = vec![clause.id.as_str()];
    for child in &clause.children {
        match child {
            LogicNode::DataElement(element) => ids.push(&element.id),
            LogicNode::Clause(inner) => ids.extend(node_ids(inner)),
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DataCategory, SiblingOverride};
    use pretty_assertions::assert_eq;

    fn el(id: &str) -> LogicNode {
        DataElement::new(id, DataCategory::Condition, id.to_uppercase()).into()
    }

    fn tree() -> LogicalClause {
        LogicalClause::and(
            "root",
            vec![
                el("a"),
                LogicalClause::or("inner", vec![el("b"), el("c")]).into(),
                el("d"),
            ],
        )
    }

    #[test]
    fn test_walk_is_depth_first_in_order() {
        let tree = tree();
        let ids: Vec<_> = walk_data_elements(&tree).map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let t = tree();
        assert_eq!(walk_data_elements(&t).count(), walk_data_elements(&t).count());
    }

    #[test]
    fn test_find_by_id() {
        let t = tree();
        assert!(matches!(find_by_id(&t, "root"), Some(NodeRef::Clause(_))));
        assert!(matches!(find_by_id(&t, "inner"), Some(NodeRef::Clause(_))));
        assert_eq!(find_by_id(&t, "c").map(|n| n.id()), Some("c"));
        assert!(find_by_id(&t, "zzz").is_none());
    }

    #[test]
    fn test_replace_by_id_returns_new_tree() {
        let t = tree();
        let replaced = replace_by_id(&t, "c", el("x"));
        let ids: Vec<_> = walk_data_elements(&replaced).map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "x", "d"]);
        // input untouched
        assert!(find_by_id(&t, "c").is_some());
    }

    #[test]
    fn test_replace_missing_id_is_unchanged_copy() {
        let t = tree();
        assert_eq!(replace_by_id(&t, "missing", el("x")), t);
    }

    #[test]
    fn test_replace_root_requires_clause() {
        let t = tree();
        assert_eq!(replace_by_id(&t, "root", el("x")), t);
        let other = LogicalClause::or("root2", vec![el("z")]);
        assert_eq!(replace_by_id(&t, "root", other.clone().into()), other);
    }

    #[test]
    fn test_resolve_operator_prefers_pending_override() {
        let mut t = tree();
        assert_eq!(resolve_operator(&t, 0, 1), LogicalOperator::And);
        t.sibling_overrides.0.push(SiblingOverride {
            from_index: 0,
            to_index: 1,
            operator: LogicalOperator::Or,
        });
        assert_eq!(resolve_operator(&t, 0, 1), LogicalOperator::Or);
        assert_eq!(resolve_operator(&t, 1, 2), LogicalOperator::And);
    }

    #[test]
    fn test_depth_and_counts() {
        let t = tree();
        assert_eq!(depth(&t), 2);
        assert_eq!(element_count(&t), 4);
        assert_eq!(node_ids(&t), vec!["root", "a", "inner", "b", "c", "d"]);
        assert_eq!(depth(&LogicalClause::and("empty", vec![])), 1);
    }
}
