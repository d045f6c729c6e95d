//! Node location tracking inside a measure's logic trees

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node inside a measure document
///
/// A location names the population whose criteria tree contains the node and
/// the chain of node ids walked from that tree's root down to the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLocation {
    /// Owning population id, if the node lives under a population
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_id: Option<String>,
    /// Node ids from the criteria root to the node (inclusive)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl NodeLocation {
    /// Location of a whole population
    pub fn population(population_id: impl Into<String>) -> Self {
        Self {
            population_id: Some(population_id.into()),
            path: Vec::new(),
        }
    }

    /// Location of a node outside of any population (e.g. a value set)
    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            population_id: None,
            path: vec![node_id.into()],
        }
    }

    /// Location built from an explicit path
    pub fn at_path(population_id: Option<&str>, path: &[String]) -> Self {
        Self {
            population_id: population_id.map(str::to_string),
            path: path.to_vec(),
        }
    }

    /// Extend the location by one child node
    pub fn child(&self, node_id: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.path.push(node_id.into());
        next
    }

    /// Id of the node this location points at
    pub fn node_id(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// Nesting depth of the node (0 for a population itself)
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl fmt::Display for NodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.population_id {
            Some(population) => write!(f, "population '{}'", population)?,
            None => write!(f, "measure")?,
        }
        if !self.path.is_empty() {
            write!(f, " at {}", self.path.join(" > "))?;
        }
        Ok(())
    }
}
