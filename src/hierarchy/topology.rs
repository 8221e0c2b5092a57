//! Declarative hierarchy tables

use serde::{Deserialize, Serialize};

use crate::errors::{EquipError, EquipResult};
use crate::query::ast::Edge;

/// Which way a traversal follows the parent edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Child to parent
    Ancestors,
    /// Parent to children
    Descendants,
}

impl Direction {
    /// The hop over `predicate` that moves in this direction
    pub fn edge(&self, predicate: &str) -> Edge {
        match self {
            Direction::Ancestors => Edge::forward(predicate),
            Direction::Descendants => Edge::reverse(predicate),
        }
    }

    pub fn flipped(&self) -> Direction {
        match self {
            Direction::Ancestors => Direction::Descendants,
            Direction::Descendants => Direction::Ancestors,
        }
    }
}

/// A fixed chain of equipment types, one per hop.
///
/// Always holds at least two non-empty levels; deserialized tables go
/// through the same check as [`Topology::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TopologyTable")]
pub struct Topology {
    name: String,
    /// Type names from the anchor outwards
    levels: Vec<String>,
    direction: Direction,
}

/// Unchecked wire form of a topology
#[derive(Debug, Deserialize)]
struct TopologyTable {
    name: String,
    levels: Vec<String>,
    direction: Direction,
}

impl TryFrom<TopologyTable> for Topology {
    type Error = EquipError;

    fn try_from(table: TopologyTable) -> EquipResult<Self> {
        Topology::new(table.name, table.levels, table.direction)
    }
}

impl Topology {
    /// Create a topology; at least two non-empty levels are required.
    pub fn new<I, S>(name: impl Into<String>, levels: I, direction: Direction) -> EquipResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let levels: Vec<String> = levels.into_iter().map(Into::into).collect();
        if levels.len() < 2 {
            return Err(EquipError::internal(
                format!("topology {}", name),
                "at least two levels are required",
            ));
        }
        if levels.iter().any(|l| l.trim().is_empty()) {
            return Err(EquipError::internal(
                format!("topology {}", name),
                "level type names cannot be empty",
            ));
        }
        Ok(Self {
            name,
            levels,
            direction,
        })
    }

    /// Virtualization host down to soft partitions
    pub fn virtualization() -> Self {
        Self {
            name: "virtualization".to_string(),
            levels: ["vcenter", "cluster", "server", "softpartition"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            direction: Direction::Descendants,
        }
    }

    /// Same chain walked from the other end
    pub fn reversed(&self) -> Self {
        Self {
            name: format!("{}-reversed", self.name),
            levels: self.levels.iter().rev().cloned().collect(),
            direction: self.direction.flipped(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn anchor_type(&self) -> &str {
        self.levels.first().map_or("", String::as_str)
    }

    /// Number of hops from the anchor
    pub fn hops(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}
