//! Option and record shapes for direct graph reads.
use serde::{Deserialize, Serialize};

use crate::query::ast::EdgeDirection;

/// Settings for a one-hop neighbor expansion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborOptions {
    /// Which adjacency lists to follow.
    #[serde(default)]
    pub direction: EdgeDirection,
    /// Restrict to one edge type.
    #[serde(default, alias = "edgeType", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    /// Report each neighbor node once.
    #[serde(default = "distinct_default")]
    pub distinct: bool,
}

impl Default for NeighborOptions {
    fn default() -> Self {
        Self {
            direction: EdgeDirection::Out,
            edge_type: None,
            distinct: true,
        }
    }
}

impl NeighborOptions {
    /// Sets the direction.
    pub fn direction(mut self, direction: EdgeDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Restricts the expansion to `edge_type`.
    pub fn edge_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = Some(edge_type.into());
        self
    }

    /// Keeps duplicate neighbors reached through parallel edges.
    pub fn with_duplicates(mut self) -> Self {
        self.distinct = false;
        self
    }
}

fn distinct_default() -> bool {
    true
}

/// Settings for a breadth-first traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfsOptions {
    /// Which adjacency lists to follow.
    #[serde(default)]
    pub direction: EdgeDirection,
    /// Edge types to follow. `None` follows every type.
    #[serde(default, alias = "edgeTypes", skip_serializing_if = "Option::is_none")]
    pub edge_types: Option<Vec<String>>,
    /// Stop after this many visits.
    #[serde(default, alias = "maxResults", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

/// Neighbor reached through one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Neighbor {
    /// Neighbor node id.
    #[serde(alias = "nodeId")]
    pub node_id: u64,
    /// Edge that was followed.
    #[serde(alias = "edgeId")]
    pub edge_id: u64,
    /// Interned edge type id.
    #[serde(alias = "typeId")]
    pub type_id: u32,
}

/// Node visited by a breadth-first traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BfsVisit {
    /// Visited node id.
    #[serde(alias = "nodeId")]
    pub node_id: u64,
    /// Hops from the start node.
    pub depth: u32,
}
