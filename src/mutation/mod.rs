//! Mutation scripts, create scripts, and the builders that assemble them.
//!
//! Two submission paths exist. [`MutationScript`] is an ordered op list the
//! engine applies atomically. [`CreateScript`] describes a graph fragment
//! whose edges may point at nodes created in the same script. Bulk loaders
//! split large inputs into independent chunks and are not atomic.

mod batch;
mod bulk;
mod create;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::schema::GraphSchema;

pub use batch::MutationBatch;
pub use bulk::EdgeLoad;
pub use create::{
    CreateBuilder, CreateEdgeSpec, CreateNodeSpec, CreateRefSpec, CreateScript, CreateSummary,
    NodeHandle, NodeRef,
};

/// Single mutation operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MutationOp {
    /// Create a new node with labels and properties.
    CreateNode {
        /// Node labels.
        labels: Vec<String>,
        /// Node properties.
        #[serde(default)]
        props: Map<String, Value>,
    },
    /// Update an existing node's properties.
    UpdateNode {
        /// Node ID to update.
        id: u64,
        /// Properties to set or update.
        #[serde(default)]
        set: Map<String, Value>,
        /// Property names to remove.
        #[serde(default)]
        unset: Vec<String>,
    },
    /// Delete an existing node.
    DeleteNode {
        /// Node ID to delete.
        id: u64,
        /// If true, cascade delete connected edges.
        #[serde(default)]
        cascade: bool,
    },
    /// Create a new edge between two existing nodes.
    CreateEdge {
        /// Source node ID.
        src: u64,
        /// Destination node ID.
        dst: u64,
        /// Edge type name.
        ty: String,
        /// Edge properties.
        #[serde(default)]
        props: Map<String, Value>,
    },
    /// Update an existing edge's properties.
    UpdateEdge {
        /// Edge ID to update.
        id: u64,
        /// Properties to set or update.
        #[serde(default)]
        set: Map<String, Value>,
        /// Property names to remove.
        #[serde(default)]
        unset: Vec<String>,
    },
    /// Delete an existing edge.
    DeleteEdge {
        /// Edge ID to delete.
        id: u64,
    },
}

impl MutationOp {
    /// Checks creation props against `schema`.
    pub(crate) fn validate(&self, schema: &GraphSchema) -> Result<()> {
        match self {
            MutationOp::CreateNode { labels, props } => schema.check_node_props(labels, props),
            MutationOp::CreateEdge { ty, props, .. } => schema.check_edge_props(ty, props),
            _ => Ok(()),
        }
    }
}

/// Ordered list of operations applied in one engine transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationScript {
    /// Operations in submission order.
    pub ops: Vec<MutationOp>,
}

/// Summary of applied mutations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MutationSummary {
    /// IDs of created nodes.
    pub created_nodes: Vec<u64>,
    /// IDs of created edges.
    pub created_edges: Vec<u64>,
    /// Number of updated nodes.
    pub updated_nodes: u64,
    /// Number of updated edges.
    pub updated_edges: u64,
    /// Number of deleted nodes.
    pub deleted_nodes: u64,
    /// Number of deleted edges.
    pub deleted_edges: u64,
}

impl MutationSummary {
    /// Folds `other` into `self`. Id lists concatenate, counters add.
    pub fn merge(&mut self, other: MutationSummary) {
        self.created_nodes.extend(other.created_nodes);
        self.created_edges.extend(other.created_edges);
        self.updated_nodes += other.updated_nodes;
        self.updated_edges += other.updated_edges;
        self.deleted_nodes += other.deleted_nodes;
        self.deleted_edges += other.deleted_edges;
    }
}
