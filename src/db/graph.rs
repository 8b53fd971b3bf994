//! Direct graph reads that skip the query planner.
use tracing::debug;

use super::Database;
use crate::engine::{BfsOptions, BfsVisit, Neighbor, NeighborOptions, Row};
use crate::error::{Result, SombraError};

impl Database {
    /// Returns the dictionary id for a label or edge type.
    pub fn intern(&self, name: &str) -> Result<u32> {
        let name = non_blank("name", name)?;
        self.engine()?.intern(name)
    }

    /// Lists nodes one hop from `node_id`.
    pub fn neighbors(&self, node_id: u64, opts: &NeighborOptions) -> Result<Vec<Neighbor>> {
        if let Some(edge_type) = &opts.edge_type {
            non_blank("edge_type", edge_type)?;
        }
        let engine = self.engine()?;
        debug!(
            node_id,
            direction = opts.direction.as_str(),
            distinct = opts.distinct,
            "client.graph.neighbors"
        );
        engine.neighbors(node_id, opts)
    }

    /// Walks breadth-first from `start`, reporting each node with its depth.
    ///
    /// A `max_depth` of zero visits only the start node.
    pub fn bfs_traversal(
        &self,
        start: u64,
        max_depth: u32,
        opts: &BfsOptions,
    ) -> Result<Vec<BfsVisit>> {
        if let Some(types) = &opts.edge_types {
            for ty in types {
                non_blank("edge_types entry", ty)?;
            }
        }
        if opts.max_results == Some(0) {
            return Err(SombraError::invalid("max_results must be a positive integer"));
        }
        let engine = self.engine()?;
        debug!(start, max_depth, "client.graph.bfs");
        engine.bfs_traversal(start, max_depth, opts)
    }

    /// Reads one node record.
    pub fn get_node_record(&self, node_id: u64) -> Result<Option<Row>> {
        self.engine()?.get_node(node_id)
    }

    /// Reads one edge record.
    pub fn get_edge_record(&self, edge_id: u64) -> Result<Option<Row>> {
        self.engine()?.get_edge(edge_id)
    }

    /// Counts nodes carrying `label`.
    pub fn count_nodes_with_label(&self, label: &str) -> Result<u64> {
        let label = non_blank("label", label)?;
        self.engine()?.count_nodes_with_label(label)
    }

    /// Counts edges of `edge_type`.
    pub fn count_edges_with_type(&self, edge_type: &str) -> Result<u64> {
        let edge_type = non_blank("edge_type", edge_type)?;
        self.engine()?.count_edges_with_type(edge_type)
    }

    /// Lists ids of nodes carrying `label`.
    pub fn list_nodes_with_label(&self, label: &str) -> Result<Vec<u64>> {
        let label = non_blank("label", label)?;
        self.engine()?.list_nodes_with_label(label)
    }
}

fn non_blank<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SombraError::invalid(format!(
            "{what} must be a non-empty string"
        )));
    }
    Ok(trimmed)
}
