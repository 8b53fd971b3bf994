//! Boundary between the client and the graph engine.
//!
//! The engine owns storage, transactions, planning, and execution. The client
//! only hands it canonical request objects and interprets what comes back.
//! Engines report failures as [`SombraError`](crate::error::SombraError),
//! usually by wrapping a `"[CODE] message"` string with
//! [`wrap_error`](crate::error::wrap_error).
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::mutation::{CreateScript, CreateSummary, MutationScript, MutationSummary};
use crate::query::ast::{ExplainSpec, QuerySpec};

mod graph;
#[cfg(test)]
pub(crate) mod testing;

pub use graph::{BfsOptions, BfsVisit, Neighbor, NeighborOptions};

/// One result row keyed by projection name.
pub type Row = Map<String, Value>;

/// Response wrapper for execute and explain calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowEnvelope {
    /// Result rows.
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Identifier echoed from the request.
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    /// Engine feature flags that shaped the answer.
    #[serde(default)]
    pub features: Option<Vec<Value>>,
    /// Physical plan, either one object or a list.
    #[serde(default)]
    pub plan: Option<Value>,
    /// Stable hash of the plan.
    #[serde(default, alias = "planHash")]
    pub plan_hash: Option<String>,
}

/// Pull-based cursor over streamed rows.
pub trait RowCursor {
    /// Returns the next row, or `None` once the result set is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Releases engine-side resources. Called at most once by the client.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Graph engine that executes client requests.
pub trait Engine: Send + Sync {
    /// Runs a query and returns every row.
    fn execute_query(&self, spec: &QuerySpec) -> Result<RowEnvelope>;

    /// Plans a query without running it.
    fn explain_query(&self, spec: &ExplainSpec) -> Result<RowEnvelope>;

    /// Opens a lazy cursor over the query's rows.
    fn stream_query(&self, spec: &QuerySpec) -> Result<Box<dyn RowCursor + '_>>;

    /// Applies an ordered list of mutations atomically.
    fn apply_mutation(&self, script: &MutationScript) -> Result<MutationSummary>;

    /// Creates a graph fragment, resolving handles and aliases atomically.
    fn apply_create_script(&self, script: &CreateScript) -> Result<CreateSummary>;

    /// Cancels an in-flight request. Returns false if nothing matched.
    fn cancel(&self, request_id: &str) -> Result<bool>;

    /// Reads an engine option.
    fn pragma_get(&self, name: &str) -> Result<Value>;

    /// Writes an engine option and returns the effective value.
    fn pragma_set(&self, name: &str, value: Value) -> Result<Value>;

    /// Returns the dictionary id for a label or edge type, allocating one if new.
    fn intern(&self, name: &str) -> Result<u32>;

    /// Lists nodes one hop from `node_id`.
    fn neighbors(&self, node_id: u64, opts: &NeighborOptions) -> Result<Vec<Neighbor>>;

    /// Walks breadth-first from `start` up to `max_depth` hops.
    fn bfs_traversal(
        &self,
        start: u64,
        max_depth: u32,
        opts: &BfsOptions,
    ) -> Result<Vec<BfsVisit>>;

    /// Reads one node record, or `None` if the id is unknown.
    fn get_node(&self, node_id: u64) -> Result<Option<Row>>;

    /// Reads one edge record, or `None` if the id is unknown.
    fn get_edge(&self, edge_id: u64) -> Result<Option<Row>>;

    /// Counts nodes carrying `label`.
    fn count_nodes_with_label(&self, label: &str) -> Result<u64>;

    /// Counts edges of `edge_type`.
    fn count_edges_with_type(&self, edge_type: &str) -> Result<u64>;

    /// Lists ids of nodes carrying `label`.
    fn list_nodes_with_label(&self, label: &str) -> Result<Vec<u64>>;

    /// Flushes and releases the engine.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn execute_query(&self, spec: &QuerySpec) -> Result<RowEnvelope> {
        (**self).execute_query(spec)
    }

    fn explain_query(&self, spec: &ExplainSpec) -> Result<RowEnvelope> {
        (**self).explain_query(spec)
    }

    fn stream_query(&self, spec: &QuerySpec) -> Result<Box<dyn RowCursor + '_>> {
        (**self).stream_query(spec)
    }

    fn apply_mutation(&self, script: &MutationScript) -> Result<MutationSummary> {
        (**self).apply_mutation(script)
    }

    fn apply_create_script(&self, script: &CreateScript) -> Result<CreateSummary> {
        (**self).apply_create_script(script)
    }

    fn cancel(&self, request_id: &str) -> Result<bool> {
        (**self).cancel(request_id)
    }

    fn pragma_get(&self, name: &str) -> Result<Value> {
        (**self).pragma_get(name)
    }

    fn pragma_set(&self, name: &str, value: Value) -> Result<Value> {
        (**self).pragma_set(name, value)
    }

    fn intern(&self, name: &str) -> Result<u32> {
        (**self).intern(name)
    }

    fn neighbors(&self, node_id: u64, opts: &NeighborOptions) -> Result<Vec<Neighbor>> {
        (**self).neighbors(node_id, opts)
    }

    fn bfs_traversal(
        &self,
        start: u64,
        max_depth: u32,
        opts: &BfsOptions,
    ) -> Result<Vec<BfsVisit>> {
        (**self).bfs_traversal(start, max_depth, opts)
    }

    fn get_node(&self, node_id: u64) -> Result<Option<Row>> {
        (**self).get_node(node_id)
    }

    fn get_edge(&self, edge_id: u64) -> Result<Option<Row>> {
        (**self).get_edge(edge_id)
    }

    fn count_nodes_with_label(&self, label: &str) -> Result<u64> {
        (**self).count_nodes_with_label(label)
    }

    fn count_edges_with_type(&self, edge_type: &str) -> Result<u64> {
        (**self).count_edges_with_type(edge_type)
    }

    fn list_nodes_with_label(&self, label: &str) -> Result<Vec<u64>> {
        (**self).list_nodes_with_label(label)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}
