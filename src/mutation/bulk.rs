//! Chunked, non-atomic loaders.
//!
//! Each chunk is its own engine transaction. When chunk `k` fails, chunks
//! before it stay committed and the error is returned as is; there is no
//! retry and no rollback.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{MutationOp, MutationScript, MutationSummary};
use crate::db::Database;
use crate::error::{Result, SombraError};

/// Edge between two existing nodes for [`Database::bulk_load_edges`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeLoad {
    /// Source node ID.
    pub src: u64,
    /// Destination node ID.
    pub dst: u64,
    /// Edge type name.
    pub ty: String,
    /// Edge properties.
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Database {
    /// Creates nodes carrying `label` in chunks of `chunk_size`, defaulting to
    /// the configured node chunk size. Returns the created ids in input order.
    pub fn bulk_load_nodes<I>(
        &self,
        label: &str,
        nodes: I,
        chunk_size: Option<usize>,
    ) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        let chunk_size = positive_chunk(chunk_size.unwrap_or(self.options().node_chunk_size))?;
        if label.trim().is_empty() {
            return Err(SombraError::invalid("label must be a non-empty string"));
        }
        let labels = vec![label.to_owned()];
        if let Some(schema) = self.schema() {
            schema.require_label(label)?;
        }
        let ops = nodes
            .into_iter()
            .map(|props| -> Result<MutationOp> {
                let op = MutationOp::CreateNode {
                    labels: labels.clone(),
                    props,
                };
                self.validate_op(&op)?;
                Ok(op)
            })
            .collect::<Result<Vec<_>>>()?;
        let summary = self.submit_chunks(ops, chunk_size, "nodes")?;
        Ok(summary.created_nodes)
    }

    /// Creates edges in chunks of `chunk_size`, defaulting to the configured
    /// edge chunk size. Returns the created ids in input order.
    pub fn bulk_load_edges<I>(&self, edges: I, chunk_size: Option<usize>) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = EdgeLoad>,
    {
        let chunk_size = positive_chunk(chunk_size.unwrap_or(self.options().edge_chunk_size))?;
        let ops = edges
            .into_iter()
            .map(|edge| -> Result<MutationOp> {
                if edge.ty.trim().is_empty() {
                    return Err(SombraError::invalid("edge type must be a non-empty string"));
                }
                if let Some(schema) = self.schema() {
                    schema.require_edge_type(&edge.ty)?;
                }
                let op = MutationOp::CreateEdge {
                    src: edge.src,
                    dst: edge.dst,
                    ty: edge.ty,
                    props: edge.props,
                };
                self.validate_op(&op)?;
                Ok(op)
            })
            .collect::<Result<Vec<_>>>()?;
        let summary = self.submit_chunks(ops, chunk_size, "edges")?;
        Ok(summary.created_edges)
    }

    /// Applies `ops` in independent chunks and merges the summaries.
    pub fn mutate_batched(
        &self,
        ops: Vec<MutationOp>,
        batch_size: Option<usize>,
    ) -> Result<MutationSummary> {
        let batch_size =
            positive_chunk(batch_size.unwrap_or(self.options().mutation_batch_size))?;
        for op in &ops {
            self.validate_op(op)?;
        }
        self.submit_chunks(ops, batch_size, "ops")
    }

    fn submit_chunks(
        &self,
        ops: Vec<MutationOp>,
        chunk_size: usize,
        kind: &'static str,
    ) -> Result<MutationSummary> {
        let engine = self.engine()?;
        let mut total = MutationSummary::default();
        let mut pending = ops.into_iter().peekable();
        let mut chunk = 0usize;
        while pending.peek().is_some() {
            let script = MutationScript {
                ops: pending.by_ref().take(chunk_size).collect(),
            };
            let len = script.ops.len();
            match engine.apply_mutation(&script) {
                Ok(summary) => {
                    debug!(kind, chunk, ops = len, "client.bulk.chunk_committed");
                    total.merge(summary);
                }
                Err(err) => {
                    warn!(
                        kind,
                        committed_chunks = chunk,
                        committed_nodes = total.created_nodes.len(),
                        committed_edges = total.created_edges.len(),
                        %err,
                        "client.bulk.chunk_failed"
                    );
                    return Err(err);
                }
            }
            chunk += 1;
        }
        Ok(total)
    }
}

fn positive_chunk(size: usize) -> Result<usize> {
    if size == 0 {
        return Err(SombraError::invalid("chunk_size must be a positive integer"));
    }
    Ok(size)
}
