use serde_json::{Map, Value};

use super::{MutationOp, MutationSummary};
use crate::db::Database;
use crate::error::{Result, SombraError};

/// Ordered operation queue committed as one engine transaction.
///
/// Ops are validated as they are queued. [`MutationBatch::commit`] and
/// [`MutationBatch::drain`] seal the batch; later calls fail without reaching
/// the engine.
pub struct MutationBatch<'db> {
    db: &'db Database,
    ops: Vec<MutationOp>,
    sealed: bool,
}

impl<'db> MutationBatch<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            ops: Vec::new(),
            sealed: false,
        }
    }

    /// Queues an arbitrary op.
    pub fn queue(&mut self, op: MutationOp) -> Result<&mut Self> {
        self.ensure_open()?;
        if let Some(schema) = self.db.schema() {
            op.validate(schema)?;
        }
        self.ops.push(op);
        Ok(self)
    }

    /// Queues a node creation.
    pub fn create_node<L, S>(&mut self, labels: L, props: Map<String, Value>) -> Result<&mut Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(SombraError::invalid("createNode requires at least one label"));
        }
        self.queue(MutationOp::CreateNode { labels, props })
    }

    /// Queues a node property update.
    pub fn update_node(
        &mut self,
        id: u64,
        set: Map<String, Value>,
        unset: Vec<String>,
    ) -> Result<&mut Self> {
        self.queue(MutationOp::UpdateNode { id, set, unset })
    }

    /// Queues a node deletion.
    pub fn delete_node(&mut self, id: u64, cascade: bool) -> Result<&mut Self> {
        self.queue(MutationOp::DeleteNode { id, cascade })
    }

    /// Queues an edge creation between existing nodes.
    pub fn create_edge(
        &mut self,
        src: u64,
        dst: u64,
        ty: impl Into<String>,
        props: Map<String, Value>,
    ) -> Result<&mut Self> {
        let ty = ty.into();
        if ty.trim().is_empty() {
            return Err(SombraError::invalid("edge type must be a non-empty string"));
        }
        self.queue(MutationOp::CreateEdge {
            src,
            dst,
            ty,
            props,
        })
    }

    /// Queues an edge property update.
    pub fn update_edge(
        &mut self,
        id: u64,
        set: Map<String, Value>,
        unset: Vec<String>,
    ) -> Result<&mut Self> {
        self.queue(MutationOp::UpdateEdge { id, set, unset })
    }

    /// Queues an edge deletion.
    pub fn delete_edge(&mut self, id: u64) -> Result<&mut Self> {
        self.queue(MutationOp::DeleteEdge { id })
    }

    /// Number of queued ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Seals the batch and hands back the queued ops.
    pub fn drain(&mut self) -> Result<Vec<MutationOp>> {
        self.ensure_open()?;
        self.sealed = true;
        Ok(std::mem::take(&mut self.ops))
    }

    /// Seals the batch and applies it atomically.
    pub fn commit(&mut self) -> Result<MutationSummary> {
        self.ensure_open()?;
        self.db.engine()?;
        let ops = self.drain()?;
        self.db.mutate(ops)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            return Err(SombraError::invalid("transaction already committed"));
        }
        Ok(())
    }
}
