//! Client handle tying an engine, an optional schema, and the builders
//! together.
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{
    ClientConfig, DEFAULT_EDGE_CHUNK_SIZE, DEFAULT_MUTATION_BATCH_SIZE, DEFAULT_NODE_CHUNK_SIZE,
};
use crate::engine::Engine;
use crate::error::{Result, SombraError};
use crate::mutation::{
    CreateBuilder, MutationBatch, MutationOp, MutationScript, MutationSummary,
};
use crate::query::builder::normalize_request_id;
use crate::query::QueryBuilder;
use crate::schema::GraphSchema;

mod graph;

/// Options applied when opening a [`Database`].
#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseOptions {
    /// Runtime schema used for build-time validation.
    pub schema: Option<GraphSchema>,
    /// Default chunk size for node bulk loads.
    pub node_chunk_size: usize,
    /// Default chunk size for edge bulk loads.
    pub edge_chunk_size: usize,
    /// Default chunk size for batched mutations.
    pub mutation_batch_size: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            schema: None,
            node_chunk_size: DEFAULT_NODE_CHUNK_SIZE,
            edge_chunk_size: DEFAULT_EDGE_CHUNK_SIZE,
            mutation_batch_size: DEFAULT_MUTATION_BATCH_SIZE,
        }
    }
}

impl DatabaseOptions {
    /// Options derived from a loaded [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            schema: config.schema().cloned(),
            node_chunk_size: config.node_chunk_size(),
            edge_chunk_size: config.edge_chunk_size(),
            mutation_batch_size: config.mutation_batch_size(),
        }
    }
}

/// Handle to a graph engine.
///
/// All builders borrow the handle. After [`Database::close`] every operation
/// fails with a `CLOSED` error before the engine is consulted.
pub struct Database {
    engine: Box<dyn Engine>,
    options: DatabaseOptions,
    closed: AtomicBool,
}

impl Database {
    /// Wraps `engine` with default options and no schema.
    pub fn new(engine: impl Engine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            options: DatabaseOptions::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Wraps `engine` with explicit options. The schema, if any, is validated.
    pub fn open(engine: impl Engine + 'static, options: DatabaseOptions) -> Result<Self> {
        if let Some(schema) = &options.schema {
            schema.validate()?;
        }
        for (name, size) in [
            ("node_chunk_size", options.node_chunk_size),
            ("edge_chunk_size", options.edge_chunk_size),
            ("mutation_batch_size", options.mutation_batch_size),
        ] {
            if size == 0 {
                return Err(SombraError::invalid(format!(
                    "{name} must be a positive integer"
                )));
            }
        }
        Ok(Self {
            engine: Box::new(engine),
            options,
            closed: AtomicBool::new(false),
        })
    }

    /// Replaces or clears the runtime schema.
    pub fn with_schema(&mut self, schema: Option<GraphSchema>) -> Result<&mut Self> {
        if let Some(schema) = &schema {
            schema.validate()?;
        }
        self.options.schema = schema;
        Ok(self)
    }

    /// Active runtime schema.
    pub fn schema(&self) -> Option<&GraphSchema> {
        self.options.schema.as_ref()
    }

    /// Options the handle was opened with.
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// True once [`Database::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the engine. Subsequent calls are no-ops.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("client.db.closed");
        self.engine.close()
    }

    pub(crate) fn engine(&self) -> Result<&dyn Engine> {
        if self.is_closed() {
            return Err(SombraError::closed());
        }
        Ok(self.engine.as_ref())
    }

    /// Starts a query.
    pub fn query(&self) -> Result<QueryBuilder<'_>> {
        self.engine()?;
        Ok(QueryBuilder::new(self))
    }

    /// Starts a create script.
    pub fn create(&self) -> Result<CreateBuilder<'_>> {
        self.engine()?;
        Ok(CreateBuilder::new(self))
    }

    /// Starts an empty mutation batch.
    pub fn batch(&self) -> Result<MutationBatch<'_>> {
        self.engine()?;
        Ok(MutationBatch::new(self))
    }

    /// Applies `ops` atomically, in order.
    pub fn mutate(&self, ops: Vec<MutationOp>) -> Result<MutationSummary> {
        let engine = self.engine()?;
        for op in &ops {
            self.validate_op(op)?;
        }
        debug!(ops = ops.len(), "client.mutation.apply");
        engine.apply_mutation(&MutationScript { ops })
    }

    /// Runs `body` against a fresh batch and commits it atomically.
    ///
    /// Nothing is sent when `body` fails. An empty batch commits without an
    /// engine call.
    pub fn transaction<T, F>(&self, body: F) -> Result<(T, MutationSummary)>
    where
        F: FnOnce(&mut MutationBatch<'_>) -> Result<T>,
    {
        let mut batch = self.batch()?;
        let value = body(&mut batch)?;
        let summary = if batch.is_empty() {
            batch.drain()?;
            MutationSummary::default()
        } else {
            batch.commit()?
        };
        Ok((value, summary))
    }

    /// Commits a batch built elsewhere.
    pub fn apply_batch(&self, batch: &mut MutationBatch<'_>) -> Result<MutationSummary> {
        let ops = batch.drain()?;
        self.mutate(ops)
    }

    /// Creates one node and returns its id.
    pub fn create_node<L, S>(&self, labels: L, props: Map<String, Value>) -> Result<Option<u64>>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = self.batch()?;
        batch.create_node(labels, props)?;
        Ok(batch.commit()?.created_nodes.first().copied())
    }

    /// Updates node properties. Returns the number of nodes updated.
    pub fn update_node(
        &self,
        id: u64,
        set: Map<String, Value>,
        unset: Vec<String>,
    ) -> Result<u64> {
        Ok(self
            .mutate(vec![MutationOp::UpdateNode { id, set, unset }])?
            .updated_nodes)
    }

    /// Deletes a node. Returns the number of nodes deleted.
    pub fn delete_node(&self, id: u64, cascade: bool) -> Result<u64> {
        Ok(self
            .mutate(vec![MutationOp::DeleteNode { id, cascade }])?
            .deleted_nodes)
    }

    /// Creates one edge and returns its id.
    pub fn create_edge(
        &self,
        src: u64,
        dst: u64,
        ty: impl Into<String>,
        props: Map<String, Value>,
    ) -> Result<Option<u64>> {
        let mut batch = self.batch()?;
        batch.create_edge(src, dst, ty, props)?;
        Ok(batch.commit()?.created_edges.first().copied())
    }

    /// Updates edge properties. Returns the number of edges updated.
    pub fn update_edge(
        &self,
        id: u64,
        set: Map<String, Value>,
        unset: Vec<String>,
    ) -> Result<u64> {
        Ok(self
            .mutate(vec![MutationOp::UpdateEdge { id, set, unset }])?
            .updated_edges)
    }

    /// Deletes an edge. Returns the number of edges deleted.
    pub fn delete_edge(&self, id: u64) -> Result<u64> {
        Ok(self
            .mutate(vec![MutationOp::DeleteEdge { id }])?
            .deleted_edges)
    }

    /// Asks the engine to cancel the request tagged `request_id`.
    pub fn cancel_request(&self, request_id: &str) -> Result<bool> {
        let request_id = normalize_request_id(request_id)?;
        let engine = self.engine()?;
        let cancelled = engine.cancel(&request_id)?;
        info!(request_id = %request_id, cancelled, "client.query.cancel");
        Ok(cancelled)
    }

    /// Reads an engine option.
    pub fn pragma(&self, name: &str) -> Result<Value> {
        let name = pragma_name(name)?;
        self.engine()?.pragma_get(name)
    }

    /// Writes an engine option and returns the effective value.
    pub fn pragma_set(&self, name: &str, value: Value) -> Result<Value> {
        let name = pragma_name(name)?;
        let engine = self.engine()?;
        debug!(pragma = name, "client.pragma.set");
        engine.pragma_set(name, value)
    }

    pub(crate) fn validate_op(&self, op: &MutationOp) -> Result<()> {
        match self.schema() {
            Some(schema) => op.validate(schema),
            None => Ok(()),
        }
    }
}

fn pragma_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SombraError::invalid("pragma name must be a non-empty string"));
    }
    Ok(trimmed)
}
