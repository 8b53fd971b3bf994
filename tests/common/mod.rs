#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use sombra_client::query::ExplainSpec;
use sombra_client::{
    wrap_error, BfsOptions, BfsVisit, CreateScript, CreateSummary, Engine, MutationOp,
    MutationScript, MutationSummary, Neighbor, NeighborOptions, QuerySpec, Result, Row,
    RowCursor, RowEnvelope,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

pub fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Every request the engine saw, in arrival order.
#[derive(Clone, Debug)]
pub enum Request {
    Execute(QuerySpec),
    Explain(ExplainSpec),
    Stream(QuerySpec),
    Mutation(MutationScript),
    Create(CreateScript),
    Cancel(String),
    Intern(String),
    Neighbors(u64, NeighborOptions),
    Bfs(u64, u32, BfsOptions),
    GetNode(u64),
    GetEdge(u64),
    CountNodes(String),
    CountEdges(String),
    ListNodes(String),
}

/// Engine double that records requests and replays canned answers.
#[derive(Default)]
pub struct ScriptedEngine {
    requests: Mutex<Vec<Request>>,
    envelopes: Mutex<VecDeque<RowEnvelope>>,
    failures: Mutex<HashMap<usize, String>>,
    stream_rows: Mutex<Vec<Row>>,
    stream_error: Mutex<Option<String>>,
    stream_closes: Arc<AtomicUsize>,
    next_id: Mutex<u64>,
    dictionary: Mutex<HashMap<String, u32>>,
    nodes: Mutex<HashMap<u64, (String, Row)>>,
    edges: Mutex<HashMap<u64, (String, Row)>>,
    adjacency: Mutex<Vec<Neighbor>>,
    visits: Mutex<Vec<BfsVisit>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }

    /// Queues the envelope returned by the next execute or explain call.
    pub fn push_envelope(&self, envelope: RowEnvelope) {
        self.envelopes.lock().push_back(envelope);
    }

    /// Makes the `index`-th request (zero based) fail with `raw`.
    pub fn fail_call(&self, index: usize, raw: &str) {
        self.failures.lock().insert(index, raw.to_owned());
    }

    pub fn set_stream_rows(&self, rows: Vec<Row>) {
        *self.stream_rows.lock() = rows;
    }

    /// Error yielded by the cursor after its rows run out.
    pub fn set_stream_error(&self, raw: &str) {
        *self.stream_error.lock() = Some(raw.to_owned());
    }

    /// Stores a node record under `label`.
    pub fn add_node(&self, id: u64, label: &str, record: Value) {
        self.nodes
            .lock()
            .insert(id, (label.to_owned(), props(record)));
    }

    /// Stores an edge record of type `ty`.
    pub fn add_edge(&self, id: u64, ty: &str, record: Value) {
        self.edges.lock().insert(id, (ty.to_owned(), props(record)));
    }

    /// Neighbors returned by every neighbor lookup.
    pub fn set_adjacency(&self, neighbors: Vec<Neighbor>) {
        *self.adjacency.lock() = neighbors;
    }

    /// Visits returned by every traversal, cut to the requested depth.
    pub fn set_visits(&self, visits: Vec<BfsVisit>) {
        *self.visits.lock() = visits;
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn mutation_sizes(&self) -> Vec<usize> {
        self.requests
            .lock()
            .iter()
            .filter_map(|req| match req {
                Request::Mutation(script) => Some(script.ops.len()),
                _ => None,
            })
            .collect()
    }

    pub fn stream_closes(&self) -> usize {
        self.stream_closes.load(Ordering::SeqCst)
    }

    fn record(&self, request: Request) -> Result<()> {
        let mut requests = self.requests.lock();
        let index = requests.len();
        requests.push(request);
        match self.failures.lock().remove(&index) {
            Some(raw) => Err(wrap_error(raw)),
            None => Ok(()),
        }
    }

    fn next_envelope(&self) -> RowEnvelope {
        self.envelopes.lock().pop_front().unwrap_or_default()
    }

    fn next_id(&self) -> u64 {
        let mut next = self.next_id.lock();
        *next += 1;
        *next
    }
}

struct ScriptedCursor {
    rows: VecDeque<Row>,
    error: Option<String>,
    closes: Arc<AtomicUsize>,
}

impl RowCursor for ScriptedCursor {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if let Some(row) = self.rows.pop_front() {
            return Ok(Some(row));
        }
        match self.error.take() {
            Some(raw) => Err(wrap_error(raw)),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Engine for ScriptedEngine {
    fn execute_query(&self, spec: &QuerySpec) -> Result<RowEnvelope> {
        self.record(Request::Execute(spec.clone()))?;
        Ok(self.next_envelope())
    }

    fn explain_query(&self, spec: &ExplainSpec) -> Result<RowEnvelope> {
        self.record(Request::Explain(spec.clone()))?;
        Ok(self.next_envelope())
    }

    fn stream_query(&self, spec: &QuerySpec) -> Result<Box<dyn RowCursor + '_>> {
        self.record(Request::Stream(spec.clone()))?;
        Ok(Box::new(ScriptedCursor {
            rows: self.stream_rows.lock().clone().into(),
            error: self.stream_error.lock().clone(),
            closes: Arc::clone(&self.stream_closes),
        }))
    }

    fn apply_mutation(&self, script: &MutationScript) -> Result<MutationSummary> {
        self.record(Request::Mutation(script.clone()))?;
        let mut summary = MutationSummary::default();
        for op in &script.ops {
            match op {
                MutationOp::CreateNode { .. } => summary.created_nodes.push(self.next_id()),
                MutationOp::CreateEdge { .. } => summary.created_edges.push(self.next_id()),
                MutationOp::UpdateNode { .. } => summary.updated_nodes += 1,
                MutationOp::UpdateEdge { .. } => summary.updated_edges += 1,
                MutationOp::DeleteNode { .. } => summary.deleted_nodes += 1,
                MutationOp::DeleteEdge { .. } => summary.deleted_edges += 1,
            }
        }
        Ok(summary)
    }

    fn apply_create_script(&self, script: &CreateScript) -> Result<CreateSummary> {
        self.record(Request::Create(script.clone()))?;
        let mut summary = CreateSummary::default();
        for node in &script.nodes {
            let id = self.next_id();
            summary.nodes.push(id);
            if let Some(alias) = &node.alias {
                summary.aliases.insert(alias.clone(), id);
            }
        }
        summary.edges = script.edges.iter().map(|_| self.next_id()).collect();
        Ok(summary)
    }

    fn cancel(&self, request_id: &str) -> Result<bool> {
        self.record(Request::Cancel(request_id.to_owned()))?;
        Ok(true)
    }

    fn pragma_get(&self, _name: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn pragma_set(&self, _name: &str, value: Value) -> Result<Value> {
        Ok(value)
    }

    fn intern(&self, name: &str) -> Result<u32> {
        self.record(Request::Intern(name.to_owned()))?;
        let mut dictionary = self.dictionary.lock();
        let next = dictionary.len() as u32 + 1;
        Ok(*dictionary.entry(name.to_owned()).or_insert(next))
    }

    fn neighbors(&self, node_id: u64, opts: &NeighborOptions) -> Result<Vec<Neighbor>> {
        self.record(Request::Neighbors(node_id, opts.clone()))?;
        let mut out: Vec<Neighbor> = Vec::new();
        for neighbor in self.adjacency.lock().iter() {
            if opts.distinct && out.iter().any(|seen| seen.node_id == neighbor.node_id) {
                continue;
            }
            out.push(*neighbor);
        }
        Ok(out)
    }

    fn bfs_traversal(
        &self,
        start: u64,
        max_depth: u32,
        opts: &BfsOptions,
    ) -> Result<Vec<BfsVisit>> {
        self.record(Request::Bfs(start, max_depth, opts.clone()))?;
        let visits = self.visits.lock();
        let reached = visits.iter().filter(|visit| visit.depth <= max_depth).copied();
        Ok(match opts.max_results {
            Some(limit) => reached.take(limit).collect(),
            None => reached.collect(),
        })
    }

    fn get_node(&self, node_id: u64) -> Result<Option<Row>> {
        self.record(Request::GetNode(node_id))?;
        Ok(self.nodes.lock().get(&node_id).map(|(_, row)| row.clone()))
    }

    fn get_edge(&self, edge_id: u64) -> Result<Option<Row>> {
        self.record(Request::GetEdge(edge_id))?;
        Ok(self.edges.lock().get(&edge_id).map(|(_, row)| row.clone()))
    }

    fn count_nodes_with_label(&self, label: &str) -> Result<u64> {
        self.record(Request::CountNodes(label.to_owned()))?;
        Ok(self.nodes.lock().values().filter(|(l, _)| l == label).count() as u64)
    }

    fn count_edges_with_type(&self, edge_type: &str) -> Result<u64> {
        self.record(Request::CountEdges(edge_type.to_owned()))?;
        Ok(self.edges.lock().values().filter(|(t, _)| t == edge_type).count() as u64)
    }

    fn list_nodes_with_label(&self, label: &str) -> Result<Vec<u64>> {
        self.record(Request::ListNodes(label.to_owned()))?;
        let mut ids: Vec<u64> = self
            .nodes
            .lock()
            .iter()
            .filter(|(_, (l, _))| l == label)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
