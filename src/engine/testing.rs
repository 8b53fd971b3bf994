use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{
    BfsOptions, BfsVisit, Engine, Neighbor, NeighborOptions, Row, RowCursor, RowEnvelope,
};
use crate::error::{wrap_error, Result};
use crate::mutation::{CreateScript, CreateSummary, MutationOp, MutationScript, MutationSummary};
use crate::query::ast::{ExplainSpec, QuerySpec};

/// In-memory engine that records requests and hands out sequential ids.
#[derive(Default)]
pub(crate) struct RecordingEngine {
    pub queries: Mutex<Vec<QuerySpec>>,
    pub explains: Mutex<Vec<ExplainSpec>>,
    pub mutations: Mutex<Vec<MutationScript>>,
    pub creates: Mutex<Vec<CreateScript>>,
    pub rows: Mutex<Vec<Row>>,
    pub failures: Mutex<VecDeque<String>>,
    pub reads: Mutex<Vec<String>>,
    pragmas: Mutex<HashMap<String, Value>>,
    next_id: Mutex<u64>,
}

impl RecordingEngine {
    pub fn calls(&self) -> usize {
        self.queries.lock().len()
            + self.explains.lock().len()
            + self.mutations.lock().len()
            + self.creates.lock().len()
            + self.reads.lock().len()
    }

    fn read(&self, call: String) -> Result<()> {
        self.reads.lock().push(call);
        self.fail_next()
    }

    fn fail_next(&self) -> Result<()> {
        match self.failures.lock().pop_front() {
            Some(raw) => Err(wrap_error(raw)),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        let mut next = self.next_id.lock();
        *next += 1;
        *next
    }
}

struct VecCursor(std::vec::IntoIter<Row>);

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.0.next())
    }
}

impl Engine for RecordingEngine {
    fn execute_query(&self, spec: &QuerySpec) -> Result<RowEnvelope> {
        self.queries.lock().push(spec.clone());
        self.fail_next()?;
        Ok(RowEnvelope {
            rows: self.rows.lock().clone(),
            ..RowEnvelope::default()
        })
    }

    fn explain_query(&self, spec: &ExplainSpec) -> Result<RowEnvelope> {
        self.explains.lock().push(spec.clone());
        self.fail_next()?;
        Ok(RowEnvelope {
            plan: Some(serde_json::json!({"op": "Scan"})),
            plan_hash: Some("0xfeed".into()),
            ..RowEnvelope::default()
        })
    }

    fn stream_query(&self, spec: &QuerySpec) -> Result<Box<dyn RowCursor + '_>> {
        self.queries.lock().push(spec.clone());
        self.fail_next()?;
        Ok(Box::new(VecCursor(self.rows.lock().clone().into_iter())))
    }

    fn apply_mutation(&self, script: &MutationScript) -> Result<MutationSummary> {
        self.mutations.lock().push(script.clone());
        self.fail_next()?;
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
        self.creates.lock().push(script.clone());
        self.fail_next()?;
        let mut summary = CreateSummary::default();
        for node in &script.nodes {
            let id = self.next_id();
            summary.nodes.push(id);
            if let Some(alias) = &node.alias {
                summary.aliases.insert(alias.clone(), id);
            }
        }
        for _ in &script.edges {
            summary.edges.push(self.next_id());
        }
        Ok(summary)
    }

    fn cancel(&self, _request_id: &str) -> Result<bool> {
        Ok(true)
    }

    fn pragma_get(&self, name: &str) -> Result<Value> {
        Ok(self.pragmas.lock().get(name).cloned().unwrap_or(Value::Null))
    }

    fn pragma_set(&self, name: &str, value: Value) -> Result<Value> {
        self.pragmas.lock().insert(name.to_owned(), value.clone());
        Ok(value)
    }

    fn intern(&self, name: &str) -> Result<u32> {
        self.read(format!("intern:{name}"))?;
        Ok(name.len() as u32)
    }

    fn neighbors(&self, node_id: u64, _opts: &NeighborOptions) -> Result<Vec<Neighbor>> {
        self.read(format!("neighbors:{node_id}"))?;
        Ok(vec![Neighbor {
            node_id: node_id + 1,
            edge_id: self.next_id(),
            type_id: 1,
        }])
    }

    fn bfs_traversal(
        &self,
        start: u64,
        max_depth: u32,
        _opts: &BfsOptions,
    ) -> Result<Vec<BfsVisit>> {
        self.read(format!("bfs:{start}:{max_depth}"))?;
        Ok((0..=max_depth)
            .map(|depth| BfsVisit {
                node_id: start + u64::from(depth),
                depth,
            })
            .collect())
    }

    fn get_node(&self, node_id: u64) -> Result<Option<Row>> {
        self.read(format!("get_node:{node_id}"))?;
        if node_id == 0 {
            return Ok(None);
        }
        let mut row = Row::new();
        row.insert("id".into(), json!(node_id));
        Ok(Some(row))
    }

    fn get_edge(&self, edge_id: u64) -> Result<Option<Row>> {
        self.read(format!("get_edge:{edge_id}"))?;
        Ok(None)
    }

    fn count_nodes_with_label(&self, label: &str) -> Result<u64> {
        self.read(format!("count_nodes:{label}"))?;
        Ok(0)
    }

    fn count_edges_with_type(&self, edge_type: &str) -> Result<u64> {
        self.read(format!("count_edges:{edge_type}"))?;
        Ok(0)
    }

    fn list_nodes_with_label(&self, label: &str) -> Result<Vec<u64>> {
        self.read(format!("list_nodes:{label}"))?;
        Ok(Vec::new())
    }
}
