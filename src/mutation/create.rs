use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::db::Database;
use crate::error::{Result, SombraError};

/// Graph fragment created atomically by the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScript {
    /// Nodes to create.
    #[serde(default)]
    pub nodes: Vec<CreateNodeSpec>,
    /// Edges to create.
    #[serde(default)]
    pub edges: Vec<CreateEdgeSpec>,
}

/// Specification for creating a node in a create script.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeSpec {
    /// Node labels.
    pub labels: Vec<String>,
    /// Node properties.
    #[serde(default)]
    pub props: Map<String, Value>,
    /// Optional alias for referencing in edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Specification for creating an edge in a create script.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEdgeSpec {
    /// Source node reference.
    pub src: CreateRefSpec,
    /// Edge type name.
    pub ty: String,
    /// Destination node reference.
    pub dst: CreateRefSpec,
    /// Edge properties.
    #[serde(default)]
    pub props: Map<String, Value>,
}

/// Encoded node reference. Resolution happens inside the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CreateRefSpec {
    /// Position of a node in the same script.
    Handle {
        /// Array index of the node.
        index: usize,
    },
    /// Alias declared by a node in the same script.
    Alias {
        /// Node alias string.
        alias: String,
    },
    /// Node that already exists.
    Id {
        /// Existing node ID.
        id: u64,
    },
}

/// Ids assigned by the engine for a create script.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSummary {
    /// IDs of created nodes, in script order.
    pub nodes: Vec<u64>,
    /// IDs of created edges, in script order.
    pub edges: Vec<u64>,
    /// Map of aliases to their node IDs.
    pub aliases: HashMap<String, u64>,
}

impl CreateSummary {
    /// Node id assigned to `alias`.
    pub fn alias(&self, alias: &str) -> Option<u64> {
        self.aliases.get(alias).copied()
    }

    /// Node id created for `handle`.
    pub fn node(&self, handle: NodeHandle) -> Option<u64> {
        self.nodes.get(handle.index()).copied()
    }
}

/// Position of a node inside the [`CreateBuilder`] that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

impl NodeHandle {
    /// Index of the node in the script.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Edge endpoint accepted by [`CreateBuilder::edge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    /// Node created by the same builder.
    Handle(NodeHandle),
    /// Node aliased in the same builder.
    Alias(String),
    /// Node that already exists.
    Existing(u64),
}

impl NodeRef {
    fn encode(self) -> Result<CreateRefSpec> {
        match self {
            NodeRef::Handle(handle) => Ok(CreateRefSpec::Handle {
                index: handle.index(),
            }),
            NodeRef::Alias(alias) if alias.trim().is_empty() => Err(SombraError::invalid(
                "alias references must be non-empty strings",
            )),
            NodeRef::Alias(alias) => Ok(CreateRefSpec::Alias { alias }),
            NodeRef::Existing(id) => Ok(CreateRefSpec::Id { id }),
        }
    }
}

impl From<NodeHandle> for NodeRef {
    fn from(handle: NodeHandle) -> Self {
        NodeRef::Handle(handle)
    }
}

impl From<&str> for NodeRef {
    fn from(alias: &str) -> Self {
        NodeRef::Alias(alias.to_owned())
    }
}

impl From<String> for NodeRef {
    fn from(alias: String) -> Self {
        NodeRef::Alias(alias)
    }
}

impl From<u64> for NodeRef {
    fn from(id: u64) -> Self {
        NodeRef::Existing(id)
    }
}

/// Accumulates nodes and edges that the engine creates in one transaction.
///
/// Single-use: after [`CreateBuilder::execute`] every further call fails.
pub struct CreateBuilder<'db> {
    db: &'db Database,
    nodes: Vec<CreateNodeSpec>,
    edges: Vec<CreateEdgeSpec>,
    used_aliases: HashSet<String>,
    sealed: bool,
}

impl<'db> CreateBuilder<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            nodes: Vec::new(),
            edges: Vec::new(),
            used_aliases: HashSet::new(),
            sealed: false,
        }
    }

    /// Adds a node and returns a handle that edges can reuse.
    pub fn node<L, S>(&mut self, labels: L, props: Map<String, Value>) -> Result<NodeHandle>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_node(collect_labels(labels), props, None)
    }

    /// Adds a node addressable by `alias` and returns its handle.
    pub fn node_with_alias<L, S>(
        &mut self,
        labels: L,
        props: Map<String, Value>,
        alias: impl Into<String>,
    ) -> Result<NodeHandle>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_node(collect_labels(labels), props, Some(alias.into()))
    }

    /// Adds an edge between two nodes identified by handles, aliases, or ids.
    pub fn edge<T>(
        &mut self,
        src: impl Into<NodeRef>,
        ty: T,
        dst: impl Into<NodeRef>,
        props: Map<String, Value>,
    ) -> Result<&mut Self>
    where
        T: Into<String>,
    {
        self.ensure_open()?;
        let ty = ty.into();
        if ty.trim().is_empty() {
            return Err(SombraError::invalid("edge type must be a non-empty string"));
        }
        if let Some(schema) = self.db.schema() {
            schema.check_edge_props(&ty, &props)?;
        }
        let src = src.into().encode()?;
        let dst = dst.into().encode()?;
        self.edges.push(CreateEdgeSpec {
            src,
            ty,
            dst,
            props,
        });
        Ok(self)
    }

    /// Script as it would be submitted.
    pub fn script(&self) -> CreateScript {
        CreateScript {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Submits the script and seals the builder.
    pub fn execute(&mut self) -> Result<CreateSummary> {
        self.ensure_open()?;
        let engine = self.db.engine()?;
        self.sealed = true;
        let script = CreateScript {
            nodes: std::mem::take(&mut self.nodes),
            edges: std::mem::take(&mut self.edges),
        };
        debug!(
            nodes = script.nodes.len(),
            edges = script.edges.len(),
            "client.create.execute"
        );
        engine.apply_create_script(&script)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            return Err(SombraError::invalid("builder already executed"));
        }
        Ok(())
    }

    fn push_node(
        &mut self,
        labels: Vec<String>,
        props: Map<String, Value>,
        alias: Option<String>,
    ) -> Result<NodeHandle> {
        self.ensure_open()?;
        if labels.is_empty() {
            return Err(SombraError::invalid("node requires at least one label"));
        }
        if labels.iter().any(|l| l.trim().is_empty()) {
            return Err(SombraError::invalid("node labels must be non-empty strings"));
        }
        if let Some(schema) = self.db.schema() {
            schema.check_node_props(&labels, &props)?;
        }
        if let Some(alias) = &alias {
            if alias.trim().is_empty() {
                return Err(SombraError::invalid("node alias must be a non-empty string"));
            }
            if !self.used_aliases.insert(alias.clone()) {
                return Err(SombraError::invalid(format!("duplicate node alias '{alias}'")));
            }
        }
        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(CreateNodeSpec {
            labels,
            props,
            alias,
        });
        Ok(handle)
    }
}

fn collect_labels<L, S>(labels: L) -> Vec<String>
where
    L: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::RecordingEngine;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn refs_encode_by_kind() -> Result<()> {
        let db = Database::new(RecordingEngine::default());
        let mut builder = db.create()?;
        let a = builder.node(["User"], Map::new())?;
        builder.node_with_alias(["User"], Map::new(), "bob")?;
        builder.edge(a, "KNOWS", "bob", Map::new())?;
        builder.edge("bob", "KNOWS", 42u64, Map::new())?;
        let script = serde_json::to_value(builder.script())?;
        assert_eq!(
            script["edges"][0]["src"],
            json!({"kind": "handle", "index": 0})
        );
        assert_eq!(script["edges"][0]["dst"], json!({"kind": "alias", "alias": "bob"}));
        assert_eq!(script["edges"][1]["dst"], json!({"kind": "id", "id": 42}));
        assert_eq!(script["nodes"][1]["alias"], json!("bob"));
        assert!(script["nodes"][0].get("alias").is_none());
        Ok(())
    }

    #[test]
    fn rejects_bad_nodes_and_edges() -> Result<()> {
        let db = Database::new(RecordingEngine::default());
        let mut builder = db.create()?;
        assert!(builder.node(Vec::<String>::new(), Map::new()).is_err());
        assert!(builder.node([""], Map::new()).is_err());
        builder.node_with_alias(["User"], Map::new(), "a")?;
        assert!(builder.node_with_alias(["User"], Map::new(), "a").is_err());
        assert!(builder.node_with_alias(["User"], Map::new(), " ").is_err());
        assert!(builder.edge("a", "", "a", Map::new()).is_err());
        assert!(builder.edge("", "KNOWS", "a", Map::new()).is_err());
        assert_eq!(builder.script().nodes.len(), 1);
        assert!(builder.script().edges.is_empty());
        Ok(())
    }

    #[test]
    fn execute_seals_builder() -> Result<()> {
        let engine = Arc::new(RecordingEngine::default());
        let db = Database::new(Arc::clone(&engine));
        let mut builder = db.create()?;
        builder.node_with_alias(["User"], Map::new(), "ada")?;
        let summary = builder.execute()?;
        assert_eq!(summary.alias("ada"), Some(summary.nodes[0]));

        match builder.execute() {
            Err(SombraError::InvalidArgument(msg)) => assert_eq!(msg, "builder already executed"),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(builder.node(["User"], Map::new()).is_err());
        assert_eq!(engine.creates.lock().len(), 1);
        Ok(())
    }

    #[test]
    fn closed_database_leaves_builder_open() -> Result<()> {
        let engine = Arc::new(RecordingEngine::default());
        let db = Database::new(Arc::clone(&engine));
        let mut builder = db.create()?;
        builder.node(["User"], Map::new())?;
        db.close()?;

        let err = builder.execute().err();
        assert!(matches!(err, Some(ref e) if e.is(crate::error::ErrorCode::Closed)));
        builder.node(["User"], Map::new())?;
        assert_eq!(builder.script().nodes.len(), 2);
        assert!(builder.execute().unwrap_err().is(crate::error::ErrorCode::Closed));
        assert!(engine.creates.lock().is_empty());
        Ok(())
    }
}
