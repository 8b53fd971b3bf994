//! Optional runtime schema used to validate property names at build time.
//!
//! A schema whitelists properties per node label and per edge type. Labels
//! that the schema does not mention pass through unchecked.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SombraError};

/// Allowed properties for one node label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSchema {
    /// Property whitelist.
    #[serde(default)]
    pub properties: BTreeSet<String>,
}

/// Definition of one edge type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSchema {
    /// Source node label.
    pub from: String,
    /// Target node label.
    pub to: String,
    /// Property whitelist.
    #[serde(default)]
    pub properties: BTreeSet<String>,
}

/// Property whitelist keyed by node label and edge type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    /// Node labels.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeSchema>,
    /// Edge types.
    #[serde(default)]
    pub edges: BTreeMap<String, EdgeSchema>,
}

impl GraphSchema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node label with its properties.
    pub fn node<I, S>(mut self, label: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.insert(
            label.into(),
            NodeSchema {
                properties: properties.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Adds an edge type connecting two labels.
    pub fn edge<I, S>(
        mut self,
        edge_type: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        properties: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges.insert(
            edge_type.into(),
            EdgeSchema {
                from: from.into(),
                to: to.into(),
                properties: properties.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Checks that names are non-blank and edges reference declared labels.
    pub fn validate(&self) -> Result<()> {
        for (label, node) in &self.nodes {
            if label.trim().is_empty() {
                return Err(SombraError::schema("node labels must be non-empty"));
            }
            if node.properties.iter().any(|p| p.trim().is_empty()) {
                return Err(SombraError::schema(format!(
                    "label '{label}' declares an empty property name"
                )));
            }
        }
        for (edge_type, edge) in &self.edges {
            if edge_type.trim().is_empty() {
                return Err(SombraError::schema("edge types must be non-empty"));
            }
            for endpoint in [&edge.from, &edge.to] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(SombraError::schema(format!(
                        "edge '{edge_type}' references unknown node label '{endpoint}'"
                    )));
                }
            }
            if edge.properties.iter().any(|p| p.trim().is_empty()) {
                return Err(SombraError::schema(format!(
                    "edge '{edge_type}' declares an empty property name"
                )));
            }
        }
        Ok(())
    }

    /// Whitelist for `label`, if declared.
    pub fn node_properties(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(label).map(|node| &node.properties)
    }

    /// Definition of `edge_type`, if declared.
    pub fn edge_definition(&self, edge_type: &str) -> Option<&EdgeSchema> {
        self.edges.get(edge_type)
    }

    /// Validator for a variable carrying `label`.
    pub fn validator_for<'s>(&'s self, label: Option<&str>) -> PropValidator<'s> {
        let Some((label, node)) = label.and_then(|l| self.nodes.get_key_value(l)) else {
            return PropValidator::PassThrough;
        };
        PropValidator::Label {
            label: label.as_str(),
            allowed: &node.properties,
        }
    }

    /// Rejects node properties that none of the declared `labels` allow.
    ///
    /// When no label is declared the props pass through.
    pub fn check_node_props(&self, labels: &[String], props: &Map<String, Value>) -> Result<()> {
        let declared: Vec<&NodeSchema> = labels.iter().filter_map(|l| self.nodes.get(l)).collect();
        if declared.is_empty() {
            return Ok(());
        }
        for key in props.keys() {
            if !declared.iter().any(|node| node.properties.contains(key)) {
                return Err(SombraError::schema(format!(
                    "unknown property '{key}' for node '{}'",
                    labels.join(":")
                )));
            }
        }
        Ok(())
    }

    /// Rejects edge properties outside the declared whitelist for `edge_type`.
    pub fn check_edge_props(&self, edge_type: &str, props: &Map<String, Value>) -> Result<()> {
        let Some(edge) = self.edges.get(edge_type) else {
            return Ok(());
        };
        for key in props.keys() {
            if !edge.properties.contains(key) {
                return Err(SombraError::schema(format!(
                    "unknown property '{key}' for edge '{edge_type}'"
                )));
            }
        }
        Ok(())
    }

    /// Fails unless `label` is declared.
    pub fn require_label(&self, label: &str) -> Result<&NodeSchema> {
        self.nodes
            .get(label)
            .ok_or_else(|| SombraError::schema(format!("unknown node label '{label}'")))
    }

    /// Fails unless `edge_type` is declared.
    pub fn require_edge_type(&self, edge_type: &str) -> Result<&EdgeSchema> {
        self.edges
            .get(edge_type)
            .ok_or_else(|| SombraError::schema(format!("unknown edge type '{edge_type}'")))
    }
}

/// Per-variable property check. Identity unless a schema label is bound.
#[derive(Clone, Copy, Debug)]
pub enum PropValidator<'s> {
    /// No schema information; every property is accepted.
    PassThrough,
    /// Properties must belong to `allowed`.
    Label {
        /// Label the variable carries.
        label: &'s str,
        /// Properties declared for the label.
        allowed: &'s BTreeSet<String>,
    },
}

impl PropValidator<'_> {
    /// Validates `prop` and returns it as an owned name.
    pub fn check(&self, prop: &str) -> Result<String> {
        let prop = normalize_prop_name(prop)?;
        match self {
            PropValidator::PassThrough => Ok(prop),
            PropValidator::Label { label, allowed } => {
                if allowed.contains(&prop) {
                    Ok(prop)
                } else {
                    Err(SombraError::schema(format!(
                        "unknown property '{prop}' on label '{label}'"
                    )))
                }
            }
        }
    }
}

pub(crate) fn normalize_prop_name(prop: &str) -> Result<String> {
    if prop.trim().is_empty() {
        return Err(SombraError::invalid("property name must be a non-empty string"));
    }
    Ok(prop.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> GraphSchema {
        GraphSchema::new()
            .node("User", ["name", "age"])
            .node("Post", ["title"])
            .edge("WROTE", "User", "Post", ["at"])
    }

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn validator_rejects_unknown_property() {
        let schema = schema();
        let validator = schema.validator_for(Some("User"));
        assert_eq!(validator.check("name").ok().as_deref(), Some("name"));
        match validator.check("email") {
            Err(SombraError::SchemaViolation(msg)) => {
                assert_eq!(msg, "unknown property 'email' on label 'User'")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn unknown_labels_pass_through() {
        let schema = schema();
        assert!(schema.validator_for(Some("Tag")).check("anything").is_ok());
        assert!(schema.validator_for(None).check("anything").is_ok());
        assert!(schema.validator_for(None).check("  ").is_err());
    }

    #[test]
    fn node_and_edge_props_are_checked() {
        let schema = schema();
        let labels = vec!["User".to_string()];
        assert!(schema.check_node_props(&labels, &props(json!({"name": "a"}))).is_ok());
        assert!(schema.check_node_props(&labels, &props(json!({"bio": "a"}))).is_err());
        assert!(schema.check_edge_props("WROTE", &props(json!({"at": 1}))).is_ok());
        assert!(schema.check_edge_props("WROTE", &props(json!({"why": 1}))).is_err());
        assert!(schema.check_edge_props("LIKES", &props(json!({"why": 1}))).is_ok());
    }

    #[test]
    fn validate_rejects_dangling_edge_labels() {
        let broken = GraphSchema::new().edge("WROTE", "User", "Post", Vec::<String>::new());
        assert!(matches!(broken.validate(), Err(SombraError::SchemaViolation(_))));
        assert!(schema().validate().is_ok());
    }

    #[test]
    fn deserializes_from_toml_shape() -> std::result::Result<(), toml::de::Error> {
        let schema: GraphSchema = toml::from_str(
            r#"
            [nodes.User]
            properties = ["name"]

            [nodes.Post]

            [edges.WROTE]
            from = "User"
            to = "Post"
            "#,
        )?;
        assert!(schema.node_properties("User").is_some_and(|p| p.contains("name")));
        assert!(schema.node_properties("Post").is_some_and(|p| p.is_empty()));
        assert_eq!(schema.edge_definition("WROTE").map(|e| e.to.as_str()), Some("Post"));
        Ok(())
    }
}
