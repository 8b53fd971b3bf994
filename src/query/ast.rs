//! Canonical request model sent to the engine.
//!
//! [`QuerySpec`] is the serialization contract: two equal specs produce the
//! same JSON, and the JSON layout is what the engine parses.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SombraError;
use crate::query::value::Literal;

/// Version stamped into every query spec.
pub const SCHEMA_VERSION: u32 = 1;

/// Variable identifier bound to a node slot.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(pub String);

impl Var {
    /// Borrowed variable name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Var(value.to_owned())
    }
}

impl From<String> for Var {
    fn from(value: String) -> Self {
        Var(value)
    }
}

/// Declared node slot with an optional label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchClause {
    /// Variable name.
    pub var: Var,
    /// Label constraint, if any.
    #[serde(default)]
    pub label: Option<String>,
}

/// Traversal direction for an edge clause.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// `from -> to`
    #[default]
    Out,
    /// `from <- to`
    In,
    /// Either direction.
    Both,
}

impl EdgeDirection {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeDirection::Out => "out",
            EdgeDirection::In => "in",
            EdgeDirection::Both => "both",
        }
    }
}

impl std::str::FromStr for EdgeDirection {
    type Err = SombraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "out" => Ok(EdgeDirection::Out),
            "in" => Ok(EdgeDirection::In),
            "both" => Ok(EdgeDirection::Both),
            other => Err(SombraError::invalid(format!(
                "direction must be 'out', 'in', or 'both', got '{other}'"
            ))),
        }
    }
}

/// Edge pattern between two declared variables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeClause {
    /// Source variable.
    pub from: Var,
    /// Target variable.
    pub to: Var,
    /// Optional edge type filter.
    #[serde(default)]
    pub edge_type: Option<String>,
    /// Traversal direction.
    #[serde(default)]
    pub direction: EdgeDirection,
}

/// Boolean predicate tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "PredicateSpec", try_from = "PredicateSpec")]
pub enum BoolExpr {
    /// Leaf comparison.
    Cmp(Comparison),
    /// Conjunction.
    And(Vec<BoolExpr>),
    /// Disjunction.
    Or(Vec<BoolExpr>),
    /// Negation.
    Not(Box<BoolExpr>),
}

/// Leaf predicate over one property of one variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    /// `prop = value`
    Eq {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Operand.
        value: Literal,
    },
    /// `prop <> value`
    Ne {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Operand.
        value: Literal,
    },
    /// `prop < value`
    Lt {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Operand.
        value: Literal,
    },
    /// `prop <= value`
    Le {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Operand.
        value: Literal,
    },
    /// `prop > value`
    Gt {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Operand.
        value: Literal,
    },
    /// `prop >= value`
    Ge {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Operand.
        value: Literal,
    },
    /// Range check with per-bound inclusivity.
    Between {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Lower bound.
        low: Literal,
        /// Upper bound.
        high: Literal,
        /// `[low_inclusive, high_inclusive]`
        inclusive: [bool; 2],
    },
    /// Membership in a literal list.
    In {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Candidate values.
        values: Vec<Literal>,
    },
    /// Property is present.
    Exists {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
    },
    /// Property is null or missing.
    IsNull {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
    },
    /// Property is present and non-null.
    IsNotNull {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
    },
}

impl Comparison {
    /// Variable the comparison is bound to.
    pub fn var(&self) -> &Var {
        match self {
            Comparison::Eq { var, .. }
            | Comparison::Ne { var, .. }
            | Comparison::Lt { var, .. }
            | Comparison::Le { var, .. }
            | Comparison::Gt { var, .. }
            | Comparison::Ge { var, .. }
            | Comparison::Between { var, .. }
            | Comparison::In { var, .. }
            | Comparison::Exists { var, .. }
            | Comparison::IsNull { var, .. }
            | Comparison::IsNotNull { var, .. } => var,
        }
    }

    /// Property the comparison reads.
    pub fn prop(&self) -> &str {
        match self {
            Comparison::Eq { prop, .. }
            | Comparison::Ne { prop, .. }
            | Comparison::Lt { prop, .. }
            | Comparison::Le { prop, .. }
            | Comparison::Gt { prop, .. }
            | Comparison::Ge { prop, .. }
            | Comparison::Between { prop, .. }
            | Comparison::In { prop, .. }
            | Comparison::Exists { prop, .. }
            | Comparison::IsNull { prop, .. }
            | Comparison::IsNotNull { prop, .. } => prop,
        }
    }
}

impl BoolExpr {
    /// Combines `self` with `other` under `And`. Existing conjunctions on
    /// either side are spliced in rather than nested.
    pub fn and(self, other: BoolExpr) -> BoolExpr {
        let mut args = Vec::new();
        for expr in [self, other] {
            match expr {
                BoolExpr::And(inner) => args.extend(inner),
                expr => args.push(expr),
            }
        }
        BoolExpr::And(args)
    }

    /// Combines `self` with `other` under `Or`. Existing disjunctions on
    /// either side are spliced in rather than nested.
    pub fn or(self, other: BoolExpr) -> BoolExpr {
        let mut args = Vec::new();
        for expr in [self, other] {
            match expr {
                BoolExpr::Or(inner) => args.extend(inner),
                expr => args.push(expr),
            }
        }
        BoolExpr::Or(args)
    }
}

/// Projection emitted in the result rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Projection {
    /// Whole node bound to `var`.
    Var {
        /// Variable.
        var: Var,
        /// Output column name.
        #[serde(default)]
        alias: Option<String>,
    },
    /// Single property of `var`.
    Prop {
        /// Variable.
        var: Var,
        /// Property name.
        prop: String,
        /// Output column name.
        #[serde(default)]
        alias: Option<String>,
    },
}

/// Canonical query request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Wire version, always [`SCHEMA_VERSION`].
    #[serde(rename = "$schemaVersion")]
    pub schema_version: u32,
    /// Declared variables in declaration order.
    #[serde(default)]
    pub matches: Vec<MatchClause>,
    /// Edge patterns in traversal order.
    #[serde(default)]
    pub edges: Vec<EdgeClause>,
    /// Filter predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<BoolExpr>,
    /// Output columns.
    #[serde(default)]
    pub projections: Vec<Projection>,
    /// Deduplicate rows.
    #[serde(default)]
    pub distinct: bool,
    /// Caller supplied identifier for cancellation and tracing.
    #[serde(
        default,
        alias = "requestId",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            matches: Vec::new(),
            edges: Vec::new(),
            predicate: None,
            projections: Vec::new(),
            distinct: false,
            request_id: None,
        }
    }
}

/// Query spec submitted to the planner without execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplainSpec {
    /// Query being explained.
    #[serde(flatten)]
    pub query: QuerySpec,
    /// Replace literal values in the rendered plan.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub redact_literals: bool,
}

fn both_inclusive() -> [bool; 2] {
    [true, true]
}

/// Wire mirror of [`BoolExpr`] with comparisons inlined under an `op` tag.
#[derive(Serialize, Deserialize)]
#[serde(tag = "op")]
enum PredicateSpec {
    #[serde(rename = "and")]
    And { args: Vec<PredicateSpec> },
    #[serde(rename = "or")]
    Or { args: Vec<PredicateSpec> },
    #[serde(rename = "not")]
    Not { args: Vec<PredicateSpec> },
    #[serde(rename = "eq")]
    Eq { var: Var, prop: String, value: Literal },
    #[serde(rename = "ne")]
    Ne { var: Var, prop: String, value: Literal },
    #[serde(rename = "lt")]
    Lt { var: Var, prop: String, value: Literal },
    #[serde(rename = "le")]
    Le { var: Var, prop: String, value: Literal },
    #[serde(rename = "gt")]
    Gt { var: Var, prop: String, value: Literal },
    #[serde(rename = "ge")]
    Ge { var: Var, prop: String, value: Literal },
    #[serde(rename = "between")]
    Between {
        var: Var,
        prop: String,
        low: Literal,
        high: Literal,
        #[serde(default = "both_inclusive")]
        inclusive: [bool; 2],
    },
    #[serde(rename = "in")]
    In {
        var: Var,
        prop: String,
        values: Vec<Literal>,
    },
    #[serde(rename = "exists")]
    Exists { var: Var, prop: String },
    #[serde(rename = "isNull")]
    IsNull { var: Var, prop: String },
    #[serde(rename = "isNotNull")]
    IsNotNull { var: Var, prop: String },
}

impl From<BoolExpr> for PredicateSpec {
    fn from(expr: BoolExpr) -> Self {
        let lower = |args: Vec<BoolExpr>| args.into_iter().map(PredicateSpec::from).collect();
        match expr {
            BoolExpr::And(args) => PredicateSpec::And { args: lower(args) },
            BoolExpr::Or(args) => PredicateSpec::Or { args: lower(args) },
            BoolExpr::Not(inner) => PredicateSpec::Not {
                args: vec![PredicateSpec::from(*inner)],
            },
            BoolExpr::Cmp(cmp) => match cmp {
                Comparison::Eq { var, prop, value } => PredicateSpec::Eq { var, prop, value },
                Comparison::Ne { var, prop, value } => PredicateSpec::Ne { var, prop, value },
                Comparison::Lt { var, prop, value } => PredicateSpec::Lt { var, prop, value },
                Comparison::Le { var, prop, value } => PredicateSpec::Le { var, prop, value },
                Comparison::Gt { var, prop, value } => PredicateSpec::Gt { var, prop, value },
                Comparison::Ge { var, prop, value } => PredicateSpec::Ge { var, prop, value },
                Comparison::Between {
                    var,
                    prop,
                    low,
                    high,
                    inclusive,
                } => PredicateSpec::Between {
                    var,
                    prop,
                    low,
                    high,
                    inclusive,
                },
                Comparison::In { var, prop, values } => PredicateSpec::In { var, prop, values },
                Comparison::Exists { var, prop } => PredicateSpec::Exists { var, prop },
                Comparison::IsNull { var, prop } => PredicateSpec::IsNull { var, prop },
                Comparison::IsNotNull { var, prop } => PredicateSpec::IsNotNull { var, prop },
            },
        }
    }
}

impl TryFrom<PredicateSpec> for BoolExpr {
    type Error = SombraError;

    fn try_from(spec: PredicateSpec) -> Result<Self, Self::Error> {
        let lift = |op: &str, args: Vec<PredicateSpec>| -> Result<Vec<BoolExpr>, SombraError> {
            if args.is_empty() {
                return Err(SombraError::invalid(format!(
                    "{op} predicate requires at least one argument"
                )));
            }
            args.into_iter().map(BoolExpr::try_from).collect()
        };
        let cmp = match spec {
            PredicateSpec::And { args } => return Ok(BoolExpr::And(lift("and", args)?)),
            PredicateSpec::Or { args } => return Ok(BoolExpr::Or(lift("or", args)?)),
            PredicateSpec::Not { mut args } => {
                if args.len() != 1 {
                    return Err(SombraError::invalid(
                        "not predicate requires exactly one argument",
                    ));
                }
                let inner = args.remove(0);
                return Ok(BoolExpr::Not(Box::new(BoolExpr::try_from(inner)?)));
            }
            PredicateSpec::Eq { var, prop, value } => Comparison::Eq { var, prop, value },
            PredicateSpec::Ne { var, prop, value } => Comparison::Ne { var, prop, value },
            PredicateSpec::Lt { var, prop, value } => Comparison::Lt { var, prop, value },
            PredicateSpec::Le { var, prop, value } => Comparison::Le { var, prop, value },
            PredicateSpec::Gt { var, prop, value } => Comparison::Gt { var, prop, value },
            PredicateSpec::Ge { var, prop, value } => Comparison::Ge { var, prop, value },
            PredicateSpec::Between {
                var,
                prop,
                low,
                high,
                inclusive,
            } => Comparison::Between {
                var,
                prop,
                low,
                high,
                inclusive,
            },
            PredicateSpec::In { var, prop, values } => Comparison::In { var, prop, values },
            PredicateSpec::Exists { var, prop } => Comparison::Exists { var, prop },
            PredicateSpec::IsNull { var, prop } => Comparison::IsNull { var, prop },
            PredicateSpec::IsNotNull { var, prop } => Comparison::IsNotNull { var, prop },
        };
        Ok(BoolExpr::Cmp(cmp))
    }
}
