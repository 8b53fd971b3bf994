//! Free-standing predicate helpers.
//!
//! These build an [`Expr`] that is not yet tied to a variable. Binding happens
//! through [`NodeScope::r#where`](crate::query::NodeScope::r#where), which
//! also re-checks every property against the active schema.
use crate::error::{Result, SombraError};
use crate::query::ast::{BoolExpr, Comparison, Var};
use crate::query::value::{encode, Literal, LiteralKind, Scalar};
use crate::schema::{normalize_prop_name, PropValidator};

/// Binary comparison operators with a single literal operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        }
    }

    fn is_ordered(self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

/// Validated leaf test awaiting a variable and property.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Test {
    Compare(CompareOp, Literal),
    Between {
        low: Literal,
        high: Literal,
        inclusive: [bool; 2],
    },
    In(Vec<Literal>),
    Exists,
    IsNull,
    IsNotNull,
}

impl Test {
    pub(crate) fn compare(op: CompareOp, value: Scalar) -> Result<Self> {
        let literal = encode(value)?;
        if op.is_ordered() && literal.is_null() {
            return Err(SombraError::invalid(format!(
                "{}() does not accept null literals",
                op.name()
            )));
        }
        Ok(Test::Compare(op, literal))
    }

    pub(crate) fn between(low: Scalar, high: Scalar, inclusive: [bool; 2]) -> Result<Self> {
        let low = encode(low)?;
        let high = encode(high)?;
        if low.is_null() || high.is_null() {
            return Err(SombraError::invalid("between() does not accept null literals"));
        }
        Ok(Test::Between {
            low,
            high,
            inclusive,
        })
    }

    pub(crate) fn in_list<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let literals = values
            .into_iter()
            .map(encode)
            .collect::<Result<Vec<_>>>()?;
        if literals.is_empty() {
            return Err(SombraError::invalid("in_list() requires at least one value"));
        }
        let mut kinds = literals
            .iter()
            .map(Literal::kind)
            .filter(|kind| *kind != LiteralKind::Null);
        if let Some(first) = kinds.next() {
            if let Some(other) = kinds.find(|kind| *kind != first) {
                return Err(SombraError::invalid(format!(
                    "in_list() literals must share one type, found {first} and {other}"
                )));
            }
        }
        Ok(Test::In(literals))
    }

    pub(crate) fn bind(self, var: Var, prop: String) -> Comparison {
        match self {
            Test::Compare(op, value) => match op {
                CompareOp::Eq => Comparison::Eq { var, prop, value },
                CompareOp::Ne => Comparison::Ne { var, prop, value },
                CompareOp::Lt => Comparison::Lt { var, prop, value },
                CompareOp::Le => Comparison::Le { var, prop, value },
                CompareOp::Gt => Comparison::Gt { var, prop, value },
                CompareOp::Ge => Comparison::Ge { var, prop, value },
            },
            Test::Between {
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
            Test::In(values) => Comparison::In { var, prop, values },
            Test::Exists => Comparison::Exists { var, prop },
            Test::IsNull => Comparison::IsNull { var, prop },
            Test::IsNotNull => Comparison::IsNotNull { var, prop },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Leaf { prop: String, test: Test },
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
}

/// Predicate tree not yet bound to a variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr(Node);

impl Expr {
    fn leaf(prop: &str, test: Test) -> Result<Self> {
        Ok(Expr(Node::Leaf {
            prop: normalize_prop_name(prop)?,
            test,
        }))
    }

    /// Binds every leaf to `var`, validating property names on the way.
    pub(crate) fn bind(self, var: &Var, validator: &PropValidator<'_>) -> Result<BoolExpr> {
        bind_node(self.0, var, validator)
    }
}

fn bind_node(node: Node, var: &Var, validator: &PropValidator<'_>) -> Result<BoolExpr> {
    let bind_all = |nodes: Vec<Node>| -> Result<Vec<BoolExpr>> {
        nodes
            .into_iter()
            .map(|n| bind_node(n, var, validator))
            .collect()
    };
    Ok(match node {
        Node::Leaf { prop, test } => {
            let prop = validator.check(&prop)?;
            BoolExpr::Cmp(test.bind(var.clone(), prop))
        }
        Node::And(args) => BoolExpr::And(bind_all(args)?),
        Node::Or(args) => BoolExpr::Or(bind_all(args)?),
        Node::Not(inner) => BoolExpr::Not(Box::new(bind_node(*inner, var, validator)?)),
    })
}

fn compare(op: CompareOp, prop: &str, value: Scalar) -> Result<Expr> {
    Expr::leaf(prop, Test::compare(op, value)?)
}

/// `prop = value`
pub fn eq(prop: &str, value: impl Into<Scalar>) -> Result<Expr> {
    compare(CompareOp::Eq, prop, value.into())
}

/// `prop <> value`
pub fn ne(prop: &str, value: impl Into<Scalar>) -> Result<Expr> {
    compare(CompareOp::Ne, prop, value.into())
}

/// `prop < value`. Null operands are rejected.
pub fn lt(prop: &str, value: impl Into<Scalar>) -> Result<Expr> {
    compare(CompareOp::Lt, prop, value.into())
}

/// `prop <= value`. Null operands are rejected.
pub fn le(prop: &str, value: impl Into<Scalar>) -> Result<Expr> {
    compare(CompareOp::Le, prop, value.into())
}

/// `prop > value`. Null operands are rejected.
pub fn gt(prop: &str, value: impl Into<Scalar>) -> Result<Expr> {
    compare(CompareOp::Gt, prop, value.into())
}

/// `prop >= value`. Null operands are rejected.
pub fn ge(prop: &str, value: impl Into<Scalar>) -> Result<Expr> {
    compare(CompareOp::Ge, prop, value.into())
}

/// Inclusive range check. Bounds are encoded as given, in any order.
pub fn between(prop: &str, low: impl Into<Scalar>, high: impl Into<Scalar>) -> Result<Expr> {
    between_with(prop, low, high, [true, true])
}

/// Range check with explicit `[low, high]` inclusivity.
pub fn between_with(
    prop: &str,
    low: impl Into<Scalar>,
    high: impl Into<Scalar>,
    inclusive: [bool; 2],
) -> Result<Expr> {
    Expr::leaf(prop, Test::between(low.into(), high.into(), inclusive)?)
}

/// Membership test. Requires at least one value; non-null values share a type.
pub fn in_list<I, V>(prop: &str, values: I) -> Result<Expr>
where
    I: IntoIterator<Item = V>,
    V: Into<Scalar>,
{
    Expr::leaf(prop, Test::in_list(values)?)
}

/// Property is present.
pub fn exists(prop: &str) -> Result<Expr> {
    Expr::leaf(prop, Test::Exists)
}

/// Property is null or missing.
pub fn is_null(prop: &str) -> Result<Expr> {
    Expr::leaf(prop, Test::IsNull)
}

/// Property is present and non-null.
pub fn is_not_null(prop: &str) -> Result<Expr> {
    Expr::leaf(prop, Test::IsNotNull)
}

fn combine<I>(name: &str, exprs: I, wrap: fn(Vec<Node>) -> Node) -> Result<Expr>
where
    I: IntoIterator<Item = Expr>,
{
    let mut nodes: Vec<Node> = exprs.into_iter().map(|e| e.0).collect();
    match nodes.len() {
        0 => Err(SombraError::invalid(format!(
            "{name}() requires at least one expression"
        ))),
        1 => Ok(Expr(nodes.remove(0))),
        _ => Ok(Expr(wrap(nodes))),
    }
}

/// Conjunction of one or more expressions. A single argument is returned as is.
pub fn and<I>(exprs: I) -> Result<Expr>
where
    I: IntoIterator<Item = Expr>,
{
    combine("and", exprs, Node::And)
}

/// Disjunction of one or more expressions. A single argument is returned as is.
pub fn or<I>(exprs: I) -> Result<Expr>
where
    I: IntoIterator<Item = Expr>,
{
    combine("or", exprs, Node::Or)
}

/// Negation.
pub fn not(expr: Expr) -> Expr {
    Expr(Node::Not(Box::new(expr.0)))
}
