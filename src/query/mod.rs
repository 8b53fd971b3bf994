#![forbid(unsafe_code)]

//! Query construction: literals, predicates, patterns, projections, and the
//! adapters that turn engine responses into results.

/// Canonical request model sent to the engine.
///
/// Defines the query spec with match clauses, edges, predicates, and
/// projections, together with its JSON wire encoding.
pub mod ast;

/// Fluent query builder.
///
/// Tracks declared variables and validates every call as it is made.
pub mod builder;

/// Free-standing predicate helpers producing unbound expressions.
pub mod expr;

/// Normalization of `select` inputs.
pub mod projection;

/// Result envelopes and lazy row streams.
pub mod result;

/// Tagged literal encoding.
pub mod value;

pub use ast::{
    BoolExpr, Comparison, EdgeClause, EdgeDirection, ExplainSpec, MatchClause, Projection,
    QuerySpec, Var,
};
pub use builder::{EdgeSpec, MatchTarget, NodeScope, PredicateBuilder, QueryBuilder};
pub use expr::Expr;
pub use projection::ProjectionField;
pub use result::{QueryResult, QueryStream};
pub use value::{encode, Literal, LiteralKind, Scalar};
