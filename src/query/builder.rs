//! Fluent query builder.
//!
//! The builder tracks declared variables, edge patterns, the accumulated
//! predicate, and projections. Every call validates its input immediately;
//! nothing is deferred to execute time.

use std::mem;

use tracing::debug;

use crate::db::Database;
use crate::engine::Row;
use crate::error::{Result, SombraError};
use crate::query::ast::{
    BoolExpr, EdgeClause, EdgeDirection, ExplainSpec, MatchClause, Projection, QuerySpec, Var,
    SCHEMA_VERSION,
};
use crate::query::expr::{CompareOp, Expr, Test};
use crate::query::projection::ProjectionField;
use crate::query::result::{QueryResult, QueryStream};
use crate::query::value::Scalar;
use crate::schema::PropValidator;

/// Fluent builder producing a [`QuerySpec`].
pub struct QueryBuilder<'db> {
    db: &'db Database,
    matches: Vec<MatchClause>,
    edges: Vec<EdgeClause>,
    predicate: Option<BoolExpr>,
    projections: Vec<Projection>,
    distinct: bool,
    request_id: Option<String>,
    last_var: Option<Var>,
    next_var_idx: usize,
    pending_direction: EdgeDirection,
}

impl<'db> QueryBuilder<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            matches: Vec::new(),
            edges: Vec::new(),
            predicate: None,
            projections: Vec::new(),
            distinct: false,
            request_id: None,
            last_var: None,
            next_var_idx: 0,
            pending_direction: EdgeDirection::Out,
        }
    }

    /// Declares an auto-named variable carrying `label` and returns a scope
    /// bound to it.
    pub fn nodes(&mut self, label: &str) -> Result<NodeScope<'_, 'db>> {
        let label = non_empty(label, "label")?;
        let var = self.next_auto_var();
        self.ensure_match(&var, Some(label));
        self.last_var = Some(var.clone());
        Ok(NodeScope { builder: self, var })
    }

    /// Declares or merges a variable and makes it current.
    pub fn r#match<T>(&mut self, target: T) -> Result<&mut Self>
    where
        T: Into<MatchTarget>,
    {
        let (var, label) = self.resolve_target(target.into())?;
        self.ensure_match(&var, label);
        self.last_var = Some(var);
        Ok(self)
    }

    /// Declares several variables at once. The last one becomes current.
    pub fn match_all<I, T>(&mut self, targets: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<MatchTarget>,
    {
        let mut seen = false;
        for target in targets {
            self.r#match(target)?;
            seen = true;
        }
        if !seen {
            return Err(SombraError::invalid("match_all requires at least one target"));
        }
        Ok(self)
    }

    /// Adds an edge from the current variable to `target` using the pending
    /// direction, then makes `target` current.
    pub fn traverse<E, T>(&mut self, edge: E, target: T) -> Result<&mut Self>
    where
        E: Into<EdgeSpec>,
        T: Into<MatchTarget>,
    {
        let from = self
            .last_var
            .clone()
            .ok_or_else(|| SombraError::invalid("traverse requires a preceding match clause"))?;
        let edge_type = match edge.into().edge_type {
            Some(ty) => Some(non_empty(&ty, "edge type")?),
            None => None,
        };
        let (to, label) = self.resolve_target(target.into())?;
        self.ensure_match(&to, label);
        self.edges.push(EdgeClause {
            from,
            to: to.clone(),
            edge_type,
            direction: mem::take(&mut self.pending_direction),
        });
        self.last_var = Some(to);
        Ok(self)
    }

    /// Sets the direction for the next edge clause.
    pub fn direction(&mut self, dir: EdgeDirection) -> &mut Self {
        self.pending_direction = dir;
        self
    }

    /// Convenience helper for bidirectional expansions.
    pub fn bidirectional(&mut self) -> &mut Self {
        self.direction(EdgeDirection::Both)
    }

    /// Runs `scope` against a labelled variable.
    pub fn on<F>(&mut self, var: &str, scope: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut NodeScope<'_, 'db>) -> Result<()>,
    {
        let var = self.assert_match(var)?;
        self.require_label(&var)?;
        scope(&mut NodeScope {
            builder: &mut *self,
            var,
        })?;
        Ok(self)
    }

    /// Adds predicates for `var`, ANDed onto the existing predicate.
    pub fn where_var<F>(&mut self, var: &str, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder<'db>) -> Result<()>,
    {
        let var = self.assert_match(var)?;
        let validator = self.validator(&var);
        let mut builder = PredicateBuilder::new(var, PredicateMode::And, validator);
        build(&mut builder)?;
        let expr = builder.finish()?;
        self.append_predicate(expr, PredicateMode::And);
        Ok(self)
    }

    /// Marks the query as distinct.
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Sets or clears the request id. Input is trimmed; blank ids are rejected.
    pub fn request_id(&mut self, id: Option<&str>) -> Result<&mut Self> {
        self.request_id = id.map(normalize_request_id).transpose()?;
        Ok(self)
    }

    /// Replaces the projection list.
    pub fn select<I, P>(&mut self, fields: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<ProjectionField>,
    {
        let projections = fields
            .into_iter()
            .map(|field| {
                let field: ProjectionField = field.into();
                field.normalize(|var| {
                    self.assert_match(var.as_str())?;
                    Ok(self.validator(var))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.projections = projections;
        Ok(self)
    }

    /// Builds the canonical spec.
    ///
    /// Without an explicit projection every declared variable is returned
    /// in declaration order.
    pub fn build(&self) -> QuerySpec {
        let projections = if self.projections.is_empty() {
            self.matches
                .iter()
                .map(|clause| Projection::Var {
                    var: clause.var.clone(),
                    alias: None,
                })
                .collect()
        } else {
            self.projections.clone()
        };
        QuerySpec {
            schema_version: SCHEMA_VERSION,
            matches: self.matches.clone(),
            edges: self.edges.clone(),
            predicate: self.predicate.clone(),
            projections,
            distinct: self.distinct,
            request_id: self.request_id.clone(),
        }
    }

    /// Executes the query and returns its rows.
    pub fn execute(&self) -> Result<Vec<Row>> {
        self.execute_with_meta().map(QueryResult::into_rows)
    }

    /// Executes the query and returns rows plus envelope metadata.
    pub fn execute_with_meta(&self) -> Result<QueryResult> {
        let engine = self.db.engine()?;
        let spec = self.build();
        debug!(
            request_id = spec.request_id.as_deref(),
            matches = spec.matches.len(),
            edges = spec.edges.len(),
            "client.query.execute"
        );
        let envelope = engine.execute_query(&spec)?;
        Ok(QueryResult::from_envelope(envelope, spec.request_id.as_deref()))
    }

    /// Requests the engine's plan for this query.
    pub fn explain(&self, redact_literals: bool) -> Result<QueryResult> {
        let engine = self.db.engine()?;
        let spec = ExplainSpec {
            query: self.build(),
            redact_literals,
        };
        debug!(
            request_id = spec.query.request_id.as_deref(),
            redact_literals, "client.query.explain"
        );
        let envelope = engine.explain_query(&spec)?;
        Ok(QueryResult::from_envelope(envelope, spec.query.request_id.as_deref()))
    }

    /// Opens a lazy row stream.
    pub fn stream(&self) -> Result<QueryStream<'db>> {
        let engine = self.db.engine()?;
        let spec = self.build();
        debug!(
            request_id = spec.request_id.as_deref(),
            "client.query.stream_open"
        );
        let cursor = engine.stream_query(&spec)?;
        Ok(QueryStream::new(cursor, spec.request_id))
    }

    fn resolve_target(&mut self, target: MatchTarget) -> Result<(Var, Option<String>)> {
        match target {
            MatchTarget::Label(label) => {
                let label = non_empty(&label, "label")?;
                Ok((self.next_auto_var(), Some(label)))
            }
            MatchTarget::Var { name, label } => {
                let name = non_empty(&name, "variable name")?;
                let label = label.map(|l| non_empty(&l, "label")).transpose()?;
                Ok((Var(name), label))
            }
        }
    }

    /// Declares `var` or adopts `label` for it. A label, once set, is kept.
    fn ensure_match(&mut self, var: &Var, label: Option<String>) {
        match self.matches.iter_mut().find(|m| &m.var == var) {
            Some(existing) => {
                if existing.label.is_none() {
                    existing.label = label;
                }
            }
            None => self.matches.push(MatchClause {
                var: var.clone(),
                label,
            }),
        }
    }

    fn assert_match(&self, var: &str) -> Result<Var> {
        self.matches
            .iter()
            .find(|m| m.var.as_str() == var)
            .map(|m| m.var.clone())
            .ok_or_else(|| {
                SombraError::invalid(format!("unknown variable '{var}' - declare it first"))
            })
    }

    fn label_of(&self, var: &Var) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| &m.var == var)
            .and_then(|m| m.label.as_deref())
    }

    fn require_label(&self, var: &Var) -> Result<()> {
        match self.label_of(var) {
            Some(_) => Ok(()),
            None => Err(SombraError::invalid(format!(
                "variable '{var}' requires a label before applying predicates"
            ))),
        }
    }

    fn validator(&self, var: &Var) -> PropValidator<'db> {
        let db: &'db Database = self.db;
        match db.schema() {
            Some(schema) => schema.validator_for(self.label_of(var)),
            None => PropValidator::PassThrough,
        }
    }

    fn append_predicate(&mut self, expr: BoolExpr, mode: PredicateMode) {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => match mode {
                PredicateMode::And => existing.and(expr),
                PredicateMode::Or => existing.or(expr),
            },
            None => expr,
        });
    }

    fn next_auto_var(&mut self) -> Var {
        loop {
            let candidate = auto_var_name(self.next_var_idx);
            self.next_var_idx += 1;
            if !self.matches.iter().any(|m| m.var.as_str() == candidate) {
                return Var(candidate);
            }
        }
    }
}

/// Builder handle bound to one declared variable.
pub struct NodeScope<'b, 'db> {
    builder: &'b mut QueryBuilder<'db>,
    var: Var,
}

impl<'db> NodeScope<'_, 'db> {
    /// Variable this scope is bound to.
    pub fn var(&self) -> &Var {
        &self.var
    }

    /// ANDs `expr`, bound to this variable, onto the query predicate.
    pub fn r#where(&mut self, expr: Expr) -> Result<&mut Self> {
        self.attach(expr, PredicateMode::And)
    }

    /// Same as [`NodeScope::r#where`].
    pub fn and_where(&mut self, expr: Expr) -> Result<&mut Self> {
        self.attach(expr, PredicateMode::And)
    }

    /// ORs `expr`, bound to this variable, onto the query predicate.
    pub fn or_where(&mut self, expr: Expr) -> Result<&mut Self> {
        self.attach(expr, PredicateMode::Or)
    }

    /// Adds predicates through a scoped [`PredicateBuilder`].
    pub fn where_with<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder<'db>) -> Result<()>,
    {
        self.builder.where_var(self.var.as_str(), build)?;
        Ok(self)
    }

    /// Appends property projections for this variable.
    pub fn select<I, S>(&mut self, props: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let validator = self.builder.validator(&self.var);
        let projections = props
            .into_iter()
            .map(|prop| -> Result<Projection> {
                Ok(Projection::Prop {
                    var: self.var.clone(),
                    prop: validator.check(prop.as_ref())?,
                    alias: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if projections.is_empty() {
            return Err(SombraError::invalid("select requires at least one property"));
        }
        self.builder.projections.extend(projections);
        Ok(self)
    }

    /// Marks the query as distinct.
    pub fn distinct(&mut self) -> &mut Self {
        self.builder.distinct();
        self
    }

    /// Sets the direction for the next edge clause.
    pub fn direction(&mut self, dir: EdgeDirection) -> &mut Self {
        self.builder.direction(dir);
        self
    }

    /// Convenience helper for bidirectional expansions.
    pub fn bidirectional(&mut self) -> &mut Self {
        self.direction(EdgeDirection::Both)
    }

    /// Sets or clears the request id.
    pub fn request_id(&mut self, id: Option<&str>) -> Result<&mut Self> {
        self.builder.request_id(id)?;
        Ok(self)
    }

    /// Builds the canonical spec.
    pub fn build(&self) -> QuerySpec {
        self.builder.build()
    }

    /// See [`QueryBuilder::execute`].
    pub fn execute(&self) -> Result<Vec<Row>> {
        self.builder.execute()
    }

    /// See [`QueryBuilder::execute_with_meta`].
    pub fn execute_with_meta(&self) -> Result<QueryResult> {
        self.builder.execute_with_meta()
    }

    /// See [`QueryBuilder::explain`].
    pub fn explain(&self, redact_literals: bool) -> Result<QueryResult> {
        self.builder.explain(redact_literals)
    }

    /// See [`QueryBuilder::stream`].
    pub fn stream(&self) -> Result<QueryStream<'db>> {
        self.builder.stream()
    }

    fn attach(&mut self, expr: Expr, mode: PredicateMode) -> Result<&mut Self> {
        self.builder.require_label(&self.var)?;
        let validator = self.builder.validator(&self.var);
        let bound = expr.bind(&self.var, &validator)?;
        self.builder.append_predicate(bound, mode);
        Ok(self)
    }
}

/// Specifies the target node for a match or edge clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchTarget {
    /// Match by label only; the variable name is generated.
    Label(String),
    /// Match by variable name and optional label.
    Var {
        /// Variable name.
        name: String,
        /// Optional label constraint.
        label: Option<String>,
    },
}

impl MatchTarget {
    /// Variable without a label.
    pub fn var(name: impl Into<String>) -> Self {
        MatchTarget::Var {
            name: name.into(),
            label: None,
        }
    }
}

impl From<&str> for MatchTarget {
    fn from(label: &str) -> Self {
        MatchTarget::Label(label.to_owned())
    }
}

impl From<String> for MatchTarget {
    fn from(label: String) -> Self {
        MatchTarget::Label(label)
    }
}

impl From<(&str, &str)> for MatchTarget {
    fn from((var, label): (&str, &str)) -> Self {
        MatchTarget::Var {
            name: var.to_owned(),
            label: Some(label.to_owned()),
        }
    }
}

impl From<(&str, Option<&str>)> for MatchTarget {
    fn from((var, label): (&str, Option<&str>)) -> Self {
        MatchTarget::Var {
            name: var.to_owned(),
            label: label.map(str::to_owned),
        }
    }
}

/// Edge type filter for [`QueryBuilder::traverse`].
pub struct EdgeSpec {
    edge_type: Option<String>,
}

impl EdgeSpec {
    /// Creates a new edge specification with an optional edge type constraint.
    pub fn new(edge_type: Option<String>) -> Self {
        Self { edge_type }
    }
}

impl From<&str> for EdgeSpec {
    fn from(edge_type: &str) -> Self {
        Self::new(Some(edge_type.to_owned()))
    }
}

impl From<Option<&str>> for EdgeSpec {
    fn from(edge_type: Option<&str>) -> Self {
        Self::new(edge_type.map(str::to_owned))
    }
}

#[derive(Clone, Copy, Debug)]
enum PredicateMode {
    And,
    Or,
}

/// Builder used to construct predicates bound to a single variable.
///
/// Group methods hand a fresh nested builder to the callback; the nested
/// builder is consumed when the group closes.
pub struct PredicateBuilder<'db> {
    var: Var,
    mode: PredicateMode,
    validator: PropValidator<'db>,
    exprs: Vec<BoolExpr>,
}

impl<'db> PredicateBuilder<'db> {
    fn new(var: Var, mode: PredicateMode, validator: PropValidator<'db>) -> Self {
        Self {
            var,
            mode,
            validator,
            exprs: Vec::new(),
        }
    }

    fn push(&mut self, prop: &str, test: Test) -> Result<&mut Self> {
        let prop = self.validator.check(prop)?;
        self.exprs
            .push(BoolExpr::Cmp(test.bind(self.var.clone(), prop)));
        Ok(self)
    }

    fn compare(&mut self, op: CompareOp, prop: &str, value: Scalar) -> Result<&mut Self> {
        let test = Test::compare(op, value)?;
        self.push(prop, test)
    }

    fn finish(self) -> Result<BoolExpr> {
        let mut exprs = self.exprs;
        match exprs.len() {
            0 => Err(SombraError::invalid(
                "predicate group must emit at least one predicate",
            )),
            1 => Ok(exprs.remove(0)),
            _ => Ok(match self.mode {
                PredicateMode::And => BoolExpr::And(exprs),
                PredicateMode::Or => BoolExpr::Or(exprs),
            }),
        }
    }

    fn group<F>(&self, mode: PredicateMode, build: F) -> Result<BoolExpr>
    where
        F: FnOnce(&mut PredicateBuilder<'db>) -> Result<()>,
    {
        let mut nested = PredicateBuilder::new(self.var.clone(), mode, self.validator);
        build(&mut nested)?;
        nested.finish()
    }

    /// Adds an equality predicate.
    pub fn eq(&mut self, prop: &str, value: impl Into<Scalar>) -> Result<&mut Self> {
        self.compare(CompareOp::Eq, prop, value.into())
    }

    /// Adds an inequality predicate.
    pub fn ne(&mut self, prop: &str, value: impl Into<Scalar>) -> Result<&mut Self> {
        self.compare(CompareOp::Ne, prop, value.into())
    }

    /// Adds a strict less-than predicate.
    pub fn lt(&mut self, prop: &str, value: impl Into<Scalar>) -> Result<&mut Self> {
        self.compare(CompareOp::Lt, prop, value.into())
    }

    /// Adds a less-than-or-equal predicate.
    pub fn le(&mut self, prop: &str, value: impl Into<Scalar>) -> Result<&mut Self> {
        self.compare(CompareOp::Le, prop, value.into())
    }

    /// Adds a strict greater-than predicate.
    pub fn gt(&mut self, prop: &str, value: impl Into<Scalar>) -> Result<&mut Self> {
        self.compare(CompareOp::Gt, prop, value.into())
    }

    /// Adds a greater-than-or-equal predicate.
    pub fn ge(&mut self, prop: &str, value: impl Into<Scalar>) -> Result<&mut Self> {
        self.compare(CompareOp::Ge, prop, value.into())
    }

    /// Adds a between predicate with both bounds included.
    pub fn between(
        &mut self,
        prop: &str,
        low: impl Into<Scalar>,
        high: impl Into<Scalar>,
    ) -> Result<&mut Self> {
        self.between_with(prop, low, high, [true, true])
    }

    /// Adds a between predicate with explicit `[low, high]` inclusivity.
    pub fn between_with(
        &mut self,
        prop: &str,
        low: impl Into<Scalar>,
        high: impl Into<Scalar>,
        inclusive: [bool; 2],
    ) -> Result<&mut Self> {
        let test = Test::between(low.into(), high.into(), inclusive)?;
        self.push(prop, test)
    }

    /// Adds an `IN` predicate over a homogeneous literal set.
    pub fn in_list<I, V>(&mut self, prop: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let test = Test::in_list(values)?;
        self.push(prop, test)
    }

    /// Asserts that the property key is present on the entity.
    pub fn exists(&mut self, prop: &str) -> Result<&mut Self> {
        self.push(prop, Test::Exists)
    }

    /// Tests whether the property is null or missing.
    pub fn is_null(&mut self, prop: &str) -> Result<&mut Self> {
        self.push(prop, Test::IsNull)
    }

    /// Tests whether the property exists and is not null.
    pub fn is_not_null(&mut self, prop: &str) -> Result<&mut Self> {
        self.push(prop, Test::IsNotNull)
    }

    /// Nests a group of predicates combined with logical AND.
    pub fn and_group<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder<'db>) -> Result<()>,
    {
        let expr = self.group(PredicateMode::And, build)?;
        self.exprs.push(expr);
        Ok(self)
    }

    /// Nests a group of predicates combined with logical OR.
    pub fn or_group<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder<'db>) -> Result<()>,
    {
        let expr = self.group(PredicateMode::Or, build)?;
        self.exprs.push(expr);
        Ok(self)
    }

    /// Nests a group of predicates and negates the result.
    pub fn not_group<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder<'db>) -> Result<()>,
    {
        let expr = self.group(PredicateMode::And, build)?;
        self.exprs.push(BoolExpr::Not(Box::new(expr)));
        Ok(self)
    }
}

fn non_empty(value: &str, what: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(SombraError::invalid(format!("{what} must be a non-empty string")));
    }
    Ok(value.to_owned())
}

pub(crate) fn normalize_request_id(id: &str) -> Result<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(SombraError::invalid("request_id must be a non-empty string"));
    }
    Ok(trimmed.to_owned())
}

fn auto_var_name(idx: usize) -> String {
    const FIRST: u8 = b'a';
    let letter = (FIRST + (idx % 26) as u8) as char;
    if idx < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, idx / 26)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseOptions;
    use crate::engine::testing::RecordingEngine;
    use crate::query::ast::Comparison;
    use crate::query::expr::{eq, gt, or};
    use crate::query::value::Literal;
    use crate::schema::GraphSchema;
    use serde_json::json;

    fn db() -> Database {
        Database::new(RecordingEngine::default())
    }

    fn db_with_schema() -> Result<Database> {
        Database::open(
            RecordingEngine::default(),
            DatabaseOptions {
                schema: Some(GraphSchema::new().node("User", ["name", "age"])),
                ..DatabaseOptions::default()
            },
        )
    }

    #[test]
    fn builder_adds_match_and_edge() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder
            .r#match("User")?
            .traverse("FOLLOWS", "User")?
            .select(["a", "b"])?;

        let spec = builder.build();
        assert_eq!(spec.matches.len(), 2);
        assert_eq!(spec.edges.len(), 1);
        assert_eq!(spec.edges[0].from, Var::from("a"));
        assert_eq!(spec.edges[0].to, Var::from("b"));
        assert_eq!(spec.projections.len(), 2);
        Ok(())
    }

    #[test]
    fn direction_resets_after_traversal() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder
            .r#match(("a", "User"))?
            .direction(EdgeDirection::In)
            .traverse("FOLLOWS", ("b", "User"))?
            .traverse(None::<&str>, ("c", None::<&str>))?;
        let spec = builder.build();
        assert_eq!(spec.edges[0].direction, EdgeDirection::In);
        assert_eq!(spec.edges[1].direction, EdgeDirection::Out);
        assert_eq!(spec.edges[1].edge_type, None);
        Ok(())
    }

    #[test]
    fn traverse_requires_current_variable() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        assert!(builder.traverse("FOLLOWS", "User").is_err());
        Ok(())
    }

    #[test]
    fn builder_parses_property_predicates() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.r#match(("a", "User"))?.where_var("a", |pred| {
            pred.ge("age", 21)?.or_group(|g| {
                g.eq("name", "Ada")?.is_null("name")?;
                Ok(())
            })?;
            Ok(())
        })?;
        let value = serde_json::to_value(builder.build())?;
        assert_eq!(
            value["predicate"],
            json!({
                "op": "and",
                "args": [
                    {"op": "ge", "var": "a", "prop": "age", "value": {"t": "Int", "v": 21}},
                    {"op": "or", "args": [
                        {"op": "eq", "var": "a", "prop": "name", "value": {"t": "String", "v": "Ada"}},
                        {"op": "isNull", "var": "a", "prop": "name"}
                    ]}
                ]
            })
        );
        Ok(())
    }

    #[test]
    fn empty_group_is_rejected() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.r#match(("a", "User"))?;
        let err = builder
            .where_var("a", |pred| {
                pred.not_group(|_| Ok(()))?;
                Ok(())
            })
            .err();
        assert!(matches!(err, Some(SombraError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn unknown_variable_is_rejected() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.r#match(("a", "User"))?;
        match builder.where_var("z", |p| p.exists("name").map(|_| ())) {
            Err(SombraError::InvalidArgument(msg)) => assert!(msg.contains("unknown variable 'z'")),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
        assert!(builder.select(["z"]).is_err());
        Ok(())
    }

    #[test]
    fn predicates_accumulate_with_combinators() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        {
            let mut users = builder.nodes("User")?;
            users.r#where(eq("name", "Ada")?)?;
            users.and_where(gt("age", 30)?)?;
            users.or_where(or([eq("name", "Grace")?])?)?;
        }
        match builder.build().predicate {
            Some(BoolExpr::Or(args)) => {
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[0], BoolExpr::And(inner) if inner.len() == 2));
                assert!(matches!(
                    &args[1],
                    BoolExpr::Cmp(Comparison::Eq { value: Literal::String(s), .. }) if s == "Grace"
                ));
            }
            other => panic!("unexpected predicate {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn on_requires_label() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.r#match(MatchTarget::var("x"))?;
        let err = builder.on("x", |scope| scope.r#where(eq("a", 1)?).map(|_| ()));
        assert!(matches!(err, Err(SombraError::InvalidArgument(_))));

        builder.r#match(("x", "User"))?;
        builder.on("x", |scope| {
            scope.r#where(eq("a", 1)?)?.select(["a"])?;
            Ok(())
        })?;
        let spec = builder.build();
        assert_eq!(spec.matches.len(), 1);
        assert_eq!(spec.matches[0].label.as_deref(), Some("User"));
        assert_eq!(spec.projections.len(), 1);
        Ok(())
    }

    #[test]
    fn first_label_wins_on_redeclaration() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder
            .r#match(("a", "User"))?
            .r#match(("a", None::<&str>))?
            .r#match(("a", "Post"))?
            .traverse("FOLLOWS", ("a", "Post"))?;
        let spec = builder.build();
        assert_eq!(spec.matches.len(), 1);
        assert_eq!(spec.matches[0].label.as_deref(), Some("User"));
        assert_eq!(spec.edges.len(), 1);
        Ok(())
    }

    #[test]
    fn auto_vars_skip_declared_names() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.r#match(("a", "User"))?.r#match("Post")?;
        let spec = builder.build();
        assert_eq!(spec.matches[1].var, Var::from("b"));
        assert_eq!(auto_var_name(27), "b1");
        Ok(())
    }

    #[test]
    fn schema_checks_predicates_and_projections() -> Result<()> {
        let db = db_with_schema()?;
        let mut builder = db.query()?;
        {
            let mut users = builder.nodes("User")?;
            assert!(matches!(
                users.r#where(eq("email", "x")?),
                Err(SombraError::SchemaViolation(_))
            ));
            assert!(matches!(
                users.select(["email"]),
                Err(SombraError::SchemaViolation(_))
            ));
            users.select(["name"])?;
        }
        assert!(matches!(
            builder.select([ProjectionField::prop("a", "email")]),
            Err(SombraError::SchemaViolation(_))
        ));
        assert!(builder.build().predicate.is_none());
        Ok(())
    }

    #[test]
    fn request_id_is_trimmed() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.request_id(Some("  req-1 "))?;
        assert_eq!(builder.build().request_id.as_deref(), Some("req-1"));
        assert!(builder.request_id(Some("   ")).is_err());
        builder.request_id(None)?;
        assert!(builder.build().request_id.is_none());
        Ok(())
    }

    #[test]
    fn default_projection_covers_all_matches() -> Result<()> {
        let db = db();
        let mut builder = db.query()?;
        builder.match_all([("a", Some("User")), ("b", None)])?.distinct();
        let value = serde_json::to_value(builder.build())?;
        assert_eq!(
            value,
            json!({
                "$schemaVersion": 1,
                "matches": [{"var": "a", "label": "User"}, {"var": "b", "label": null}],
                "edges": [],
                "projections": [
                    {"kind": "var", "var": "a", "alias": null},
                    {"kind": "var", "var": "b", "alias": null}
                ],
                "distinct": true
            })
        );
        Ok(())
    }
}
