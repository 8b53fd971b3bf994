//! Projection normalizer for `select` inputs.
use crate::error::{Result, SombraError};
use crate::query::ast::{Projection, Var};
use crate::schema::PropValidator;

/// Caller-facing projection request.
///
/// Accepts a bare variable name, a `(var, alias)` pair, or an explicit
/// property projection built with [`ProjectionField::prop`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectionField {
    /// Whole node bound to `var`.
    Var {
        /// Variable name.
        var: String,
        /// Output column name.
        alias: Option<String>,
    },
    /// One property of `var`.
    Prop {
        /// Variable name.
        var: String,
        /// Property name.
        prop: String,
        /// Output column name.
        alias: Option<String>,
    },
}

impl ProjectionField {
    /// Whole-node projection.
    pub fn var(var: impl Into<String>) -> Self {
        ProjectionField::Var {
            var: var.into(),
            alias: None,
        }
    }

    /// Property projection.
    pub fn prop(var: impl Into<String>, prop: impl Into<String>) -> Self {
        ProjectionField::Prop {
            var: var.into(),
            prop: prop.into(),
            alias: None,
        }
    }

    /// Sets the output column name.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match &mut self {
            ProjectionField::Var { alias, .. } | ProjectionField::Prop { alias, .. } => {
                *alias = name
            }
        }
        self
    }

    fn var_name(&self) -> &str {
        match self {
            ProjectionField::Var { var, .. } | ProjectionField::Prop { var, .. } => var,
        }
    }

    /// Canonicalizes the field.
    ///
    /// `resolve` must fail for undeclared variables and otherwise return the
    /// validator for the variable's label.
    pub(crate) fn normalize<'s, F>(self, resolve: F) -> Result<Projection>
    where
        F: FnOnce(&Var) -> Result<PropValidator<'s>>,
    {
        let var = Var::from(self.var_name());
        let validator = resolve(&var)?;
        match self {
            ProjectionField::Var { alias, .. } => Ok(Projection::Var {
                var,
                alias: check_alias(alias)?,
            }),
            ProjectionField::Prop { prop, alias, .. } => Ok(Projection::Prop {
                prop: validator.check(&prop)?,
                var,
                alias: check_alias(alias)?,
            }),
        }
    }
}

fn check_alias(alias: Option<String>) -> Result<Option<String>> {
    match alias {
        Some(name) if name.trim().is_empty() => {
            Err(SombraError::invalid("projection alias must be non-empty"))
        }
        other => Ok(other),
    }
}

impl From<&str> for ProjectionField {
    fn from(var: &str) -> Self {
        ProjectionField::var(var)
    }
}

impl From<String> for ProjectionField {
    fn from(var: String) -> Self {
        ProjectionField::var(var)
    }
}

impl From<(&str, &str)> for ProjectionField {
    fn from((var, alias): (&str, &str)) -> Self {
        ProjectionField::var(var).alias(alias)
    }
}

impl From<Projection> for ProjectionField {
    fn from(projection: Projection) -> Self {
        match projection {
            Projection::Var { var, alias } => ProjectionField::Var { var: var.0, alias },
            Projection::Prop { var, prop, alias } => ProjectionField::Prop {
                var: var.0,
                prop,
                alias,
            },
        }
    }
}
