//! Client-side query and mutation builders for the Sombra graph engine.
//!
//! Application code composes queries and mutations through fluent builders.
//! The builders validate input as it arrives and emit canonical request
//! objects ([`QuerySpec`], [`MutationScript`], [`CreateScript`]) that an
//! [`Engine`] executes. Engine failures come back as typed [`SombraError`]s.
//!
//! ```no_run
//! # use sombra_client::{Database, Engine, Result};
//! # use sombra_client::query::expr::{gt, eq, or};
//! # fn run(engine: impl Engine + 'static) -> Result<()> {
//! let db = Database::new(engine);
//! let mut query = db.query()?;
//! query
//!     .nodes("User")?
//!     .r#where(or([gt("age", 30)?, eq("name", "Ada")?])?)?
//!     .select(["name"])?;
//! let rows = query.execute()?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod mutation;
pub mod query;
pub mod schema;

pub use config::{ClientConfig, ConfigError};
pub use db::{Database, DatabaseOptions};
pub use engine::{
    BfsOptions, BfsVisit, Engine, Neighbor, NeighborOptions, Row, RowCursor, RowEnvelope,
};
pub use error::{wrap_error, ErrorCode, Result, SombraError};
pub use mutation::{
    CreateBuilder, CreateScript, CreateSummary, EdgeLoad, MutationBatch, MutationOp,
    MutationScript, MutationSummary, NodeHandle, NodeRef,
};
pub use query::{QueryBuilder, QueryResult, QuerySpec, QueryStream};
pub use schema::{GraphSchema, PropValidator};
