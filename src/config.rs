//! TOML client configuration.
//!
//! ```toml
//! [bulk]
//! node_chunk_size = 10000
//! edge_chunk_size = 100000
//! mutation_batch_size = 1024
//!
//! [schema.nodes.User]
//! properties = ["name", "age"]
//!
//! [schema.edges.FOLLOWS]
//! from = "User"
//! to = "User"
//! ```
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::GraphSchema;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SOMBRA_CLIENT_CONFIG";

/// Default chunk size for [`Database::bulk_load_nodes`](crate::Database::bulk_load_nodes).
pub const DEFAULT_NODE_CHUNK_SIZE: usize = 10_000;
/// Default chunk size for [`Database::bulk_load_edges`](crate::Database::bulk_load_edges).
pub const DEFAULT_EDGE_CHUNK_SIZE: usize = 100_000;
/// Default chunk size for [`Database::mutate_batched`](crate::Database::mutate_batched).
pub const DEFAULT_MUTATION_BATCH_SIZE: usize = 1024;

/// Loaded client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl ClientConfig {
    /// Loads configuration from `explicit`, then `$SOMBRA_CLIENT_CONFIG`, then
    /// the platform config dir. A missing file yields defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        data.validate()?;
        Ok(Self { path, data })
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let data: RawConfig =
            toml::from_str(contents).map_err(|source| ConfigError::ParseInline { source })?;
        data.validate()?;
        Ok(Self { path: None, data })
    }

    /// File the configuration was resolved from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Chunk size for node bulk loads.
    pub fn node_chunk_size(&self) -> usize {
        self.data.bulk.node_chunk_size.unwrap_or(DEFAULT_NODE_CHUNK_SIZE)
    }

    /// Chunk size for edge bulk loads.
    pub fn edge_chunk_size(&self) -> usize {
        self.data.bulk.edge_chunk_size.unwrap_or(DEFAULT_EDGE_CHUNK_SIZE)
    }

    /// Chunk size for batched mutations.
    pub fn mutation_batch_size(&self) -> usize {
        self.data
            .bulk
            .mutation_batch_size
            .unwrap_or(DEFAULT_MUTATION_BATCH_SIZE)
    }

    /// Runtime schema, if configured.
    pub fn schema(&self) -> Option<&GraphSchema> {
        self.data.schema.as_ref()
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Platform default location of the client config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("sombra").join("client.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default)]
    bulk: BulkSection,
    #[serde(default)]
    schema: Option<GraphSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BulkSection {
    #[serde(default)]
    node_chunk_size: Option<usize>,
    #[serde(default)]
    edge_chunk_size: Option<usize>,
    #[serde(default)]
    mutation_batch_size: Option<usize>,
}

impl RawConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("bulk.node_chunk_size", self.bulk.node_chunk_size),
            ("bulk.edge_chunk_size", self.bulk.edge_chunk_size),
            ("bulk.mutation_batch_size", self.bulk.mutation_batch_size),
        ];
        for (field, value) in sizes {
            if value == Some(0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be a positive integer".into(),
                });
            }
        }
        if let Some(schema) = &self.schema {
            schema.validate().map_err(|err| ConfigError::Invalid {
                field: "schema",
                reason: err.message(),
            })?;
        }
        Ok(())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read client config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for this layout.
    #[error("failed to parse client config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Inline TOML is not valid for this layout.
    #[error("failed to parse client config: {source}")]
    ParseInline {
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("client config field '{field}' {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
