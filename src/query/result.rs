//! Result and stream adapters over engine responses.
use std::iter::FusedIterator;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{Row, RowCursor, RowEnvelope};
use crate::error::{ErrorCode, Result, SombraError};

/// Rows plus metadata returned by execute and explain calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    rows: Vec<Row>,
    request_id: Option<String>,
    features: Option<Vec<Value>>,
    plan: Option<Value>,
    plan_hash: Option<String>,
}

impl QueryResult {
    /// Wraps an engine envelope. A missing request id is filled from the
    /// request that produced the envelope.
    pub(crate) fn from_envelope(envelope: RowEnvelope, requested: Option<&str>) -> Self {
        let RowEnvelope {
            rows,
            request_id,
            features,
            plan,
            plan_hash,
        } = envelope;
        Self {
            rows,
            request_id: request_id.or_else(|| requested.map(str::to_owned)),
            features,
            plan,
            plan_hash,
        }
    }

    /// Result rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consumes the result, returning only the rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Request identifier the engine associated with the call.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Engine feature flags, when reported.
    pub fn features(&self) -> Option<&[Value]> {
        self.features.as_deref()
    }

    /// Plan nodes, always as a list. A plan that is neither an object nor a
    /// list is reported here rather than when the envelope is received.
    pub fn plan(&self) -> Result<&[Value]> {
        match &self.plan {
            None | Some(Value::Null) => Ok(&[][..]),
            Some(Value::Array(nodes)) => Ok(nodes.as_slice()),
            Some(node @ Value::Object(_)) => Ok(std::slice::from_ref(node)),
            Some(other) => Err(SombraError::wire(
                ErrorCode::Json,
                format!("plan must be an object or list when present, got {other}"),
            )),
        }
    }

    /// Plan hash, when reported.
    pub fn plan_hash(&self) -> Option<&str> {
        self.plan_hash.as_deref()
    }

    /// Deserializes every row into `T`.
    pub fn deserialize_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(Value::Object(row.clone())).map_err(Into::into))
            .collect()
    }
}

/// Lazy row stream bound to an open engine cursor.
///
/// Rows are pulled one at a time. The stream closes itself once the engine
/// reports the end of the result set or an error, and on drop.
pub struct QueryStream<'db> {
    cursor: Option<Box<dyn RowCursor + 'db>>,
    request_id: Option<String>,
}

impl<'db> QueryStream<'db> {
    pub(crate) fn new(cursor: Box<dyn RowCursor + 'db>, request_id: Option<String>) -> Self {
        Self {
            cursor: Some(cursor),
            request_id,
        }
    }

    /// Request identifier the stream was opened with.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// True once the stream has been closed or exhausted.
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Stops delivery and releases the cursor. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut cursor) = self.cursor.take() else {
            return Ok(());
        };
        debug!(request_id = self.request_id.as_deref(), "client.stream.closed");
        cursor.close()
    }
}

impl Iterator for QueryStream<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        match cursor.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                if let Err(err) = self.close() {
                    return Some(Err(err));
                }
                None
            }
            Err(err) => {
                if let Err(close_err) = self.close() {
                    warn!(%close_err, "client.stream.close_failed");
                }
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for QueryStream<'_> {}

impl Drop for QueryStream<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(%err, "client.stream.drop_close_failed");
        }
    }
}
