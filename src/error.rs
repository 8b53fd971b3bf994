//! Error taxonomy shared by the builders and the engine boundary.
//!
//! Engine failures travel as strings of the form `"[CODE] message"`. They are
//! parsed back into [`SombraError::Wire`] so callers can branch on
//! [`ErrorCode`] instead of matching on text.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias used throughout the client.
pub type Result<T> = std::result::Result<T, SombraError>;

/// Closed set of wire error codes emitted by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Error without a recognised code prefix.
    Unknown,
    /// Free-form message from the engine.
    Message,
    /// Query analysis rejected the spec.
    Analyzer,
    /// Malformed JSON payload.
    Json,
    /// Underlying I/O failure.
    Io,
    /// On-disk corruption detected.
    Corruption,
    /// Write-write conflict between transactions.
    Conflict,
    /// Reader snapshot was reclaimed.
    SnapshotTooOld,
    /// Request was cancelled.
    Cancelled,
    /// Engine-side argument validation failed.
    InvalidArg,
    /// Entity lookup failed.
    NotFound,
    /// Handle was already closed.
    Closed,
}

impl ErrorCode {
    /// Every known code, in wire order.
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::Unknown,
        ErrorCode::Message,
        ErrorCode::Analyzer,
        ErrorCode::Json,
        ErrorCode::Io,
        ErrorCode::Corruption,
        ErrorCode::Conflict,
        ErrorCode::SnapshotTooOld,
        ErrorCode::Cancelled,
        ErrorCode::InvalidArg,
        ErrorCode::NotFound,
        ErrorCode::Closed,
    ];

    /// Returns the wire spelling of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::Message => "MESSAGE",
            ErrorCode::Analyzer => "ANALYZER",
            ErrorCode::Json => "JSON",
            ErrorCode::Io => "IO",
            ErrorCode::Corruption => "CORRUPTION",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::SnapshotTooOld => "SNAPSHOT_TOO_OLD",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InvalidArg => "INVALID_ARG",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Closed => "CLOSED",
        }
    }

    /// Parses a wire code. Unrecognised codes map to [`ErrorCode::Unknown`].
    pub fn parse(code: &str) -> Self {
        ErrorCode::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == code)
            .unwrap_or(ErrorCode::Unknown)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum SombraError {
    /// Malformed builder input, raised before anything reaches the engine.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A label or property is not part of the active schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    /// Failure reported by the engine.
    #[error("[{code}] {message}")]
    Wire {
        /// Parsed wire code.
        code: ErrorCode,
        /// Message with the code prefix stripped.
        message: String,
    },
    /// Client configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SombraError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SombraError::InvalidArgument(message.into())
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        SombraError::SchemaViolation(message.into())
    }

    /// Builds a wire error with an explicit code.
    pub fn wire(code: ErrorCode, message: impl Into<String>) -> Self {
        SombraError::Wire {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn closed() -> Self {
        SombraError::wire(ErrorCode::Closed, "database is closed")
    }

    /// Wire code for this error. Builder-side failures report `INVALID_ARG`.
    pub fn code(&self) -> ErrorCode {
        match self {
            SombraError::InvalidArgument(_) | SombraError::SchemaViolation(_) => {
                ErrorCode::InvalidArg
            }
            SombraError::Wire { code, .. } => *code,
            SombraError::Config(_) => ErrorCode::Io,
        }
    }

    /// Message without any code prefix.
    pub fn message(&self) -> String {
        match self {
            SombraError::InvalidArgument(msg) | SombraError::SchemaViolation(msg) => msg.clone(),
            SombraError::Wire { message, .. } => message.clone(),
            SombraError::Config(err) => err.to_string(),
        }
    }

    /// Returns true when the error carries `code`.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == code
    }
}

/// Splits `"[CODE] rest"` into its code and remainder.
fn split_code_prefix(raw: &str) -> Option<(&str, &str)> {
    let body = raw.strip_prefix('[')?;
    let end = body.find(']')?;
    let code = &body[..end];
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_uppercase() || b == b'_') {
        return None;
    }
    Some((code, body[end + 1..].trim_start()))
}

impl From<&str> for SombraError {
    fn from(raw: &str) -> Self {
        match split_code_prefix(raw) {
            Some((code, rest)) => SombraError::wire(ErrorCode::parse(code), rest),
            None => SombraError::wire(ErrorCode::Unknown, raw),
        }
    }
}

impl From<String> for SombraError {
    fn from(raw: String) -> Self {
        SombraError::from(raw.as_str())
    }
}

impl From<serde_json::Error> for SombraError {
    fn from(err: serde_json::Error) -> Self {
        SombraError::wire(ErrorCode::Json, err.to_string())
    }
}

impl From<io::Error> for SombraError {
    fn from(err: io::Error) -> Self {
        SombraError::wire(ErrorCode::Io, err.to_string())
    }
}

/// Converts an engine failure into a typed error.
///
/// Strings are parsed for the `"[CODE] message"` prefix. Already typed errors
/// are returned unchanged.
pub fn wrap_error(err: impl Into<SombraError>) -> SombraError {
    err.into()
}
