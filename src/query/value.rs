//! Literal encoder: turns application scalars into tagged wire literals.
//!
//! Every literal crosses the engine boundary as `{"t": <kind>, "v": <value>}`.
//! Validation happens here, before a literal ever reaches an expression tree.
use std::fmt;

use serde::{Deserialize, Serialize};
use time::macros::datetime;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{Result, SombraError};

/// Earliest instant accepted for datetime literals (inclusive).
pub const MIN_DATETIME: OffsetDateTime = datetime!(1900-01-01 0:00 UTC);
/// Upper bound for datetime literals (exclusive).
pub const MAX_DATETIME: OffsetDateTime = datetime!(2100-01-01 0:00 UTC);

/// Typed literal tagged with explicit type information so the wire format
/// stays unambiguous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Literal {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// Finite 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
    /// Binary payload, base64 encoded on the wire.
    #[serde(with = "serde_base64")]
    Bytes(Vec<u8>),
    /// Nanoseconds since Unix epoch in UTC.
    #[serde(deserialize_with = "serde_datetime::deserialize")]
    DateTime(i64),
}

/// Discriminant of a [`Literal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// `Null`
    Null,
    /// `Bool`
    Bool,
    /// `Int`
    Int,
    /// `Float`
    Float,
    /// `String`
    String,
    /// `Bytes`
    Bytes,
    /// `DateTime`
    DateTime,
}

impl LiteralKind {
    /// Wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            LiteralKind::Null => "Null",
            LiteralKind::Bool => "Bool",
            LiteralKind::Int => "Int",
            LiteralKind::Float => "Float",
            LiteralKind::String => "String",
            LiteralKind::Bytes => "Bytes",
            LiteralKind::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Literal {
    /// Returns the literal's tag.
    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Null => LiteralKind::Null,
            Literal::Bool(_) => LiteralKind::Bool,
            Literal::Int(_) => LiteralKind::Int,
            Literal::Float(_) => LiteralKind::Float,
            Literal::String(_) => LiteralKind::String,
            Literal::Bytes(_) => LiteralKind::Bytes,
            Literal::DateTime(_) => LiteralKind::DateTime,
        }
    }

    /// True for [`Literal::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Decodes a datetime literal back into a UTC timestamp.
    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Literal::DateTime(nanos) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(*nanos)).ok()
            }
            _ => None,
        }
    }
}

/// Application-side value accepted by the literal encoder.
///
/// Integers are carried widened so out-of-range inputs can be reported
/// instead of silently truncated.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer of any primitive width.
    Int(i128),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Offset-aware timestamp.
    DateTime(OffsetDateTime),
    /// Timestamp without an offset. Always rejected by [`encode`].
    NaiveDateTime(PrimitiveDateTime),
}

impl Scalar {
    /// Converts a JSON value into a scalar. Arrays and objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;
        match value {
            Json::Null => Ok(Scalar::Null),
            Json::Bool(b) => Ok(Scalar::Bool(*b)),
            Json::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(Scalar::Int(i128::from(v)))
                } else if let Some(v) = n.as_u64() {
                    Ok(Scalar::Int(i128::from(v)))
                } else {
                    n.as_f64()
                        .map(Scalar::Float)
                        .ok_or_else(|| SombraError::invalid(format!("unsupported number {n}")))
                }
            }
            Json::String(s) => Ok(Scalar::String(s.clone())),
            Json::Array(_) => Err(SombraError::invalid("unsupported literal type: array")),
            Json::Object(_) => Err(SombraError::invalid("unsupported literal type: object")),
        }
    }
}

/// Encodes a scalar into a wire literal, validating range and type.
pub fn encode(value: impl Into<Scalar>) -> Result<Literal> {
    match value.into() {
        Scalar::Null => Ok(Literal::Null),
        Scalar::Bool(b) => Ok(Literal::Bool(b)),
        Scalar::Int(v) => i64::try_from(v).map(Literal::Int).map_err(|_| {
            SombraError::invalid(format!("integer literal {v} exceeds the signed 64-bit range"))
        }),
        Scalar::Float(v) if v.is_finite() => Ok(Literal::Float(v)),
        Scalar::Float(v) => Err(SombraError::invalid(format!(
            "float literal must be finite, got {v}"
        ))),
        Scalar::String(s) => Ok(Literal::String(s)),
        Scalar::Bytes(b) => Ok(Literal::Bytes(b)),
        Scalar::DateTime(dt) => encode_datetime(dt),
        Scalar::NaiveDateTime(dt) => Err(SombraError::invalid(format!(
            "datetime literal {dt} must carry an explicit offset"
        ))),
    }
}

fn encode_datetime(dt: OffsetDateTime) -> Result<Literal> {
    let utc = dt.to_offset(UtcOffset::UTC);
    if utc < MIN_DATETIME || utc >= MAX_DATETIME {
        return Err(SombraError::invalid(format!(
            "datetime literal {utc} is outside [1900-01-01, 2100-01-01)"
        )));
    }
    i64::try_from(utc.unix_timestamp_nanos())
        .map(Literal::DateTime)
        .map_err(|_| SombraError::invalid(format!("datetime literal {utc} overflows nanoseconds")))
}

mod serde_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::{self, Deserialize, Deserializer};
    use serde::Serializer;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(|err| de::Error::custom(format!("invalid base64 bytes literal: {err}")))
    }
}

mod serde_datetime {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DateTimeVisitor;

        impl<'de> Visitor<'de> for DateTimeVisitor {
            type Value = i64;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string or number of nanoseconds since Unix epoch")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                i64::try_from(value)
                    .map_err(|_| E::custom(format!("datetime literal {value} out of range")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse::<i64>()
                    .map_err(|err| E::custom(format!("invalid datetime literal '{value}': {err}")))
            }
        }

        deserializer.deserialize_any(DateTimeVisitor)
    }
}

macro_rules! scalar_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::Int(value as i128)
                }
            }
        )*
    };
}

scalar_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Scalar::Float(f64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<&String> for Scalar {
    fn from(value: &String) -> Self {
        Scalar::String(value.clone())
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Scalar::Bytes(value)
    }
}

impl From<&[u8]> for Scalar {
    fn from(value: &[u8]) -> Self {
        Scalar::Bytes(value.to_vec())
    }
}

impl From<OffsetDateTime> for Scalar {
    fn from(value: OffsetDateTime) -> Self {
        Scalar::DateTime(value)
    }
}

impl From<PrimitiveDateTime> for Scalar {
    fn from(value: PrimitiveDateTime) -> Self {
        Scalar::NaiveDateTime(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Scalar::Null, Into::into)
    }
}

impl TryFrom<Scalar> for Literal {
    type Error = SombraError;

    fn try_from(value: Scalar) -> Result<Self> {
        encode(value)
    }
}
