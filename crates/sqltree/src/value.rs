//! Bind values carried alongside compiled SQL.
//!
//! [`Value`] is the single currency of the statement boundary: every `?`
//! placeholder in a compiled statement corresponds to exactly one `Value`, and
//! backends hand rows back as `(column, Value)` pairs.

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A positional bind value (or a column value in a result row).
///
/// The serde representation is externally tagged so that a value survives a
/// JSON round-trip unchanged (the cache relies on this); non-finite floats are
/// written as `"inf"`, `"-inf"` and `"nan"`. Use
/// [`Value::to_json`] for a plain JSON rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    #[serde(with = "float_repr")]
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Value {
    /// Returns `true` for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON rendering (timestamps as RFC 3339, uuids and bytes as strings/arrays).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Value::Uuid(id) => serde_json::Value::String(id.to_string()),
        }
    }

    /// Convert a plain JSON scalar into a value. Arrays and objects are kept as JSON text.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

/// JSON has no literal for non-finite floats; encode them as strings.
mod float_repr {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ts) => write!(f, "'{}'", ts.to_rfc3339()),
            Value::Uuid(id) => write!(f, "'{id}'"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl TryFrom<u64> for Value {
    type Error = OrmError;

    fn try_from(v: u64) -> OrmResult<Self> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| OrmError::validation(format!("{v} does not fit a signed 64-bit integer")))
    }
}

impl TryFrom<usize> for Value {
    type Error = OrmError;

    fn try_from(v: usize) -> OrmResult<Self> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| OrmError::validation(format!("{v} does not fit a signed 64-bit integer")))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Typed extraction of a [`Value`].
pub trait FromValue: Sized {
    /// Convert a value, naming `column` in the decode error on mismatch.
    fn from_value(value: &Value, column: &str) -> OrmResult<Self>;
}

fn mismatch(column: &str, expected: &str, got: &Value) -> OrmError {
    OrmError::decode(
        column,
        format!("expected {expected}, found {}", got.type_name()),
    )
}

impl FromValue for Value {
    fn from_value(value: &Value, _column: &str) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Int(n) => Ok(*n),
            other => Err(mismatch(column, "int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        let n = i64::from_value(value, column)?;
        i32::try_from(n).map_err(|e| OrmError::decode(column, e.to_string()))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            other => Err(mismatch(column, "float", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            // SQLite has no boolean storage class.
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch(column, "bool", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(column, "bytes", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Uuid(id) => Ok(*id),
            Value::Text(s) => Uuid::parse_str(s).map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, "uuid", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}
