use std::fmt;

use clap::ValueEnum;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value as JsonValue;

/// Values passed to drivers as command arguments and handed back as replies.
///
/// Every driver speaks this one enum so the façade never branches on backend types:
/// ```rust
/// use redis_facade::prelude::*;
///
/// let args = vec![Value::from("user:1"), Value::from(42), Value::Bool(true)];
/// # let _ = args;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent reply (missing key, empty pop)
    Nil,
    /// Boolean reply; `false` is the "nothing affected" sentinel
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Binary payload that is not valid UTF-8
    Bytes(Vec<u8>),
    /// Multi-element reply
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is `Nil`
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            Value::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Int(1) => Some(true),
            Value::Int(0) => Some(false),
            _ => None,
        }
    }

    /// Float view of the value. Integers too large to be represented exactly
    /// (beyond 2^53 in magnitude) give `None` rather than a rounded float.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        const EXACT: i64 = 1 << 53;
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) if (-EXACT..=EXACT).contains(value) => Some(*value as f64),
            Value::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        if let Value::Array(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// Raw bytes of a scalar value as a backend would receive them.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Nil => Vec::new(),
            Value::Bool(true) => b"1".to_vec(),
            Value::Bool(false) => b"0".to_vec(),
            Value::Int(value) => value.to_string().into_bytes(),
            Value::Float(value) => value.to_string().into_bytes(),
            Value::Text(text) => text.clone().into_bytes(),
            Value::Bytes(bytes) => bytes.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| String::from_utf8_lossy(&item.to_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
                .into_bytes(),
        }
    }

    /// Number of elements a reply stands for when a command is logged.
    ///
    /// `false` counts as nothing found, a multi-element reply counts its elements,
    /// and every other reply (including `Nil`) counts as one.
    #[must_use]
    pub fn affected_count(&self) -> usize {
        match self {
            Value::Bool(false) => 0,
            Value::Array(items) => items.len(),
            _ => 1,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Bytes(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_none(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::Text(text) => serializer.serialize_str(text),
            // non-UTF-8 payloads are logged as their raw octets
            Value::Bytes(bytes) => serializer.collect_seq(bytes),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        match String::from_utf8(value) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Nil,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or_else(|| Value::Text(n.to_string())),
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            JsonValue::Object(_) => Value::Text(value.to_string()),
        }
    }
}

/// The bundled backends reachable through the reserved driver aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum DriverKind {
    /// Network driver speaking to a Redis server
    #[default]
    Redis,
    /// In-process store, no network
    Memory,
}

impl DriverKind {
    /// Short alias accepted in the `driver` configuration key.
    #[must_use]
    pub const fn alias(self) -> &'static str {
        match self {
            DriverKind::Redis => "redis",
            DriverKind::Memory => "memory",
        }
    }

    /// Fully-qualified name under the driver namespace.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            DriverKind::Redis => "Redis/Driver/Redis",
            DriverKind::Memory => "Redis/Driver/Memory",
        }
    }
}
