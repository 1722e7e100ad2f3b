// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indexmap::IndexMap;
use serde::{Serialize, Serializer, ser::Error as _};
use serde_json::Value;

/// An ordered map of auxiliary data, as attached to a test by fixtures or extensions.
pub type AuxMap = IndexMap<String, AuxValue>;

/// A value attached to a test as auxiliary data (metadata, device-under-test or equipment data,
/// or user properties).
///
/// Unlike [`serde_json::Value`], an `AuxValue` can hold data that has no JSON representation:
/// raw bytes, non-finite floats, and opaque objects. Serializing such a value fails; see
/// [`is_serializable`](crate::is_serializable).
#[derive(Clone, Debug, PartialEq)]
pub enum AuxValue {
    /// A null value.
    Null,

    /// A boolean.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// An unsigned integer.
    UInt(u64),

    /// A floating-point number. Only finite values can be serialized.
    Float(f64),

    /// A string.
    String(String),

    /// Raw bytes. These cannot be serialized.
    Bytes(Vec<u8>),

    /// An ordered sequence of values.
    List(Vec<AuxValue>),

    /// A map with string keys.
    Map(AuxMap),

    /// An object with no serializable representation, identified by its type name.
    Opaque {
        /// The name of the object's type, used in error messages.
        type_name: String,
    },
}

impl AuxValue {
    /// Creates an opaque value with the given type name.
    pub fn opaque(type_name: impl Into<String>) -> Self {
        AuxValue::Opaque {
            type_name: type_name.into(),
        }
    }

    /// Returns true if this is an empty map or list.
    pub fn is_empty_container(&self) -> bool {
        match self {
            AuxValue::List(list) => list.is_empty(),
            AuxValue::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl Serialize for AuxValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AuxValue::Null => serializer.serialize_unit(),
            AuxValue::Bool(b) => serializer.serialize_bool(*b),
            AuxValue::Int(n) => serializer.serialize_i64(*n),
            AuxValue::UInt(n) => serializer.serialize_u64(*n),
            AuxValue::Float(f) => {
                // serde_json writes non-finite floats as null, which would silently lose data.
                if f.is_finite() {
                    serializer.serialize_f64(*f)
                } else {
                    Err(S::Error::custom(format!("float {f} is not representable in JSON")))
                }
            }
            AuxValue::String(s) => serializer.serialize_str(s),
            AuxValue::Bytes(_) => Err(S::Error::custom("bytes are not representable in JSON")),
            AuxValue::List(list) => serializer.collect_seq(list),
            AuxValue::Map(map) => serializer.collect_map(map),
            AuxValue::Opaque { type_name } => Err(S::Error::custom(format!(
                "object of type `{type_name}` is not JSON-serializable"
            ))),
        }
    }
}

impl From<Value> for AuxValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => AuxValue::Null,
            Value::Bool(b) => AuxValue::Bool(b),
            Value::Number(n) => {
                if let Some(n) = n.as_i64() {
                    AuxValue::Int(n)
                } else if let Some(n) = n.as_u64() {
                    AuxValue::UInt(n)
                } else {
                    // A JSON number is always one of i64, u64 or f64.
                    AuxValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => AuxValue::String(s),
            Value::Array(list) => AuxValue::List(list.into_iter().map(AuxValue::from).collect()),
            Value::Object(map) => AuxValue::Map(
                map.into_iter()
                    .map(|(key, value)| (key, AuxValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for AuxValue {
    fn from(b: bool) -> Self {
        AuxValue::Bool(b)
    }
}

impl From<i32> for AuxValue {
    fn from(n: i32) -> Self {
        AuxValue::Int(n.into())
    }
}

impl From<i64> for AuxValue {
    fn from(n: i64) -> Self {
        AuxValue::Int(n)
    }
}

impl From<u32> for AuxValue {
    fn from(n: u32) -> Self {
        AuxValue::UInt(n.into())
    }
}

impl From<u64> for AuxValue {
    fn from(n: u64) -> Self {
        AuxValue::UInt(n)
    }
}

impl From<f64> for AuxValue {
    fn from(f: f64) -> Self {
        AuxValue::Float(f)
    }
}

impl From<&str> for AuxValue {
    fn from(s: &str) -> Self {
        AuxValue::String(s.to_owned())
    }
}

impl From<String> for AuxValue {
    fn from(s: String) -> Self {
        AuxValue::String(s)
    }
}

impl From<Vec<u8>> for AuxValue {
    fn from(bytes: Vec<u8>) -> Self {
        AuxValue::Bytes(bytes)
    }
}

impl<T: Into<AuxValue>> From<Option<T>> for AuxValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AuxValue::Null, Into::into)
    }
}

impl From<AuxMap> for AuxValue {
    fn from(map: AuxMap) -> Self {
        AuxValue::Map(map)
    }
}

impl<T: Into<AuxValue>> FromIterator<T> for AuxValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        AuxValue::List(iter.into_iter().map(Into::into).collect())
    }
}
