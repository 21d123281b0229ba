use serde::de::DeserializeOwned;
use serde_json::Number;

use crate::Error;

/// A decoded JSON document in which objects are navigable records
///
/// Every JSON object, including those nested inside arrays, becomes a [`Record`].
/// All other JSON values are carried over unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(Number),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<Value>),
    /// JSON object
    Record(Record),
}

/// A JSON object whose fields can be looked up by name
///
/// Fields keep the order in which they appeared in the document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Value {
    /// Decode a UTF-8 JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(value.into())
    }

    /// Look up a field if this value is a record
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|record| record.get(name))
    }

    /// Get an element if this value is an array
    pub fn element(&self, index: usize) -> Option<&Value> {
        self.as_array().and_then(|array| array.get(index))
    }

    /// True for JSON `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this value is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(x) => Some(*x),
            _ => None,
        }
    }

    /// The number as `i64`, if it is an integer that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(x) => x.as_i64(),
            _ => None,
        }
    }

    /// The number as `u64`, if it is a non-negative integer that fits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(x) => x.as_u64(),
            _ => None,
        }
    }

    /// The number as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(x) => x.as_f64(),
            _ => None,
        }
    }

    /// The string, if this value is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(x) => Some(x),
            _ => None,
        }
    }

    /// The elements, if this value is an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(x) => Some(x),
            _ => None,
        }
    }

    /// The record, if this value is an object
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(x) => Some(x),
            _ => None,
        }
    }
}

impl Record {
    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Fields in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(x) => Self::Bool(x),
            serde_json::Value::Number(x) => Self::Number(x),
            serde_json::Value::String(x) => Self::String(x),
            serde_json::Value::Array(x) => Self::Array(x.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(x) => Self::Record(Record {
                fields: x.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
        }
    }
}

/// Decode a UTF-8 JSON document directly into a declared response type
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(serde_json::from_slice(bytes)?)
}
