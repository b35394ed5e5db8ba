//! The configuration value tree.
//!
//! Every formatter decodes raw bytes into a `Value`, and the merge engine
//! combines `Value` trees into one. Trees are owned and acyclic; published
//! snapshots are wrapped in `Arc` so no reader ever observes a mutation.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// A decoded configuration value.
///
/// All numeric literals normalize to `f64`, matching the loose typing of the
/// source formats: an integer `30` and a float `30.0` are indistinguishable
/// downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// An empty map, the identity element of the merge engine.
    pub fn empty_map() -> Value {
        Value::Map(BTreeMap::new())
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a top-level key. Returns `None` unless `self` is a map that
    /// contains `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|fields| fields.get(key))
    }

    /// Look up a dotted path, e.g. `"redis.addr"`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut node = self;
        for segment in path.split('.') {
            node = node.get(segment)?;
        }
        Some(node)
    }

    /// Deserialize the tree into a typed value.
    ///
    /// This is the surface typed accessor layers build on: the merged tree is
    /// converted once into an application-defined struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let json = self.to_json();
        serde_json::from_value(json).map_err(|e| ConfigError::decode("value", e))
    }

    /// Convert into the equivalent `serde_json` representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
