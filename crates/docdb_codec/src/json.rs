//! Conversions between [`Value`] and `serde_json::Value`.
//!
//! JSON is the exchange format at the edges of the engine: import/export
//! files, filter and update objects, and the WAL change feed. Internally
//! everything is [`Value`].

use crate::value::Value;
use std::collections::BTreeMap;

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    // u64 beyond i64::MAX, or a float. Degrades to a
                    // double, losing precision above 2^53.
                    Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from(&json)
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Double(d) => {
                // JSON has no NaN/Infinity; those serialize as null.
                serde_json::Number::from_f64(*d)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        serde_json::Value::from(&value)
    }
}

/// Renders a value as compact JSON.
#[must_use]
pub fn to_json_string(value: &Value) -> String {
    serde_json::Value::from(value).to_string()
}

/// Renders a value as pretty-printed JSON.
#[must_use]
pub fn to_json_string_pretty(value: &Value) -> String {
    let json = serde_json::Value::from(value);
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
}
