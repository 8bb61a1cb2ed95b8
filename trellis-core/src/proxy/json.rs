//! JSON bridge.
//!
//! Builds raw container trees from `serde_json` values and snapshots value
//! trees back to JSON. Snapshots read raw data, so they never create
//! dependencies.

use std::collections::HashSet;

use serde_json::{Map, Number};

use super::raw::Raw;
use super::value::Value;
use crate::error::{Error, Result};
use crate::reactive::SourceId;

impl Value {
    /// Convert a JSON document into a value, building fresh raw containers
    /// for objects and arrays.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Raw::array_from(items.into_iter().map(Value::from_json)))
            }
            serde_json::Value::Object(map) => Value::Object(Raw::object_from(
                map.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    /// Snapshot the value tree as JSON.
    ///
    /// Proxies and refs are seen through. `Undefined` and non-finite numbers
    /// become `null`. Shared sub-trees are fine; a container that contains
    /// itself is reported as [`Error::Cycle`].
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut path = HashSet::new();
        snapshot(self, &mut path)
    }
}

impl Raw {
    /// Build a raw container from a JSON object or array.
    pub fn from_json(json: serde_json::Value) -> Result<Raw> {
        match Value::from_json(json) {
            Value::Object(raw) => Ok(raw),
            other => Err(Error::NotAContainer {
                found: other.type_name(),
            }),
        }
    }
}

/// Integral numbers come out as JSON integers, the rest as floats.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn snapshot(value: &Value, path: &mut HashSet<SourceId>) -> Result<serde_json::Value> {
    let json = match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Ref(r) => snapshot(&r.value_untracked(), path)?,
        Value::Object(_) | Value::Proxy(_) => {
            let Some(raw) = value.as_raw() else {
                return Ok(serde_json::Value::Null);
            };
            if !path.insert(raw.id()) {
                return Err(Error::Cycle);
            }
            let json = if raw.is_array() {
                let items = raw
                    .values()
                    .iter()
                    .map(|v| snapshot(v, path))
                    .collect::<Result<Vec<_>>>()?;
                serde_json::Value::Array(items)
            } else {
                let mut map = Map::new();
                for key in raw.keys() {
                    map.insert(key.to_string(), snapshot(&raw.get(key.clone()), path)?);
                }
                serde_json::Value::Object(map)
            };
            path.remove(&raw.id());
            json
        }
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_preserves_shape() {
        let doc = json!({"name": "rain", "tags": ["a", "b"], "nested": {"n": 1.5}});
        let raw = Raw::from_json(doc.clone()).unwrap();
        assert_eq!(Value::from(&raw).to_json().unwrap(), doc);
    }

    #[test]
    fn non_finite_numbers_become_null() {
        let raw = Raw::array_from([f64::NAN, f64::INFINITY, 2.0]);
        assert_eq!(Value::from(&raw).to_json().unwrap(), json!([null, null, 2]));
    }

    #[test]
    fn primitives_are_not_containers() {
        assert_eq!(
            Raw::from_json(json!(1)).unwrap_err(),
            Error::NotAContainer { found: "number" }
        );
    }

    #[test]
    fn cycles_are_reported() {
        let raw = Raw::object();
        raw.set("me", &raw);
        assert_eq!(Value::from(&raw).to_json(), Err(Error::Cycle));
        // Break the cycle so the container can be released.
        raw.delete("me");
    }

    #[test]
    fn shared_subtrees_are_not_cycles() {
        let shared = Raw::object_from([("x", 1)]);
        let raw = Raw::object_from([("a", Value::from(&shared)), ("b", Value::from(&shared))]);
        assert_eq!(
            Value::from(&raw).to_json().unwrap(),
            json!({"a": {"x": 1}, "b": {"x": 1}})
        );
    }
}
