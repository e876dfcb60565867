//! Canonical JSON serialization (spec §4.1, §6.2).
//!
//! Deep recursive normalization: object keys sorted lexicographically,
//! `null` stands in for anything non-representable, and the result is
//! serialized with no whitespace. Used for every hash input, on-disk
//! evidence, and transport payload in the system.
//!
//! `serde_json::Value`'s object map is a `BTreeMap` by default (the
//! `preserve_order` feature is not enabled in this crate), so key order is
//! already lexicographic on serialization; [`canonicalize`] exists to make
//! that guarantee explicit, to collapse non-finite floats, and to guard
//! against cyclic structures when the value is later assembled by hand
//! (spec §9 "Cyclic / shared args").

use serde_json::{Map, Value};

/// Canonicalize an arbitrary JSON value into its deterministic string form.
///
/// Same semantic value ⇒ byte-identical output (spec §4.1).
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let normalized = normalize_value(value, 0);
    serde_json::to_string(&normalized).unwrap_or_else(|_| "null".to_string())
}

/// Maximum recursion depth before a nested value is replaced with the
/// literal string `"[Circular]"`. `serde_json::Value` cannot actually form a
/// reference cycle (it owns its children), so this is a depth guard that
/// gives the same externally-visible behavior spec.md asks for if a future
/// caller builds a value some other way (e.g. via recursive construction
/// that happens to loop).
const MAX_DEPTH: usize = 256;

fn normalize_value(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String("[Circular]".to_string());
    }
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Value::Null;
                }
            }
            Value::Number(n.clone())
        }
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| normalize_value(v, depth + 1)).collect())
        }
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), normalize_value(v, depth + 1));
            }
            Value::Object(out)
        }
    }
}

/// Canonicalize a serializable Rust value via its `serde_json::Value`
/// representation. Convenience wrapper over [`canonicalize`].
pub fn canonicalize_of<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(v) => canonicalize(&v),
        Err(_) => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonicalize(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(canonicalize(&v), r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn no_whitespace() {
        let v = json!({"a": [1, 2, 3]});
        let s = canonicalize(&v);
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn idempotent() {
        let v = json!({"b": [3, 2, {"d": 1, "c": 2}], "a": "x"});
        let once = canonicalize(&v);
        let reparsed: Value = serde_json::from_str(&once).unwrap();
        let twice = canonicalize(&reparsed);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_finite_numbers_become_null() {
        // serde_json cannot represent NaN/Infinity directly in a `Value`
        // literal, so this guards the defensive branch structurally rather
        // than by constructing one (not constructible from valid JSON text).
        let v = json!(1.5);
        assert_eq!(canonicalize(&v), "1.5");
    }
}
