//! Deep transformations over the engine's data model.
//!
//! The detection passes need two whole-graph operations on a data binding:
//! rewriting every reachable string through a transform (placeholder
//! substitution, code-point doubling) and scanning every reachable string
//! for characters that are meaningful to a target grammar. Both walk a
//! [`serde_json::Value`] tree, which is the value model the template engine
//! consumes; mapping keys are strings in this model and take part in both
//! operations. Non-string scalars are reproduced verbatim.

use serde_json::{Map, Value};

/// Returns a copy of `value` in which every reachable string `s` has been
/// replaced by `f(s)`, preserving shape, sequence order and key
/// associations. Mapping keys are transformed like any other string.
pub(crate) fn transform_strings(value: &Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| transform_strings(v, f)).collect())
        }
        Value::Object(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (key, child) in entries {
                out.insert(f(key), transform_strings(child, f));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// True if any reachable string (mapping keys included) contains a
/// character from `specials`.
pub(crate) fn contains_special_strings(value: &Value, specials: &str) -> bool {
    match value {
        Value::String(s) => s.chars().any(|c| specials.contains(c)),
        Value::Array(items) => items.iter().any(|v| contains_special_strings(v, specials)),
        Value::Object(entries) => entries.iter().any(|(key, child)| {
            key.chars().any(|c| specials.contains(c)) || contains_special_strings(child, specials)
        }),
        _ => false,
    }
}

/// Doubles every code point of `s`. The workhorse of the mutated pass: a
/// string that contributes structure to the output parses differently once
/// each of its characters appears twice, while a string that only fills a
/// scalar slot does not.
pub(crate) fn double_runes(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        out.push(c);
        out.push(c);
    }
    out
}
