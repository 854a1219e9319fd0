//! Path reads and writes on the serialized options tree.
//!
//! Unmarshalling never touches the caller's struct field by field. The
//! current value is serialized into a `serde_json::Value`, resolved values are
//! written into that tree by field path, and the tree is deserialized back in
//! one step.
//!
//! `{"database": null}` + (`database.url`, `"pg://"`) becomes
//! `{"database": {"url": "pg://", ...zero values of the other fields}}`.

use serde_json::{Map, Value};

use crate::error::StructcliError;
use crate::walk::NestedNode;

/// Read the value at `path`, if every segment exists.
pub fn get_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| current.get(*segment))
}

/// Write `value` at `path`.
///
/// Missing or null intermediate nodes are replaced by the zero value of their
/// nested options type (an empty object when the type is unknown).
pub(crate) fn set_path(
    root: &mut Value,
    path: &[&'static str],
    value: Value,
    nested: &[NestedNode],
) -> Result<(), StructcliError> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let object = as_object(current, &path[..depth])?;
        let slot = object.entry(segment.to_string()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = zero_for(&path[..=depth], nested)?;
        }
        current = slot;
    }

    let object = as_object(current, parents)?;
    object.insert(last.to_string(), value);
    Ok(())
}

fn as_object<'a>(
    value: &'a mut Value,
    at: &[&str],
) -> Result<&'a mut Map<String, Value>, StructcliError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StructcliError::Tree {
            path: at.join("."),
            reason: format!("expected a struct, found {}", kind_of(other)),
        }),
    }
}

fn zero_for(path: &[&'static str], nested: &[NestedNode]) -> Result<Value, StructcliError> {
    match nested.iter().find(|n| n.path == path) {
        Some(node) => (node.zero)().map_err(|e| StructcliError::Tree {
            path: path.join("."),
            reason: e.to_string(),
        }),
        None => Ok(Value::Object(Map::new())),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a struct",
    }
}
