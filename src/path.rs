use serde_json::{Map, Value};

use crate::errors::PathError;

/// Result of a [`write`] that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// An existing non-object value sits at `at`, so the path cannot be
    /// traversed. Nothing was written.
    Blocked { at: String },
}

/// Read the value at a dotted path such as `a.b.0.c`.
///
/// Numeric segments index arrays. Anything that does not resolve yields
/// `None`. Object and array leaves come back as their canonical JSON text,
/// so callers only ever receive scalars or strings.
pub fn resolve(doc: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = doc;
    for seg in path.split('.') {
        current = match current {
            Value::Array(arr) => arr.get(seg.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(seg)?,
            _ => return None,
        };
    }
    Some(stringify_nested(current))
}

/// Objects and arrays become their JSON text; scalars are cloned.
pub(crate) fn stringify_nested(v: &Value) -> Value {
    match v {
        Value::Object(_) | Value::Array(_) => {
            // serializing a Value with string keys cannot fail
            Value::String(serde_json::to_string(v).unwrap_or_default())
        }
        other => other.clone(),
    }
}

/// Split a target path, rejecting empty paths and empty segments.
pub fn segments(path: &str) -> Result<Vec<&str>, PathError> {
    if path.trim().is_empty() {
        return Err(PathError::Empty);
    }
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(parts)
}

/// Write `value` at a dotted path inside `target`, creating intermediate
/// objects. The final segment is overwritten unconditionally.
pub fn write(
    target: &mut Map<String, Value>,
    path: &str,
    value: Value,
) -> Result<WriteOutcome, PathError> {
    let parts = segments(path)?;
    let (last, parents) = match parts.split_last() {
        Some(split) => split,
        None => return Err(PathError::Empty),
    };

    let mut current = target;
    for (depth, part) in parents.iter().enumerate() {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match slot {
            Value::Object(map) => map,
            _ => {
                return Ok(WriteOutcome::Blocked {
                    at: parts[..=depth].join("."),
                })
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(WriteOutcome::Written)
}
