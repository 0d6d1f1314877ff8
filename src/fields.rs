//! Discover the dotted paths a sample payload offers for mapping.

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

/// One mappable path with a hint of what it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sample: Value,
}

const ARRAY_KIND: &str = "array (→ JSON string)";
const OBJECT_KIND: &str = "object (→ JSON string)";
const SAMPLE_LEN: usize = 3;

/// Leaf paths of `doc` in document order.
///
/// Arrays are listed themselves; when their first element is an object its
/// fields are listed under `<array>.0`.
pub fn field_paths(doc: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_paths(doc, "", &mut out);
    out
}

fn collect_paths(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Array(arr) => {
            if let Some(first) = arr.first() {
                collect_paths(first, &join(prefix, "0"), out);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                let path = join(prefix, key);
                match value {
                    Value::Array(arr) => {
                        out.push(path.clone());
                        if let Some(first @ Value::Object(_)) = arr.first() {
                            collect_paths(first, &join(&path, "0"), out);
                        }
                    }
                    Value::Object(_) => collect_paths(value, &path, out),
                    _ => out.push(path),
                }
            }
        }
        _ => {}
    }
}

/// Paths of `doc` with their type and a short sample value.
pub fn fields_with_info(doc: &Value) -> Vec<FieldInfo> {
    let mut out = Vec::new();
    collect_info(doc, "", &mut out);
    out
}

fn collect_info(v: &Value, prefix: &str, out: &mut Vec<FieldInfo>) {
    match v {
        Value::Array(arr) => {
            if let Some(first) = arr.first() {
                collect_info(first, &join(prefix, "0"), out);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                let path = join(prefix, key);
                match value {
                    Value::Null => out.push(FieldInfo {
                        path,
                        kind: "null".into(),
                        sample: Value::Null,
                    }),
                    Value::Array(arr) => {
                        out.push(FieldInfo {
                            path: path.clone(),
                            kind: ARRAY_KIND.into(),
                            sample: Value::String(array_sample(arr)),
                        });
                        if let Some(first @ Value::Object(_)) = arr.first() {
                            collect_info(first, &join(&path, "0"), out);
                        }
                    }
                    Value::Object(inner) => {
                        out.push(FieldInfo {
                            path: path.clone(),
                            kind: OBJECT_KIND.into(),
                            sample: Value::String(object_sample(inner)),
                        });
                        collect_info(value, &path, out);
                    }
                    Value::Bool(_) => out.push(scalar(path, "boolean", value)),
                    Value::Number(_) => out.push(scalar(path, "number", value)),
                    Value::String(_) => out.push(scalar(path, "string", value)),
                }
            }
        }
        _ => {}
    }
}

fn scalar(path: String, kind: &str, value: &Value) -> FieldInfo {
    FieldInfo {
        path,
        kind: kind.into(),
        sample: value.clone(),
    }
}

fn array_sample(arr: &[Value]) -> String {
    let shown: Vec<Value> = if arr.len() > SAMPLE_LEN {
        arr.iter()
            .take(SAMPLE_LEN)
            .cloned()
            .chain(std::iter::once(Value::String("...".into())))
            .collect()
    } else {
        arr.to_vec()
    };
    Value::Array(shown).to_string()
}

fn object_sample(map: &Map<String, Value>) -> String {
    let keys = map.keys().take(SAMPLE_LEN).join(", ");
    let more = if map.len() > SAMPLE_LEN { ", ..." } else { "" };
    format!("{{{keys}{more}}}")
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
