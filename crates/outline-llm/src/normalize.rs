//! Folding stray `description` fields into the content field.
//!
//! Models sometimes describe a node with a `description` string or object
//! next to its other fields. Those are flattened into `key: value` lines
//! (lists become `key:` followed by `- item` lines), written to the content
//! field, and removed, starting with the top-level object.

use serde_json::{Map, Value};

const DESCRIPTION: &str = "description";

pub fn normalize_descriptions(value: Value, content_field: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_object(map, content_field)),
        other => other,
    }
}

fn normalize_node(node: Value, content_field: &str) -> Value {
    match node {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_node(item, content_field))
                .collect(),
        ),
        Value::Object(map) => Value::Object(normalize_object(map, content_field)),
        other => other,
    }
}

fn normalize_object(mut map: Map<String, Value>, content_field: &str) -> Map<String, Value> {
    if let Some(description) = map.remove(DESCRIPTION) {
        let flattened = flatten_description(&description);
        let keep_existing = matches!(map.get(content_field), Some(Value::Array(items)) if !items.is_empty());
        if !flattened.is_empty() && !keep_existing {
            map.insert(content_field.to_string(), Value::String(flattened));
        }
    }

    map.into_iter()
        .map(|(key, child)| {
            if key == content_field {
                (key, child)
            } else {
                (key, normalize_node(child, content_field))
            }
        })
        .collect()
}

fn flatten_description(description: &Value) -> String {
    match description {
        Value::String(text) => text.clone(),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, value)| match value {
                Value::Array(items) => {
                    let lines: Vec<String> = items.iter().map(|v| format!("- {}", scalar_text(v))).collect();
                    format!("{key}:\n{}", lines.join("\n"))
                }
                other => format!("{key}: {}", scalar_text(other)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
