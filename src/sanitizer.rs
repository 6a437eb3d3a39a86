//! Parameter Sanitizer (C9, §4.9).
//!
//! Recursively normalizes a submitted parameter tree before persistence so
//! the sanitized payload never carries a field past the record store's
//! document-size ceiling (§3 invariant 4). Pure function, no I/O — the
//! design notes (§9) call for exactly this: "a transformation on a
//! recursive sum type". `serde_json::Value` already is that sum type, so
//! `sanitize` is a straightforward recursive match over it, the same shape
//! as the teacher's `Reservation::{Workflow,Node,Link}` match dispatch.

use serde_json::{Map, Value};

const MAX_STRING_BYTES: usize = 10_000;
const MAX_SHORT_FIELD_BYTES: usize = 1_000;
const SENSITIVE_VALUE_PLACEHOLDER: &str = "[redacted: stored in artifact store]";

const SENSITIVE_KEYS: &[&str] =
    &["content", "filecontent", "file_content", "data", "filedata", "file_data", "body", "payload", "source", "sourcecode", "source_code"];

const FILE_ENTRY_KEPT_KEYS: &[&str] = &["name", "filename", "file_name", "path", "filepath", "file_path", "size", "type", "mimetype", "mime_type", "extension"];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&lower.as_str())
}

fn truncated_string_placeholder(original: &str) -> Value {
    Value::String(format!("[truncated: {} bytes omitted]", original.len()))
}

/// Sanitizes a single string value, replacing it if it's over the size
/// ceiling. Strings under the ceiling pass through unchanged.
fn sanitize_string(s: &str) -> Value {
    if s.len() > MAX_STRING_BYTES {
        truncated_string_placeholder(s)
    } else {
        Value::String(s.to_string())
    }
}

/// Sanitizes one element of a `files` array: keeps only the allow-listed
/// metadata fields, replaces `content|data|body` with the sensitive-value
/// placeholder, and passes through any other short string field.
fn sanitize_file_entry(entry: &Map<String, Value>) -> Value {
    let mut out = Map::new();

    for (key, value) in entry {
        let lower = key.to_ascii_lowercase();

        if is_sensitive_key(key) {
            out.insert(key.clone(), Value::String(SENSITIVE_VALUE_PLACEHOLDER.to_string()));
            continue;
        }

        if FILE_ENTRY_KEPT_KEYS.contains(&lower.as_str()) {
            out.insert(key.clone(), sanitize_value(value));
            continue;
        }

        match value {
            Value::String(s) if s.len() <= MAX_SHORT_FIELD_BYTES => {
                out.insert(key.clone(), Value::String(s.clone()));
            }
            Value::String(s) => {
                out.insert(key.clone(), truncated_string_placeholder(s));
            }
            _ => {
                out.insert(key.clone(), sanitize_value(value));
            }
        }
    }

    Value::Object(out)
}

fn looks_like_files_array(key: &str) -> bool {
    key.eq_ignore_ascii_case("files")
}

/// Recursively sanitizes a JSON value tree.
pub fn sanitize(value: &Value) -> Value {
    sanitize_value(value)
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(s) => sanitize_string(s),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(SENSITIVE_VALUE_PLACEHOLDER.to_string()));
                    continue;
                }

                if looks_like_files_array(key) {
                    if let Value::Array(items) = v {
                        out.insert(
                            key.clone(),
                            Value::Array(
                                items
                                    .iter()
                                    .map(|item| match item {
                                        Value::Object(entry) => sanitize_file_entry(entry),
                                        other => sanitize_value(other),
                                    })
                                    .collect(),
                            ),
                        );
                        continue;
                    }
                }

                out.insert(key.clone(), sanitize_value(v));
            }
            Value::Object(out)
        }
    }
}
