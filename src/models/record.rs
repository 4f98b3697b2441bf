//! Alert records and their content hash.

use crate::constants::MISSING_TIMESTAMP;
use crate::error::{TriageError, TriageResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// One alert: an arbitrary JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> TriageResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(TriageError::validation(format!(
                "record must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn parse_line(line: &[u8]) -> TriageResult<Self> {
        let value: Value = serde_json::from_slice(line)
            .map_err(|e| TriageError::validation(format!("invalid JSON record: {e}")))?;
        Self::from_value(value)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Field value rendered for display; strings are returned unquoted
    pub fn field_text(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn timestamp(&self, field: &str) -> String {
        self.field_text(field)
            .unwrap_or_else(|| MISSING_TIMESTAMP.to_string())
    }

    /// Compact JSON with object keys sorted at every depth
    pub fn canonical_json(&self) -> String {
        let mut out = String::new();
        write_canonical(&Value::Object(self.0.clone()), &mut out);
        out
    }

    /// Lowercase hex SHA-256 of [`Record::canonical_json`]
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_json().as_bytes()))
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on a JSON string value yields its quoted, escaped form
                let _ = write!(out, "{}", Value::String(key.clone()));
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
