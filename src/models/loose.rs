//! Deserializers for operator-supplied rows, where spreadsheet cells arrive as
//! strings, numbers or booleans depending on the exporter.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any scalar as trimmed text; `null`, blank strings and containers become `None`.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(scalar_text))
}

pub fn scalar_text(value: Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
