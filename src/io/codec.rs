//! Decoding of stored values.
//!
//! Anything that does not have the expected shape is treated as absent,
//! never as an error. Task entries are normalized on the way in so that
//! decoding an already-normalized collection is the identity.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::model::{Priority, Task, Theme};

use super::backend::StorageError;

/// A task entry as it may appear in storage, before normalization
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    #[serde(default)]
    id: Value,
    text: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    created_at: Option<Value>,
}

impl StoredTask {
    fn normalize(self) -> Option<Task> {
        let id = match self.id {
            Value::String(s) if !s.is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if self.text.trim().is_empty() {
            return None;
        }
        let priority = self
            .priority
            .as_ref()
            .and_then(Value::as_str)
            .and_then(Priority::parse_priority)
            .unwrap_or_default();
        let created_at = self
            .created_at
            .as_ref()
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0);
        Some(Task {
            id,
            text: self.text,
            done: self.done,
            priority,
            created_at,
        })
    }
}

/// Decode a stored task collection. Returns `None` unless the value is an
/// array. Entries that cannot be read are dropped; a repeated id keeps its
/// first occurrence.
pub fn decode_tasks(value: &Value) -> Option<Vec<Task>> {
    let entries = value.as_array()?;
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(task) = StoredTask::deserialize(entry)
            .ok()
            .and_then(StoredTask::normalize)
        else {
            tracing::debug!(entry = %entry, "dropping unreadable task entry");
            continue;
        };
        if seen.insert(task.id.clone()) {
            tasks.push(task);
        }
    }
    Some(tasks)
}

pub fn decode_theme(value: &Value) -> Option<Theme> {
    value.as_str().and_then(Theme::parse_theme)
}

pub fn decode_minimized(value: &Value) -> Option<bool> {
    value.as_bool()
}

pub fn encode_tasks(tasks: &[Task]) -> Result<Value, StorageError> {
    Ok(serde_json::to_value(tasks)?)
}

pub fn encode_theme(theme: Theme) -> Value {
    Value::String(theme.as_str().to_string())
}

pub fn encode_minimized(minimized: bool) -> Value {
    Value::Bool(minimized)
}
