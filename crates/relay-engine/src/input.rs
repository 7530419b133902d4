//! Step input resolution.
//!
//! A step's input mapping rewrites its configuration before dispatch.
//! Each mapping value is either a `"<source-step-id>:<dot.path>"`
//! reference into a prior step's recorded output, or a literal string
//! assigned as-is. Resolution is best effort: a reference to a missing
//! output or a dead path segment yields JSON null for that key rather
//! than failing the step.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::warn;

/// Produce a step's resolved configuration.
///
/// The stored configuration is cloned, never mutated. `outputs` is keyed
/// by step definition id and holds the recorded outputs of the steps that
/// already completed in this run.
pub fn resolve_config(
  config: &Value,
  input_mapping: Option<&BTreeMap<String, String>>,
  outputs: &HashMap<String, Value>,
) -> Value {
  let mut resolved = config.as_object().cloned().unwrap_or_default();

  let Some(mapping) = input_mapping else {
    return Value::Object(resolved);
  };

  for (key, value) in mapping {
    match value.split_once(':') {
      Some((source_id, path)) => {
        let looked_up = outputs.get(source_id).and_then(|output| follow_path(output, path));
        if looked_up.is_none() {
          warn!(source_id, path, key, "input mapping reference did not resolve");
        }
        resolved.insert(key.clone(), looked_up.cloned().unwrap_or(Value::Null));
      }
      // No separator: a literal, passed through untouched.
      None => {
        resolved.insert(key.clone(), Value::String(value.clone()));
      }
    }
  }

  Value::Object(resolved)
}

/// Descend a value by a dot-separated path.
///
/// Objects are descended by field name, arrays by numeric index. `None`
/// marks an absent value; the caller decides what absence means.
fn follow_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  let mut current = value;
  for segment in path.split('.') {
    current = match current {
      Value::Object(map) => map.get(segment)?,
      Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(current)
}
