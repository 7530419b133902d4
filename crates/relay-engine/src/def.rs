//! Workflow definition input.
//!
//! A [`WorkflowDef`] is the author-facing description of a workflow,
//! parsed from JSON. The engine validates it, mints ids and turns it
//! into a stored [`Workflow`](relay_store::Workflow).

use std::collections::BTreeMap;

use chrono::Utc;
use relay_store::{Json, Workflow, WorkflowStep};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Author-facing workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub trigger_type: String,
  pub trigger_value: String,
  #[serde(default)]
  pub steps: Vec<StepDef>,
}

/// One step within a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
  pub step_type: String,
  #[serde(default)]
  pub step_config: Option<serde_json::Value>,
  /// Config key -> literal or `"<source>:<dot.path>"` reference, where
  /// `<source>` names an earlier step by its `step_order`.
  #[serde(default)]
  pub input_mapping: Option<BTreeMap<String, String>>,
  pub step_order: i32,
}

impl WorkflowDef {
  /// Validate the definition and build a stored workflow with minted ids.
  ///
  /// Step order values must be unique within the workflow. Input-mapping
  /// references written against step orders are rewritten to the minted
  /// step ids, since orders are the only handle an author has before ids
  /// exist.
  pub fn build(self) -> Result<Workflow, EngineError> {
    let workflow_id = uuid::Uuid::new_v4().to_string();

    let mut defs = self.steps;
    defs.sort_by_key(|d| d.step_order);
    for pair in defs.windows(2) {
      if pair[0].step_order == pair[1].step_order {
        return Err(EngineError::InvalidWorkflow(format!(
          "duplicate step_order {} in workflow '{}'",
          pair[0].step_order, self.name
        )));
      }
    }

    let ids_by_order: BTreeMap<i32, String> = defs
      .iter()
      .map(|d| (d.step_order, uuid::Uuid::new_v4().to_string()))
      .collect();

    let steps = defs
      .into_iter()
      .map(|def| WorkflowStep {
        id: ids_by_order[&def.step_order].clone(),
        workflow_id: workflow_id.clone(),
        step_type: def.step_type,
        step_config: Json(
          def
            .step_config
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        ),
        input_mapping: def.input_mapping.map(|mapping| {
          Json(
            mapping
              .into_iter()
              .map(|(key, value)| (key, rewrite_reference(&value, &ids_by_order)))
              .collect(),
          )
        }),
        step_order: def.step_order,
      })
      .collect();

    Ok(Workflow {
      id: workflow_id,
      name: self.name,
      description: self.description,
      trigger_type: self.trigger_type,
      trigger_value: self.trigger_value,
      created_at: Utc::now(),
      steps,
    })
  }
}

/// Rewrite `"<order>:<path>"` to `"<step-id>:<path>"` when `<order>`
/// names a step of this workflow; anything else is left untouched.
fn rewrite_reference(value: &str, ids_by_order: &BTreeMap<i32, String>) -> String {
  let Some((source, path)) = value.split_once(':') else {
    return value.to_string();
  };
  match source.parse::<i32>().ok().and_then(|o| ids_by_order.get(&o)) {
    Some(id) => format!("{id}:{path}"),
    None => value.to_string(),
  }
}
