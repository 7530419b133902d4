use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

/// Status of a single step-run within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StepStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

/// The `(type, value)` pair a workflow is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
  #[serde(rename = "type")]
  pub trigger_type: String,
  pub value: String,
}

/// A workflow definition. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Workflow {
  pub id: String,
  pub name: String,
  pub description: String,
  pub trigger_type: String,
  pub trigger_value: String,
  pub created_at: DateTime<Utc>,
  /// Steps in ascending `step_order`. Not a table column; loaded
  /// alongside the workflow row.
  #[sqlx(skip)]
  pub steps: Vec<WorkflowStep>,
}

/// One step definition within a workflow.
///
/// `input_mapping` maps a config key to either a literal string or a
/// `"<source-step-id>:<dot.path>"` reference into a prior step's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowStep {
  pub id: String,
  pub workflow_id: String,
  pub step_type: String,
  pub step_config: Json<serde_json::Value>,
  pub input_mapping: Option<Json<BTreeMap<String, String>>>,
  pub step_order: i32,
}

/// One execution attempt of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Run {
  pub id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  /// The trigger that started the run, copied at creation time.
  pub trigger_type: String,
  pub trigger_value: String,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error_message: Option<String>,
  /// Id of the failed run this run is a retry of, if any.
  pub retry_of: Option<String>,
  /// Step-runs in definition order. Not a table column; loaded
  /// alongside the run row.
  #[sqlx(skip)]
  pub step_runs: Vec<StepRun>,
}

/// One execution attempt of one step within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StepRun {
  pub id: String,
  pub run_id: String,
  pub step_id: String,
  pub step_order: i32,
  pub status: StepStatus,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub output: Option<Json<serde_json::Value>>,
  pub error_message: Option<String>,
}

impl Run {
  /// Materialize a fresh run for a workflow: run in `Pending`, one
  /// `Pending` step-run per step in definition order.
  pub fn for_workflow(workflow: &Workflow, retry_of: Option<String>) -> Self {
    let run_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    let step_runs = workflow
      .steps
      .iter()
      .map(|step| StepRun {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: run_id.clone(),
        step_id: step.id.clone(),
        step_order: step.step_order,
        status: StepStatus::Pending,
        started_at: now,
        completed_at: None,
        output: None,
        error_message: None,
      })
      .collect();

    Self {
      id: run_id,
      workflow_id: workflow.id.clone(),
      status: RunStatus::Pending,
      trigger_type: workflow.trigger_type.clone(),
      trigger_value: workflow.trigger_value.clone(),
      started_at: now,
      completed_at: None,
      error_message: None,
      retry_of,
      step_runs,
    }
  }
}
