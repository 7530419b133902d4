//! Run execution.
//!
//! Drives one run to a terminal state: steps strictly in ascending
//! order, each step-run transitioned through
//! `Pending -> Running -> {Completed | Failed}` with a persisted write
//! before the next step begins. The first failing step fails the run;
//! later step-runs stay `Pending` permanently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use relay_integrations::IntegrationRegistry;
use relay_store::{Json, Run, RunStatus, StepRun, StepStatus, Store, Workflow};
use tracing::{error, info, instrument};

use crate::error::EngineError;
use crate::input::resolve_config;

/// Execute a run to completion or failure.
///
/// Every status transition is persisted as it happens, so a crash
/// mid-run leaves the last-recorded status accurate for every step
/// already attempted. A persistence failure aborts the attempt and is
/// surfaced to the spawning task, which logs it; the run keeps its last
/// persisted status.
#[instrument(
  name = "run_execute",
  skip_all,
  fields(run_id = %run.id, workflow_id = %workflow.id)
)]
pub(crate) async fn execute_run(
  store: Arc<dyn Store>,
  registry: Arc<IntegrationRegistry>,
  mut run: Run,
  workflow: Workflow,
) -> Result<(), EngineError> {
  info!(
    workflow_name = %workflow.name,
    steps = workflow.steps.len(),
    "run_started"
  );

  run.status = RunStatus::Running;
  store
    .update_run_status(&run.id, RunStatus::Running, None, None)
    .await?;

  if workflow.steps.is_empty() {
    store
      .update_run_status(&run.id, RunStatus::Completed, Some(Utc::now()), None)
      .await?;
    info!("run_completed");
    return Ok(());
  }

  // Outputs of completed steps, keyed by step definition id, feeding
  // later steps' input mappings.
  let mut outputs: HashMap<String, serde_json::Value> = HashMap::new();

  for (index, (step, step_run)) in workflow
    .steps
    .iter()
    .zip(run.step_runs.iter_mut())
    .enumerate()
  {
    let position = index + 1;

    step_run.status = StepStatus::Running;
    step_run.started_at = Utc::now();
    store.update_step_run(step_run).await?;

    let resolved = resolve_config(
      &step.step_config.0,
      step.input_mapping.as_ref().map(|m| &m.0),
      &outputs,
    );

    info!(
      step_run_id = %step_run.id,
      step_type = %step.step_type,
      position,
      "step_started"
    );

    let result = registry.execute(&step.step_type, &resolved).await;

    if result.success {
      let output = result.to_value();
      step_run.status = StepStatus::Completed;
      step_run.completed_at = Some(Utc::now());
      step_run.output = Some(Json(output.clone()));
      store.update_step_run(step_run).await?;
      outputs.insert(step.id.clone(), output);

      info!(
        step_run_id = %step_run.id,
        step_type = %step.step_type,
        position,
        "step_completed"
      );
    } else {
      let message = result
        .error
        .unwrap_or_else(|| "integration reported failure".to_string());

      step_run.status = StepStatus::Failed;
      step_run.completed_at = Some(Utc::now());
      step_run.error_message = Some(message.clone());
      store.update_step_run(step_run).await?;

      let run_error = format!("step {position} ({}) failed: {message}", step.step_type);
      store
        .update_run_status(&run.id, RunStatus::Failed, Some(Utc::now()), Some(&run_error))
        .await?;

      error!(
        step_run_id = %step_run.id,
        step_type = %step.step_type,
        position,
        error = %message,
        "run_failed"
      );
      return Ok(());
    }
  }

  store
    .update_run_status(&run.id, RunStatus::Completed, Some(Utc::now()), None)
    .await?;
  info!(steps = workflow.steps.len(), "run_completed");
  Ok(())
}
