//! The workflow engine: trigger matching, run creation and retry.

use std::sync::Arc;

use relay_integrations::IntegrationRegistry;
use relay_store::{Run, RunStatus, Store, Trigger, Workflow};
use tracing::{error, info};

use crate::def::WorkflowDef;
use crate::error::EngineError;
use crate::executor::execute_run;

/// The workflow run execution engine.
///
/// Run execution is fire-and-forget: creation returns the fresh
/// `Pending` run immediately and a detached task drives it to a terminal
/// state. Progress is observable only through the store.
pub struct WorkflowEngine {
  store: Arc<dyn Store>,
  registry: Arc<IntegrationRegistry>,
}

impl WorkflowEngine {
  /// Create a new engine over a store and an integration registry.
  pub fn new(store: Arc<dyn Store>, registry: Arc<IntegrationRegistry>) -> Self {
    Self { store, registry }
  }

  /// The underlying store, for read-only inspection of runs.
  pub fn store(&self) -> &Arc<dyn Store> {
    &self.store
  }

  /// Validate and persist a new workflow, returning it with minted ids.
  pub async fn create_workflow(&self, def: WorkflowDef) -> Result<Workflow, EngineError> {
    let workflow = def.build()?;
    self.store.create_workflow(&workflow).await?;
    info!(
      workflow_id = %workflow.id,
      name = %workflow.name,
      steps = workflow.steps.len(),
      "workflow created"
    );
    Ok(workflow)
  }

  /// Match a trigger to a workflow and start a run for it.
  ///
  /// Returns `Ok(None)` when no workflow is registered for the trigger;
  /// that is a non-event, not an error. The returned run is `Pending`;
  /// execution has been handed to a detached task.
  pub async fn trigger(&self, trigger: &Trigger) -> Result<Option<Run>, EngineError> {
    info!(
      trigger_type = %trigger.trigger_type,
      trigger_value = %trigger.value,
      "trigger received"
    );

    let Some(workflow) = self
      .store
      .find_workflow_by_trigger(&trigger.trigger_type, &trigger.value)
      .await?
    else {
      info!(
        trigger_type = %trigger.trigger_type,
        trigger_value = %trigger.value,
        "no workflow for trigger"
      );
      return Ok(None);
    };

    let run = self.start_run(workflow, None).await?;
    Ok(Some(run))
  }

  /// Retry a failed run as a fresh attempt.
  ///
  /// Only `Failed` runs are retryable. The new run is created against
  /// the workflow's current definition and carries `retry_of` for
  /// lineage; the original run is left untouched.
  pub async fn retry(&self, run_id: &str) -> Result<Run, EngineError> {
    let run = match self.store.get_run(run_id).await {
      Ok(run) => run,
      Err(relay_store::Error::NotFound(_)) => {
        return Err(EngineError::RunNotFound(run_id.to_string()));
      }
      Err(e) => return Err(e.into()),
    };

    if run.status != RunStatus::Failed {
      return Err(EngineError::InvalidState {
        run_id: run.id,
        status: run.status,
      });
    }

    let workflow = match self.store.get_workflow(&run.workflow_id).await {
      Ok(workflow) => workflow,
      Err(relay_store::Error::NotFound(_)) => {
        return Err(EngineError::WorkflowMissing {
          run_id: run.id,
          workflow_id: run.workflow_id,
        });
      }
      Err(e) => return Err(e.into()),
    };

    info!(original_run_id = %run.id, workflow_id = %workflow.id, "retrying run");
    self.start_run(workflow, Some(run.id)).await
  }

  /// Get a run with its step-runs.
  pub async fn get_run(&self, run_id: &str) -> Result<Run, EngineError> {
    match self.store.get_run(run_id).await {
      Ok(run) => Ok(run),
      Err(relay_store::Error::NotFound(_)) => Err(EngineError::RunNotFound(run_id.to_string())),
      Err(e) => Err(e.into()),
    }
  }

  /// List runs for a workflow, most recent first.
  pub async fn list_runs(&self, workflow_id: &str) -> Result<Vec<Run>, EngineError> {
    Ok(self.store.list_runs(workflow_id).await?)
  }

  /// Create the run with its pending step-runs and hand execution to a
  /// detached task.
  async fn start_run(&self, workflow: Workflow, retry_of: Option<String>) -> Result<Run, EngineError> {
    let run = Run::for_workflow(&workflow, retry_of);
    self.store.create_run(&run).await?;

    info!(
      run_id = %run.id,
      workflow_id = %workflow.id,
      step_runs = run.step_runs.len(),
      retry_of = run.retry_of.as_deref().unwrap_or("-"),
      "run created"
    );

    let store = self.store.clone();
    let registry = self.registry.clone();
    let spawned = run.clone();
    tokio::spawn(async move {
      let run_id = spawned.id.clone();
      if let Err(e) = execute_run(store, registry, spawned, workflow).await {
        // A failed status write leaves the run at its last persisted
        // state; callers observe that state, not this error.
        error!(run_id = %run_id, error = %e, "run execution aborted");
      }
    });

    Ok(run)
  }
}
