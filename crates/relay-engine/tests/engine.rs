//! End-to-end engine tests over an in-memory SQLite store.
//!
//! Execution is fire-and-forget, so these tests observe progress the
//! same way real callers do: by polling persisted run state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_engine::{EngineError, StepDef, WorkflowDef, WorkflowEngine};
use relay_integrations::{Integration, IntegrationRegistry, IntegrationResult};
use relay_store::{Run, RunStatus, SqliteStore, StepStatus, Store, Trigger};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;

/// Succeeds, echoing the object under the config's `payload` key as the
/// result payload.
struct StaticIntegration;

#[async_trait]
impl Integration for StaticIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let payload = config
      .get("payload")
      .and_then(Value::as_object)
      .cloned()
      .unwrap_or_default();
    IntegrationResult::ok_with(payload)
  }
}

/// Succeeds, recording the full resolved config it was dispatched with.
struct EchoIntegration;

#[async_trait]
impl Integration for EchoIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let mut payload = serde_json::Map::new();
    payload.insert("config".to_string(), config.clone());
    IntegrationResult::ok_with(payload)
  }
}

/// Always reports failure.
struct FailingIntegration;

#[async_trait]
impl Integration for FailingIntegration {
  async fn execute(&self, _config: &Value) -> IntegrationResult {
    IntegrationResult::failure("boom")
  }
}

async fn test_engine() -> (WorkflowEngine, Arc<SqliteStore>) {
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .unwrap();
  let store = Arc::new(SqliteStore::new(pool));
  store.migrate().await.unwrap();

  let mut registry = IntegrationRegistry::new();
  registry.register("static", Arc::new(StaticIntegration));
  registry.register("echo", Arc::new(EchoIntegration));
  registry.register("fail", Arc::new(FailingIntegration));

  let engine = WorkflowEngine::new(store.clone(), Arc::new(registry));
  (engine, store)
}

fn step(step_type: &str, step_order: i32) -> StepDef {
  StepDef {
    step_type: step_type.to_string(),
    step_config: None,
    input_mapping: None,
    step_order,
  }
}

fn workflow_def(trigger_value: &str, steps: Vec<StepDef>) -> WorkflowDef {
  WorkflowDef {
    name: format!("wf-{trigger_value}"),
    description: String::new(),
    trigger_type: "webhook".to_string(),
    trigger_value: trigger_value.to_string(),
    steps,
  }
}

fn trigger(value: &str) -> Trigger {
  Trigger {
    trigger_type: "webhook".to_string(),
    value: value.to_string(),
  }
}

async fn wait_for_terminal(store: &SqliteStore, run_id: &str) -> Run {
  for _ in 0..500 {
    let run = store.get_run(run_id).await.unwrap();
    if matches!(run.status, RunStatus::Completed | RunStatus::Failed) {
      return run;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("run {run_id} did not reach a terminal state");
}

#[tokio::test]
async fn zero_step_workflow_completes_immediately() {
  let (engine, store) = test_engine().await;
  engine
    .create_workflow(workflow_def("empty", vec![]))
    .await
    .unwrap();

  let run = engine.trigger(&trigger("empty")).await.unwrap().unwrap();
  assert!(run.step_runs.is_empty());

  let done = wait_for_terminal(&store, &run.id).await;
  assert_eq!(done.status, RunStatus::Completed);
  assert!(done.step_runs.is_empty());
  assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn run_materializes_pending_step_runs_in_definition_order() {
  let (engine, _store) = test_engine().await;
  let workflow = engine
    .create_workflow(workflow_def(
      "ordered",
      vec![step("static", 1), step("static", 2), step("static", 3)],
    ))
    .await
    .unwrap();

  let run = engine.trigger(&trigger("ordered")).await.unwrap().unwrap();

  assert_eq!(run.status, RunStatus::Pending);
  assert_eq!(run.workflow_id, workflow.id);
  assert_eq!(run.trigger_type, "webhook");
  assert_eq!(run.trigger_value, "ordered");
  assert_eq!(run.step_runs.len(), 3);
  for (step_run, step) in run.step_runs.iter().zip(&workflow.steps) {
    assert_eq!(step_run.step_id, step.id);
    assert_eq!(step_run.status, StepStatus::Pending);
    assert_eq!(step_run.run_id, run.id);
  }
}

#[tokio::test]
async fn all_steps_succeeding_completes_the_run() {
  let (engine, store) = test_engine().await;
  engine
    .create_workflow(workflow_def(
      "happy",
      vec![step("static", 1), step("static", 2)],
    ))
    .await
    .unwrap();

  let run = engine.trigger(&trigger("happy")).await.unwrap().unwrap();
  let done = wait_for_terminal(&store, &run.id).await;

  assert_eq!(done.status, RunStatus::Completed);
  assert!(done.error_message.is_none());
  for step_run in &done.step_runs {
    assert_eq!(step_run.status, StepStatus::Completed);
    assert!(step_run.completed_at.is_some());
    let output = &step_run.output.as_ref().unwrap().0;
    assert_eq!(output["success"], json!(true));
  }
}

#[tokio::test]
async fn failing_step_fails_the_run_and_leaves_later_steps_pending() {
  let (engine, store) = test_engine().await;
  engine
    .create_workflow(workflow_def(
      "midfail",
      vec![step("static", 1), step("fail", 2), step("static", 3)],
    ))
    .await
    .unwrap();

  let run = engine.trigger(&trigger("midfail")).await.unwrap().unwrap();
  let done = wait_for_terminal(&store, &run.id).await;

  assert_eq!(done.status, RunStatus::Failed);
  assert_eq!(
    done.error_message.as_deref(),
    Some("step 2 (fail) failed: boom")
  );
  assert_eq!(done.step_runs[0].status, StepStatus::Completed);
  assert_eq!(done.step_runs[1].status, StepStatus::Failed);
  assert_eq!(done.step_runs[1].error_message.as_deref(), Some("boom"));
  // Steps after the failure are never started, not marked skipped.
  assert_eq!(done.step_runs[2].status, StepStatus::Pending);
  assert!(done.step_runs[2].completed_at.is_none());
}

#[tokio::test]
async fn outputs_flow_between_steps_via_input_mapping() {
  let (engine, store) = test_engine().await;

  let mut producer = step("static", 1);
  producer.step_config = Some(json!({ "payload": { "items": [{ "id": 123 }] } }));
  let mut consumer = step("echo", 2);
  consumer.input_mapping = Some(BTreeMap::from([
    ("data".to_string(), "1:items.0.id".to_string()),
    ("missing".to_string(), "1:items.9.id".to_string()),
    ("label".to_string(), "literal-label".to_string()),
  ]));

  engine
    .create_workflow(workflow_def("mapped", vec![producer, consumer]))
    .await
    .unwrap();

  let run = engine.trigger(&trigger("mapped")).await.unwrap().unwrap();
  let done = wait_for_terminal(&store, &run.id).await;

  assert_eq!(done.status, RunStatus::Completed);
  let echoed = &done.step_runs[1].output.as_ref().unwrap().0["config"];
  assert_eq!(echoed["data"], json!(123));
  assert_eq!(echoed["missing"], json!(null));
  assert_eq!(echoed["label"], json!("literal-label"));
}

#[tokio::test]
async fn unknown_integration_type_fails_the_step_not_the_engine() {
  let (engine, store) = test_engine().await;
  engine
    .create_workflow(workflow_def("unknown", vec![step("teleport", 1)]))
    .await
    .unwrap();

  let run = engine.trigger(&trigger("unknown")).await.unwrap().unwrap();
  let done = wait_for_terminal(&store, &run.id).await;

  assert_eq!(done.status, RunStatus::Failed);
  assert_eq!(
    done.error_message.as_deref(),
    Some("step 1 (teleport) failed: unknown integration type: teleport")
  );
}

#[tokio::test]
async fn unregistered_trigger_is_not_found_not_an_error() {
  let (engine, _store) = test_engine().await;
  let matched = engine.trigger(&trigger("nobody-home")).await.unwrap();
  assert!(matched.is_none());
}

#[tokio::test]
async fn retry_is_rejected_unless_the_run_failed() {
  let (engine, store) = test_engine().await;
  let workflow = engine
    .create_workflow(workflow_def("states", vec![step("static", 1)]))
    .await
    .unwrap();

  for status in [RunStatus::Pending, RunStatus::Running, RunStatus::Completed] {
    let run = Run::for_workflow(&workflow, None);
    store.create_run(&run).await.unwrap();
    store
      .update_run_status(&run.id, status, None, None)
      .await
      .unwrap();

    let err = engine.retry(&run.id).await.unwrap_err();
    assert!(
      matches!(err, EngineError::InvalidState { status: s, .. } if s == status),
      "expected InvalidState for {status:?}"
    );
  }
}

#[tokio::test]
async fn retry_of_missing_run_is_not_found() {
  let (engine, _store) = test_engine().await;
  let err = engine.retry("no-such-run").await.unwrap_err();
  assert!(matches!(err, EngineError::RunNotFound(_)));
}

#[tokio::test]
async fn retry_with_deleted_workflow_is_fatal() {
  let (engine, store) = test_engine().await;

  // A run whose owning workflow was never persisted stands in for a
  // workflow deleted after the run was created.
  let orphan_workflow = workflow_def("ghost", vec![step("static", 1)])
    .build()
    .unwrap();
  let mut run = Run::for_workflow(&orphan_workflow, None);
  run.status = RunStatus::Failed;
  store.create_run(&run).await.unwrap();
  store
    .update_run_status(&run.id, RunStatus::Failed, None, Some("boom"))
    .await
    .unwrap();

  let err = engine.retry(&run.id).await.unwrap_err();
  assert!(matches!(err, EngineError::WorkflowMissing { .. }));
}

#[tokio::test]
async fn retry_creates_a_fresh_linked_run_and_leaves_the_original_alone() {
  let (engine, store) = test_engine().await;
  engine
    .create_workflow(workflow_def(
      "retryable",
      vec![step("static", 1), step("fail", 2)],
    ))
    .await
    .unwrap();

  let original = engine
    .trigger(&trigger("retryable"))
    .await
    .unwrap()
    .unwrap();
  let failed = wait_for_terminal(&store, &original.id).await;
  assert_eq!(failed.status, RunStatus::Failed);

  let retried = engine.retry(&original.id).await.unwrap();
  assert_ne!(retried.id, original.id);
  assert_eq!(retried.retry_of.as_deref(), Some(original.id.as_str()));
  assert_eq!(retried.step_runs.len(), 2);
  assert!(
    retried
      .step_runs
      .iter()
      .all(|sr| sr.status == StepStatus::Pending)
  );
  // Fresh step-runs, never shared with the original run.
  for (new_sr, old_sr) in retried.step_runs.iter().zip(&failed.step_runs) {
    assert_ne!(new_sr.id, old_sr.id);
  }

  let retried_done = wait_for_terminal(&store, &retried.id).await;
  assert_eq!(retried_done.status, RunStatus::Failed);

  // Retry is additive: the original run is untouched.
  let original_after = store.get_run(&original.id).await.unwrap();
  assert_eq!(original_after.status, RunStatus::Failed);
  assert_eq!(original_after.error_message, failed.error_message);
  assert_eq!(original_after.step_runs, failed.step_runs);
}

#[tokio::test]
async fn list_runs_shows_newest_first() {
  let (engine, store) = test_engine().await;
  let workflow = engine
    .create_workflow(workflow_def("history", vec![step("static", 1)]))
    .await
    .unwrap();

  let first = engine.trigger(&trigger("history")).await.unwrap().unwrap();
  wait_for_terminal(&store, &first.id).await;
  let second = engine.trigger(&trigger("history")).await.unwrap().unwrap();
  wait_for_terminal(&store, &second.id).await;

  let runs = engine.list_runs(&workflow.id).await.unwrap();
  assert_eq!(runs.len(), 2);
  assert_eq!(runs[0].id, second.id);
}
