//! Error types for the workflow engine.

use relay_store::RunStatus;
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Integration failures are not errors: they are recorded on the failing
/// step-run and fail the run itself, observable only through run state.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The requested run does not exist.
  #[error("run not found: {0}")]
  RunNotFound(String),

  /// The requested workflow does not exist.
  #[error("workflow not found: {0}")]
  WorkflowNotFound(String),

  /// Retry was requested for a run that is not in a retryable state.
  #[error("cannot retry run {run_id} with status {status:?}: only failed runs are retryable")]
  InvalidState { run_id: String, status: RunStatus },

  /// A run's owning workflow is gone. Retrying such a run is a fatal
  /// inconsistency, not a recoverable condition.
  #[error("workflow {workflow_id} missing for run {run_id}")]
  WorkflowMissing { run_id: String, workflow_id: String },

  /// A workflow definition failed validation at creation time.
  #[error("invalid workflow definition: {0}")]
  InvalidWorkflow(String),

  /// A storage operation failed.
  #[error(transparent)]
  Store(#[from] relay_store::Error),
}
