//! Relay Store
//!
//! This crate provides the storage trait and SQLite implementation for
//! workflows, runs and step-runs. Data is persisted to a database.
//!
//! The [`Store`] trait defines operations for:
//! - Creating workflows (workflow plus steps, atomically)
//! - Looking up a workflow by its trigger
//! - Creating runs (run plus step-runs, atomically)
//! - Recording run and step-run status transitions
//! - Querying run history

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{Run, RunStatus, StepRun, StepStatus, Trigger, Workflow, WorkflowStep};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for workflows, runs and step-runs.
#[async_trait]
pub trait Store: Send + Sync {
  /// Insert a workflow and all of its steps. All rows become visible
  /// together or not at all.
  async fn create_workflow(&self, workflow: &Workflow) -> Result<(), Error>;

  /// Get a workflow by id, with its steps in definition order.
  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error>;

  /// List all workflows (without steps), oldest first.
  async fn list_workflows(&self) -> Result<Vec<Workflow>, Error>;

  /// Find the workflow whose trigger matches `(trigger_type, trigger_value)`
  /// exactly. Returns `None` when nothing matches. When several match, the
  /// first by creation order wins.
  async fn find_workflow_by_trigger(
    &self,
    trigger_type: &str,
    trigger_value: &str,
  ) -> Result<Option<Workflow>, Error>;

  /// Insert a run and all of its step-runs. All rows become visible
  /// together or not at all.
  async fn create_run(&self, run: &Run) -> Result<(), Error>;

  /// Get a run by id, with its step-runs in definition order.
  async fn get_run(&self, run_id: &str) -> Result<Run, Error>;

  /// List runs for a workflow (without step-runs), most recent first.
  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<Run>, Error>;

  /// Record a run status transition.
  async fn update_run_status(
    &self,
    run_id: &str,
    status: RunStatus,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<&str>,
  ) -> Result<(), Error>;

  /// Record a step-run status transition, together with its timestamps
  /// and its output or error message.
  async fn update_step_run(&self, step_run: &StepRun) -> Result<(), Error>;
}
