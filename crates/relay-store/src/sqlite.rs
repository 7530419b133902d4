use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{Error, Run, RunStatus, StepRun, Store, Workflow, WorkflowStep};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }

  async fn load_steps(&self, workflow_id: &str) -> Result<Vec<WorkflowStep>, Error> {
    let steps = sqlx::query_as(
      r#"
            SELECT id, workflow_id, step_type, step_config, input_mapping, step_order
            FROM workflow_steps
            WHERE workflow_id = ?
            ORDER BY step_order ASC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(steps)
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_workflow(&self, workflow: &Workflow) -> Result<(), Error> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      r#"
            INSERT INTO workflows (id, name, description, trigger_type, trigger_value, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&workflow.id)
    .bind(&workflow.name)
    .bind(&workflow.description)
    .bind(&workflow.trigger_type)
    .bind(&workflow.trigger_value)
    .bind(&workflow.created_at)
    .execute(&mut *tx)
    .await?;

    for step in &workflow.steps {
      sqlx::query(
        r#"
                INSERT INTO workflow_steps (id, workflow_id, step_type, step_config, input_mapping, step_order)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
      )
      .bind(&step.id)
      .bind(&step.workflow_id)
      .bind(&step.step_type)
      .bind(&step.step_config)
      .bind(&step.input_mapping)
      .bind(step.step_order)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error> {
    let workflow: Option<Workflow> = sqlx::query_as(
      r#"
            SELECT id, name, description, trigger_type, trigger_value, created_at
            FROM workflows
            WHERE id = ?
            "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?;

    let mut workflow =
      workflow.ok_or_else(|| Error::NotFound(format!("workflow {workflow_id}")))?;
    workflow.steps = self.load_steps(workflow_id).await?;
    Ok(workflow)
  }

  async fn list_workflows(&self) -> Result<Vec<Workflow>, Error> {
    let workflows = sqlx::query_as(
      r#"
            SELECT id, name, description, trigger_type, trigger_value, created_at
            FROM workflows
            ORDER BY created_at ASC, id ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(workflows)
  }

  async fn find_workflow_by_trigger(
    &self,
    trigger_type: &str,
    trigger_value: &str,
  ) -> Result<Option<Workflow>, Error> {
    let workflow: Option<Workflow> = sqlx::query_as(
      r#"
            SELECT id, name, description, trigger_type, trigger_value, created_at
            FROM workflows
            WHERE trigger_type = ? AND trigger_value = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
    )
    .bind(trigger_type)
    .bind(trigger_value)
    .fetch_optional(&self.pool)
    .await?;

    match workflow {
      Some(mut workflow) => {
        let steps = self.load_steps(&workflow.id).await?;
        workflow.steps = steps;
        Ok(Some(workflow))
      }
      None => Ok(None),
    }
  }

  async fn create_run(&self, run: &Run) -> Result<(), Error> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      r#"
            INSERT INTO workflow_runs
                (id, workflow_id, status, trigger_type, trigger_value, started_at, completed_at, error_message, retry_of)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&run.id)
    .bind(&run.workflow_id)
    .bind(run.status)
    .bind(&run.trigger_type)
    .bind(&run.trigger_value)
    .bind(&run.started_at)
    .bind(&run.completed_at)
    .bind(&run.error_message)
    .bind(&run.retry_of)
    .execute(&mut *tx)
    .await?;

    for step_run in &run.step_runs {
      sqlx::query(
        r#"
                INSERT INTO workflow_step_runs
                    (id, run_id, step_id, step_order, status, started_at, completed_at, output, error_message)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
      )
      .bind(&step_run.id)
      .bind(&step_run.run_id)
      .bind(&step_run.step_id)
      .bind(step_run.step_order)
      .bind(step_run.status)
      .bind(&step_run.started_at)
      .bind(&step_run.completed_at)
      .bind(&step_run.output)
      .bind(&step_run.error_message)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn get_run(&self, run_id: &str) -> Result<Run, Error> {
    let run: Option<Run> = sqlx::query_as(
      r#"
            SELECT id, workflow_id, status, trigger_type, trigger_value, started_at, completed_at, error_message, retry_of
            FROM workflow_runs
            WHERE id = ?
            "#,
    )
    .bind(run_id)
    .fetch_optional(&self.pool)
    .await?;

    let mut run = run.ok_or_else(|| Error::NotFound(format!("run {run_id}")))?;

    run.step_runs = sqlx::query_as(
      r#"
            SELECT id, run_id, step_id, step_order, status, started_at, completed_at, output, error_message
            FROM workflow_step_runs
            WHERE run_id = ?
            ORDER BY step_order ASC
            "#,
    )
    .bind(run_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(run)
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<Run>, Error> {
    let runs = sqlx::query_as(
      r#"
            SELECT id, workflow_id, status, trigger_type, trigger_value, started_at, completed_at, error_message, retry_of
            FROM workflow_runs
            WHERE workflow_id = ?
            ORDER BY started_at DESC, id DESC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(runs)
  }

  async fn update_run_status(
    &self,
    run_id: &str,
    status: RunStatus,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<&str>,
  ) -> Result<(), Error> {
    sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = ?, completed_at = ?, error_message = ?
            WHERE id = ?
            "#,
    )
    .bind(status)
    .bind(completed_at)
    .bind(error_message)
    .bind(run_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn update_step_run(&self, step_run: &StepRun) -> Result<(), Error> {
    sqlx::query(
      r#"
            UPDATE workflow_step_runs
            SET status = ?, started_at = ?, completed_at = ?, output = ?, error_message = ?
            WHERE id = ? AND run_id = ?
            "#,
    )
    .bind(step_run.status)
    .bind(&step_run.started_at)
    .bind(&step_run.completed_at)
    .bind(&step_run.output)
    .bind(&step_run.error_message)
    .bind(&step_run.id)
    .bind(&step_run.run_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}
