use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::EnvFilter;

use relay_engine::{WorkflowDef, WorkflowEngine};
use relay_integrations::IntegrationRegistry;
use relay_store::{Run, RunStatus, SqliteStore, Store, Trigger};

/// Relay - a workflow automation engine
#[derive(Parser)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.relay)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage workflow definitions
  Workflow {
    #[command(subcommand)]
    action: WorkflowAction,
  },

  /// Fire a trigger and start the matching workflow's run
  Trigger {
    /// Trigger type (e.g. "webhook", "schedule", "manual")
    trigger_type: String,

    /// Trigger value
    trigger_value: String,

    /// Return immediately instead of polling the run to a terminal state
    #[arg(long)]
    no_wait: bool,
  },

  /// List runs for a workflow, most recent first
  Runs {
    /// Workflow id
    workflow_id: String,
  },

  /// Show one run with its step-runs
  Run {
    /// Run id
    run_id: String,
  },

  /// Retry a failed run as a fresh attempt
  Retry {
    /// Run id of the failed run
    run_id: String,

    /// Return immediately instead of polling the run to a terminal state
    #[arg(long)]
    no_wait: bool,
  },
}

#[derive(Subcommand)]
enum WorkflowAction {
  /// Create a workflow from a JSON definition file
  Create {
    /// Path to the definition file
    definition_file: PathBuf,
  },

  /// List all workflows
  List,

  /// Show one workflow with its steps
  Show {
    /// Workflow id
    workflow_id: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".relay")
  });

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(cli.command, data_dir))
}

async fn run(command: Option<Commands>, data_dir: PathBuf) -> Result<()> {
  let Some(command) = command else {
    println!("relay - use --help to see available commands");
    return Ok(());
  };

  let engine = open_engine(&data_dir).await?;

  match command {
    Commands::Workflow { action } => match action {
      WorkflowAction::Create { definition_file } => {
        let content = tokio::fs::read_to_string(&definition_file)
          .await
          .with_context(|| {
            format!(
              "failed to read definition file: {}",
              definition_file.display()
            )
          })?;
        let def: WorkflowDef = serde_json::from_str(&content).with_context(|| {
          format!(
            "failed to parse definition file: {}",
            definition_file.display()
          )
        })?;

        let workflow = engine.create_workflow(def).await?;
        println!("{}", serde_json::to_string_pretty(&workflow)?);
      }
      WorkflowAction::List => {
        let workflows = engine.store().list_workflows().await?;
        for workflow in workflows {
          println!(
            "{}  {}  ({} -> {})",
            workflow.id, workflow.name, workflow.trigger_type, workflow.trigger_value
          );
        }
      }
      WorkflowAction::Show { workflow_id } => {
        let workflow = engine.store().get_workflow(&workflow_id).await?;
        println!("{}", serde_json::to_string_pretty(&workflow)?);
      }
    },

    Commands::Trigger {
      trigger_type,
      trigger_value,
      no_wait,
    } => {
      let trigger = Trigger {
        trigger_type,
        value: trigger_value,
      };
      match engine.trigger(&trigger).await? {
        Some(run) => {
          eprintln!("started run {}", run.id);
          finish(&engine, run, no_wait).await?;
        }
        None => {
          eprintln!(
            "no workflow registered for trigger {}:{}",
            trigger.trigger_type, trigger.value
          );
        }
      }
    }

    Commands::Runs { workflow_id } => {
      let runs = engine.list_runs(&workflow_id).await?;
      for run in runs {
        println!(
          "{}  {:?}  started {}  {}",
          run.id,
          run.status,
          run.started_at,
          run.error_message.as_deref().unwrap_or("")
        );
      }
    }

    Commands::Run { run_id } => {
      let run = engine.get_run(&run_id).await?;
      println!("{}", serde_json::to_string_pretty(&run)?);
    }

    Commands::Retry { run_id, no_wait } => {
      let run = engine.retry(&run_id).await?;
      eprintln!("started run {} (retry of {})", run.id, run_id);
      finish(&engine, run, no_wait).await?;
    }
  }

  Ok(())
}

async fn open_engine(data_dir: &Path) -> Result<WorkflowEngine> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let options = SqliteConnectOptions::new()
    .filename(data_dir.join("relay.db"))
    .create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .connect_with(options)
    .await
    .context("failed to open database")?;

  let store = SqliteStore::new(pool);
  store.migrate().await.context("failed to run migrations")?;

  Ok(WorkflowEngine::new(
    Arc::new(store),
    Arc::new(IntegrationRegistry::with_builtins()),
  ))
}

/// Poll the run to a terminal state, unless the caller opted out.
///
/// The engine never pushes progress back to the caller; polling the
/// stored run state is the only observation channel.
async fn finish(engine: &WorkflowEngine, run: Run, no_wait: bool) -> Result<()> {
  if no_wait {
    println!("{}", serde_json::to_string_pretty(&run)?);
    return Ok(());
  }

  let run_id = run.id;
  loop {
    let run = engine.get_run(&run_id).await?;
    if matches!(run.status, RunStatus::Completed | RunStatus::Failed) {
      println!("{}", serde_json::to_string_pretty(&run)?);
      return Ok(());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
  }
}
