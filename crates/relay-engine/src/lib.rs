//! Relay Engine
//!
//! This crate drives workflow runs: it matches an incoming trigger to a
//! workflow, materializes a run with one pending step-run per step,
//! executes the steps strictly in order while passing data between them,
//! persists every status transition, and re-instantiates failed runs as
//! fresh retry attempts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                         │
//! │  - trigger(type, value) → run lookup + creation             │
//! │  - retry(run_id) → new run linked to the failed one         │
//! │  - spawns one detached task per run (fire-and-forget)       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       execute_run                           │
//! │  - steps in ascending order, one at a time                  │
//! │  - resolve inputs → dispatch → persist outcome → advance    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   IntegrationRegistry                       │
//! │  - step type tag → side-effecting capability                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Execution is decoupled from creation: the caller gets the freshly
//! created run back immediately and observes progress by polling the
//! store.

mod def;
mod engine;
mod error;
mod executor;
mod input;

pub use def::{StepDef, WorkflowDef};
pub use engine::WorkflowEngine;
pub use error::EngineError;
pub use input::resolve_config;
