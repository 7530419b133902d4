//! Relay Integrations
//!
//! This crate provides the pluggable side-effect capabilities a workflow
//! step dispatches to. An [`Integration`] takes the step's resolved
//! configuration and returns an [`IntegrationResult`] describing success
//! or failure plus a type-specific payload.
//!
//! Integrations are looked up by the step's type tag through an
//! [`IntegrationRegistry`]. Dispatching an unknown tag yields a failure
//! result, never a panic or an error.

mod claude;
mod email;
mod http;
mod log;
mod slack;

pub use claude::ClaudeIntegration;
pub use email::EmailIntegration;
pub use http::HttpIntegration;
pub use log::LogIntegration;
pub use slack::SlackIntegration;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Outcome of one integration dispatch.
///
/// Failure is data, not an error: a failed dispatch fails the step that
/// requested it, nothing else. `payload` carries the integration-specific
/// result fields and is flattened on the wire, so a serialized result
/// reads `{"success": true, "status": 200, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationResult {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(flatten)]
  pub payload: Map<String, Value>,
}

impl IntegrationResult {
  /// A successful result with no payload.
  pub fn ok() -> Self {
    Self {
      success: true,
      error: None,
      payload: Map::new(),
    }
  }

  /// A successful result carrying the given payload fields.
  pub fn ok_with(payload: Map<String, Value>) -> Self {
    Self {
      success: true,
      error: None,
      payload,
    }
  }

  /// A failure result with the given message.
  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      success: false,
      error: Some(message.into()),
      payload: Map::new(),
    }
  }

  /// The result as a JSON value, the shape recorded as step output.
  pub fn to_value(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

/// A pluggable capability that performs a step's side effect.
#[async_trait]
pub trait Integration: Send + Sync {
  /// Execute with the step's resolved configuration.
  async fn execute(&self, config: &Value) -> IntegrationResult;
}

/// Registry mapping a step type tag to its integration.
pub struct IntegrationRegistry {
  integrations: HashMap<String, Arc<dyn Integration>>,
}

impl IntegrationRegistry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self {
      integrations: HashMap::new(),
    }
  }

  /// Create a registry with all built-in integrations registered.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register("email", Arc::new(EmailIntegration));
    registry.register("slack", Arc::new(SlackIntegration));
    registry.register("http", Arc::new(HttpIntegration::new()));
    registry.register("log", Arc::new(LogIntegration));
    registry.register("claude", Arc::new(ClaudeIntegration::from_env()));
    registry
  }

  /// Register an integration under a step type tag.
  pub fn register(&mut self, step_type: impl Into<String>, integration: Arc<dyn Integration>) {
    self.integrations.insert(step_type.into(), integration);
  }

  /// Dispatch a step to the integration registered for its type.
  ///
  /// An unregistered type is a reported failure, not a crash.
  pub async fn execute(&self, step_type: &str, config: &Value) -> IntegrationResult {
    match self.integrations.get(step_type) {
      Some(integration) => integration.execute(config).await,
      None => {
        warn!(step_type, "unknown integration type");
        IntegrationResult::failure(format!("unknown integration type: {step_type}"))
      }
    }
  }
}

impl Default for IntegrationRegistry {
  fn default() -> Self {
    Self::new()
  }
}

/// Deserialize an integration config, reporting failures as a result value.
pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(
  step_type: &str,
  config: &Value,
) -> Result<T, IntegrationResult> {
  serde_json::from_value(config.clone())
    .map_err(|e| IntegrationResult::failure(format!("invalid {step_type} config: {e}")))
}
