use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{Integration, IntegrationResult, parse_config};

#[derive(Debug, Deserialize)]
struct LogConfig {
  message: String,
  #[serde(default)]
  level: Option<String>,
}

/// Writes a message through the structured logger.
pub struct LogIntegration;

#[async_trait]
impl Integration for LogIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let config: LogConfig = match parse_config("log", config) {
      Ok(config) => config,
      Err(failure) => return failure,
    };

    match config.level.as_deref() {
      Some("warn") => warn!(message = %config.message, "workflow log"),
      Some("error") => error!(message = %config.message, "workflow log"),
      _ => info!(message = %config.message, "workflow log"),
    }

    IntegrationResult::ok()
  }
}
