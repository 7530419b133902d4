use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::{Integration, IntegrationResult, parse_config};

#[derive(Debug, Deserialize)]
struct SlackConfig {
  channel: String,
  message: String,
}

/// Posts a message to a chat channel.
///
/// No chat transport is wired up; the post is logged and the send
/// timestamp is returned.
pub struct SlackIntegration;

#[async_trait]
impl Integration for SlackIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let config: SlackConfig = match parse_config("slack", config) {
      Ok(config) => config,
      Err(failure) => return failure,
    };

    info!(channel = %config.channel, message = %config.message, "posting slack message");

    let mut payload = Map::new();
    payload.insert(
      "timestamp".to_string(),
      Value::String(chrono::Utc::now().to_rfc3339()),
    );
    IntegrationResult::ok_with(payload)
  }
}
