use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::{Integration, IntegrationResult, parse_config};

#[derive(Debug, Deserialize)]
struct EmailConfig {
  to: String,
  subject: String,
  #[serde(default)]
  body: Option<String>,
  #[serde(default)]
  cc: Vec<String>,
  #[serde(default)]
  bcc: Vec<String>,
}

/// Sends an email.
///
/// No mail transport is wired up; delivery is logged and a fresh message
/// id is returned so downstream steps can reference it.
pub struct EmailIntegration;

#[async_trait]
impl Integration for EmailIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let config: EmailConfig = match parse_config("email", config) {
      Ok(config) => config,
      Err(failure) => return failure,
    };

    info!(
      to = %config.to,
      subject = %config.subject,
      cc = config.cc.len(),
      bcc = config.bcc.len(),
      has_body = config.body.is_some(),
      "sending email"
    );

    let mut payload = Map::new();
    payload.insert(
      "message_id".to_string(),
      Value::String(uuid::Uuid::new_v4().to_string()),
    );
    IntegrationResult::ok_with(payload)
  }
}
