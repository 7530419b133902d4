use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::{Integration, IntegrationResult, parse_config};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Deserialize)]
struct ClaudeConfig {
  prompt: String,
  #[serde(default)]
  model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
  model: String,
  content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(default)]
  text: String,
}

/// Sends a prompt to the Anthropic messages API and returns
/// `{response, model}`.
///
/// A missing API key or an API error is a reported failure, never a
/// panic.
pub struct ClaudeIntegration {
  client: reqwest::Client,
  api_key: Option<String>,
}

impl ClaudeIntegration {
  pub fn new(api_key: Option<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      api_key,
    }
  }

  /// Read the API key from `ANTHROPIC_API_KEY`.
  pub fn from_env() -> Self {
    Self::new(std::env::var("ANTHROPIC_API_KEY").ok())
  }
}

#[async_trait]
impl Integration for ClaudeIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let config: ClaudeConfig = match parse_config("claude", config) {
      Ok(config) => config,
      Err(failure) => return failure,
    };

    let Some(api_key) = &self.api_key else {
      return IntegrationResult::failure("claude integration requires ANTHROPIC_API_KEY");
    };

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    info!(model, prompt_len = config.prompt.len(), "prompting model");

    let body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": [{ "role": "user", "content": config.prompt }],
    });

    let response = match self
      .client
      .post(API_URL)
      .header("x-api-key", api_key)
      .header("anthropic-version", API_VERSION)
      .json(&body)
      .send()
      .await
    {
      Ok(response) => response,
      Err(e) => return IntegrationResult::failure(format!("claude API error: {e}")),
    };

    if !response.status().is_success() {
      let status = response.status();
      let detail = response.text().await.unwrap_or_default();
      return IntegrationResult::failure(format!("claude API error: {status}: {detail}"));
    }

    let parsed: MessagesResponse = match response.json().await {
      Ok(parsed) => parsed,
      Err(e) => return IntegrationResult::failure(format!("invalid claude API response: {e}")),
    };

    let text = parsed
      .content
      .first()
      .map(|block| block.text.clone())
      .unwrap_or_default();

    let mut payload = Map::new();
    payload.insert("response".to_string(), Value::String(text));
    payload.insert("model".to_string(), Value::String(parsed.model));
    IntegrationResult::ok_with(payload)
  }
}
