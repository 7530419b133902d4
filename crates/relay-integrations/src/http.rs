use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::{Integration, IntegrationResult, parse_config};

#[derive(Debug, Deserialize)]
struct HttpConfig {
  method: String,
  url: String,
  #[serde(default)]
  headers: HashMap<String, String>,
  #[serde(default)]
  body: Option<Value>,
}

/// Calls an HTTP endpoint and returns `{status, data}`.
///
/// A non-2xx status is still a successful dispatch; the status code is
/// part of the payload for downstream steps to inspect. Only transport
/// errors fail the step.
pub struct HttpIntegration {
  client: reqwest::Client,
}

impl HttpIntegration {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
    }
  }
}

impl Default for HttpIntegration {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Integration for HttpIntegration {
  async fn execute(&self, config: &Value) -> IntegrationResult {
    let config: HttpConfig = match parse_config("http", config) {
      Ok(config) => config,
      Err(failure) => return failure,
    };

    let method: reqwest::Method = match config.method.to_uppercase().parse() {
      Ok(method) => method,
      Err(_) => {
        return IntegrationResult::failure(format!("invalid http method: {}", config.method));
      }
    };

    info!(method = %method, url = %config.url, "making http request");

    let mut request = self.client.request(method, &config.url);
    for (name, value) in &config.headers {
      request = request.header(name, value);
    }
    if let Some(body) = &config.body {
      request = request.json(body);
    }

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => return IntegrationResult::failure(format!("http request failed: {e}")),
    };

    let status = response.status().as_u16();
    // Not every endpoint returns JSON; fall back to the raw body text.
    let data = match response.text().await {
      Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
      Err(e) => return IntegrationResult::failure(format!("failed to read response body: {e}")),
    };

    let mut payload = Map::new();
    payload.insert("status".to_string(), Value::from(status));
    payload.insert("data".to_string(), data);
    IntegrationResult::ok_with(payload)
  }
}
