// src/protocol/llm.rs

use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{ConfigurationError, PlanningError};

/// Something that turns a prompt into completion text.
pub trait Completion: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, PlanningError>;
}

/// Blocking client for an Ollama-style `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    /// `lookup` resolves the configured credential variable; pass
    /// `|var| std::env::var(var).ok()` in production.
    pub fn from_config<F>(config: &LlmConfig, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = config.resolve_api_key(lookup)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigurationError::invalid(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Completion for LlmClient {
    fn complete(&self, prompt: &str) -> Result<String, PlanningError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let mut request = self.http.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        debug!(endpoint = %self.endpoint, model = %self.model, "requesting plan completion");

        let response = request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PlanningError::Transport(e.to_string()))?;
        let body: Value = response
            .json()
            .map_err(|e| PlanningError::Malformed(format!("response is not JSON: {e}")))?;

        body.get("response")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| PlanningError::Malformed("response missing 'response' field".into()))
    }
}
