//! OpenAI-compatible chat completions over HTTP.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatModel, LlmError};
use crate::config::LlmConfig;
use async_trait::async_trait;

pub struct OpenAiCompatProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: usize,
    temperature: f32,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| LlmError::Api(format!("failed to build HTTP client: {e}")))?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "API key env var not set, sending unauthenticated requests"
            );
        }

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "creating chat completion provider"
        );

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    /// Parse a response body as JSON, returning a clear error if the server
    /// returned HTML (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T, LlmError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Api(format!("failed to read response body from {endpoint}: {e}")))?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') || trimmed.starts_with("<!") {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(LlmError::Api(format!(
                "endpoint {endpoint} returned HTML instead of JSON (HTTP {status}): {preview}"
            )));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            LlmError::Api(format!(
                "failed to parse JSON from {endpoint} (HTTP {status}): {e}. Response body: {preview}"
            ))
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": false
        });

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            prompt_len = user.len(),
            "sending chat completion request"
        );

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(endpoint = %self.endpoint, "chat completion timed out");
                LlmError::Timeout
            } else if e.is_connect() {
                tracing::error!(endpoint = %self.endpoint, error = %e, "connection failed");
                LlmError::Api(format!("failed to connect to {}: {e}", self.endpoint))
            } else {
                tracing::error!(endpoint = %self.endpoint, error = %e, "request failed");
                LlmError::Api(format!("request to {} failed: {e}", self.endpoint))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            tracing::error!(endpoint = %self.endpoint, status = %status, error = %error, "API returned error");
            return Err(LlmError::Api(format!("API error ({status}): {error}")));
        }

        let result: OpenAIResponse = Self::parse_json_response(response, &self.endpoint).await?;
        let Some(choice) = result.choices.into_iter().next() else {
            return Err(LlmError::Api("no choices returned from API".into()));
        };

        tracing::debug!("chat completion received, {} chars", choice.message.content.len());
        Ok(choice.message.content)
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: String,
}
