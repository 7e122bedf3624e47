//! OpenAI-compatible chat-completion adapter.
//!
//! Supports OpenAI API, Azure OpenAI, and local Ollama instances.
//! Implements `ChatCompletionPort`; returns the first choice's text untouched.

use crate::domain::{ChatMessage, CompletionRequest, DomainError};
use crate::ports::ChatCompletionPort;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI-compatible adapter.
///
/// Can be configured to work with:
/// - OpenAI API (api.openai.com)
/// - Azure OpenAI
/// - Ollama (localhost)
/// - Any OpenAI-compatible API
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiAdapter {
    /// Create a new OpenAI adapter.
    ///
    /// # Arguments
    /// * `api_url` - API endpoint (e.g., "https://api.openai.com/v1/chat/completions")
    /// * `api_key` - API key; `None` makes every call fail with `DomainError::Configuration`
    /// * `model` - Model name (e.g., "gpt-4o-mini", "llama3.2")
    /// * `timeout` - Whole-request timeout; expiry is reported as `DomainError::Timeout`
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model,
        })
    }

    fn map_transport(e: reqwest::Error) -> DomainError {
        if e.is_timeout() {
            DomainError::Timeout
        } else {
            DomainError::Upstream(format!("HTTP request failed: {}", e))
        }
    }
}

/// OpenAI API request structure.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// OpenAI API response structure.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatCompletionPort for OpenAiAdapter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DomainError::Configuration("AI API key not configured".to_string()))?;

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "sending chat completion request"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "AI API returned error");
            return Err(DomainError::Upstream(format!(
                "API error {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::Timeout
            } else {
                DomainError::Upstream(format!("Failed to parse API response: {}", e))
            }
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::Upstream("No response choices returned".to_string()))?;

        debug!(raw_len = content.len(), "received AI response");

        Ok(content)
    }
}
