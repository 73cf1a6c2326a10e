//! LLM client abstraction.
//!
//! Stage processors treat text generation as an opaque capability: a
//! prompt goes in, text comes out, and the call may fail or time out.
//! The single concrete implementation speaks the OpenAI-compatible
//! chat-completions protocol, which covers OpenAI, Azure, OpenRouter
//! and local servers exposing the same API shape.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Generic LLM client trait for provider abstraction.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client.
///
/// Error mapping: rate limiting, timeouts, connection failures and 5xx
/// responses surface as [`AppError::Llm`] (retryable by the stage retry
/// policy); other 4xx responses surface as [`AppError::InvalidInput`]
/// (not retryable).
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(api_base: &str, api_key: Option<String>, model: &str, temperature: f32) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
        }
    }

    async fn chat(&self, messages: serde_json::Value) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            AppError::Llm(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            // 429 and server-side errors are worth retrying; the rest are not.
            if status.as_u16() == 429 || status.as_u16() == 408 || status.is_server_error() {
                return Err(AppError::Llm(format!("{} from {}: {}", status, url, detail)));
            }
            return Err(AppError::InvalidInput(format!(
                "{} from {}: {}",
                status, url, detail
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("malformed completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("completion response contained no content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(json!([{"role": "user", "content": prompt}])).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
