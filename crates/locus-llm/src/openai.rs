//! OpenAI-compatible Provider Implementation
//!
//! Talks to any server exposing the OpenAI `/chat/completions` API (OpenAI,
//! vLLM, llama.cpp server, Ollama's `/v1` endpoint, OpenRouter, ...).
//!
//! # Features
//!
//! - Async HTTP communication
//! - Configurable endpoint, API key and model
//! - Deterministic sampling (`temperature: 0`) and JSON-object response mode
//! - HTTP status mapped onto [`LlmError`] variants
//!
//! Retrying is left to the caller, which knows whether a failed call is worth
//! repeating.
//!
//! # Examples
//!
//! ```no_run
//! use locus_llm::OpenAiProvider;
//!
//! let provider = OpenAiProvider::new("http://localhost:11434/v1", "llama3.1")
//!     .unwrap()
//!     .with_api_key("sk-local");
//! ```

use crate::LlmError;
use locus_domain::traits::LlmProvider as LlmProviderTrait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default OpenAI API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default HTTP timeout for LLM requests (5 minutes; long chunks are slow)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default completion budget for a location extraction reply
pub const DEFAULT_MAX_TOKENS: u32 = 5000;

/// OpenAI-compatible chat-completions provider
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    temperature: f32,
    max_tokens: Option<u32>,
    json_mode: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

/// Response from the chat completions API
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: API base URL, without the `/chat/completions` suffix
    /// - `model`: Model to use (e.g., "gpt-4o-mini", "llama3.1")
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client,
            temperature: 0.0,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            json_mode: true,
        })
    }

    /// Create a provider against the public OpenAI endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Replace the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    /// Set the completion token limit (`None` lets the server decide)
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request `response_format: {"type": "json_object"}` (on by default)
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn request_body<'a>(&'a self, system_prompt: &'a str, user_text: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: self.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    /// Run one chat completion
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The server is unreachable or the request times out
    /// - The model is not available (HTTP 404)
    /// - The server rate-limits the request (HTTP 429)
    /// - The response has no message content
    pub async fn chat(&self, system_prompt: &str, user_text: &str) -> Result<String, LlmError> {
        let body = self.request_body(system_prompt, user_text);
        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.model, chars = user_text.len(), "sending chat completion");

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let completion = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response has no message content".to_string()))
    }
}

impl LlmProviderTrait for OpenAiProvider {
    type Error = LlmError;

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, LlmError> {
        self.chat(system_prompt, user_text).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
