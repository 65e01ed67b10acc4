//! Locus LLM Provider Layer
//!
//! Pluggable LLM provider implementations.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LlmProvider` trait from `locus-domain`.
//! It supports multiple LLM backends with a common interface.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OpenAiProvider`: Any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Examples
//!
//! ```
//! use locus_llm::MockProvider;
//! use locus_domain::traits::LlmProvider;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let provider = MockProvider::new(r#"{"locations": []}"#);
//! let result = provider.complete("system", "chunk text").await.unwrap();
//! assert_eq!(result, r#"{"locations": []}"#);
//! # });
//! ```

#![warn(missing_docs)]

pub mod openai;

use locus_domain::traits::LlmProvider as LlmProviderTrait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use openai::OpenAiProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Respond(String),
    Fail,
    Transient { failures_left: usize, then: String },
    Delayed { delay: Duration, response: String },
}

#[derive(Debug, Clone)]
struct MockRule {
    trigger: String,
    behavior: MockBehavior,
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls. Rules
/// are matched in insertion order against the user text: the first rule whose
/// trigger is a substring of the user text decides the reply, otherwise the
/// default response is returned.
///
/// # Examples
///
/// ```
/// use locus_llm::MockProvider;
/// use locus_domain::traits::LlmProvider;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut provider = MockProvider::new("[]");
/// provider.add_response("Lisbon", r#"[{"name": "Lisbon Basin", "importance": 9}]"#);
/// provider.add_error("corrupted");
///
/// assert!(provider.complete("sys", "the Lisbon Basin").await.unwrap().contains("Lisbon"));
/// assert!(provider.complete("sys", "corrupted page").await.is_err());
/// assert_eq!(provider.complete("sys", "anything else").await.unwrap(), "[]");
/// assert_eq!(provider.call_count(), 3);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
    default_response: String,
    rules: Arc<Mutex<Vec<MockRule>>>,
    call_count: Arc<Mutex<usize>>,
    received: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            model: "mock".to_string(),
            default_response: response.into(),
            rules: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report a different model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Reply with `response` whenever the user text contains `trigger`
    pub fn add_response(&mut self, trigger: impl Into<String>, response: impl Into<String>) {
        self.push_rule(trigger, MockBehavior::Respond(response.into()));
    }

    /// Fail every call whose user text contains `trigger`
    pub fn add_error(&mut self, trigger: impl Into<String>) {
        self.push_rule(trigger, MockBehavior::Fail);
    }

    /// Fail the first `failures` matching calls, then reply with `response`
    pub fn add_transient_errors(
        &mut self,
        trigger: impl Into<String>,
        failures: usize,
        response: impl Into<String>,
    ) {
        self.push_rule(
            trigger,
            MockBehavior::Transient {
                failures_left: failures,
                then: response.into(),
            },
        );
    }

    /// Wait `delay` before replying with `response`
    pub fn add_delayed_response(
        &mut self,
        trigger: impl Into<String>,
        delay: Duration,
        response: impl Into<String>,
    ) {
        self.push_rule(
            trigger,
            MockBehavior::Delayed {
                delay,
                response: response.into(),
            },
        );
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *lock(&self.call_count) = 0;
    }

    /// User texts received so far, in call order
    pub fn received(&self) -> Vec<String> {
        lock(&self.received).clone()
    }

    fn push_rule(&mut self, trigger: impl Into<String>, behavior: MockBehavior) {
        lock(&self.rules).push(MockRule {
            trigger: trigger.into(),
            behavior,
        });
    }

    /// Decide the reply for a call; locks are released before any waiting
    fn resolve(&self, user_text: &str) -> (Option<Duration>, Result<String, LlmError>) {
        *lock(&self.call_count) += 1;
        lock(&self.received).push(user_text.to_string());

        let mut rules = lock(&self.rules);
        let Some(rule) = rules.iter_mut().find(|r| user_text.contains(&r.trigger)) else {
            return (None, Ok(self.default_response.clone()));
        };

        match &mut rule.behavior {
            MockBehavior::Respond(response) => (None, Ok(response.clone())),
            MockBehavior::Fail => (None, Err(LlmError::Other("Mock error".to_string()))),
            MockBehavior::Transient { failures_left, then } => {
                if *failures_left > 0 {
                    *failures_left -= 1;
                    (
                        None,
                        Err(LlmError::Communication("Mock transient error".to_string())),
                    )
                } else {
                    (None, Ok(then.clone()))
                }
            }
            MockBehavior::Delayed { delay, response } => (Some(*delay), Ok(response.clone())),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("[]")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String, LlmError> {
        let (delay, outcome) = self.resolve(user_text);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
