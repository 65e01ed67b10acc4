//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use std::future::Future;

/// Trait for LLM completion endpoints
///
/// Implemented by the infrastructure layer (locus-llm). The returned future
/// must be `Send` so that one call per chunk can run on its own task.
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Run one chat completion with a system prompt and a user message,
    /// returning the raw text of the model's reply
    fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Identifier of the model behind this provider
    fn model_name(&self) -> &str;
}
