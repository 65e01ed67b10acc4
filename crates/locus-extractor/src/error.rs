//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Configuration error (detected before any processing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document could not be split into chunks
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Invalid location format in LLM response
    #[error("Invalid location format: {0}")]
    InvalidFormat(String),

    /// A single LLM call exceeded the per-chunk timeout
    #[error("Extraction timeout after {0}s")]
    Timeout(u64),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// The run was cancelled before every chunk finished
    #[error("Extraction cancelled")]
    Cancelled,

    /// Every chunk invocation failed (strict mode only)
    #[error("All {0} chunk invocations failed")]
    AllChunksFailed(usize),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
