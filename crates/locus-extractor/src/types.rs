//! Result types for extraction

use crate::error::ExtractorError;
use locus_domain::AggregatedLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A non-fatal problem met while processing a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// A chunk call failed and was retried
    ChunkRetried {
        /// Chunk index
        chunk_index: usize,
        /// Attempt that failed (1-based)
        attempt: u32,
        /// Failure reason
        reason: String,
    },

    /// A chunk contributed nothing because every attempt failed
    ChunkFailed {
        /// Chunk index
        chunk_index: usize,
        /// Attempts made
        attempts: u32,
        /// Reason of the last failure
        reason: String,
    },

    /// A malformed location entry was dropped from a chunk reply
    MentionDropped {
        /// Chunk index
        chunk_index: usize,
        /// Why the entry was dropped
        reason: String,
    },

    /// No chunk call succeeded
    AllChunksFailed {
        /// Number of chunks
        chunk_count: usize,
    },

    /// The abstract was shortened to fit the context budget
    AbstractTruncated {
        /// Token estimate of the full abstract
        original_tokens: usize,
        /// Token estimate of the prefix that was used
        kept_tokens: usize,
    },

    /// The context budget left no room for the abstract
    AbstractDropped {
        /// Token estimate of the full abstract
        original_tokens: usize,
    },

    /// Keyword focus matched nothing, so the full text was used
    KeywordFocusEmpty,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::ChunkRetried {
                chunk_index,
                attempt,
                reason,
            } => write!(f, "chunk {} attempt {} failed: {}", chunk_index, attempt, reason),
            ExtractionWarning::ChunkFailed {
                chunk_index,
                attempts,
                reason,
            } => write!(
                f,
                "chunk {} failed after {} attempts: {}",
                chunk_index, attempts, reason
            ),
            ExtractionWarning::MentionDropped {
                chunk_index,
                reason,
            } => write!(f, "chunk {}: dropped {}", chunk_index, reason),
            ExtractionWarning::AllChunksFailed { chunk_count } => {
                write!(f, "all {} chunk calls failed", chunk_count)
            }
            ExtractionWarning::AbstractTruncated {
                original_tokens,
                kept_tokens,
            } => write!(
                f,
                "abstract truncated from {} to {} tokens",
                original_tokens, kept_tokens
            ),
            ExtractionWarning::AbstractDropped { original_tokens } => write!(
                f,
                "abstract of {} tokens dropped, no room in the context budget",
                original_tokens
            ),
            ExtractionWarning::KeywordFocusEmpty => {
                write!(f, "no location cue phrase found, used the full text")
            }
        }
    }
}

/// Metadata about an extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Unique, time-ordered identifier of the run
    pub run_id: Uuid,

    /// Timestamp when extraction finished (seconds since the epoch)
    pub timestamp: u64,

    /// Name of the LLM model used
    pub model_name: String,

    /// Number of chunks sent to the model
    pub chunk_count: usize,

    /// Chunks that contributed nothing
    pub failed_chunks: usize,

    /// Sum of the chunk token estimates
    pub total_tokens: usize,

    /// Well-formed mentions received across all chunks
    pub mentions_received: usize,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Result of extracting locations from one document
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Identifier of the processed document
    pub document_id: String,

    /// Every aggregated location, most important first
    pub locations: Vec<AggregatedLocation>,

    /// Non-fatal problems, in the order they were met
    pub warnings: Vec<ExtractionWarning>,

    /// Metadata about the run
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// Locations that passed the importance filter
    pub fn retained(&self) -> impl Iterator<Item = &AggregatedLocation> {
        self.locations.iter().filter(|l| l.retained)
    }

    /// True when no chunk call succeeded
    pub fn is_complete_failure(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::AllChunksFailed { .. }))
    }

    /// Turn a run where every chunk failed into an error
    pub fn into_strict(self) -> Result<Self, ExtractorError> {
        if self.is_complete_failure() {
            return Err(ExtractorError::AllChunksFailed(self.metadata.chunk_count));
        }
        Ok(self)
    }
}
