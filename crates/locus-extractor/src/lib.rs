//! Locus Extractor
//!
//! Extracts the geographic locations a scientific paper is about, using an
//! LLM over overlapping chunks of the paper's text.
//!
//! # Overview
//!
//! Papers are usually longer than one model call allows, so the text is cut
//! into token-budgeted chunks that share a little text at each cut. Every
//! chunk is sent to the model with the paper's abstract as context, the
//! per-chunk answers are merged into one deduplicated list, and a percentile
//! filter marks the locations that matter most.
//!
//! # Architecture
//!
//! ```text
//! Document → [KeywordFocus] → TextChunker (+ ContextAugmenter) → Chunks
//!          → LlmProvider (one call per chunk) → parser → Aggregator
//!          → ImportanceFilter → ExtractionResult
//! ```
//!
//! # Key Features
//!
//! - **Token budgeting**: per-model token estimates via [`TokenizerRegistry`]
//! - **Balanced chunking**: natural cut points and controlled overlap
//! - **Bounded concurrency**: retries, per-call timeouts and cancellation
//! - **Overlap-aware merging**: a location seen twice in shared text counts once
//! - **Metadata**: DOI lookup and first-page metadata extraction
//!
//! # Example Usage
//!
//! ```no_run
//! use locus_domain::Document;
//! use locus_extractor::{Extractor, ExtractorConfig};
//! use locus_llm::MockProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = MockProvider::new(r#"[{"name": "Lisbon Basin", "importance": 9}]"#);
//! let extractor = Extractor::new(llm, ExtractorConfig::default())?;
//!
//! let document = Document::new("paper-1", "Samples were collected in the Lisbon Basin.")
//!     .with_abstract("We study rifting along the Iberian margin.");
//!
//! let result = extractor.extract(&document).await?;
//! for location in result.retained() {
//!     println!("{} ({})", location.name, location.importance);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod aggregate;
mod chunking;
mod cleanup;
mod config;
mod context;
mod error;
mod extractor;
mod filter;
mod focus;
mod metadata;
mod parser;
pub mod prompt;
mod tokenizer;
mod types;

#[cfg(test)]
mod tests;

pub use aggregate::{
    canonicalize, resolve_anchor, Aggregator, ExactMatcher, FuzzyMatcher, LocationMatcher,
};
pub use chunking::TextChunker;
pub use cleanup::{strip_citations, trim_back_matter};
pub use config::{ExtractorConfig, MatchPolicy, DEFAULT_SYSTEM_PROMPT};
pub use context::{ContextAugmenter, ContextPrefix, PREFIX_SEPARATOR};
pub use error::ExtractorError;
pub use extractor::{Extractor, PreparedDocument};
pub use filter::{ImportanceFilter, PercentileFilter, ThresholdFilter, TopKFilter};
pub use focus::{KeywordFocus, DEFAULT_FOCUS_KEYWORDS};
pub use metadata::{find_doi, parse_metadata_response, MetadataExtractor};
pub use parser::{parse_location_response, ParsedLocations};
pub use tokenizer::{HeuristicEstimator, TokenEstimator, TokenizerRegistry};
pub use types::{ExtractionMetadata, ExtractionResult, ExtractionWarning};

pub use tokio_util::sync::CancellationToken;
