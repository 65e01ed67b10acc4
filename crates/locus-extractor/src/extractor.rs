//! Core Extractor implementation

use crate::aggregate::{Aggregator, ExactMatcher, FuzzyMatcher, LocationMatcher};
use crate::chunking::TextChunker;
use crate::config::{ExtractorConfig, MatchPolicy};
use crate::context::ContextAugmenter;
use crate::error::ExtractorError;
use crate::filter::{ImportanceFilter, PercentileFilter};
use crate::focus::KeywordFocus;
use crate::parser::{parse_location_response, ParsedLocations};
use crate::prompt::location_system_prompt;
use crate::tokenizer::{TokenEstimator, TokenizerRegistry};
use crate::types::{ExtractionMetadata, ExtractionResult, ExtractionWarning};
use locus_domain::traits::LlmProvider;
use locus_domain::{AggregatedLocation, Chunk, Document, RawLocationMention};
use regex::RegexBuilder;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Chunks of a document, ready to be sent to the model
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Ordered chunks, context prefix included
    pub chunks: Vec<Chunk>,

    /// Warnings raised while building the chunks
    pub warnings: Vec<ExtractionWarning>,
}

/// Outcome of all attempts for one chunk
#[derive(Debug)]
struct ChunkReport {
    parsed: Option<ParsedLocations>,
    failures: Vec<String>,
}

/// The Extractor turns document text into a ranked list of locations
pub struct Extractor<L>
where
    L: LlmProvider,
{
    llm_provider: Arc<L>,
    config: Arc<ExtractorConfig>,
    model_name: String,
    estimator: Arc<dyn TokenEstimator>,
    focus: Option<KeywordFocus>,
    aggregator: Aggregator,
    filter: Box<dyn ImportanceFilter>,
}

impl<L> Extractor<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send,
{
    /// Create a new Extractor
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] if the configuration is invalid.
    pub fn new(llm_provider: L, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;

        let estimator = TokenizerRegistry::new().for_model(&config.model);
        let focus = match config.keyword_window {
            Some(window) => Some(KeywordFocus::new(&config.focus_keywords, window)?),
            None => None,
        };
        let matcher: Arc<dyn LocationMatcher> = match config.matching {
            MatchPolicy::Exact => Arc::new(ExactMatcher),
            MatchPolicy::Fuzzy { threshold } => Arc::new(FuzzyMatcher::new(threshold)),
        };
        let mut filter = PercentileFilter::new(config.percentile_cutoff);
        if let Some(floor) = config.importance_floor {
            filter = filter.with_floor(floor);
        }

        Ok(Self {
            model_name: llm_provider.model_name().to_string(),
            llm_provider: Arc::new(llm_provider),
            config: Arc::new(config),
            estimator,
            focus,
            aggregator: Aggregator::new(matcher),
            filter: Box::new(filter),
        })
    }

    /// Report a different model name in the result metadata
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Pick the token estimator for the configured model from `registry`
    pub fn with_registry(mut self, registry: &TokenizerRegistry) -> Self {
        self.estimator = registry.for_model(&self.config.model);
        self
    }

    /// Use a specific token estimator
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Replace the location matching strategy
    pub fn with_matcher(mut self, matcher: Arc<dyn LocationMatcher>) -> Self {
        self.aggregator = Aggregator::new(matcher);
        self
    }

    /// Replace the importance filter
    pub fn with_filter(mut self, filter: impl ImportanceFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Build the chunks for a document without calling the model
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Chunking`] for a blank document or when the
    /// context prefix leaves no room for text.
    pub fn prepare(&self, document: &Document) -> Result<PreparedDocument, ExtractorError> {
        let mut warnings = Vec::new();
        let chunker = TextChunker::new(
            Arc::clone(&self.estimator),
            self.config.max_tokens_per_part,
            self.config.overlap_percentage,
        )?;

        let augmenter = ContextAugmenter::new(
            self.estimator.as_ref(),
            self.config.append_abstract_to_context,
            self.config.max_tokens_per_part,
            self.config.max_abstract_share,
        );
        let prefix = augmenter.prefix_for(document);
        match prefix.as_ref() {
            Some(prefix) if prefix.is_dropped() => {
                warn!(
                    document = %document.id,
                    original_tokens = prefix.original_tokens,
                    "Abstract dropped, no room left in the context budget"
                );
                warnings.push(ExtractionWarning::AbstractDropped {
                    original_tokens: prefix.original_tokens,
                });
            }
            Some(prefix) if prefix.truncated => {
                warn!(
                    document = %document.id,
                    original_tokens = prefix.original_tokens,
                    kept_tokens = prefix.tokens,
                    "Abstract truncated to fit the context budget"
                );
                warnings.push(ExtractionWarning::AbstractTruncated {
                    original_tokens: prefix.original_tokens,
                    kept_tokens: prefix.tokens,
                });
            }
            _ => {}
        }
        let prefix_text = prefix.as_ref().map(|p| p.text.as_str()).unwrap_or("");

        let chunks = match &self.focus {
            Some(focus) => {
                let windows = focus.windows(&document.text);
                if windows.is_empty() {
                    warn!(document = %document.id, "No location cue phrase found, using the full text");
                    warnings.push(ExtractionWarning::KeywordFocusEmpty);
                    chunker.chunk(&document.text, prefix_text)?
                } else {
                    debug!(windows = windows.len(), "Keyword focus applied");
                    chunker.chunk_ranges(&document.text, &windows, prefix_text)?
                }
            }
            None => chunker.chunk(&document.text, prefix_text)?,
        };

        Ok(PreparedDocument { chunks, warnings })
    }

    /// Extract locations from a document
    pub async fn extract(&self, document: &Document) -> Result<ExtractionResult, ExtractorError> {
        self.extract_with_cancellation(document, CancellationToken::new())
            .await
    }

    /// Extract locations, stopping early when `cancel` fires
    ///
    /// A cancelled run returns [`ExtractorError::Cancelled`] and aggregates
    /// nothing. Chunk failures never fail the run: they are reported as
    /// warnings, and a run where every chunk failed yields no locations and an
    /// [`ExtractionWarning::AllChunksFailed`] warning.
    pub async fn extract_with_cancellation(
        &self,
        document: &Document,
        cancel: CancellationToken,
    ) -> Result<ExtractionResult, ExtractorError> {
        let start_time = Instant::now();

        info!(
            "Starting extraction for document '{}', text length {}",
            document.id,
            document.text.len()
        );

        let PreparedDocument {
            chunks,
            mut warnings,
        } = self.prepare(document)?;

        info!("Split text into {} chunks", chunks.len());

        let reports = self.invoke_all(&chunks, &cancel).await?;

        let mut mentions: Vec<RawLocationMention> = Vec::new();
        let mut failed_chunks = 0;
        for (chunk, report) in chunks.iter().zip(reports) {
            let Some(report) = report else {
                failed_chunks += 1;
                warnings.push(ExtractionWarning::ChunkFailed {
                    chunk_index: chunk.index,
                    attempts: 0,
                    reason: "task ended without a result".to_string(),
                });
                continue;
            };

            let attempts = report.failures.len() as u32;
            match report.parsed {
                Some(parsed) => {
                    for (i, reason) in report.failures.into_iter().enumerate() {
                        warnings.push(ExtractionWarning::ChunkRetried {
                            chunk_index: chunk.index,
                            attempt: i as u32 + 1,
                            reason,
                        });
                    }
                    for reason in parsed.dropped {
                        warnings.push(ExtractionWarning::MentionDropped {
                            chunk_index: chunk.index,
                            reason,
                        });
                    }
                    mentions.extend(parsed.mentions);
                }
                None => {
                    failed_chunks += 1;
                    let mut failures = report.failures;
                    let last = failures.pop().unwrap_or_default();
                    for (i, reason) in failures.into_iter().enumerate() {
                        warnings.push(ExtractionWarning::ChunkRetried {
                            chunk_index: chunk.index,
                            attempt: i as u32 + 1,
                            reason,
                        });
                    }
                    warnings.push(ExtractionWarning::ChunkFailed {
                        chunk_index: chunk.index,
                        attempts,
                        reason: last,
                    });
                }
            }
        }

        if failed_chunks == chunks.len() {
            warn!(
                "All {} chunk calls failed for document '{}'",
                chunks.len(),
                document.id
            );
            warnings.push(ExtractionWarning::AllChunksFailed {
                chunk_count: chunks.len(),
            });
        }

        let mut locations = self.aggregator.aggregate(&chunks, &mentions);
        self.filter.apply(&mut locations);
        if self.config.count_text_occurrences {
            annotate_occurrences(&document.text, &mut locations);
        }

        let metadata = ExtractionMetadata {
            run_id: Uuid::now_v7(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            model_name: self.model_name.clone(),
            chunk_count: chunks.len(),
            failed_chunks,
            total_tokens: chunks.iter().map(|c| c.token_count).sum(),
            mentions_received: mentions.len(),
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {} locations ({} retained), {} mentions, {} failed chunks",
            locations.len(),
            locations.iter().filter(|l| l.retained).count(),
            mentions.len(),
            failed_chunks
        );

        Ok(ExtractionResult {
            document_id: document.id.clone(),
            locations,
            warnings,
            metadata,
        })
    }

    /// Run one call per chunk with bounded concurrency
    ///
    /// Returns one slot per chunk, in chunk order. A slot is `None` only
    /// when the chunk's task died before reporting.
    async fn invoke_all(
        &self,
        chunks: &[Chunk],
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<ChunkReport>>, ExtractorError> {
        let system_prompt: Arc<str> = location_system_prompt(&self.config.system_prompt).into();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();

        for (slot, chunk) in chunks.iter().enumerate() {
            let llm = Arc::clone(&self.llm_provider);
            let config = Arc::clone(&self.config);
            let semaphore = Arc::clone(&semaphore);
            let system_prompt = Arc::clone(&system_prompt);
            let text = chunk.text.clone();
            let index = chunk.index;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let report = ChunkReport {
                        parsed: None,
                        failures: vec!["concurrency limiter closed".to_string()],
                    };
                    return (slot, report);
                };
                let report = call_with_retries(llm.as_ref(), &config, &system_prompt, &text, index).await;
                (slot, report)
            });
        }

        let mut slots: Vec<Option<ChunkReport>> = chunks.iter().map(|_| None).collect();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!("Extraction cancelled with {} chunk calls outstanding", tasks.len());
                    return Err(ExtractorError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((slot, report))) => {
                        if let Some(entry) = slots.get_mut(slot) {
                            *entry = Some(report);
                        }
                    }
                    Some(Err(e)) => warn!("Chunk task failed: {}", e),
                    None => break,
                },
            }
        }

        Ok(slots)
    }
}

/// Call the model for one chunk, retrying failures with exponential backoff
async fn call_with_retries<L>(
    llm: &L,
    config: &ExtractorConfig,
    system_prompt: &str,
    text: &str,
    index: usize,
) -> ChunkReport
where
    L: LlmProvider,
    L::Error: Display,
{
    let mut failures = Vec::new();

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            sleep(config.retry_delay(attempt - 1)).await;
        }
        debug!(chunk = index, attempt, "Calling LLM");

        let outcome = match timeout(config.chunk_timeout(), llm.complete(system_prompt, text)).await {
            Ok(Ok(reply)) => {
                debug!(chunk = index, "LLM response length: {} chars", reply.len());
                parse_location_response(&reply, index).map_err(|e| e.to_string())
            }
            Ok(Err(e)) => Err(ExtractorError::Llm(e.to_string()).to_string()),
            Err(_) => Err(ExtractorError::Timeout(config.chunk_timeout_secs).to_string()),
        };

        match outcome {
            Ok(parsed) => {
                debug!(chunk = index, mentions = parsed.mentions.len(), "Chunk parsed");
                return ChunkReport {
                    parsed: Some(parsed),
                    failures,
                };
            }
            Err(reason) => {
                warn!(chunk = index, attempt, "Chunk call failed: {}", reason);
                failures.push(reason);
            }
        }
    }

    ChunkReport {
        parsed: None,
        failures,
    }
}

/// Count word-bounded, case-insensitive occurrences of each name in the text
fn annotate_occurrences(text: &str, locations: &mut [AggregatedLocation]) {
    for location in locations.iter_mut() {
        let pattern = format!(r"\b{}\b", regex::escape(&location.name));
        location.text_occurrences = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .ok()
            .map(|re| re.find_iter(text).count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_llm::MockProvider;

    fn create_test_extractor(llm: MockProvider) -> Extractor<MockProvider> {
        Extractor::new(llm, ExtractorConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExtractorConfig {
            max_tokens_per_part: 0,
            ..ExtractorConfig::default()
        };
        let result = Extractor::new(MockProvider::default(), config);
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_prepare_short_document() {
        let extractor = create_test_extractor(MockProvider::default());
        let doc = Document::new("p", "The Lisbon Basin.").with_abstract("Rifting in Iberia.");

        let prepared = extractor.prepare(&doc).unwrap();
        assert_eq!(prepared.chunks.len(), 1);
        assert_eq!(prepared.chunks[0].text, "Rifting in Iberia.\n\nThe Lisbon Basin.");
        assert!(prepared.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_extract_empty_document() {
        let extractor = create_test_extractor(MockProvider::default());
        let result = extractor.extract(&Document::new("p", "   ")).await;
        assert!(matches!(result, Err(ExtractorError::Chunking(_))));
    }

    #[tokio::test]
    async fn test_extract_empty_response() {
        let extractor = create_test_extractor(MockProvider::new("[]"));
        let result = extractor.extract(&Document::new("p", "Some text")).await.unwrap();
        assert!(result.locations.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.metadata.chunk_count, 1);
    }

    #[test]
    fn test_annotate_occurrences() {
        let mut locations = vec![AggregatedLocation {
            name: "Sintra".to_string(),
            canonical_key: "sintra".to_string(),
            country: None,
            chunk_indices: vec![0],
            importance: 5.0,
            frequency: 1,
            evidence: vec![],
            text_occurrences: None,
            retained: true,
        }];
        annotate_occurrences("Sintra, SINTRA and Sintrano; sintra.", &mut locations);
        assert_eq!(locations[0].text_occurrences, Some(3));
    }
}
