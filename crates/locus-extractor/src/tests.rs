//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{
        CancellationToken, ExtractionWarning, Extractor, ExtractorConfig, ExtractorError,
        HeuristicEstimator, MetadataExtractor, TopKFilter,
    };
    use locus_domain::traits::LlmProvider;
    use locus_domain::{Chunk, Document};
    use locus_llm::{LlmError, MockProvider};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn sentence(n: usize) -> String {
        format!("Sample {} was collected in the Lisbon Basin.", n)
    }

    /// Two-chunk paper mentioning the Lisbon Basin in every sentence
    fn paper_a() -> Document {
        let text: String = (1..=1450).map(|n| format!("{} ", sentence(n))).collect();
        Document::new("paperA", text)
    }

    fn test_config() -> ExtractorConfig {
        ExtractorConfig {
            retry_base_delay_ms: 1,
            ..ExtractorConfig::default()
        }
    }

    fn reply(name: &str, importance: u32, evidence: Option<&str>) -> String {
        let mut entry = json!({"location_name": name, "importance_score": importance});
        if let Some(evidence) = evidence {
            entry["evidence"] = json!(evidence);
        }
        json!({ "locations": [entry] }).to_string()
    }

    /// A sentence lying entirely inside the text shared by the two chunks
    fn sentence_in_overlap(chunks: &[Chunk]) -> String {
        let overlap = chunks[0].overlap_text(&chunks[1]).expect("chunks overlap");
        let inside: Vec<String> = (1..=1450)
            .map(sentence)
            .filter(|s| overlap.contains(s.as_str()))
            .collect();
        assert!(!inside.is_empty(), "overlap holds whole sentences");
        inside[inside.len() / 2].clone()
    }

    #[tokio::test]
    async fn test_paper_a_overlap_mention_with_evidence_counts_once() {
        let mut llm = MockProvider::default();
        let extractor = Extractor::new(llm.clone(), test_config()).unwrap();
        let doc = paper_a();

        let prepared = extractor.prepare(&doc).unwrap();
        assert_eq!(prepared.chunks.len(), 2);
        let evidence = sentence_in_overlap(&prepared.chunks);

        llm.add_response("Sample 1 was", reply("Lisbon Basin", 8, Some(&evidence)));
        llm.add_response("Sample 1450 was", reply("Lisbon Basin", 9, Some(&evidence)));

        let result = extractor.extract(&doc).await.unwrap();
        assert_eq!(llm.call_count(), 2);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.locations.len(), 1);

        let location = &result.locations[0];
        assert_eq!(location.name, "Lisbon Basin");
        assert_eq!(location.importance, 9.0);
        assert_eq!(location.frequency, 1);
        assert_eq!(location.chunk_indices, vec![0, 1]);
        assert_eq!(location.evidence, vec![evidence]);
        assert_eq!(location.text_occurrences, Some(1450));
        assert!(location.retained);
    }

    #[tokio::test]
    async fn test_paper_a_overlap_mention_by_name_counts_once() {
        let mut llm = MockProvider::default();
        llm.add_response("Sample 1 was", reply("Lisbon Basin", 8, None));
        llm.add_response("Sample 1450 was", reply("lisbon basin", 9, None));
        let extractor = Extractor::new(llm, test_config()).unwrap();

        let result = extractor.extract(&paper_a()).await.unwrap();
        assert_eq!(result.locations.len(), 1);
        assert_eq!(result.locations[0].importance, 9.0);
        assert_eq!(result.locations[0].frequency, 1);
        assert_eq!(result.metadata.chunk_count, 2);
        assert_eq!(result.metadata.mentions_received, 2);
    }

    #[tokio::test]
    async fn test_distinct_sentences_count_separately() {
        let mut llm = MockProvider::default();
        llm.add_response("Sample 1 was", reply("Lisbon Basin", 8, Some(&sentence(2))));
        llm.add_response("Sample 1450 was", reply("Lisbon Basin", 9, Some(&sentence(1449))));
        let extractor = Extractor::new(llm, test_config()).unwrap();

        let result = extractor.extract(&paper_a()).await.unwrap();
        assert_eq!(result.locations.len(), 1);
        assert_eq!(result.locations[0].frequency, 2);
    }

    #[tokio::test]
    async fn test_all_chunks_failing_yields_empty_result_with_warning() {
        let mut llm = MockProvider::default();
        llm.add_error("");
        let config = ExtractorConfig {
            max_attempts: 2,
            ..test_config()
        };
        let extractor = Extractor::new(llm.clone(), config).unwrap();

        let result = extractor
            .extract(&Document::new("p", "Samples from the Tagus Basin."))
            .await
            .unwrap();

        assert!(result.locations.is_empty());
        assert!(result.is_complete_failure());
        assert_eq!(result.metadata.failed_chunks, 1);
        assert_eq!(llm.call_count(), 2);
        assert!(matches!(
            result.warnings.as_slice(),
            [
                ExtractionWarning::ChunkRetried { chunk_index: 0, attempt: 1, .. },
                ExtractionWarning::ChunkFailed { chunk_index: 0, attempts: 2, .. },
                ExtractionWarning::AllChunksFailed { chunk_count: 1 },
            ]
        ));
        assert!(matches!(
            result.into_strict(),
            Err(ExtractorError::AllChunksFailed(1))
        ));
    }

    #[tokio::test]
    async fn test_one_failed_chunk_still_returns_the_rest() {
        let mut llm = MockProvider::default();
        llm.add_error("Sample 1 was");
        llm.add_response("Sample 1450 was", reply("Lisbon Basin", 9, None));
        let config = ExtractorConfig {
            max_attempts: 1,
            ..test_config()
        };
        let extractor = Extractor::new(llm, config).unwrap();

        let result = extractor.extract(&paper_a()).await.unwrap();
        assert!(!result.is_complete_failure());
        assert_eq!(result.metadata.failed_chunks, 1);
        assert_eq!(result.locations.len(), 1);
        assert_eq!(result.locations[0].chunk_indices, vec![1]);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::ChunkFailed { chunk_index: 0, .. })));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut llm = MockProvider::default();
        llm.add_transient_errors("Tagus", 2, reply("Tagus Basin", 7, None));
        let extractor = Extractor::new(llm.clone(), test_config()).unwrap();

        let result = extractor
            .extract(&Document::new("p", "Samples from the Tagus Basin."))
            .await
            .unwrap();

        assert_eq!(llm.call_count(), 3);
        assert_eq!(result.locations.len(), 1);
        assert_eq!(result.metadata.failed_chunks, 0);
        let retries = result
            .warnings
            .iter()
            .filter(|w| matches!(w, ExtractionWarning::ChunkRetried { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_invalid_json_reply_is_a_chunk_failure() {
        let llm = MockProvider::new("This is not JSON");
        let config = ExtractorConfig {
            max_attempts: 2,
            ..test_config()
        };
        let extractor = Extractor::new(llm.clone(), config).unwrap();

        let result = extractor.extract(&Document::new("p", "Some text")).await.unwrap();
        assert!(result.is_complete_failure());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let mut llm = MockProvider::default();
        llm.add_delayed_response("slow", Duration::from_millis(1_500), "[]");
        let config = ExtractorConfig {
            chunk_timeout_secs: 1,
            max_attempts: 1,
            ..test_config()
        };
        let extractor = Extractor::new(llm, config).unwrap();

        let result = extractor
            .extract(&Document::new("p", "A slow chunk"))
            .await
            .unwrap();

        match result.warnings.first() {
            Some(ExtractionWarning::ChunkFailed { reason, .. }) => {
                assert!(reason.contains("timeout"), "{}", reason)
            }
            other => panic!("unexpected warning {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_run() {
        let mut llm = MockProvider::default();
        llm.add_delayed_response("", Duration::from_secs(5), "[]");
        let extractor = Extractor::new(llm, test_config()).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = extractor
            .extract_with_cancellation(&paper_a(), cancel)
            .await;
        assert!(matches!(result, Err(ExtractorError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let extractor = Extractor::new(MockProvider::default(), test_config()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = extractor
            .extract_with_cancellation(&Document::new("p", "text"), cancel)
            .await;
        assert!(matches!(result, Err(ExtractorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_malformed_entries_become_warnings() {
        let llm = MockProvider::new(
            r#"[{"name": "Sintra", "importance": 6}, {"name": "", "importance": 2}, {"importance": 4}]"#,
        );
        let extractor = Extractor::new(llm, test_config()).unwrap();

        let result = extractor.extract(&Document::new("p", "Sintra")).await.unwrap();
        assert_eq!(result.locations.len(), 1);
        let dropped = result
            .warnings
            .iter()
            .filter(|w| matches!(w, ExtractionWarning::MentionDropped { chunk_index: 0, .. }))
            .count();
        assert_eq!(dropped, 2);
    }

    #[tokio::test]
    async fn test_abstract_is_prepended_to_every_chunk() {
        let llm = MockProvider::default();
        let extractor = Extractor::new(llm.clone(), test_config()).unwrap();
        let doc = Document {
            abstract_text: Some("We map rifting in the Lusitanian margin.".to_string()),
            ..paper_a()
        };

        extractor.extract(&doc).await.unwrap();
        let received = llm.received();
        assert!(received.len() >= 2);
        for text in received {
            assert!(text.starts_with("We map rifting in the Lusitanian margin.\n\nSample "));
        }
    }

    #[tokio::test]
    async fn test_abstract_disabled() {
        let llm = MockProvider::default();
        let config = ExtractorConfig {
            append_abstract_to_context: false,
            ..test_config()
        };
        let extractor = Extractor::new(llm.clone(), config).unwrap();
        let doc = Document::new("p", "Body text.").with_abstract("Abstract text.");

        extractor.extract(&doc).await.unwrap();
        assert_eq!(llm.received(), vec!["Body text."]);
    }

    #[test]
    fn test_long_abstract_is_truncated_with_warning() {
        let config = ExtractorConfig {
            max_tokens_per_part: 100,
            max_abstract_share: 0.2,
            ..test_config()
        };
        let extractor = Extractor::new(MockProvider::default(), config).unwrap();
        let abstract_text = "Rift basins of western Iberia record Mesozoic extension. ".repeat(10);
        let doc = Document::new("p", "Samples from the Tagus Basin.").with_abstract(abstract_text);

        let prepared = extractor.prepare(&doc).unwrap();
        assert!(matches!(
            prepared.warnings.as_slice(),
            [ExtractionWarning::AbstractTruncated { .. }]
        ));
        assert!(prepared.chunks[0].prefix().starts_with("Rift basins"));
        assert!(prepared.chunks[0].token_count <= 100);
    }

    #[test]
    fn test_abstract_with_oversized_first_word_is_kept_in_part() {
        let config = ExtractorConfig {
            max_tokens_per_part: 100,
            max_abstract_share: 0.5,
            ..test_config()
        };
        let extractor = Extractor::new(MockProvider::default(), config).unwrap();
        let abstract_text = format!("{} short words follow here", "x".repeat(400));
        let doc = Document::new("p", "Samples from the Tagus Basin.").with_abstract(abstract_text);

        let prepared = extractor.prepare(&doc).unwrap();
        assert!(matches!(
            prepared.warnings.as_slice(),
            [ExtractionWarning::AbstractTruncated { .. }]
        ));
        assert!(prepared.chunks[0].prefix().starts_with("xxxx"));
        assert!(prepared.chunks[0].token_count <= 100);
    }

    #[test]
    fn test_abstract_without_room_is_dropped_with_warning() {
        // A 0.04 share of 20 tokens leaves no token for the abstract
        let config = ExtractorConfig {
            max_tokens_per_part: 20,
            max_abstract_share: 0.04,
            ..test_config()
        };
        let extractor = Extractor::new(MockProvider::default(), config)
            .unwrap()
            .with_estimator(Arc::new(HeuristicEstimator::new("test", 4.0, 0.0)));
        let doc = Document::new("p", "Samples.").with_abstract("Rifting in Iberia.");

        let prepared = extractor.prepare(&doc).unwrap();
        assert!(matches!(
            prepared.warnings.as_slice(),
            [ExtractionWarning::AbstractDropped { original_tokens }] if *original_tokens > 0
        ));
        assert_eq!(prepared.chunks.len(), 1);
        assert_eq!(prepared.chunks[0].text, "Samples.");
    }

    #[test]
    fn test_keyword_focus_selects_windows() {
        let config = ExtractorConfig {
            keyword_window: Some(60),
            ..test_config()
        };
        let extractor = Extractor::new(MockProvider::default(), config).unwrap();

        let filler = "Quartz grains were counted under the microscope. ".repeat(40);
        let text = format!("{}The study area lies near Sintra. {}", filler, filler);
        let doc = Document::new("p", text.clone());

        let prepared = extractor.prepare(&doc).unwrap();
        assert!(prepared.warnings.is_empty());
        assert_eq!(prepared.chunks.len(), 1);
        let chunk = &prepared.chunks[0];
        assert!(chunk.start > 0);
        assert!(chunk.end < text.len());
        assert!(chunk.body().contains("The study area lies near Sintra."));
        assert_eq!(&text[chunk.span()], chunk.body());
    }

    #[test]
    fn test_keyword_focus_without_match_uses_full_text() {
        let config = ExtractorConfig {
            keyword_window: Some(60),
            ..test_config()
        };
        let extractor = Extractor::new(MockProvider::default(), config).unwrap();
        let doc = Document::new("p", "Quartz grains were counted under the microscope.");

        let prepared = extractor.prepare(&doc).unwrap();
        assert_eq!(prepared.warnings, vec![ExtractionWarning::KeywordFocusEmpty]);
        assert_eq!(prepared.chunks[0].body(), doc.text);
    }

    #[tokio::test]
    async fn test_percentile_filter_marks_top_locations() {
        let locations: Vec<_> = (1..=10)
            .map(|i| json!({"name": format!("Site {}", i), "importance": i}))
            .collect();
        let llm = MockProvider::new(json!(locations).to_string());
        let extractor = Extractor::new(llm, test_config()).unwrap();

        let result = extractor.extract(&Document::new("p", "Ten sites.")).await.unwrap();
        assert_eq!(result.locations.len(), 10);
        let retained: Vec<&str> = result.retained().map(|l| l.name.as_str()).collect();
        assert_eq!(retained, vec!["Site 10", "Site 9", "Site 8"]);
    }

    #[tokio::test]
    async fn test_custom_filter() {
        let llm = MockProvider::new(
            r#"[{"name": "A", "importance": 2}, {"name": "B", "importance": 9}, {"name": "C", "importance": 5}]"#,
        );
        let extractor = Extractor::new(llm, test_config())
            .unwrap()
            .with_filter(TopKFilter::new(1));

        let result = extractor.extract(&Document::new("p", "A B C")).await.unwrap();
        let retained: Vec<&str> = result.retained().map(|l| l.name.as_str()).collect();
        assert_eq!(retained, vec!["B"]);
    }

    #[tokio::test]
    async fn test_extraction_metadata() {
        let extractor = Extractor::new(MockProvider::default(), test_config())
            .unwrap()
            .with_model_name("test-model");

        let result = extractor.extract(&Document::new("doc-7", "Test text")).await.unwrap();
        assert_eq!(result.document_id, "doc-7");
        assert_eq!(result.metadata.model_name, "test-model");
        assert_eq!(result.metadata.chunk_count, 1);
        assert_eq!(result.metadata.failed_chunks, 0);
        assert!(result.metadata.total_tokens > 0);
    }

    /// Provider that records how many calls run at the same time
    #[derive(Clone, Default)]
    struct ConcurrencyProbe {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl LlmProvider for ConcurrencyProbe {
        type Error = LlmError;

        async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("[]".to_string())
        }

        fn model_name(&self) -> &str {
            "probe"
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let probe = ConcurrencyProbe::default();
        let config = ExtractorConfig {
            max_tokens_per_part: 2_000,
            max_concurrency: 2,
            ..test_config()
        };
        let extractor = Extractor::new(probe.clone(), config).unwrap();

        let result = extractor.extract(&paper_a()).await.unwrap();
        assert!(result.metadata.chunk_count > 2);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(probe.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_metadata_extraction_from_first_page() {
        let llm = MockProvider::new(
            r#"{"paper_title": "Rifting in Iberia", "authors": [{"author_name": "A. Silva"}],
                "journal_name": "Tectonophysics", "keywords": [{"keyword_name": "rift"}],
                "publication_year": "2020", "doi_number": ""}"#,
        );
        let page = "Rifting in Iberia\nA. Silva\nTectonophysics 2020\ndoi:10.1016/j.tecto.2020.228345";

        let metadata = MetadataExtractor::new(llm).extract(page).await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Rifting in Iberia"));
        assert_eq!(metadata.authors, vec!["A. Silva"]);
        assert_eq!(metadata.doi.as_deref(), Some("10.1016/j.tecto.2020.228345"));
    }
}
