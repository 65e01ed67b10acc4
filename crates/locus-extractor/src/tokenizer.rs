//! Token length estimation
//!
//! The chunker only needs a monotonic, deterministic estimate of how many
//! tokens a span of text costs for a given model. Estimators are looked up by
//! model identifier through a [`TokenizerRegistry`]; unknown identifiers fall
//! back to a generic heuristic.

use std::sync::Arc;
use tracing::debug;

/// Estimates the token length of text for one model family
///
/// Implementations must be deterministic and monotonic: extending a span never
/// lowers its estimate.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count of `text`
    fn estimate(&self, text: &str) -> usize;

    /// Name of the model family the estimate is tuned for
    fn family(&self) -> &str;
}

/// Character and whitespace heuristic
///
/// The estimate is the larger of `chars / chars_per_token` and
/// `words * tokens_per_word`, which keeps dense text (numbers, coordinates)
/// and long-word text both from being undercounted.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicEstimator {
    family: String,
    chars_per_token: f64,
    tokens_per_word: f64,
}

impl HeuristicEstimator {
    /// Create an estimator with explicit ratios
    pub fn new(family: impl Into<String>, chars_per_token: f64, tokens_per_word: f64) -> Self {
        Self {
            family: family.into(),
            chars_per_token: chars_per_token.max(0.1),
            tokens_per_word: tokens_per_word.max(0.0),
        }
    }

    /// Fallback used for unknown models
    pub fn generic() -> Self {
        Self::new("generic", 4.0, 1.33)
    }

    /// OpenAI GPT and o-series (BPE, cl100k/o200k style)
    pub fn openai() -> Self {
        Self::new("openai", 4.0, 1.3)
    }

    /// Anthropic Claude
    pub fn claude() -> Self {
        Self::new("claude", 3.5, 1.4)
    }

    /// SentencePiece-style open-weight models (Llama, Mistral, Qwen, Gemma, ...)
    pub fn sentencepiece() -> Self {
        Self::new("sentencepiece", 3.6, 1.45)
    }

    /// Google Gemini
    pub fn gemini() -> Self {
        Self::new("gemini", 4.0, 1.3)
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        let words = text.split_whitespace().count() as f64;
        let by_chars = (chars / self.chars_per_token).ceil();
        let by_words = (words * self.tokens_per_word).ceil();
        by_chars.max(by_words) as usize
    }

    fn family(&self) -> &str {
        &self.family
    }
}

/// Maps model identifiers to token estimators
///
/// Patterns are matched as substrings of the lowercased model identifier.
/// Estimators registered with [`TokenizerRegistry::register`] take priority
/// over the built-in families.
///
/// # Examples
///
/// ```
/// use locus_extractor::TokenizerRegistry;
///
/// let registry = TokenizerRegistry::new();
/// assert_eq!(registry.for_model("gpt-4o-mini").family(), "openai");
/// assert_eq!(registry.for_model("meta-llama/Llama-3.1-70B").family(), "sentencepiece");
/// assert_eq!(registry.for_model("my-private-model").family(), "generic");
/// ```
#[derive(Clone)]
pub struct TokenizerRegistry {
    custom: Vec<(String, Arc<dyn TokenEstimator>)>,
    builtin: Vec<(FamilyPattern, Arc<dyn TokenEstimator>)>,
    fallback: Arc<dyn TokenEstimator>,
}

impl TokenizerRegistry {
    /// Registry with the built-in model families
    pub fn new() -> Self {
        let openai: Arc<dyn TokenEstimator> = Arc::new(HeuristicEstimator::openai());
        let claude: Arc<dyn TokenEstimator> = Arc::new(HeuristicEstimator::claude());
        let sentencepiece: Arc<dyn TokenEstimator> =
            Arc::new(HeuristicEstimator::sentencepiece());
        let gemini: Arc<dyn TokenEstimator> = Arc::new(HeuristicEstimator::gemini());

        let mut builtin: Vec<(FamilyPattern, Arc<dyn TokenEstimator>)> = Vec::new();
        for pattern in ["gpt", "text-embedding", "davinci"] {
            builtin.push((FamilyPattern::Anywhere(pattern), Arc::clone(&openai)));
        }
        for pattern in ["o1", "o3", "o4"] {
            builtin.push((FamilyPattern::Leading(pattern), Arc::clone(&openai)));
        }
        builtin.push((FamilyPattern::Anywhere("claude"), Arc::clone(&claude)));
        for pattern in ["llama", "mistral", "mixtral", "qwen", "gemma", "deepseek"] {
            builtin.push((FamilyPattern::Anywhere(pattern), Arc::clone(&sentencepiece)));
        }
        for pattern in ["phi", "yi-"] {
            builtin.push((FamilyPattern::Leading(pattern), Arc::clone(&sentencepiece)));
        }
        builtin.push((FamilyPattern::Anywhere("gemini"), gemini));

        Self {
            custom: Vec::new(),
            builtin,
            fallback: Arc::new(HeuristicEstimator::generic()),
        }
    }

    /// Register an estimator for model identifiers containing `pattern`
    pub fn register(&mut self, pattern: impl Into<String>, estimator: Arc<dyn TokenEstimator>) {
        self.custom.push((pattern.into().to_lowercase(), estimator));
    }

    /// Estimator for a model identifier
    ///
    /// Never fails: unknown identifiers get the generic heuristic.
    pub fn for_model(&self, model: &str) -> Arc<dyn TokenEstimator> {
        let id = model.to_lowercase();

        let custom = self
            .custom
            .iter()
            .find(|(pattern, _)| id.contains(pattern.as_str()))
            .map(|(_, estimator)| estimator);
        let builtin = || {
            self.builtin
                .iter()
                .find(|(pattern, _)| pattern.matches(&id))
                .map(|(_, estimator)| estimator)
        };

        match custom.or_else(builtin) {
            Some(estimator) => Arc::clone(estimator),
            None => {
                debug!(model = %model, "unknown model family, using generic token estimate");
                Arc::clone(&self.fallback)
            }
        }
    }
}

/// How a built-in family name is looked for in a lowercase model id
#[derive(Debug, Clone, Copy)]
enum FamilyPattern {
    /// Anywhere in the id
    Anywhere(&'static str),
    /// At the start of the id or of a `/`-separated segment, so short
    /// names like `o1` or `phi` do not match inside unrelated ids
    Leading(&'static str),
}

impl FamilyPattern {
    fn matches(&self, id: &str) -> bool {
        match *self {
            FamilyPattern::Anywhere(pattern) => id.contains(pattern),
            FamilyPattern::Leading(pattern) => {
                id.split('/').any(|segment| segment.starts_with(pattern))
            }
        }
    }
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEstimator;

    impl TokenEstimator for FixedEstimator {
        fn estimate(&self, text: &str) -> usize {
            text.len()
        }

        fn family(&self) -> &str {
            "bytes"
        }
    }

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(HeuristicEstimator::generic().estimate(""), 0);
    }

    #[test]
    fn test_character_bound() {
        let estimator = HeuristicEstimator::new("t", 4.0, 0.0);
        assert_eq!(estimator.estimate("abcd"), 1);
        assert_eq!(estimator.estimate("abcde"), 2);
    }

    #[test]
    fn test_word_bound_dominates_short_words() {
        let estimator = HeuristicEstimator::new("t", 4.0, 1.0);
        // 10 chars -> 3 by chars, 5 words -> 5 by words
        assert_eq!(estimator.estimate("a b c d e "), 5);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let estimator = HeuristicEstimator::new("t", 1.0, 0.0);
        assert_eq!(estimator.estimate("Évora"), 5);
    }

    #[test]
    fn test_monotonic_under_extension() {
        let estimator = HeuristicEstimator::generic();
        let text = "The Lusitanian Basin lies along the western margin of Iberia.";
        let mut last = 0;
        for end in (0..=text.len()).filter(|i| text.is_char_boundary(*i)) {
            let current = estimator.estimate(&text[..end]);
            assert!(current >= last);
            last = current;
        }
    }

    #[test]
    fn test_registry_families() {
        let registry = TokenizerRegistry::new();
        assert_eq!(registry.for_model("GPT-4o").family(), "openai");
        assert_eq!(registry.for_model("claude-3-5-sonnet").family(), "claude");
        assert_eq!(registry.for_model("mistral-large").family(), "sentencepiece");
        assert_eq!(registry.for_model("gemini-1.5-pro").family(), "gemini");
        assert_eq!(registry.for_model("").family(), "generic");
    }

    #[test]
    fn test_short_family_names_match_only_at_segment_start() {
        let registry = TokenizerRegistry::new();
        assert_eq!(registry.for_model("o1-mini").family(), "openai");
        assert_eq!(registry.for_model("openai/o3-mini").family(), "openai");
        assert_eq!(registry.for_model("microsoft/Phi-3-mini").family(), "sentencepiece");

        assert_eq!(registry.for_model("dolphin-2.9").family(), "generic");
        assert_eq!(registry.for_model("acme-zo1-base").family(), "generic");
        assert_eq!(registry.for_model("sapphire-v4").family(), "generic");
    }

    #[test]
    fn test_custom_registration_takes_priority() {
        let mut registry = TokenizerRegistry::new();
        registry.register("GPT-4o", Arc::new(FixedEstimator));

        assert_eq!(registry.for_model("gpt-4o-mini").family(), "bytes");
        assert_eq!(registry.for_model("gpt-3.5-turbo").family(), "openai");
    }
}
