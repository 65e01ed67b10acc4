//! Abstract prefix for chunk context
//!
//! Every chunk of a paper is sent with the paper's abstract in front of it so
//! the model knows what the paper is about even when a chunk is mostly
//! methods or results. The abstract is capped to a share of the token budget.

use crate::tokenizer::TokenEstimator;
use locus_domain::Document;

/// Separator between the prefix and the chunk body
pub const PREFIX_SEPARATOR: &str = "\n\n";

/// A prepared context prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPrefix {
    /// Prefix text, separator included
    pub text: String,

    /// Whether the abstract was cut to fit its share of the budget
    pub truncated: bool,

    /// Token estimate of the full abstract
    pub original_tokens: usize,

    /// Token estimate of the prefix as built
    pub tokens: usize,
}

impl ContextPrefix {
    /// Whether the budget left no room for any of the abstract
    pub fn is_dropped(&self) -> bool {
        self.text.is_empty()
    }
}

/// Builds the abstract prefix prepended to every chunk
pub struct ContextAugmenter<'a> {
    estimator: &'a dyn TokenEstimator,
    enabled: bool,
    max_prefix_tokens: usize,
}

impl<'a> ContextAugmenter<'a> {
    /// Create an augmenter allowing the prefix `max_share` of `max_tokens_per_part`
    pub fn new(
        estimator: &'a dyn TokenEstimator,
        enabled: bool,
        max_tokens_per_part: usize,
        max_share: f64,
    ) -> Self {
        Self {
            estimator,
            enabled,
            max_prefix_tokens: (max_tokens_per_part as f64 * max_share).floor() as usize,
        }
    }

    /// Prefix for the document, or `None` when disabled or there is no abstract
    ///
    /// An abstract too long for its share is cut at whitespace, or inside
    /// its first word when that word alone is too long. The returned prefix
    /// is empty (see [`ContextPrefix::is_dropped`]) only when not one
    /// character fits.
    pub fn prefix_for(&self, document: &Document) -> Option<ContextPrefix> {
        if !self.enabled || !document.has_abstract() {
            return None;
        }
        let abstract_text = document.abstract_text.as_deref()?.trim();
        self.build(abstract_text)
    }

    fn build(&self, abstract_text: &str) -> Option<ContextPrefix> {
        let estimate = |body: &str| self.estimator.estimate(&format!("{}{}", body, PREFIX_SEPARATOR));

        let original_tokens = estimate(abstract_text);
        if original_tokens <= self.max_prefix_tokens {
            return Some(ContextPrefix {
                text: format!("{}{}", abstract_text, PREFIX_SEPARATOR),
                truncated: false,
                original_tokens,
                tokens: original_tokens,
            });
        }

        // Longest whitespace-bounded head of the abstract that fits
        let cuts: Vec<usize> = abstract_text
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .map(|(i, _)| i)
            .collect();
        let fits = |cut: usize| estimate(abstract_text[..cut].trim_end()) <= self.max_prefix_tokens;
        let fitting = cuts.partition_point(|&cut| fits(cut));
        let mut head = match fitting {
            0 => "",
            n => abstract_text[..cuts[n - 1]].trim_end(),
        };

        // The first word alone is too long: cut it on a character boundary
        if head.is_empty() {
            let first_word_end = cuts.first().copied().unwrap_or(abstract_text.len());
            let char_cuts: Vec<usize> = abstract_text[..first_word_end]
                .char_indices()
                .map(|(i, _)| i)
                .skip(1)
                .chain(std::iter::once(first_word_end))
                .collect();
            let fitting = char_cuts.partition_point(|&cut| fits(cut));
            if fitting > 0 {
                head = &abstract_text[..char_cuts[fitting - 1]];
            }
        }

        if head.is_empty() {
            return Some(ContextPrefix {
                text: String::new(),
                truncated: true,
                original_tokens,
                tokens: 0,
            });
        }

        let text = format!("{}{}", head, PREFIX_SEPARATOR);
        let tokens = self.estimator.estimate(&text);
        Some(ContextPrefix {
            text,
            truncated: true,
            original_tokens,
            tokens,
        })
    }
}
