//! Configuration for the Extractor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// System prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert geologist reading a scientific paper. \
Extract every geographic location where the study was carried out or samples were taken \
(study areas, basins, formations, outcrops, regions, cities, countries). \
Give each location an importance score between 1 and 10: 10 for the main study area, \
1 for locations mentioned only in passing. Return JSON only.";

/// How location names reported by different chunks are matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Canonical keys must be equal
    #[default]
    Exact,
    /// Canonical keys must be at least `threshold` similar (0.0..=1.0)
    Fuzzy {
        /// Normalized similarity required for a match
        threshold: f64,
    },
}

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Model identifier, used for token estimation and reporting
    pub model: String,

    /// Instructions sent as the system message of every chunk call
    pub system_prompt: String,

    /// Token budget of one chunk, context prefix included
    pub max_tokens_per_part: usize,

    /// Share of the budget repeated between consecutive chunks, in [0, 1)
    pub overlap_percentage: f64,

    /// Percentile (0-100) a location's importance must reach to be retained
    pub percentile_cutoff: f64,

    /// Prepend the abstract to every chunk
    pub append_abstract_to_context: bool,

    /// Largest share of the budget the abstract may take, in (0, 1)
    pub max_abstract_share: f64,

    /// Only send windows of this many bytes around location cue phrases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_window: Option<usize>,

    /// Cue phrases for keyword focus (empty = built-in list)
    pub focus_keywords: Vec<String>,

    /// The percentile threshold never drops below this score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_floor: Option<f64>,

    /// Maximum number of chunk calls in flight
    pub max_concurrency: usize,

    /// Timeout of a single chunk call attempt (seconds)
    pub chunk_timeout_secs: u64,

    /// Attempts per chunk before giving up on it
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry
    pub retry_base_delay_ms: u64,

    /// Count whole-text occurrences of every aggregated name
    pub count_text_occurrences: bool,

    /// Location name matching across chunks
    pub matching: MatchPolicy,
}

impl ExtractorConfig {
    /// Get the per-attempt timeout as a Duration
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens_per_part == 0 {
            return Err("max_tokens_per_part must be greater than 0".to_string());
        }
        if !self.overlap_percentage.is_finite()
            || self.overlap_percentage < 0.0
            || self.overlap_percentage >= 1.0
        {
            return Err(format!(
                "overlap_percentage {} out of range [0.0, 1.0)",
                self.overlap_percentage
            ));
        }
        if !self.percentile_cutoff.is_finite()
            || self.percentile_cutoff < 0.0
            || self.percentile_cutoff > 100.0
        {
            return Err(format!(
                "percentile_cutoff {} out of range [0, 100]",
                self.percentile_cutoff
            ));
        }
        if !(self.max_abstract_share > 0.0 && self.max_abstract_share < 1.0) {
            return Err(format!(
                "max_abstract_share {} out of range (0.0, 1.0)",
                self.max_abstract_share
            ));
        }
        if self.keyword_window == Some(0) {
            return Err("keyword_window must be greater than 0".to_string());
        }
        if let Some(floor) = self.importance_floor {
            if !floor.is_finite() {
                return Err("importance_floor must be a finite number".to_string());
            }
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".to_string());
        }
        if self.chunk_timeout_secs == 0 {
            return Err("chunk_timeout_secs must be greater than 0".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if let MatchPolicy::Fuzzy { threshold } = self.matching {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(format!(
                    "fuzzy matching threshold {} out of range (0.0, 1.0]",
                    threshold
                ));
            }
        }
        if self.system_prompt.trim().is_empty() {
            return Err("system_prompt must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration, matching the reference pipeline settings
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens_per_part: 10_000,
            overlap_percentage: 0.15,
            percentile_cutoff: 70.0,
            append_abstract_to_context: true,
            max_abstract_share: 0.5,
            keyword_window: None,
            focus_keywords: Vec::new(),
            importance_floor: None,
            max_concurrency: 4,
            chunk_timeout_secs: 120,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            count_text_occurrences: true,
            matching: MatchPolicy::Exact,
        }
    }
}

impl ExtractorConfig {
    /// Thorough preset: smaller chunks, more overlap and retries, fuzzy matching
    pub fn thorough() -> Self {
        Self {
            max_tokens_per_part: 6_000,
            overlap_percentage: 0.2,
            chunk_timeout_secs: 300,
            max_attempts: 5,
            matching: MatchPolicy::Fuzzy { threshold: 0.9 },
            ..Self::default()
        }
    }

    /// Fast preset: large chunks around location cue phrases only
    pub fn fast() -> Self {
        Self {
            max_tokens_per_part: 16_000,
            overlap_percentage: 0.1,
            keyword_window: Some(4_000),
            max_concurrency: 8,
            chunk_timeout_secs: 60,
            max_attempts: 2,
            retry_base_delay_ms: 500,
            ..Self::default()
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "thorough" => Some(Self::thorough()),
            "fast" => Some(Self::fast()),
            _ => None,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }

    /// Override settings from environment-style variables
    ///
    /// Reads `MAX_TOKENS_PER_PART`, `OVERLAP_PERCENTAGE`, `PERCENTILE_CUTOFF`,
    /// `SYSTEM_PROMPT`, `APPEND_ABSTRACT_TO_CONTEXT` and `LLM_MODEL` through
    /// `lookup`, so callers can pass `std::env::var` or a test map.
    ///
    /// # Examples
    ///
    /// ```
    /// use locus_extractor::ExtractorConfig;
    ///
    /// let config = ExtractorConfig::default()
    ///     .with_env(|key| (key == "MAX_TOKENS_PER_PART").then(|| "4000".to_string()))
    ///     .unwrap();
    /// assert_eq!(config.max_tokens_per_part, 4000);
    /// ```
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        if let Some(value) = lookup("MAX_TOKENS_PER_PART") {
            self.max_tokens_per_part = parse_var("MAX_TOKENS_PER_PART", &value)?;
        }
        if let Some(value) = lookup("OVERLAP_PERCENTAGE") {
            self.overlap_percentage = parse_var("OVERLAP_PERCENTAGE", &value)?;
        }
        if let Some(value) = lookup("PERCENTILE_CUTOFF") {
            self.percentile_cutoff = parse_var("PERCENTILE_CUTOFF", &value)?;
        }
        if let Some(value) = lookup("SYSTEM_PROMPT") {
            if !value.trim().is_empty() {
                self.system_prompt = value;
            }
        }
        if let Some(value) = lookup("APPEND_ABSTRACT_TO_CONTEXT") {
            self.append_abstract_to_context = parse_bool("APPEND_ABSTRACT_TO_CONTEXT", &value)?;
        }
        if let Some(value) = lookup("LLM_MODEL") {
            if !value.trim().is_empty() {
                self.model = value.trim().to_string();
            }
        }
        Ok(self)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("Invalid value '{}' for {}: {}", value, key, e))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("Invalid value '{}' for {}: expected true or false", value, key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tokens_per_part, 10_000);
        assert_eq!(config.overlap_percentage, 0.15);
        assert_eq!(config.percentile_cutoff, 70.0);
        assert_eq!(config.matching, MatchPolicy::default());
        assert_eq!(MatchPolicy::default(), MatchPolicy::Exact);
    }

    #[test]
    fn test_presets_are_valid() {
        for name in ["default", "thorough", "fast"] {
            let config = ExtractorConfig::preset(name).unwrap();
            assert!(config.validate().is_ok(), "preset {} invalid", name);
        }
        assert!(ExtractorConfig::preset("turbo").is_none());
    }

    #[test]
    fn test_invalid_max_tokens() {
        let mut config = ExtractorConfig::default();
        config.max_tokens_per_part = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_overlap() {
        let mut config = ExtractorConfig::default();
        config.overlap_percentage = 1.0;
        assert!(config.validate().is_err());

        config.overlap_percentage = -0.1;
        assert!(config.validate().is_err());

        config.overlap_percentage = f64::NAN;
        assert!(config.validate().is_err());

        config.overlap_percentage = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_fuzzy_threshold() {
        let mut config = ExtractorConfig::default();
        config.matching = MatchPolicy::Fuzzy { threshold: 1.5 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_doubles() {
        let config = ExtractorConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(1_000));
        assert_eq!(config.retry_delay(2), Duration::from_millis(2_000));
        assert_eq!(config.retry_delay(3), Duration::from_millis(4_000));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::thorough();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml(
            r#"
            max_tokens_per_part = 4000
            keyword_window = 2000

            [matching]
            policy = "fuzzy"
            threshold = 0.85
            "#,
        )
        .unwrap();

        assert_eq!(parsed.max_tokens_per_part, 4000);
        assert_eq!(parsed.keyword_window, Some(2000));
        assert_eq!(parsed.matching, MatchPolicy::Fuzzy { threshold: 0.85 });
        assert_eq!(parsed.overlap_percentage, 0.15);
    }

    #[test]
    fn test_env_overrides() {
        let config = ExtractorConfig::default()
            .with_env(env(&[
                ("MAX_TOKENS_PER_PART", "8000"),
                ("OVERLAP_PERCENTAGE", "0.2"),
                ("PERCENTILE_CUTOFF", "50"),
                ("APPEND_ABSTRACT_TO_CONTEXT", "False"),
                ("LLM_MODEL", "llama3.1:70b"),
                ("SYSTEM_PROMPT", "Find places."),
            ]))
            .unwrap();

        assert_eq!(config.max_tokens_per_part, 8000);
        assert_eq!(config.overlap_percentage, 0.2);
        assert_eq!(config.percentile_cutoff, 50.0);
        assert!(!config.append_abstract_to_context);
        assert_eq!(config.model, "llama3.1:70b");
        assert_eq!(config.system_prompt, "Find places.");
    }

    #[test]
    fn test_env_rejects_garbage() {
        let result = ExtractorConfig::default().with_env(env(&[("MAX_TOKENS_PER_PART", "lots")]));
        assert!(result.is_err());

        let result =
            ExtractorConfig::default().with_env(env(&[("APPEND_ABSTRACT_TO_CONTEXT", "maybe")]));
        assert!(result.is_err());
    }
}
