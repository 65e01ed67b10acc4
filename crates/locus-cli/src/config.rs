//! Configuration management for the CLI.
//!
//! Settings are layered: the config file, then environment variables (a
//! `.env` file is loaded into the environment first), then command-line flags.

use crate::error::{CliError, Result};
use locus_extractor::ExtractorConfig;
use locus_llm::openai::DEFAULT_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM endpoint settings
    #[serde(default)]
    pub llm: LlmSettings,

    /// Extraction pipeline settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// LLM endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (prefer the `LLM_API_KEY` environment variable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for metadata extraction (defaults to the extractor model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_model: Option<String>,

    /// HTTP timeout of one request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".locus").join("config.toml"))
    }

    /// Load configuration from `path`, or the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path()?,
        };

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment-style overrides read through `lookup`.
    ///
    /// Reads `LLM_API_URL`, `LLM_API_KEY` and `LLM_MODEL_METADATA` here, and
    /// the pipeline variables through [`ExtractorConfig::with_env`].
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("LLM_API_URL").filter(|v| !v.trim().is_empty()) {
            self.llm.api_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL_METADATA").filter(|v| !v.trim().is_empty()) {
            self.llm.metadata_model = Some(model);
        }
        self.extractor = self
            .extractor
            .clone()
            .with_env(&lookup)
            .map_err(CliError::Config)?;
        Ok(())
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            metadata_model: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.api_url, DEFAULT_ENDPOINT);
        assert_eq!(config.extractor.max_tokens_per_part, 10_000);
        assert!(config.settings.color);
        assert_eq!(config.settings.format, OutputFormat::Table);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.extractor.percentile_cutoff, 70.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.extractor = ExtractorConfig::thorough();
        config.llm.api_url = "http://localhost:11434/v1".to_string();
        config.settings.format = OutputFormat::Json;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.extractor, ExtractorConfig::thorough());
        assert_eq!(loaded.llm.api_url, "http://localhost:11434/v1");
        assert_eq!(loaded.settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[extractor]\nmax_tokens_per_part = 4000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.extractor.max_tokens_per_part, 4000);
        assert_eq!(config.extractor.overlap_percentage, 0.15);
        assert_eq!(config.llm.api_url, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[extractor\n").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(CliError::Toml(_))));
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("LLM_API_URL", "http://localhost:8000/v1"),
            ("LLM_API_KEY", "secret"),
            ("LLM_MODEL", "llama3.1"),
            ("PERCENTILE_CUTOFF", "50"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.api_url, "http://localhost:8000/v1");
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.extractor.model, "llama3.1");
        assert_eq!(config.extractor.percentile_cutoff, 50.0);
    }

    #[test]
    fn test_apply_env_rejects_bad_numbers() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "MAX_TOKENS_PER_PART").then(|| "many".to_string()));
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
