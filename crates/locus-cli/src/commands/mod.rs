//! Command implementations.

pub mod chunk;
pub mod config;
pub mod doi;
pub mod extract;
pub mod metadata;

pub use self::chunk::execute_chunk;
pub use self::config::execute_config;
pub use self::doi::execute_doi;
pub use self::extract::execute_extract;
pub use self::metadata::execute_metadata;

use crate::cli::{EndpointArgs, PaperArgs};
use crate::config::Config;
use crate::error::{CliError, Result};
use locus_domain::Document;
use locus_extractor::{strip_citations, trim_back_matter, ExtractorConfig};
use locus_llm::OpenAiProvider;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Read the paper text (and abstract) named on the command line.
pub(crate) fn read_paper(args: &PaperArgs) -> Result<Document> {
    let text = read_text(&args.file, args)?;
    if text.trim().is_empty() {
        return Err(CliError::InvalidInput(format!(
            "{} contains no text",
            args.file.display()
        )));
    }

    let id = match &args.id {
        Some(id) => id.clone(),
        None => args
            .file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string()),
    };

    let mut document = Document::new(id, text);
    if let Some(path) = &args.abstract_file {
        document = document.with_abstract(read_text(path, args)?);
    }
    Ok(document)
}

fn read_text(path: &Path, args: &PaperArgs) -> Result<String> {
    let mut text = fs::read_to_string(path)?;
    if args.trim_back_matter {
        let trimmed = trim_back_matter(&text);
        debug!(
            "Back matter trimmed from {}: {} -> {} bytes",
            path.display(),
            text.len(),
            trimmed.len()
        );
        text = trimmed.to_string();
    }
    if args.strip_citations {
        text = strip_citations(&text);
    }
    Ok(text)
}

/// Pipeline settings: config file, then preset, then flags.
pub(crate) fn pipeline_config(base: &ExtractorConfig, args: &PaperArgs) -> Result<ExtractorConfig> {
    let mut config = match &args.preset {
        Some(name) => {
            let preset = ExtractorConfig::preset(name)
                .ok_or_else(|| CliError::InvalidInput(format!("Unknown preset '{}'", name)))?;
            ExtractorConfig {
                model: base.model.clone(),
                system_prompt: base.system_prompt.clone(),
                ..preset
            }
        }
        None => base.clone(),
    };

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens_per_part = max_tokens;
    }
    if let Some(overlap) = args.overlap {
        config.overlap_percentage = overlap;
    }
    if args.no_abstract {
        config.append_abstract_to_context = false;
    }
    if let Some(window) = args.keyword_window {
        config.keyword_window = Some(window);
    }

    config.validate().map_err(CliError::Config)?;
    Ok(config)
}

/// OpenAI-compatible provider for `model`, flags taking precedence over config.
pub(crate) fn build_provider(
    config: &Config,
    endpoint: Option<&EndpointArgs>,
    model: &str,
) -> Result<OpenAiProvider> {
    let api_url = endpoint
        .and_then(|e| e.api_url.clone())
        .unwrap_or_else(|| config.llm.api_url.clone());
    let api_key = endpoint
        .and_then(|e| e.api_key.clone())
        .or_else(|| config.llm.api_key.clone());

    debug!("Using model '{}' at {}", model, api_url);
    let mut provider = OpenAiProvider::new(api_url, model)?
        .with_timeout(Duration::from_secs(config.llm.request_timeout_secs))?;
    if let Some(key) = api_key {
        provider = provider.with_api_key(key);
    }
    Ok(provider)
}
