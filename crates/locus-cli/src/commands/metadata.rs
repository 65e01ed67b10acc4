//! Metadata command implementation.

use super::build_provider;
use crate::cli::MetadataArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use locus_extractor::MetadataExtractor;
use std::fs;
use std::time::Duration;

/// Execute the metadata command.
pub async fn execute_metadata(args: MetadataArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let text = fs::read_to_string(&args.file)?;
    let page = first_page(&text, args.first_page_bytes);
    if page.trim().is_empty() {
        return Err(CliError::InvalidInput(format!(
            "{} contains no text",
            args.file.display()
        )));
    }

    let model = args
        .model
        .clone()
        .or_else(|| config.llm.metadata_model.clone())
        .unwrap_or_else(|| config.extractor.model.clone());
    let provider = build_provider(config, Some(&args.endpoint), &model)?;
    let extractor = MetadataExtractor::new(provider)
        .with_timeout(Duration::from_secs(config.llm.request_timeout_secs));

    let metadata = extractor.extract(page).await?;
    println!("{}", formatter.format_metadata(&metadata)?);
    Ok(())
}

/// Text up to the first form feed, or the first `max_bytes` bytes.
fn first_page(text: &str, max_bytes: usize) -> &str {
    if let Some(page_break) = text.find('\x0c') {
        return &text[..page_break];
    }
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_stops_at_form_feed() {
        assert_eq!(first_page("Title\nAuthors\x0cBody", 4000), "Title\nAuthors");
    }

    #[test]
    fn test_first_page_byte_limit() {
        assert_eq!(first_page("abcdef", 4), "abcd");
        assert_eq!(first_page("abc", 4), "abc");
        // 'é' is two bytes; never cut inside it
        assert_eq!(first_page("aéb", 2), "a");
    }
}
