//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use locus_domain::{Chunk, PaperMetadata};
use locus_extractor::{ExtractionResult, ExtractionWarning};
use serde_json::json;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Characters of chunk text shown in summaries
const PREVIEW_CHARS: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format an extraction result.
    ///
    /// Only retained locations are listed unless `show_all` is set.
    pub fn format_result(&self, result: &ExtractionResult, show_all: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_result_json(result, show_all),
            OutputFormat::Table => Ok(self.format_result_table(result, show_all)),
            OutputFormat::Quiet => Ok(result
                .locations
                .iter()
                .filter(|l| show_all || l.retained)
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn format_result_json(&self, result: &ExtractionResult, show_all: bool) -> Result<String> {
        let locations: Vec<serde_json::Value> = result
            .locations
            .iter()
            .filter(|l| show_all || l.retained)
            .map(|l| {
                json!({
                    "name": l.name,
                    "country": l.country,
                    "importance": l.importance,
                    "frequency": l.frequency,
                    "text_occurrences": l.text_occurrences,
                    "chunks": l.chunk_indices,
                    "evidence": l.evidence,
                    "retained": l.retained,
                })
            })
            .collect();

        let output = json!({
            "document_id": result.document_id,
            "locations": locations,
            "warnings": result.warnings,
            "metadata": result.metadata,
        });
        Ok(serde_json::to_string_pretty(&output)?)
    }

    fn format_result_table(&self, result: &ExtractionResult, show_all: bool) -> String {
        let rows: Vec<_> = result
            .locations
            .iter()
            .filter(|l| show_all || l.retained)
            .collect();

        let mut out = Vec::new();
        if rows.is_empty() {
            out.push(self.colorize("No locations found.", "yellow"));
        } else {
            let mut builder = Builder::default();
            builder.push_record(["Location", "Importance", "Frequency", "Occurrences", "Chunks", "Retained"]);
            for location in rows {
                let occurrences = location
                    .text_occurrences
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let chunks = location
                    .chunk_indices
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                builder.push_record([
                    location.display_name(),
                    format!("{:.1}", location.importance),
                    location.frequency.to_string(),
                    occurrences,
                    chunks,
                    if location.retained { "yes" } else { "no" }.to_string(),
                ]);
            }

            let mut table = builder.build();
            table
                .with(Style::rounded())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
            out.push(table.to_string());
        }

        for warning in &result.warnings {
            out.push(self.warning(&warning.to_string()));
        }
        out.push(self.info(&format!(
            "{} chunk(s), {} failed, {} ms, model {}",
            result.metadata.chunk_count,
            result.metadata.failed_chunks,
            result.metadata.processing_time_ms,
            result.metadata.model_name
        )));
        out.join("\n")
    }

    /// Format chunks; `full` prints every chunk text.
    pub fn format_chunks(&self, chunks: &[Chunk], full: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json_chunks: Vec<serde_json::Value> = chunks
                    .iter()
                    .map(|c| {
                        json!({
                            "index": c.index,
                            "start": c.start,
                            "end": c.end,
                            "prefix_len": c.prefix_len,
                            "token_count": c.token_count,
                            "text": if full { Some(c.text.as_str()) } else { None },
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json_chunks)?)
            }
            OutputFormat::Quiet => Ok(chunks
                .iter()
                .map(|c| format!("{}\t{}\t{}", c.start, c.end, c.token_count))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table if full => Ok(chunks
                .iter()
                .map(|c| {
                    format!(
                        "{}\n{}",
                        self.colorize(
                            &format!("── chunk {} [{}..{}] {} tokens", c.index, c.start, c.end, c.token_count),
                            "cyan"
                        ),
                        c.text
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["#", "Start", "End", "Tokens", "Begins with"]);
                for chunk in chunks {
                    builder.push_record([
                        chunk.index.to_string(),
                        chunk.start.to_string(),
                        chunk.end.to_string(),
                        chunk.token_count.to_string(),
                        preview(chunk.body()),
                    ]);
                }
                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format paper metadata.
    pub fn format_metadata(&self, metadata: &PaperMetadata) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "title": metadata.title,
                "authors": metadata.authors,
                "journal": metadata.journal,
                "year": metadata.year,
                "keywords": metadata.keywords,
                "doi": metadata.doi,
            }))?),
            OutputFormat::Quiet => Ok(metadata.doi.clone().unwrap_or_default()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                let year = metadata.year.map(|y| y.to_string()).unwrap_or_default();
                builder.push_record(["Title", metadata.title.as_deref().unwrap_or("")]);
                builder.push_record(["Authors", metadata.authors_line().as_str()]);
                builder.push_record(["Journal", metadata.journal.as_deref().unwrap_or("")]);
                builder.push_record(["Year", year.as_str()]);
                builder.push_record(["Keywords", metadata.keywords_line().as_str()]);
                builder.push_record(["DOI", metadata.doi.as_deref().unwrap_or("")]);
                let mut table = builder.build();
                table.with(Style::rounded());
                Ok(table.to_string())
            }
        }
    }

    /// Format a DOI lookup.
    pub fn format_doi(&self, doi: Option<&str>) -> Result<String> {
        match (self.format, doi) {
            (OutputFormat::Json, _) => Ok(serde_json::to_string_pretty(&json!({ "doi": doi }))?),
            (_, Some(doi)) => Ok(doi.to_string()),
            (OutputFormat::Quiet, None) => Ok(String::new()),
            (OutputFormat::Table, None) => Ok(self.warning("No DOI found")),
        }
    }

    /// Format warnings on their own.
    pub fn warnings(&self, warnings: &[ExtractionWarning]) -> String {
        warnings
            .iter()
            .map(|w| self.warning(&w.to_string()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

/// First characters of a text on one line
fn preview(text: &str) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
