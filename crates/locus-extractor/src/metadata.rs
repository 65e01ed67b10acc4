//! Paper metadata: DOI lookup and LLM-based first-page extraction

use crate::error::ExtractorError;
use crate::parser::extract_json;
use crate::prompt::metadata_system_prompt;
use locus_domain::traits::LlmProvider;
use locus_domain::PaperMetadata;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::fmt::Display;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// DOI shapes, most general first
const DOI_PATTERNS: &[&str] = &[
    r"10\.\d{4,9}/[-._;()/:A-Z0-9]+",
    r"10\.1002/[^\s]+",
    r"10\.\d{4}/\d+-\d+X?(\d+)\d+<[\d\w]+:[\d\w]*>\d+\.\d+\.\w+;\d",
    r"10\.1021/\w\w\d+",
    r"10\.1207/[\w\d]+&\d+_\d+",
];

static DOI_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DOI_PATTERNS
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("valid DOI pattern")
        })
        .collect()
});

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[5-9]\d\d|20\d\d)\b").expect("valid year pattern"));

/// Find the first DOI in a text
///
/// Patterns are tried in order; for each pattern single lines are searched
/// before the whole text, so a DOI split across a line break is still found
/// by the later patterns only if nothing cleaner matched.
///
/// # Examples
///
/// ```
/// use locus_extractor::find_doi;
///
/// let page = "Journal of Iberian Geology\nhttps://doi.org/10.1007/s41513-021-00170-3\n";
/// assert_eq!(find_doi(page).as_deref(), Some("10.1007/s41513-021-00170-3"));
/// assert_eq!(find_doi("no identifier here"), None);
/// ```
pub fn find_doi(text: &str) -> Option<String> {
    for regex in DOI_REGEXES.iter() {
        for line in text.lines() {
            if let Some(found) = regex.find(line.trim()) {
                return Some(clean_doi(found.as_str()));
            }
        }
        if let Some(found) = regex.find(text) {
            return Some(clean_doi(found.as_str()));
        }
    }
    None
}

/// Trailing punctuation picked up from the surrounding sentence
fn clean_doi(doi: &str) -> String {
    doi.trim_end_matches(['.', ',', ';', ')'])
        .to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataReply {
    paper_title: Option<String>,
    authors: Vec<NamedEntry>,
    journal_name: Option<String>,
    keywords: Vec<NamedEntry>,
    publication_year: Option<YearValue>,
    doi_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NamedEntry {
    Author { author_name: String },
    Keyword { keyword_name: String },
    Plain(String),
}

impl NamedEntry {
    fn into_name(self) -> String {
        match self {
            NamedEntry::Author { author_name } => author_name,
            NamedEntry::Keyword { keyword_name } => keyword_name,
            NamedEntry::Plain(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YearValue {
    Number(i64),
    Text(String),
}

impl YearValue {
    fn year(&self) -> Option<i32> {
        match self {
            YearValue::Number(n) => i32::try_from(*n).ok(),
            YearValue::Text(s) => YEAR.find(s).and_then(|m| m.as_str().parse().ok()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a metadata reply into [`PaperMetadata`]
///
/// # Errors
///
/// Returns [`ExtractorError::InvalidFormat`] if the reply is not a JSON object.
pub fn parse_metadata_response(response: &str) -> Result<PaperMetadata, ExtractorError> {
    let json_str = extract_json(response)?;
    let reply: MetadataReply = serde_json::from_str(&json_str)
        .map_err(|e| ExtractorError::InvalidFormat(format!("Metadata JSON parse error: {}", e)))?;

    let clean_list = |entries: Vec<NamedEntry>| -> Vec<String> {
        entries
            .into_iter()
            .map(|e| e.into_name().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    };

    Ok(PaperMetadata {
        title: non_blank(reply.paper_title),
        authors: clean_list(reply.authors),
        doi: non_blank(reply.doi_number),
        journal: non_blank(reply.journal_name),
        year: reply.publication_year.as_ref().and_then(YearValue::year),
        keywords: clean_list(reply.keywords),
    })
}

/// Extracts bibliographic metadata from a paper's first page
pub struct MetadataExtractor<L: LlmProvider> {
    llm: L,
    call_timeout: Duration,
}

impl<L> MetadataExtractor<L>
where
    L: LlmProvider,
    L::Error: Display,
{
    /// Create a new metadata extractor
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            call_timeout: Duration::from_secs(120),
        }
    }

    /// Replace the LLM call timeout
    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Extract metadata from the first page
    ///
    /// A DOI found by pattern in the page text replaces the model's DOI.
    pub async fn extract(&self, first_page: &str) -> Result<PaperMetadata, ExtractorError> {
        if first_page.trim().is_empty() {
            return Err(ExtractorError::InvalidFormat("first page is empty".to_string()));
        }

        info!(model = %self.llm.model_name(), "Extracting paper metadata");
        let system_prompt = metadata_system_prompt();
        let reply = timeout(self.call_timeout, self.llm.complete(&system_prompt, first_page))
            .await
            .map_err(|_| ExtractorError::Timeout(self.call_timeout.as_secs()))?
            .map_err(|e| ExtractorError::Llm(e.to_string()))?;

        let mut metadata = parse_metadata_response(&reply)?;
        if let Some(doi) = find_doi(first_page) {
            debug!(doi = %doi, "DOI found in page text");
            metadata.doi = Some(doi);
        }
        Ok(metadata)
    }
}
