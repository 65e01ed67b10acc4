//! Location mentions and their per-document aggregates

/// One location reported by the model for one chunk.
///
/// Mentions are received once per chunk invocation and never mutated
/// afterwards, except for resolving `source_offset` before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLocationMention {
    /// Index of the chunk the mention came from
    pub chunk_index: usize,

    /// Location name as returned by the model
    pub name: String,

    /// Model-assigned importance (higher = more central to the paper)
    pub importance: f64,

    /// Supporting text quoted from the chunk
    pub evidence: Option<String>,

    /// Country reported alongside the location
    pub country: Option<String>,

    /// Byte offset of the evidence in the document text, when known
    pub source_offset: Option<usize>,
}

impl RawLocationMention {
    /// Create a mention with no evidence
    pub fn new(chunk_index: usize, name: impl Into<String>, importance: f64) -> Self {
        Self {
            chunk_index,
            name: name.into(),
            importance,
            evidence: None,
            country: None,
            source_offset: None,
        }
    }

    /// Attach a supporting snippet
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Attach a country
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Attach a known document offset
    pub fn with_source_offset(mut self, offset: usize) -> Self {
        self.source_offset = Some(offset);
        self
    }
}

/// All mentions of one location across a document, merged.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedLocation {
    /// Representative spelling of the location name
    pub name: String,

    /// Normalized merge key
    pub canonical_key: String,

    /// Most frequently reported country
    pub country: Option<String>,

    /// Contributing chunk indices, ascending and unique
    pub chunk_indices: Vec<usize>,

    /// Combined importance (maximum over contributing mentions)
    pub importance: f64,

    /// Distinct mentions, overlap-region duplicates counted once
    pub frequency: usize,

    /// Distinct evidence snippets, in chunk order
    pub evidence: Vec<String>,

    /// Whole-text occurrences of the name, when counted
    pub text_occurrences: Option<usize>,

    /// False when the importance filter marked the location as background
    pub retained: bool,
}

impl AggregatedLocation {
    /// Name with the country appended, e.g. `"Lisbon Basin, Portugal"`
    pub fn display_name(&self) -> String {
        match &self.country {
            Some(country) if !country.trim().is_empty() => {
                format!("{}, {}", self.name, country.trim())
            }
            _ => self.name.clone(),
        }
    }
}
