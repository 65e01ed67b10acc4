//! Documents - the unit of ingestion

use std::fmt;

/// Bibliographic metadata of a paper
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaperMetadata {
    /// Paper title
    pub title: Option<String>,

    /// Author names in publication order
    pub authors: Vec<String>,

    /// Digital Object Identifier (without resolver prefix)
    pub doi: Option<String>,

    /// Journal or venue name
    pub journal: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Author-supplied keywords
    pub keywords: Vec<String>,
}

impl PaperMetadata {
    /// Authors joined with `", "`, the way the backend stores them
    pub fn authors_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Keywords joined with `", "`
    pub fn keywords_line(&self) -> String {
        self.keywords.join(", ")
    }

    /// True when no field carries a value
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.authors.is_empty()
            && self.doi.is_none()
            && self.journal.is_none()
            && self.year.is_none()
            && self.keywords.is_empty()
    }
}

/// A document whose text has already been extracted from its PDF.
///
/// Documents are created once per ingestion and never mutated afterwards;
/// the builder methods consume `self` and are meant to be used only while
/// constructing the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document identifier (file stem, DOI, or caller-supplied id)
    pub id: String,

    /// Full extracted body text
    pub text: String,

    /// Abstract, extracted separately from the first page
    pub abstract_text: Option<String>,

    /// Bibliographic metadata
    pub metadata: PaperMetadata,
}

impl Document {
    /// Create a new document from its id and body text
    ///
    /// # Examples
    ///
    /// ```
    /// use locus_domain::Document;
    ///
    /// let doc = Document::new("paperA", "Samples were collected in the Lisbon Basin.")
    ///     .with_abstract("We study Cretaceous sediments of western Iberia.");
    /// assert_eq!(doc.id, "paperA");
    /// assert!(doc.has_abstract());
    /// ```
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            abstract_text: None,
            metadata: PaperMetadata::default(),
        }
    }

    /// Attach the abstract
    pub fn with_abstract(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = Some(abstract_text.into());
        self
    }

    /// Attach bibliographic metadata
    pub fn with_metadata(mut self, metadata: PaperMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// True if a non-blank abstract is present
    pub fn has_abstract(&self) -> bool {
        self.abstract_text
            .as_deref()
            .map_or(false, |a| !a.trim().is_empty())
    }

    /// True if the body has no visible text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metadata.title {
            Some(title) => write!(f, "{} ({})", self.id, title),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_abstract_is_not_an_abstract() {
        let doc = Document::new("d", "text").with_abstract("   \n");
        assert!(!doc.has_abstract());
    }

    #[test]
    fn test_is_blank() {
        assert!(Document::new("d", " \n\t").is_blank());
        assert!(!Document::new("d", "Lisbon").is_blank());
    }

    #[test]
    fn test_metadata_lines() {
        let metadata = PaperMetadata {
            authors: vec!["A. Ribeiro".to_string(), "M. Costa".to_string()],
            keywords: vec!["basin".to_string(), "rifting".to_string()],
            ..Default::default()
        };
        assert_eq!(metadata.authors_line(), "A. Ribeiro, M. Costa");
        assert_eq!(metadata.keywords_line(), "basin, rifting");
        assert!(!metadata.is_empty());
        assert!(PaperMetadata::default().is_empty());
    }

    #[test]
    fn test_display_uses_title_when_known() {
        let doc = Document::new("paperA", "x").with_metadata(PaperMetadata {
            title: Some("Rift basins of Iberia".to_string()),
            ..Default::default()
        });
        assert_eq!(doc.to_string(), "paperA (Rift basins of Iberia)");
    }
}
