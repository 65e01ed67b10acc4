//! LLM prompt engineering for location and metadata extraction

/// JSON schema of the location reply, appended to the system prompt
pub const LOCATIONS_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "locations": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "location_name": { "type": "string" },
          "location_country": { "type": "string" },
          "importance_score": { "type": "integer", "minimum": 1, "maximum": 10 },
          "evidence": { "type": "string", "description": "exact sentence from the text naming the location" }
        },
        "required": ["location_name", "location_country", "importance_score"]
      }
    }
  },
  "required": ["locations"]
}"#;

/// JSON schema of the metadata reply
pub const METADATA_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "paper_title": { "type": "string" },
    "authors": { "type": "array", "items": { "type": "object", "properties": { "author_name": { "type": "string" } } } },
    "journal_name": { "type": "string" },
    "keywords": { "type": "array", "items": { "type": "object", "properties": { "keyword_name": { "type": "string" } } } },
    "publication_year": { "type": "string" },
    "doi_number": { "type": "string" }
  },
  "required": ["paper_title", "authors", "journal_name", "keywords", "publication_year", "doi_number"]
}"#;

const METADATA_INSTRUCTIONS: &str = "Your job is to read the first page of a geological research paper \
and extract its metadata. Return the metadata in JSON with the given format.";

/// System message for location extraction: instructions plus reply schema
///
/// # Examples
///
/// ```
/// use locus_extractor::prompt::location_system_prompt;
///
/// let prompt = location_system_prompt("Find the study areas.");
/// assert!(prompt.starts_with("Find the study areas. The JSON object must use the schema:"));
/// ```
pub fn location_system_prompt(instructions: &str) -> String {
    with_schema(instructions, LOCATIONS_SCHEMA)
}

/// System message for metadata extraction
pub fn metadata_system_prompt() -> String {
    with_schema(METADATA_INSTRUCTIONS, METADATA_SCHEMA)
}

fn with_schema(instructions: &str, schema: &str) -> String {
    format!(
        "{} The JSON object must use the schema: {}",
        instructions.trim_end(),
        schema
    )
}
