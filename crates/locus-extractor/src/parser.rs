//! Parse LLM output into location mentions

use crate::error::ExtractorError;
use locus_domain::RawLocationMention;
use serde_json::{Map, Value};
use tracing::warn;

/// Mentions parsed from one chunk reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLocations {
    /// Well-formed mentions, in reply order
    pub mentions: Vec<RawLocationMention>,

    /// Why each malformed entry was dropped
    pub dropped: Vec<String>,
}

/// Parse a chunk reply into location mentions
///
/// Accepts a JSON array of locations or an object with a `locations` array,
/// optionally wrapped in a markdown code block. Entries use `name` or
/// `location_name`, `importance` or `importance_score`, and optionally
/// `evidence` and `country` / `location_country`.
///
/// # Errors
///
/// Returns [`ExtractorError::InvalidFormat`] when the reply as a whole is not
/// a location list. Malformed entries only end up in
/// [`ParsedLocations::dropped`].
pub fn parse_location_response(
    response: &str,
    chunk_index: usize,
) -> Result<ParsedLocations, ExtractorError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| ExtractorError::InvalidFormat(format!("JSON parse error: {}", e)))?;

    let entries = match &json {
        Value::Array(entries) => entries,
        Value::Object(obj) => match obj.get("locations") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) => return Ok(ParsedLocations::default()),
            None if obj.is_empty() => return Ok(ParsedLocations::default()),
            _ => {
                return Err(ExtractorError::InvalidFormat(
                    "Expected a 'locations' array".to_string(),
                ))
            }
        },
        _ => {
            return Err(ExtractorError::InvalidFormat(
                "Expected JSON array or object".to_string(),
            ))
        }
    };

    let mut parsed = ParsedLocations::default();
    for (idx, entry) in entries.iter().enumerate() {
        match parse_location_json(entry, chunk_index) {
            Ok(mention) => parsed.mentions.push(mention),
            Err(e) => {
                warn!(chunk = chunk_index, entry = idx, "Dropping location: {}", e);
                parsed.dropped.push(format!("entry {}: {}", idx, e));
            }
        }
    }

    Ok(parsed)
}

/// Extract JSON from response, handling markdown code blocks
pub(crate) fn extract_json(response: &str) -> Result<String, ExtractorError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(ExtractorError::InvalidFormat("Empty code block".to_string()));
        }

        // Skip the opening fence line and a closing fence if present
        let body_end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        Ok(lines[1..body_end].join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn string_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Result<f64, String> {
    let value = keys
        .iter()
        .find_map(|key| obj.get(*key))
        .ok_or_else(|| format!("Missing '{}'", keys[0]))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("Invalid '{}': {}", keys[0], value))?;

    if !number.is_finite() || number < 0.0 {
        return Err(format!("'{}' {} out of range", keys[0], number));
    }
    Ok(number)
}

/// Parse a single location from JSON
fn parse_location_json(json: &Value, chunk_index: usize) -> Result<RawLocationMention, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Location is not a JSON object".to_string())?;

    let name = string_field(obj, &["name", "location_name"])
        .ok_or_else(|| "Missing or empty 'name'".to_string())?;
    let importance = number_field(obj, &["importance", "importance_score"])?;

    let mut mention = RawLocationMention::new(chunk_index, name, importance);
    if let Some(evidence) = string_field(obj, &["evidence"]) {
        mention = mention.with_evidence(evidence);
    }
    if let Some(country) = string_field(obj, &["country", "location_country"]) {
        mention = mention.with_country(country);
    }
    Ok(mention)
}
