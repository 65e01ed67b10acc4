//! Keyword focus: keep only text near location cue phrases
//!
//! Geological papers name their study areas close to phrases like "study
//! area", "collected from" or "Formation". Sending only windows around those
//! phrases cuts the number of model calls for long papers.

use crate::error::ExtractorError;
use regex::{Regex, RegexBuilder};
use std::ops::Range;

/// Built-in cue phrases
pub const DEFAULT_FOCUS_KEYWORDS: &[&str] = &[
    "study area",
    "study site",
    "field area",
    "sampling site",
    "sample location",
    "province of",
    "district of",
    "county of",
    "city of",
    "town of",
    "village of",
    "basin",
    "formation",
    "complex",
    "range",
    "outcrop at",
    "exposed at",
    "collected from",
    "located in",
    "situated in",
    "region of",
    "area of",
];

/// Finds byte windows around cue phrases
#[derive(Debug, Clone)]
pub struct KeywordFocus {
    pattern: Regex,
    window: usize,
}

impl KeywordFocus {
    /// Build a matcher for `keywords` (whole words, case-insensitive)
    ///
    /// An empty keyword list selects [`DEFAULT_FOCUS_KEYWORDS`].
    pub fn new<S: AsRef<str>>(keywords: &[S], window: usize) -> Result<Self, ExtractorError> {
        let alternatives: Vec<String> = if keywords.is_empty() {
            DEFAULT_FOCUS_KEYWORDS.iter().map(|k| regex::escape(k)).collect()
        } else {
            keywords
                .iter()
                .map(|k| k.as_ref().trim())
                .filter(|k| !k.is_empty())
                .map(regex::escape)
                .collect()
        };
        if alternatives.is_empty() {
            return Err(ExtractorError::Config(
                "focus keywords must not be blank".to_string(),
            ));
        }

        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
            .case_insensitive(true)
            .build()
            .map_err(|e| ExtractorError::Config(format!("Invalid focus keywords: {}", e)))?;

        Ok(Self { pattern, window })
    }

    /// Merged windows of `window` bytes either side of every cue phrase
    ///
    /// Windows are widened to character boundaries. Returns an empty list when
    /// no cue phrase occurs.
    ///
    /// # Examples
    ///
    /// ```
    /// use locus_extractor::KeywordFocus;
    ///
    /// let focus = KeywordFocus::new(&["study area"], 4).unwrap();
    /// let text = "Intro text. The study area lies in Alentejo. More text.";
    /// assert_eq!(focus.windows(text), vec![12..30]);
    /// ```
    pub fn windows(&self, text: &str) -> Vec<Range<usize>> {
        let mut merged: Vec<Range<usize>> = Vec::new();
        for found in self.pattern.find_iter(text) {
            let start = floor_boundary(text, found.start().saturating_sub(self.window));
            let end = ceil_boundary(text, (found.end() + self.window).min(text.len()));
            match merged.last_mut() {
                Some(current) if start <= current.end => current.end = current.end.max(end),
                _ => merged.push(start..end),
            }
        }
        merged
    }
}

fn floor_boundary(text: &str, mut pos: usize) -> usize {
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn ceil_boundary(text: &str, mut pos: usize) -> usize {
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_focus(window: usize) -> KeywordFocus {
        KeywordFocus::new::<&str>(&[], window).unwrap()
    }

    #[test]
    fn test_no_cue_phrase_gives_no_windows() {
        let focus = default_focus(100);
        assert!(focus.windows("Quartz grains were counted under the microscope.").is_empty());
    }

    #[test]
    fn test_match_is_whole_word_and_case_insensitive() {
        let focus = default_focus(0);
        let text = "The Lusitanian BASIN is large. Basinal facies are not a cue.";
        assert_eq!(focus.windows(text), vec![15..20]);
    }

    #[test]
    fn test_overlapping_windows_merge() {
        let focus = KeywordFocus::new(&["basin"], 10).unwrap();
        let text = "basin and basin, then a long stretch of unrelated words, then basin";
        let windows = focus.windows(text);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], 0..25);
        assert_eq!(windows[1].end, text.len());
    }

    #[test]
    fn test_windows_respect_char_boundaries() {
        let focus = KeywordFocus::new(&["basin"], 2).unwrap();
        let text = "ÉÉ basin ÉÉ";
        let windows = focus.windows(text);
        assert_eq!(windows.len(), 1);
        assert_eq!(&text[windows[0].clone()], "É basin É");
    }

    #[test]
    fn test_blank_keywords_rejected() {
        assert!(KeywordFocus::new(&["  "], 10).is_err());
    }
}
