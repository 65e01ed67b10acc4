//! Text cleanup applied before chunking
//!
//! Extracted paper text carries hyphenated line breaks, inline citations and a
//! reference list, all of which waste budget and feed the model place names
//! from other papers.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)- (\w)").expect("valid hyphen break pattern"));

/// A parenthesised group containing a four-digit year, e.g. `(Smith, 2004)`
static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^()]*\d{4}[^()]*\)").expect("valid citation pattern"));

static BACK_MATTER_HEADING: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"^[ \t]*(?:\d+\.?\s*)?(?:references|bibliography|acknowledge?ments?|author contributions?|declarations?)\b[^\n]{0,40}$",
    )
    .case_insensitive(true)
    .multi_line(true)
    .build()
    .expect("valid back matter heading pattern")
});

/// Join hyphenated line breaks and drop parenthesised citations
///
/// # Examples
///
/// ```
/// use locus_extractor::strip_citations;
///
/// let text = "The Lusi- tanian Basin (Rasmussen et al., 1998) is a rift.";
/// assert_eq!(strip_citations(text), "The Lusitanian Basin  is a rift.");
/// ```
pub fn strip_citations(text: &str) -> String {
    let joined = HYPHEN_BREAK.replace_all(text, "$1$2");
    CITATION.replace_all(&joined, "").into_owned()
}

/// Cut the text before the back matter (references, acknowledgements, ...)
///
/// Only headings in the second half of the text count, so a table of
/// contents or an early "references therein" does not truncate the paper.
pub fn trim_back_matter(text: &str) -> &str {
    let half = text.len() / 2;
    BACK_MATTER_HEADING
        .find_iter(text)
        .find(|m| m.start() >= half)
        .map(|m| text[..m.start()].trim_end())
        .unwrap_or(text)
}
