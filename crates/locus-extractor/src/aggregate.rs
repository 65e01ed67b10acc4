//! Cross-chunk aggregation of location mentions
//!
//! Every chunk call reports its own list of locations. Aggregation merges the
//! mentions of one location across chunks, counts how many distinct places in
//! the text mention it (a mention repeated because it sits in the overlap of
//! two chunks counts once) and keeps the highest importance any chunk gave it.

use locus_domain::{AggregatedLocation, Chunk, RawLocationMention};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalized merge key of a location name
///
/// NFKD-decomposes, drops combining marks, lowercases, turns everything that
/// is not alphanumeric into a space and collapses runs of spaces.
///
/// # Examples
///
/// ```
/// use locus_extractor::canonicalize;
///
/// assert_eq!(canonicalize("  Évora-Monte "), "evora monte");
/// assert_eq!(canonicalize("LISBON  Basin,"), "lisbon basin");
/// ```
pub fn canonicalize(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decides whether two location names refer to the same place
pub trait LocationMatcher: Send + Sync {
    /// Merge key of a name
    fn canonical_key(&self, name: &str) -> String {
        canonicalize(name)
    }

    /// Whether two canonical keys denote the same location
    fn matches(&self, a: &str, b: &str) -> bool;
}

/// Keys must be identical
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl LocationMatcher for ExactMatcher {
    fn matches(&self, a: &str, b: &str) -> bool {
        a == b
    }
}

/// Keys must be similar (normalized Levenshtein ratio)
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl FuzzyMatcher {
    /// Match keys whose similarity is at least `threshold` (0.0..=1.0)
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl LocationMatcher for FuzzyMatcher {
    fn matches(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        if a.is_empty() || b.is_empty() {
            return false;
        }
        rapidfuzz::fuzz::ratio(a.chars(), b.chars()) >= self.threshold
    }
}

/// A mention prepared for grouping
#[derive(Debug, Clone)]
struct Keyed<'a> {
    key: String,
    anchor: Option<usize>,
    mention: &'a RawLocationMention,
}

impl Keyed<'_> {
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then(self.mention.chunk_index.cmp(&other.mention.chunk_index))
            .then(self.anchor.cmp(&other.anchor))
            .then(self.mention.name.cmp(&other.mention.name))
            .then(self.mention.importance.total_cmp(&other.mention.importance))
            .then(self.mention.evidence.cmp(&other.mention.evidence))
            .then(self.mention.country.cmp(&other.mention.country))
    }
}

/// Merges per-chunk mentions into per-document locations
#[derive(Clone)]
pub struct Aggregator {
    matcher: Arc<dyn LocationMatcher>,
}

impl Aggregator {
    /// Aggregator using the given matching strategy
    pub fn new(matcher: Arc<dyn LocationMatcher>) -> Self {
        Self { matcher }
    }

    /// Aggregator with exact key matching
    pub fn exact() -> Self {
        Self::new(Arc::new(ExactMatcher))
    }

    /// Merge mentions into aggregated locations
    ///
    /// `chunks` supplies the spans used to resolve evidence and detect
    /// overlap duplicates; pass an empty slice when spans are unknown, in
    /// which case mentions from adjacent chunks are treated as duplicates.
    /// Mentions attributed to a chunk that is not in `chunks` are ignored.
    ///
    /// The result does not depend on the order of `mentions`. Locations are
    /// ordered by importance (descending), frequency (descending), then name.
    pub fn aggregate(
        &self,
        chunks: &[Chunk],
        mentions: &[RawLocationMention],
    ) -> Vec<AggregatedLocation> {
        let by_index: HashMap<usize, &Chunk> = chunks.iter().map(|c| (c.index, c)).collect();
        let spans_known = !chunks.is_empty();

        let mut keyed: Vec<Keyed<'_>> = Vec::with_capacity(mentions.len());
        for mention in mentions {
            let chunk = by_index.get(&mention.chunk_index).copied();
            if spans_known && chunk.is_none() {
                warn!(
                    chunk = mention.chunk_index,
                    name = %mention.name,
                    "Ignoring mention from unknown chunk"
                );
                continue;
            }
            let key = self.matcher.canonical_key(&mention.name);
            if key.is_empty() {
                continue;
            }
            keyed.push(Keyed {
                key,
                anchor: resolve_anchor(chunk, mention),
                mention,
            });
        }
        keyed.sort_by(Keyed::sort_cmp);

        // Greedy grouping over the sorted mentions keeps the result
        // independent of input order
        let mut groups: Vec<Vec<Keyed<'_>>> = Vec::new();
        for item in keyed {
            match groups
                .iter_mut()
                .find(|group| self.matcher.matches(&group[0].key, &item.key))
            {
                Some(group) => group.push(item),
                None => groups.push(vec![item]),
            }
        }

        let mut overlap_keys = OverlapCache::default();
        let mut locations: Vec<AggregatedLocation> = groups
            .iter()
            .map(|group| build_location(group, &by_index, spans_known, &mut overlap_keys))
            .collect();

        locations.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then(b.frequency.cmp(&a.frequency))
                .then(a.name.cmp(&b.name))
                .then(a.canonical_key.cmp(&b.canonical_key))
        });

        debug!(
            mentions = mentions.len(),
            locations = locations.len(),
            "mentions aggregated"
        );
        locations
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::exact()
    }
}

/// Document offset a mention points at, if it can be pinned down
///
/// Uses the mention's own offset when it lies inside the chunk body, else
/// looks the evidence up in the chunk body (case-insensitive, any run of
/// whitespace matching any other). When the location name occurs inside the
/// matched evidence the anchor is the name's position, so two quotes of
/// different length around the same mention resolve to the same offset.
pub fn resolve_anchor(chunk: Option<&Chunk>, mention: &RawLocationMention) -> Option<usize> {
    if let Some(offset) = mention.source_offset {
        return match chunk {
            Some(chunk) if !chunk.contains_offset(offset) => None,
            _ => Some(offset),
        };
    }

    let chunk = chunk?;
    let evidence = mention.evidence.as_deref()?;
    let evidence_re = flexible_regex(evidence)?;
    let body = chunk.body();
    let found = evidence_re.find(body)?;

    let name_at = flexible_regex(&mention.name)
        .and_then(|name_re| name_re.find(found.as_str()))
        .map(|m| m.start())
        .unwrap_or(0);
    Some(chunk.start + found.start() + name_at)
}

fn flexible_regex(text: &str) -> Option<Regex> {
    let words: Vec<String> = text.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    RegexBuilder::new(&words.join(r"\s+"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Canonical overlap text of adjacent chunk pairs, computed once per pair
#[derive(Default)]
struct OverlapCache {
    keys: HashMap<(usize, usize), Option<String>>,
}

impl OverlapCache {
    fn mentions_name(&mut self, earlier: &Chunk, later: &Chunk, key: &str) -> bool {
        let overlap = self
            .keys
            .entry((earlier.index, later.index))
            .or_insert_with(|| {
                earlier
                    .overlap_text(later)
                    .map(|text| format!(" {} ", canonicalize(text)))
            });
        match overlap {
            Some(text) => text.contains(&format!(" {} ", key)),
            None => false,
        }
    }
}

/// Whether two mentions of one location are the same occurrence in the text
fn same_occurrence(
    a: &Keyed<'_>,
    b: &Keyed<'_>,
    by_index: &HashMap<usize, &Chunk>,
    spans_known: bool,
    overlap_keys: &mut OverlapCache,
) -> bool {
    if let (Some(x), Some(y)) = (a.anchor, b.anchor) {
        return x == y;
    }

    let (ca, cb) = (a.mention.chunk_index, b.mention.chunk_index);
    if ca == cb {
        return true;
    }
    if ca.abs_diff(cb) != 1 {
        return false;
    }
    if !spans_known {
        return true;
    }

    let (first, second) = if ca < cb { (a, b) } else { (b, a) };
    let (Some(earlier), Some(later)) = (
        by_index.get(&first.mention.chunk_index),
        by_index.get(&second.mention.chunk_index),
    ) else {
        return false;
    };
    let Some(overlap) = earlier.overlap_with(later) else {
        return false;
    };

    match (first.anchor, second.anchor) {
        (Some(anchor), None) | (None, Some(anchor)) => overlap.contains(&anchor),
        _ => {
            overlap_keys.mentions_name(earlier, later, &first.key)
                || overlap_keys.mentions_name(earlier, later, &second.key)
        }
    }
}

/// Number of distinct places in the text a group of mentions points at
///
/// Anchored mentions form one occurrence per anchor. Each unanchored mention
/// then joins the first occurrence it duplicates, or starts its own. Joining
/// never merges two occurrences, so a bare mention cannot fold two distinct
/// anchors into one.
fn count_occurrences(
    group: &[Keyed<'_>],
    by_index: &HashMap<usize, &Chunk>,
    spans_known: bool,
    overlap_keys: &mut OverlapCache,
) -> usize {
    // Each occurrence is the list of group members describing it
    let mut occurrences: Vec<Vec<usize>> = Vec::new();
    let mut anchored: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, item) in group.iter().enumerate() {
        if let Some(anchor) = item.anchor {
            match anchored.get(&anchor) {
                Some(&slot) => occurrences[slot].push(i),
                None => {
                    anchored.insert(anchor, occurrences.len());
                    occurrences.push(vec![i]);
                }
            }
        }
    }

    for (i, item) in group.iter().enumerate().filter(|(_, k)| k.anchor.is_none()) {
        let existing = occurrences.iter_mut().find(|members| {
            members.iter().any(|&j| {
                same_occurrence(&group[j], item, by_index, spans_known, overlap_keys)
            })
        });
        match existing {
            Some(members) => members.push(i),
            None => occurrences.push(vec![i]),
        }
    }

    occurrences.len()
}

fn build_location(
    group: &[Keyed<'_>],
    by_index: &HashMap<usize, &Chunk>,
    spans_known: bool,
    overlap_keys: &mut OverlapCache,
) -> AggregatedLocation {
    let occurrences = count_occurrences(group, by_index, spans_known, overlap_keys);

    let mut chunk_indices: Vec<usize> = group.iter().map(|k| k.mention.chunk_index).collect();
    chunk_indices.sort_unstable();
    chunk_indices.dedup();

    let importance = group
        .iter()
        .map(|k| k.mention.importance)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut by_chunk: Vec<&Keyed<'_>> = group.iter().collect();
    by_chunk.sort_by_key(|k| k.mention.chunk_index);
    let mut evidence: Vec<String> = Vec::new();
    for item in by_chunk {
        if let Some(snippet) = item.mention.evidence.as_deref() {
            if !evidence.iter().any(|e| e == snippet) {
                evidence.push(snippet.to_string());
            }
        }
    }

    AggregatedLocation {
        name: representative_name(group),
        canonical_key: group[0].key.clone(),
        country: most_common_country(group),
        chunk_indices,
        importance,
        frequency: occurrences,
        evidence,
        text_occurrences: None,
        retained: true,
    }
}

/// Most frequent spelling; ties go to the higher importance, then the
/// lexicographically smaller spelling
fn representative_name(group: &[Keyed<'_>]) -> String {
    let mut spellings: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for item in group {
        let entry = spellings
            .entry(item.mention.name.as_str())
            .or_insert((0, f64::NEG_INFINITY));
        entry.0 += 1;
        entry.1 = entry.1.max(item.mention.importance);
    }
    spellings
        .into_iter()
        .max_by(|(name_a, (count_a, imp_a)), (name_b, (count_b, imp_b))| {
            count_a
                .cmp(count_b)
                .then(imp_a.total_cmp(imp_b))
                .then(name_b.cmp(name_a))
        })
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

fn most_common_country(group: &[Keyed<'_>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in group {
        if let Some(country) = item.mention.country.as_deref().map(str::trim) {
            if !country.is_empty() {
                *counts.entry(country).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by(|(name_a, count_a), (name_b, count_b)| {
            count_a.cmp(count_b).then(name_b.cmp(name_a))
        })
        .map(|(name, _)| name.to_string())
}
