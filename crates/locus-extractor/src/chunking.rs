//! Token-budgeted text chunking with overlap
//!
//! Long documents are split into balanced parts that each fit one model call.
//! Consecutive parts share roughly `overlap_percentage` of the budget so a
//! location mentioned near a cut is seen whole by at least one call. Cut
//! points prefer paragraph breaks, then sentence ends, then whitespace.

use crate::error::ExtractorError;
use crate::tokenizer::TokenEstimator;
use locus_domain::Chunk;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Splits document text into [`Chunk`]s under a token budget
pub struct TextChunker {
    estimator: Arc<dyn TokenEstimator>,
    max_tokens_per_part: usize,
    overlap_percentage: f64,
}

impl TextChunker {
    /// Create a new text chunker
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] if `max_tokens_per_part` is zero or
    /// `overlap_percentage` is outside `[0, 1)`.
    pub fn new(
        estimator: Arc<dyn TokenEstimator>,
        max_tokens_per_part: usize,
        overlap_percentage: f64,
    ) -> Result<Self, ExtractorError> {
        if max_tokens_per_part == 0 {
            return Err(ExtractorError::Config(
                "max_tokens_per_part must be greater than 0".to_string(),
            ));
        }
        if !overlap_percentage.is_finite() || !(0.0..1.0).contains(&overlap_percentage) {
            return Err(ExtractorError::Config(format!(
                "overlap_percentage {} out of range [0.0, 1.0)",
                overlap_percentage
            )));
        }
        Ok(Self {
            estimator,
            max_tokens_per_part,
            overlap_percentage,
        })
    }

    /// Token budget of one chunk, prefix included
    pub fn max_tokens_per_part(&self) -> usize {
        self.max_tokens_per_part
    }

    /// Estimated token count of `text`
    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /// Tokens left for document text once `prefix` is prepended
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Chunking`] if the prefix leaves no room.
    pub fn budget(&self, prefix: &str) -> Result<usize, ExtractorError> {
        let prefix_tokens = self.estimator.estimate(prefix);
        if prefix_tokens >= self.max_tokens_per_part {
            return Err(ExtractorError::Chunking(format!(
                "context prefix of {} tokens leaves no room in a {}-token part",
                prefix_tokens, self.max_tokens_per_part
            )));
        }
        Ok(self.max_tokens_per_part - prefix_tokens)
    }

    /// Tokens shared by consecutive chunks
    pub fn overlap_tokens(&self, budget: usize) -> usize {
        (budget as f64 * self.overlap_percentage).floor() as usize
    }

    /// Split the whole text, prepending `prefix` to every chunk
    ///
    /// # Examples
    ///
    /// ```
    /// use locus_extractor::{HeuristicEstimator, TextChunker};
    /// use std::sync::Arc;
    ///
    /// let chunker = TextChunker::new(Arc::new(HeuristicEstimator::generic()), 10_000, 0.15).unwrap();
    /// let chunks = chunker.chunk("Samples were taken near Évora.", "").unwrap();
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].text, "Samples were taken near Évora.");
    /// ```
    pub fn chunk(&self, text: &str, prefix: &str) -> Result<Vec<Chunk>, ExtractorError> {
        self.chunk_ranges(text, &[0..text.len()], prefix)
    }

    /// Split selected byte windows of the text
    ///
    /// Windows must be ascending, disjoint and on character boundaries.
    /// Chunk offsets refer to the full text and indices run on across
    /// windows. Whitespace-only windows are skipped.
    pub fn chunk_ranges(
        &self,
        text: &str,
        ranges: &[Range<usize>],
        prefix: &str,
    ) -> Result<Vec<Chunk>, ExtractorError> {
        if text.trim().is_empty() {
            return Err(ExtractorError::Chunking("document text is empty".to_string()));
        }
        validate_ranges(text, ranges)?;
        let budget = self.budget(prefix)?;

        let mut chunks = Vec::new();
        for range in ranges {
            if text[range.clone()].trim().is_empty() {
                continue;
            }
            let window = Window::new(self, text, prefix, range.clone());
            for (start, end) in window.split(budget)? {
                chunks.push(self.make_chunk(chunks.len(), text, prefix, start, end));
            }
        }

        if chunks.is_empty() {
            return Err(ExtractorError::Chunking(
                "selected ranges contain no text".to_string(),
            ));
        }

        debug!(
            chunks = chunks.len(),
            budget,
            overlap = self.overlap_tokens(budget),
            "document chunked"
        );
        Ok(chunks)
    }

    fn make_chunk(&self, index: usize, text: &str, prefix: &str, start: usize, end: usize) -> Chunk {
        let mut chunk_text = String::with_capacity(prefix.len() + end - start);
        chunk_text.push_str(prefix);
        chunk_text.push_str(&text[start..end]);
        let token_count = self.estimator.estimate(&chunk_text);
        Chunk {
            index,
            text: chunk_text,
            prefix_len: prefix.len(),
            start,
            end,
            token_count,
        }
    }
}

fn validate_ranges(text: &str, ranges: &[Range<usize>]) -> Result<(), ExtractorError> {
    if ranges.is_empty() {
        return Err(ExtractorError::Chunking("no text ranges to chunk".to_string()));
    }
    let mut previous_end = 0;
    for range in ranges {
        if range.start >= range.end
            || range.end > text.len()
            || range.start < previous_end
            || !text.is_char_boundary(range.start)
            || !text.is_char_boundary(range.end)
        {
            return Err(ExtractorError::Chunking(format!(
                "invalid text range {}..{} for a text of {} bytes",
                range.start,
                range.end,
                text.len()
            )));
        }
        previous_end = range.end;
    }
    Ok(())
}

/// Quality of a cut point: text before `pos` ends a paragraph (3), a
/// sentence (2), a word (1) or nothing (0)
fn boundary_rank(text: &str, pos: usize) -> u8 {
    let before = &text[..pos];
    if before.ends_with("\n\n") {
        return 3;
    }
    let mut rev = before.chars().rev();
    match (rev.next(), rev.next()) {
        (Some(ws), Some(p)) if ws.is_whitespace() && matches!(p, '.' | '!' | '?') => 2,
        (Some(ws), _) if ws.is_whitespace() => 1,
        _ => 0,
    }
}

/// One contiguous byte window being split
struct Window<'a> {
    chunker: &'a TextChunker,
    text: &'a str,
    prefix: &'a str,
    /// Character boundaries inside the window, both ends included
    bounds: Vec<usize>,
}

impl<'a> Window<'a> {
    fn new(chunker: &'a TextChunker, text: &'a str, prefix: &'a str, range: Range<usize>) -> Self {
        let bounds = (range.start..=range.end)
            .filter(|&i| text.is_char_boundary(i))
            .collect();
        Self {
            chunker,
            text,
            prefix,
            bounds,
        }
    }

    fn body_tokens(&self, start: usize, end: usize) -> usize {
        self.chunker.estimator.estimate(&self.text[start..end])
    }

    fn fits(&self, start: usize, end: usize) -> bool {
        if self.prefix.is_empty() {
            return self.body_tokens(start, end) <= self.chunker.max_tokens_per_part;
        }
        let mut joined = String::with_capacity(self.prefix.len() + end - start);
        joined.push_str(self.prefix);
        joined.push_str(&self.text[start..end]);
        self.chunker.estimator.estimate(&joined) <= self.chunker.max_tokens_per_part
    }

    /// Byte spans of the chunks, in order
    fn split(&self, budget: usize) -> Result<Vec<(usize, usize)>, ExtractorError> {
        let last = self.bounds.len() - 1;
        let (lo, hi) = (self.bounds[0], self.bounds[last]);
        if self.fits(lo, hi) {
            return Ok(vec![(lo, hi)]);
        }

        let overlap = self.chunker.overlap_tokens(budget);
        let effective = budget - overlap;
        let total = self.body_tokens(lo, hi);
        let parts = ((total.saturating_sub(overlap) + effective - 1) / effective).max(2);
        let target = ((total + (parts - 1) * overlap + parts - 1) / parts).clamp(1, budget);
        debug!(total, parts, target, overlap, "balanced split plan");

        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(parts);
        let mut previous_end_idx: Option<usize> = None;
        let mut start_idx = 0;
        loop {
            let start = self.bounds[start_idx];
            if self.fits(start, hi) {
                spans.push((start, hi));
                break;
            }

            let hard_idx = self.hard_end(start_idx)?;
            let soft_idx = self.soft_end(start_idx, hard_idx, target);
            let mut end_idx = self.snap_end(start_idx, soft_idx, hard_idx);

            if let Some(previous) = previous_end_idx {
                if end_idx <= previous {
                    if hard_idx <= previous {
                        // the overlap alone fills the budget
                        start_idx = previous;
                        continue;
                    }
                    end_idx = hard_idx;
                }
            }

            spans.push((start, self.bounds[end_idx]));
            previous_end_idx = Some(end_idx);
            start_idx = if overlap == 0 {
                end_idx
            } else {
                self.next_start(start_idx, end_idx, overlap)
            };
        }

        Ok(spans)
    }

    /// Furthest end that keeps the chunk within the budget
    fn hard_end(&self, start_idx: usize) -> Result<usize, ExtractorError> {
        let start = self.bounds[start_idx];
        let fitting = self.bounds[start_idx + 1..].partition_point(|&end| self.fits(start, end));
        if fitting == 0 {
            return Err(ExtractorError::Chunking(format!(
                "text at byte {} does not fit in a {}-token part",
                start, self.chunker.max_tokens_per_part
            )));
        }
        Ok(start_idx + fitting)
    }

    /// Furthest end whose body stays within the balanced target
    fn soft_end(&self, start_idx: usize, hard_idx: usize, target: usize) -> usize {
        let start = self.bounds[start_idx];
        let within = self.bounds[start_idx + 1..=hard_idx]
            .partition_point(|&end| self.body_tokens(start, end) <= target);
        start_idx + within.max(1)
    }

    /// Best boundary within a fifth of the chunk length around the soft end
    fn snap_end(&self, start_idx: usize, soft_idx: usize, hard_idx: usize) -> usize {
        let start = self.bounds[start_idx];
        let soft = self.bounds[soft_idx];
        let tolerance = (soft - start) / 5;
        let window_lo = soft.saturating_sub(tolerance).max(start + 1);
        let window_hi = (soft + tolerance).min(self.bounds[hard_idx]);
        self.best_boundary(window_lo, window_hi, soft).unwrap_or(soft_idx)
    }

    /// Start of the next chunk so that about `overlap` tokens are repeated
    fn next_start(&self, start_idx: usize, end_idx: usize, overlap: usize) -> usize {
        let end = self.bounds[end_idx];
        let skipped = self.bounds[start_idx + 1..=end_idx]
            .partition_point(|&s| self.body_tokens(s, end) > overlap);
        let ideal_idx = start_idx + 1 + skipped;
        let ideal = self.bounds[ideal_idx];

        let tolerance = (end - ideal) / 4;
        let window_lo = ideal
            .saturating_sub(tolerance)
            .max(self.bounds[start_idx + 1]);
        let window_hi = (ideal + tolerance).min(end);
        self.best_boundary(window_lo, window_hi, ideal)
            .unwrap_or(ideal_idx)
    }

    /// Index of the highest-ranked boundary in `[lo, hi]`, closest to `aim`
    /// on ties; `None` when the window has no word boundary at all
    fn best_boundary(&self, lo: usize, hi: usize, aim: usize) -> Option<usize> {
        if lo > hi {
            return None;
        }
        let first = self.bounds.partition_point(|&b| b < lo);
        let last = self.bounds.partition_point(|&b| b <= hi);

        let mut best: Option<(u8, usize, usize)> = None;
        for idx in first..last {
            let pos = self.bounds[idx];
            let rank = boundary_rank(self.text, pos);
            if rank == 0 {
                continue;
            }
            let distance = pos.abs_diff(aim);
            let better = match best {
                None => true,
                Some((best_rank, best_distance, _)) => {
                    rank > best_rank || (rank == best_rank && distance < best_distance)
                }
            };
            if better {
                best = Some((rank, distance, idx));
            }
        }
        best.map(|(_, _, idx)| idx)
    }
}
