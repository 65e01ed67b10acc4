//! Chunks - bounded slices of a document sized for one LLM call

use std::ops::Range;

/// A slice of document text, optionally preceded by a context prefix
/// (the abstract), sized to fit one model invocation.
///
/// Offsets are byte offsets into the document text. The body of the chunk is
/// exactly `document.text[start..end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the document's chunk sequence
    pub index: usize,

    /// Text sent to the model: context prefix followed by the body
    pub text: String,

    /// Byte length of the context prefix at the start of `text`
    pub prefix_len: usize,

    /// Byte offset of the body start in the document text
    pub start: usize,

    /// Byte offset one past the body end in the document text
    pub end: usize,

    /// Estimated token count of `text` (prefix included)
    pub token_count: usize,
}

impl Chunk {
    /// The document slice carried by this chunk, without the context prefix
    pub fn body(&self) -> &str {
        &self.text[self.prefix_len..]
    }

    /// The context prefix (empty when none was prepended)
    pub fn prefix(&self) -> &str {
        &self.text[..self.prefix_len]
    }

    /// Document byte range covered by the body
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length of the body in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True if the body is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if the document offset falls inside this chunk's body
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Document range shared with a later chunk, if any
    ///
    /// # Examples
    ///
    /// ```
    /// use locus_domain::Chunk;
    ///
    /// let a = Chunk { index: 0, text: "abcdef".into(), prefix_len: 0, start: 0, end: 6, token_count: 2 };
    /// let b = Chunk { index: 1, text: "efgh".into(), prefix_len: 0, start: 4, end: 8, token_count: 1 };
    /// assert_eq!(a.overlap_with(&b), Some(4..6));
    /// ```
    pub fn overlap_with(&self, later: &Chunk) -> Option<Range<usize>> {
        let start = later.start.max(self.start);
        let end = self.end.min(later.end);
        (start < end).then_some(start..end)
    }

    /// Text of the overlap region with a later chunk, taken from this chunk's body
    pub fn overlap_text<'a>(&'a self, later: &Chunk) -> Option<&'a str> {
        self.overlap_with(later)
            .map(|range| &self.body()[range.start - self.start..range.end - self.start])
    }
}
