// Detected entity occurrences and the char/byte offset bookkeeping shared by
// recognizers, the merger and the anonymizer.

use serde::{Deserialize, Serialize};

use crate::error::SpanError;

/// A detected entity occurrence.
///
/// `start` and `end` are half-open offsets counted in Unicode scalar values of
/// the *original* text. They are never rewritten after redaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    /// Recognizer that produced the span, e.g. `regex:us_ssn` or `presidio:SpacyRecognizer`.
    pub source: String,
}

impl Span {
    /// Build a span, rejecting ranges and scores that can never be valid.
    pub fn new(
        entity_type: impl Into<String>,
        start: usize,
        end: usize,
        score: f64,
        source: impl Into<String>,
    ) -> Result<Self, SpanError> {
        let span = Self {
            entity_type: entity_type.into(),
            start,
            end,
            score,
            source: source.into(),
        };
        span.check_intrinsic()?;
        Ok(span)
    }

    /// Number of chars covered by the span.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Half-open overlap test: adjacent spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Validate the span against a text of `char_len` chars.
    ///
    /// Adapters can build spans through the public fields, so every span is
    /// checked again here before it may reach the merger.
    pub fn validate(&self, char_len: usize) -> Result<(), SpanError> {
        self.check_intrinsic()?;
        if self.end > char_len {
            return Err(SpanError::OutOfBounds {
                start: self.start,
                end: self.end,
                len: char_len,
            });
        }
        Ok(())
    }

    fn check_intrinsic(&self) -> Result<(), SpanError> {
        if self.entity_type.is_empty() {
            return Err(SpanError::MissingEntityType);
        }
        if self.start >= self.end {
            return Err(SpanError::EmptyRange {
                start: self.start,
                end: self.end,
            });
        }
        if !(0.0..=1.0).contains(&self.score) {
            // NaN fails the range check as well
            return Err(SpanError::ScoreOutOfRange { score: self.score });
        }
        Ok(())
    }
}

/// Maps between char offsets and byte offsets of one text.
///
/// Built once per engine call; `boundaries[i]` is the byte offset of char `i`
/// and the last entry is `text.len()`.
#[derive(Debug, Clone)]
pub struct CharIndex {
    boundaries: Vec<usize>,
}

impl CharIndex {
    pub fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    /// Length of the text in chars.
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Byte offset of a char offset, `None` past the end of the text.
    pub fn byte_offset(&self, char_offset: usize) -> Option<usize> {
        self.boundaries.get(char_offset).copied()
    }

    /// Char offset of a byte offset, `None` unless it falls on a char boundary.
    pub fn char_offset(&self, byte_offset: usize) -> Option<usize> {
        self.boundaries.binary_search(&byte_offset).ok()
    }

    /// Byte range of a char range, `None` if either end is out of bounds.
    pub fn byte_range(&self, start: usize, end: usize) -> Option<std::ops::Range<usize>> {
        Some(self.byte_offset(start)?..self.byte_offset(end)?)
    }

    /// Slice `text` (the text this index was built from) by char offsets.
    pub fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> Option<&'a str> {
        text.get(self.byte_range(start, end)?)
    }
}
