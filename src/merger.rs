// Span Merger: resolves overlapping detections from independent recognizers
// into a canonical, non-overlapping span set.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::span::Span;

/// Entity types in descending redaction relevance. Unlisted types rank below all of them.
pub const DEFAULT_ENTITY_PRIORITY: &[&str] = &[
    "US_SSN",
    "PHONE_NUMBER",
    "EMAIL_ADDRESS",
    "PERSON",
    "LOCATION",
    "DATE_TIME",
    "ACCOUNT_ID",
];

/// A span selected as canonical for its text region.
///
/// Either a single recognizer span, the union of same-type overlapping spans,
/// or a remainder piece of a span that lost part of its range to a
/// higher-ranked entity of another type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    pub source: String,
}

impl MergedSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &MergedSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True if `[start, end)` lies entirely within this span.
    pub fn covers(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end
    }
}

impl From<&Span> for MergedSpan {
    fn from(span: &Span) -> Self {
        Self {
            entity_type: span.entity_type.clone(),
            start: span.start,
            end: span.end,
            score: span.score,
            source: span.source.clone(),
        }
    }
}

/// Interval merger with a safety-biased tie-break between entity types.
#[derive(Debug, Clone)]
pub struct SpanMerger {
    priority: Vec<String>,
}

impl Default for SpanMerger {
    fn default() -> Self {
        Self::with_priority(DEFAULT_ENTITY_PRIORITY.iter().copied())
    }
}

impl SpanMerger {
    /// Merger using `priority` (highest first) to break score ties between types.
    pub fn with_priority<I, S>(priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            priority: priority.into_iter().map(Into::into).collect(),
        }
    }

    /// Rank of an entity type; larger wins. Unknown types rank 0.
    pub fn priority_of(&self, entity_type: &str) -> usize {
        self.priority
            .iter()
            .position(|p| p == entity_type)
            .map_or(0, |idx| self.priority.len() - idx)
    }

    /// Merge validated spans into a sequence sorted by `start` in which no two
    /// elements overlap.
    pub fn merge(&self, spans: &[Span]) -> Vec<MergedSpan> {
        let mut sorted: Vec<&Span> = spans.iter().collect();
        sorted.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut merged = Vec::with_capacity(sorted.len());
        let mut group: Vec<&Span> = Vec::new();
        let mut group_end = 0;

        for span in sorted {
            if !group.is_empty() && span.start >= group_end {
                self.resolve_group(&group, &mut merged);
                group.clear();
            }
            group_end = if group.is_empty() {
                span.end
            } else {
                group_end.max(span.end)
            };
            group.push(span);
        }
        if !group.is_empty() {
            self.resolve_group(&group, &mut merged);
        }

        merged.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        debug!(input = spans.len(), output = merged.len(), "merged spans");
        merged
    }

    /// Resolve one connected group of overlapping spans.
    ///
    /// Every position goes to the highest-ranked raw span covering it. Pieces
    /// of overlapping same-type spans that end up touching are then joined.
    fn resolve_group(&self, group: &[&Span], out: &mut Vec<MergedSpan>) {
        if let [only] = group {
            out.push(MergedSpan::from(*only));
            return;
        }

        let components = same_type_components(group);
        let mut ranked: Vec<(usize, MergedSpan)> = components
            .into_iter()
            .zip(group.iter().map(|s| MergedSpan::from(*s)))
            .collect();
        ranked.sort_by(|a, b| self.rank(&a.1, &b.1));

        // Disjoint ranges already claimed by higher-ranked spans, sorted by start.
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut pieces: Vec<(usize, MergedSpan)> = Vec::new();
        for (component, candidate) in ranked {
            let free = subtract_claimed(candidate.start, candidate.end, &claimed);
            if free.is_empty() {
                debug!(
                    entity_type = %candidate.entity_type,
                    start = candidate.start,
                    end = candidate.end,
                    "span fully contested, dropped"
                );
                continue;
            }
            for (start, end) in free {
                claimed.push((start, end));
                pieces.push((
                    component,
                    MergedSpan {
                        start,
                        end,
                        ..candidate.clone()
                    },
                ));
            }
            claimed.sort_unstable();
        }

        pieces.sort_by_key(|(_, piece)| piece.start);
        let mut joined: Vec<(usize, MergedSpan)> = Vec::with_capacity(pieces.len());
        for (component, piece) in pieces {
            match joined.last_mut() {
                Some((last_component, last)) if *last_component == component && last.end == piece.start => {
                    last.end = piece.end;
                    if piece.score > last.score {
                        last.score = piece.score;
                        last.source = piece.source;
                    }
                }
                _ => joined.push((component, piece)),
            }
        }
        out.extend(joined.into_iter().map(|(_, piece)| piece));
    }

    /// Ordering where the winner of a contested range sorts first.
    fn rank(&self, a: &MergedSpan, b: &MergedSpan) -> Ordering {
        b.score
            .total_cmp(&a.score)
            .then_with(|| self.priority_of(&b.entity_type).cmp(&self.priority_of(&a.entity_type)))
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.entity_type.cmp(&b.entity_type))
            .then_with(|| a.source.cmp(&b.source))
    }
}

/// Label each span with the id of its same-type overlap component: spans of
/// one type that overlap, directly or through a chain, share an id.
fn same_type_components(group: &[&Span]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..group.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (group[a], group[b]);
        a.entity_type
            .cmp(&b.entity_type)
            .then(a.start.cmp(&b.start))
            .then(b.end.cmp(&a.end))
    });

    let mut components = vec![0; group.len()];
    let mut next_id = 0;
    let mut open: Option<(&str, usize)> = None;
    for idx in order {
        let span = group[idx];
        open = match open {
            Some((entity_type, end)) if entity_type == span.entity_type && span.start < end => {
                Some((entity_type, end.max(span.end)))
            }
            _ => {
                next_id += 1;
                Some((span.entity_type.as_str(), span.end))
            }
        };
        components[idx] = next_id;
    }
    components
}

/// Parts of `[start, end)` not covered by any range in `claimed`.
fn subtract_claimed(start: usize, end: usize, claimed: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut cursor = start;
    for &(c_start, c_end) in claimed {
        if c_end <= cursor || c_start >= end {
            continue;
        }
        if c_start > cursor {
            pieces.push((cursor, c_start));
        }
        cursor = cursor.max(c_end);
        if cursor >= end {
            break;
        }
    }
    if cursor < end {
        pieces.push((cursor, end));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(entity_type: &str, start: usize, end: usize, score: f64, source: &str) -> Span {
        Span::new(entity_type, start, end, score, source).unwrap()
    }

    fn assert_no_overlap(merged: &[MergedSpan]) {
        for pair in merged.windows(2) {
            assert!(
                pair[0].end <= pair[1].start,
                "overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_disjoint_spans_pass_through() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("PHONE_NUMBER", 35, 43, 0.75, "b"),
            span("US_SSN", 10, 21, 0.85, "a"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].entity_type, "US_SSN");
        assert_eq!(merged[1].entity_type, "PHONE_NUMBER");
    }

    #[test]
    fn test_same_type_overlap_unions_and_keeps_best_score() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("PERSON", 0, 4, 0.9, "model-a"),
            span("PERSON", 0, 10, 0.6, "model-b"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start, merged[0].end), (0, 10));
        assert_eq!(merged[0].score, 0.9);
        assert_eq!(merged[0].source, "model-a");
    }

    #[test]
    fn test_same_type_chain_merges_transitively() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("LOCATION", 0, 5, 0.5, "a"),
            span("LOCATION", 4, 9, 0.5, "b"),
            span("LOCATION", 8, 12, 0.7, "c"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start, merged[0].end), (0, 12));
        assert_eq!(merged[0].source, "c");
    }

    #[test]
    fn test_adjacent_spans_stay_separate() {
        let merger = SpanMerger::default();
        let spans = vec![span("PERSON", 0, 4, 0.8, "a"), span("PERSON", 4, 8, 0.8, "b")];
        assert_eq!(merger.merge(&spans).len(), 2);
    }

    #[test]
    fn test_priority_breaks_score_tie() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("ACCOUNT_ID", 0, 11, 1.0, "regex:account_id"),
            span("US_SSN", 0, 11, 1.0, "model"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_type, "US_SSN");
    }

    #[test]
    fn test_higher_score_beats_priority() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("DATE_TIME", 0, 10, 0.95, "a"),
            span("PHONE_NUMBER", 0, 10, 0.4, "b"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_type, "DATE_TIME");
    }

    #[test]
    fn test_loser_clipped_to_remainder() {
        let merger = SpanMerger::default();
        // DATE_TIME [0,10) loses [5,10) to a higher scored PHONE_NUMBER [5,15)
        let spans = vec![
            span("DATE_TIME", 0, 10, 0.6, "a"),
            span("PHONE_NUMBER", 5, 15, 0.9, "b"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].entity_type.as_str(), merged[0].start, merged[0].end), ("DATE_TIME", 0, 5));
        assert_eq!((merged[1].entity_type.as_str(), merged[1].start, merged[1].end), ("PHONE_NUMBER", 5, 15));
    }

    #[test]
    fn test_loser_split_around_contained_winner() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("LOCATION", 0, 20, 0.7, "a"),
            span("US_SSN", 5, 16, 0.9, "b"),
        ];
        let merged = merger.merge(&spans);
        let ranges: Vec<_> = merged
            .iter()
            .map(|m| (m.entity_type.as_str(), m.start, m.end))
            .collect();
        assert_eq!(
            ranges,
            vec![("LOCATION", 0, 5), ("US_SSN", 5, 16), ("LOCATION", 16, 20)]
        );
    }

    #[test]
    fn test_fully_contained_loser_dropped() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("US_SSN", 0, 11, 0.9, "a"),
            span("ACCOUNT_ID", 2, 8, 0.9, "b"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_type, "US_SSN");
    }

    #[test]
    fn test_mixed_group_coalesces_same_type_first() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("PERSON", 0, 4, 0.8, "a"),
            span("PERSON", 0, 10, 0.8, "b"),
            span("LOCATION", 8, 14, 0.5, "c"),
        ];
        let merged = merger.merge(&spans);
        let ranges: Vec<_> = merged
            .iter()
            .map(|m| (m.entity_type.as_str(), m.start, m.end))
            .collect();
        assert_eq!(ranges, vec![("PERSON", 0, 10), ("LOCATION", 10, 14)]);
    }

    #[test]
    fn test_weak_same_type_extension_does_not_borrow_score() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("PERSON", 0, 4, 0.95, "a"),
            span("PERSON", 2, 20, 0.3, "b"),
            span("US_SSN", 8, 19, 0.9, "c"),
        ];
        let merged = merger.merge(&spans);
        let ranges: Vec<_> = merged
            .iter()
            .map(|m| (m.entity_type.as_str(), m.start, m.end))
            .collect();
        assert_eq!(
            ranges,
            vec![("PERSON", 0, 8), ("US_SSN", 8, 19), ("PERSON", 19, 20)]
        );
        assert_eq!(merged[0].score, 0.95);
        assert_eq!(merged[2].score, 0.3);
        assert_eq!(merged[2].source, "b");
    }

    #[test]
    fn test_touching_same_type_spans_in_mixed_group_stay_separate() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("PERSON", 0, 4, 0.8, "a"),
            span("PERSON", 4, 8, 0.8, "b"),
            span("LOCATION", 2, 6, 0.2, "c"),
        ];
        let merged = merger.merge(&spans);
        let ranges: Vec<_> = merged
            .iter()
            .map(|m| (m.entity_type.as_str(), m.start, m.end))
            .collect();
        assert_eq!(ranges, vec![("PERSON", 0, 4), ("PERSON", 4, 8)]);
    }

    #[test]
    fn test_same_type_components() {
        let spans = vec![
            span("PERSON", 0, 4, 0.8, "a"),
            span("LOCATION", 2, 6, 0.2, "b"),
            span("PERSON", 3, 9, 0.5, "c"),
            span("PERSON", 9, 12, 0.5, "d"),
        ];
        let group: Vec<&Span> = spans.iter().collect();
        let ids = same_type_components(&group);
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[3]);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_unknown_types_rank_lowest() {
        let merger = SpanMerger::default();
        assert_eq!(merger.priority_of("US_SSN"), DEFAULT_ENTITY_PRIORITY.len());
        assert_eq!(merger.priority_of("ACCOUNT_ID"), 1);
        assert_eq!(merger.priority_of("CRYPTO"), 0);

        let spans = vec![
            span("CRYPTO", 0, 6, 0.5, "a"),
            span("ACCOUNT_ID", 0, 6, 0.5, "b"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_type, "ACCOUNT_ID");
    }

    #[test]
    fn test_custom_priority_order() {
        let merger = SpanMerger::with_priority(["PHONE_NUMBER", "US_SSN"]);
        let spans = vec![
            span("US_SSN", 0, 11, 1.0, "a"),
            span("PHONE_NUMBER", 0, 11, 1.0, "b"),
        ];
        let merged = merger.merge(&spans);
        assert_eq!(merged[0].entity_type, "PHONE_NUMBER");
    }

    #[test]
    fn test_many_overlapping_types_never_overlap() {
        let merger = SpanMerger::default();
        let spans = vec![
            span("PERSON", 0, 12, 0.6, "a"),
            span("LOCATION", 3, 20, 0.7, "b"),
            span("DATE_TIME", 10, 25, 0.7, "c"),
            span("US_SSN", 14, 18, 0.99, "d"),
            span("EMAIL_ADDRESS", 24, 30, 0.3, "e"),
            span("PERSON", 28, 33, 0.9, "f"),
        ];
        let merged = merger.merge(&spans);
        assert_no_overlap(&merged);
        assert!(merged.iter().any(|m| m.entity_type == "US_SSN" && m.covers(14, 18)));
    }

    #[test]
    fn test_subtract_claimed() {
        assert_eq!(subtract_claimed(0, 10, &[]), vec![(0, 10)]);
        assert_eq!(subtract_claimed(0, 10, &[(2, 4), (6, 8)]), vec![(0, 2), (4, 6), (8, 10)]);
        assert!(subtract_claimed(0, 10, &[(0, 10)]).is_empty());
        assert_eq!(subtract_claimed(5, 10, &[(0, 6), (9, 12)]), vec![(6, 9)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(SpanMerger::default().merge(&[]).is_empty());
    }
}
