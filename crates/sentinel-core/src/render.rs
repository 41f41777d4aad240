//! Span merging: turn a text and its flagged spans into ordered segments.
//!
//! Spans arrive unordered and may overlap or nest. They are processed in
//! ascending `(start, end)` order (shorter span first on equal starts) and
//! laid out by an [`OverlapPolicy`]. The default policy, [`CursorClip`],
//! walks the spans with a running cursor:
//!
//! - a span that ends at or before the cursor was already consumed by an
//!   earlier highlight and produces nothing;
//! - a span that starts before the cursor but ends after it only highlights
//!   `[cursor, end)`;
//! - gaps between highlights become plain segments.
//!
//! No interval union is attempted. Whatever the policy, the segments
//! concatenate back to the original text.

use serde::Serialize;
use std::ops::Range;

use crate::types::FlaggedSpan;

/// A piece of the rendered text, plain or highlighted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSegment<'a> {
    pub text: &'a str,

    /// Character range covered in the source text
    pub range: Range<usize>,

    /// The span that tags this segment, if highlighted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<&'a FlaggedSpan>,

    /// Index of `span` in the slice given to the renderer
    #[serde(skip)]
    pub span_index: Option<usize>,
}

impl RenderSegment<'_> {
    pub fn is_highlighted(&self) -> bool {
        self.span.is_some()
    }
}

/// Where a segment goes, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub range: Range<usize>,

    /// Index into the span slice for highlighted placements
    pub span: Option<usize>,
}

impl Placement {
    pub fn plain(range: Range<usize>) -> Self {
        Self { range, span: None }
    }

    pub fn highlight(range: Range<usize>, span: usize) -> Self {
        Self {
            range,
            span: Some(span),
        }
    }
}

/// Strategy for laying overlapping spans out over a text.
///
/// Implementations return placements that tile `0..text_len` in order.
/// The renderer clamps anything that strays past the text.
pub trait OverlapPolicy {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn place(&self, text_len: usize, spans: &[FlaggedSpan]) -> Vec<Placement>;
}

/// Indices of `spans` in processing order: `start` ascending, then `end`
/// ascending. Equal ranges keep their input order.
pub fn processing_order(spans: &[FlaggedSpan]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| (spans[i].start, spans[i].end));
    order
}

/// Clip overlapping spans against a running cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorClip;

impl OverlapPolicy for CursorClip {
    fn name(&self) -> &'static str {
        "cursor-clip"
    }

    fn place(&self, text_len: usize, spans: &[FlaggedSpan]) -> Vec<Placement> {
        let mut placements = Vec::with_capacity(spans.len() * 2 + 1);
        let mut cursor = 0;

        for index in processing_order(spans) {
            let span = &spans[index];
            let start = span.start.min(text_len);
            let end = span.end.min(text_len);
            let from = start.max(cursor);

            // Contained in earlier output, empty, or inverted.
            if end <= from {
                continue;
            }

            if start > cursor {
                placements.push(Placement::plain(cursor..start));
            }
            placements.push(Placement::highlight(from..end, index));
            cursor = end;
        }

        if cursor < text_len {
            placements.push(Placement::plain(cursor..text_len));
        }

        placements
    }
}

/// Render with the default [`CursorClip`] policy.
pub fn render<'a>(text: &'a str, spans: &'a [FlaggedSpan]) -> Vec<RenderSegment<'a>> {
    render_with(text, spans, &CursorClip)
}

/// Render with an explicit overlap policy.
pub fn render_with<'a, P>(
    text: &'a str,
    spans: &'a [FlaggedSpan],
    policy: &P,
) -> Vec<RenderSegment<'a>>
where
    P: OverlapPolicy + ?Sized,
{
    let offsets = char_byte_offsets(text);
    let text_len = offsets.len() - 1;

    policy
        .place(text_len, spans)
        .into_iter()
        .filter_map(|placement| {
            let start = placement.range.start.min(text_len);
            let end = placement.range.end.min(text_len);
            if start >= end {
                return None;
            }
            let span = placement.span.and_then(|i| spans.get(i));
            Some(RenderSegment {
                text: &text[offsets[start]..offsets[end]],
                range: start..end,
                span,
                span_index: span.and(placement.span),
            })
        })
        .collect()
}

/// Byte offset of every character boundary, including the end of the text.
fn char_byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpanCategory;
    use proptest::prelude::*;

    fn pii(start: usize, end: usize) -> FlaggedSpan {
        FlaggedSpan::new(start, end, SpanCategory::Pii, 5.0, format!("{start}..{end}"))
    }

    fn concat(segments: &[RenderSegment<'_>]) -> String {
        segments.iter().map(|s| s.text).collect()
    }

    #[test]
    fn test_no_spans_is_single_plain_segment() {
        let segments = render("hello world", &[]);
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].is_highlighted());
        assert_eq!(segments[0].text, "hello world");
    }

    #[test]
    fn test_empty_text_renders_nothing() {
        let spans = vec![pii(0, 3)];
        assert!(render("", &spans).is_empty());
    }

    #[test]
    fn test_plain_highlight_plain() {
        let text = "contact me at a@b.com today";
        let spans = vec![pii(14, 21)];
        let segments = render(text, &spans);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "contact me at ");
        assert_eq!(segments[1].text, "a@b.com");
        assert_eq!(segments[1].span, Some(&spans[0]));
        assert_eq!(segments[2].text, " today");
    }

    #[test]
    fn test_nested_span_is_skipped() {
        let text = "abcdefghijkl";
        let spans = vec![pii(0, 10), pii(5, 8)];
        let segments = render(text, &spans);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].range, 0..10);
        assert_eq!(segments[0].span_index, Some(0));
        assert_eq!(segments[1].range, 10..12);
        assert!(!segments[1].is_highlighted());
    }

    #[test]
    fn test_partial_overlap_is_clipped_at_cursor() {
        let text = "abcdefghijkl";
        let spans = vec![pii(6, 11), pii(2, 8)];
        let segments = render(text, &spans);

        let ranges: Vec<_> = segments.iter().map(|s| (s.range.clone(), s.span_index)).collect();
        assert_eq!(
            ranges,
            vec![
                (0..2, None),
                (2..8, Some(1)),
                (8..11, Some(0)),
                (11..12, None),
            ]
        );
    }

    #[test]
    fn test_equal_start_shorter_span_first() {
        let text = "0123456789";
        let spans = vec![pii(0, 8), pii(0, 3)];
        let segments = render(text, &spans);

        assert_eq!(segments[0].range, 0..3);
        assert_eq!(segments[0].span_index, Some(1));
        assert_eq!(segments[1].range, 3..8);
        assert_eq!(segments[1].span_index, Some(0));
    }

    #[test]
    fn test_unsorted_input_processed_in_order() {
        let spans = vec![pii(7, 9), pii(1, 2), pii(4, 5)];
        assert_eq!(processing_order(&spans), vec![1, 2, 0]);
    }

    #[test]
    fn test_multibyte_text_sliced_on_characters() {
        let text = "naïve café";
        let spans = vec![pii(6, 10)];
        let segments = render(text, &spans);

        assert_eq!(segments[1].text, "café");
        assert_eq!(concat(&segments), text);
    }

    #[test]
    fn test_span_past_end_is_clamped() {
        let text = "short";
        let spans = vec![pii(2, 40), pii(25, 42)];
        let segments = render(text, &spans);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "ort");
    }

    #[test]
    fn test_custom_policy_substitutes_layout() {
        struct FirstOnly;

        impl OverlapPolicy for FirstOnly {
            fn name(&self) -> &'static str {
                "first-only"
            }

            fn place(&self, text_len: usize, spans: &[FlaggedSpan]) -> Vec<Placement> {
                match spans.first() {
                    Some(span) => vec![
                        Placement::plain(0..span.start),
                        Placement::highlight(span.start..span.end, 0),
                        Placement::plain(span.end..text_len),
                    ],
                    None => vec![Placement::plain(0..text_len)],
                }
            }
        }

        let text = "abcdefgh";
        let spans = vec![pii(2, 4), pii(5, 7)];
        let segments = render_with(text, &spans, &FirstOnly);

        assert_eq!(segments.iter().filter(|s| s.is_highlighted()).count(), 1);
        assert_eq!(concat(&segments), text);
    }

    fn arb_spans() -> impl Strategy<Value = Vec<FlaggedSpan>> {
        prop::collection::vec((0usize..48, 0usize..16, any::<bool>()), 0..12).prop_map(|raw| {
            raw.into_iter()
                .map(|(start, len, injection)| {
                    let category = if injection {
                        SpanCategory::Injection
                    } else {
                        SpanCategory::Pii
                    };
                    FlaggedSpan::new(start, start + len, category, 5.0, "generated")
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_segments_reconstruct_text(text in "\\PC{0,40}", spans in arb_spans()) {
            let segments = render(&text, &spans);
            prop_assert_eq!(concat(&segments), text);
        }

        #[test]
        fn prop_segments_tile_in_order(text in "\\PC{0,40}", spans in arb_spans()) {
            let segments = render(&text, &spans);
            let mut cursor = 0;
            for segment in &segments {
                prop_assert_eq!(segment.range.start, cursor);
                prop_assert!(segment.range.end > segment.range.start);
                cursor = segment.range.end;
            }
            prop_assert_eq!(cursor, text.chars().count());
        }

        #[test]
        fn prop_highlights_stay_inside_their_span(text in "\\PC{0,40}", spans in arb_spans()) {
            for segment in render(&text, &spans) {
                if let Some(span) = segment.span {
                    prop_assert!(segment.range.start >= span.start);
                    prop_assert!(segment.range.end <= span.end);
                }
            }
        }

        #[test]
        fn prop_highlight_order_follows_start_then_end(spans in arb_spans()) {
            let text = "x".repeat(64);
            let starts: Vec<(usize, usize)> = render(&text, &spans)
                .iter()
                .filter_map(|s| s.span.map(|span| (span.start, span.end)))
                .collect();
            let mut sorted = starts.clone();
            sorted.sort();
            prop_assert_eq!(starts, sorted);
        }
    }
}
