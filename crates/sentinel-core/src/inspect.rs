//! Tooltip inspection over rendered segments.
//!
//! Pointer and keyboard paths share one state: at most one highlighted
//! segment is active, entering another replaces it, and leaving the active
//! segment clears it.

use std::fmt;

use crate::render::RenderSegment;
use crate::severity::{format, FormatMode, SEVERITY_MAX};
use crate::types::FlaggedSpan;

/// Vertical distance between the pointer and the tooltip anchor.
pub const TOOLTIP_OFFSET_Y: f32 = 40.0;

/// How a segment was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    Pointer { x: f32, y: f32 },
    Focus,
}

/// Active segment tracker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inspector {
    active: Option<usize>,
    anchor: Option<(f32, f32)>,
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the active segment.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Activate segment `index`. Plain or unknown segments are ignored.
    ///
    /// Returns whether the segment became active.
    pub fn enter(
        &mut self,
        segments: &[RenderSegment<'_>],
        index: usize,
        interaction: Interaction,
    ) -> bool {
        if !segments.get(index).is_some_and(|s| s.is_highlighted()) {
            return false;
        }
        self.active = Some(index);
        self.anchor = match interaction {
            Interaction::Pointer { x, y } => Some((x, y - TOOLTIP_OFFSET_Y)),
            Interaction::Focus => None,
        };
        true
    }

    /// Leave segment `index`; only clears if it is the active one.
    pub fn leave(&mut self, index: usize) {
        if self.active == Some(index) {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.anchor = None;
    }

    /// Move keyboard focus to the next highlighted segment, wrapping around.
    pub fn focus_next(&mut self, segments: &[RenderSegment<'_>]) -> Option<usize> {
        let highlighted = highlighted_indices(segments);
        let next = match self.active.and_then(|a| highlighted.iter().position(|&i| i == a)) {
            Some(pos) => highlighted.get((pos + 1) % highlighted.len()).copied(),
            None => highlighted.first().copied(),
        };
        self.focus(segments, next)
    }

    /// Move keyboard focus to the previous highlighted segment, wrapping around.
    pub fn focus_prev(&mut self, segments: &[RenderSegment<'_>]) -> Option<usize> {
        let highlighted = highlighted_indices(segments);
        let prev = match self.active.and_then(|a| highlighted.iter().position(|&i| i == a)) {
            Some(0) => highlighted.last().copied(),
            Some(pos) => highlighted.get(pos - 1).copied(),
            None => highlighted.last().copied(),
        };
        self.focus(segments, prev)
    }

    fn focus(&mut self, segments: &[RenderSegment<'_>], target: Option<usize>) -> Option<usize> {
        match target {
            Some(index) => {
                self.enter(segments, index, Interaction::Focus);
                Some(index)
            }
            None => {
                self.clear();
                None
            }
        }
    }

    /// Tooltip for the active segment.
    pub fn tooltip<'a>(&self, segments: &[RenderSegment<'a>]) -> Option<Tooltip<'a>> {
        let span = segments.get(self.active?)?.span?;
        Some(Tooltip {
            span,
            anchor: self.anchor,
        })
    }
}

/// Index of the segment containing character `offset`.
pub fn segment_at(segments: &[RenderSegment<'_>], offset: usize) -> Option<usize> {
    segments.iter().position(|s| s.range.contains(&offset))
}

/// Indices of highlighted segments, in display order.
pub fn highlighted_indices(segments: &[RenderSegment<'_>]) -> Vec<usize> {
    segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_highlighted())
        .map(|(i, _)| i)
        .collect()
}

/// Metadata shown for an active highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip<'a> {
    pub span: &'a FlaggedSpan,

    /// Screen anchor for pointer-driven tooltips
    pub anchor: Option<(f32, f32)>,
}

impl Tooltip<'_> {
    /// Tooltip rows as `(label, value)` pairs.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![("Type", self.span.category.to_string())];
        if let Some(subtype) = &self.span.subtype {
            rows.push(("PII Type", subtype.clone()));
        }
        rows.push((
            "Severity",
            format(self.span.severity, SEVERITY_MAX, FormatMode::Score).label,
        ));
        rows.push(("Details", self.span.explanation.clone()));
        rows
    }
}

impl fmt::Display for Tooltip<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        for (i, (label, value)) in rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{label}: {value}")?;
        }
        Ok(())
    }
}
