//! Data model shared by the renderer, the report model and the workflow.
//!
//! Analysis results are produced once per service call and never change
//! afterwards. Their spans are normalized against the analyzed text when the
//! result is built, so every span held by a result satisfies
//! `start < end <= text length` (offsets are character positions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of problem a flagged span points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanCategory {
    /// Personally identifiable information
    Pii,
    /// Prompt injection attempt
    Injection,
}

impl SpanCategory {
    /// Styling class used by highlight renderers.
    pub fn css_class(self) -> &'static str {
        match self {
            SpanCategory::Pii => "highlight-pii",
            SpanCategory::Injection => "highlight-injection",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpanCategory::Pii => "pii",
            SpanCategory::Injection => "injection",
        }
    }
}

impl fmt::Display for SpanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A character range an upstream analyzer flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedSpan {
    /// First flagged character (inclusive)
    pub start: usize,

    /// End of the flagged range (exclusive)
    pub end: usize,

    pub category: SpanCategory,

    /// Finer classification, e.g. "email" or "ssn"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    /// Severity on a 0..10 scale
    pub severity: f64,

    pub explanation: String,
}

impl FlaggedSpan {
    /// Create a span without a subtype.
    pub fn new(
        start: usize,
        end: usize,
        category: SpanCategory,
        severity: f64,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            category,
            subtype: None,
            severity,
            explanation: explanation.into(),
        }
    }

    /// Attach a subtype.
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Number of characters covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clamp the span to a text of `text_len` characters.
    ///
    /// Returns `None` when nothing of the span remains inside the text.
    pub fn clamped(&self, text_len: usize) -> Option<FlaggedSpan> {
        let end = self.end.min(text_len);
        if self.start >= end {
            return None;
        }
        let mut span = self.clone();
        span.end = end;
        Some(span)
    }
}

/// Clamp spans to the text they were produced for, dropping the ones that
/// fall outside of it.
pub fn normalize_spans(spans: Vec<FlaggedSpan>, text: &str) -> Vec<FlaggedSpan> {
    let text_len = text.chars().count();
    spans
        .into_iter()
        .filter_map(|span| match span.clamped(text_len) {
            Some(clamped) => {
                if clamped.end != span.end {
                    tracing::debug!(
                        start = span.start,
                        end = span.end,
                        text_len,
                        "Clamped span end to text length"
                    );
                }
                Some(clamped)
            }
            None => {
                tracing::warn!(
                    start = span.start,
                    end = span.end,
                    text_len,
                    category = %span.category,
                    "Dropped span outside of analyzed text"
                );
                None
            }
        })
        .collect()
}

/// Ordinal risk classification of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Derive a tier from a 0..10 severity using the display bands.
    pub fn from_severity(severity: f64) -> Self {
        match severity {
            s if s <= 3.0 => RiskTier::Low,
            s if s <= 6.0 => RiskTier::Medium,
            s if s <= 8.0 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of generation an analysis ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Scan of the user prompt before generation
    Pre,
    /// Scan of the generated text
    Post,
}

/// One named bias axis and its 0..1 score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasMetric {
    /// Stable key, e.g. "gender"
    pub axis: String,

    /// Display label, e.g. "Gender Bias"
    pub label: String,

    pub score: f64,
}

/// Bias scores in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiasMetrics(Vec<BiasMetric>);

impl BiasMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis, replacing an existing entry with the same key.
    pub fn with(mut self, axis: impl Into<String>, label: impl Into<String>, score: f64) -> Self {
        let axis = axis.into();
        let metric = BiasMetric {
            label: label.into(),
            axis: axis.clone(),
            score,
        };
        match self.0.iter_mut().find(|m| m.axis == axis) {
            Some(existing) => *existing = metric,
            None => self.0.push(metric),
        }
        self
    }

    pub fn get(&self, axis: &str) -> Option<f64> {
        self.0.iter().find(|m| m.axis == axis).map(|m| m.score)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BiasMetric> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The outcome of one analysis call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    stage: AnalysisStage,
    spans: Vec<FlaggedSpan>,
    overall_severity: f64,
    risk_tier: RiskTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    bias_metrics: Option<BiasMetrics>,
    summary_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analyzed_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// Build a result for `text`, normalizing spans against it.
    pub fn new(
        stage: AnalysisStage,
        text: &str,
        spans: Vec<FlaggedSpan>,
        overall_severity: f64,
        risk_tier: RiskTier,
        summary_notes: Vec<String>,
    ) -> Self {
        Self {
            stage,
            spans: normalize_spans(spans, text),
            overall_severity,
            risk_tier,
            bias_metrics: None,
            summary_notes,
            analyzed_at: None,
        }
    }

    /// Record when the analysis was received.
    pub fn with_analyzed_at(mut self, at: DateTime<Utc>) -> Self {
        self.analyzed_at = Some(at);
        self
    }

    /// Attach bias metrics (post-analysis only carries them).
    pub fn with_bias_metrics(mut self, metrics: BiasMetrics) -> Self {
        self.bias_metrics = Some(metrics);
        self
    }

    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    pub fn spans(&self) -> &[FlaggedSpan] {
        &self.spans
    }

    pub fn overall_severity(&self) -> f64 {
        self.overall_severity
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    pub fn bias_metrics(&self) -> Option<&BiasMetrics> {
        self.bias_metrics.as_ref()
    }

    pub fn summary_notes(&self) -> &[String] {
        &self.summary_notes
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.analyzed_at
    }

    /// Whether this result blocks generation.
    pub fn is_critical(&self) -> bool {
        self.risk_tier == RiskTier::Critical
    }
}

/// A generation agent offered by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub endpoint: String,
}
