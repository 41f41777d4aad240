//! Display model of an analysis: risk badge, overall severity, highlighted
//! text, bias gauges and summary notes.

use serde::Serialize;

use crate::render::{render, RenderSegment};
use crate::severity::{format_ratio, format_score, Severity, Tier};
use crate::types::{AnalysisResult, AnalysisStage, RiskTier};

pub const PRE_ANALYSIS_TITLE: &str = "Pre-Processing Security Analysis";
pub const POST_ANALYSIS_TITLE: &str = "Post-Processing Content Analysis";

/// One bias gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasRow {
    pub label: String,
    pub severity: Severity,
}

/// Everything a front end needs to draw an analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport<'a> {
    pub title: &'static str,
    pub risk_tier: RiskTier,
    pub risk_band: Tier,
    pub overall: Severity,

    /// Annotated text, absent when no text was supplied
    pub segments: Option<Vec<RenderSegment<'a>>>,

    /// Empty unless bias display was requested and metrics exist
    pub bias: Vec<BiasRow>,
    pub notes: &'a [String],
}

impl<'a> AnalysisReport<'a> {
    /// Build the report for `result`, annotating `text` when given.
    pub fn build(result: &'a AnalysisResult, text: Option<&'a str>, show_bias: bool) -> Self {
        let title = match result.stage() {
            AnalysisStage::Pre => PRE_ANALYSIS_TITLE,
            AnalysisStage::Post => POST_ANALYSIS_TITLE,
        };

        let bias = match result.bias_metrics() {
            Some(metrics) if show_bias => metrics
                .iter()
                .map(|m| BiasRow {
                    label: m.label.clone(),
                    severity: format_ratio(m.score),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            title,
            risk_tier: result.risk_tier(),
            risk_band: result.risk_tier().into(),
            overall: format_score(result.overall_severity()),
            segments: text.map(|t| render(t, result.spans())),
            bias,
            notes: result.summary_notes(),
        }
    }

    /// Badge text, e.g. "high Risk".
    pub fn risk_label(&self) -> String {
        format!("{} Risk", self.risk_tier)
    }
}
