//! JSON payloads exchanged with the shield and agent servers.
//!
//! Responses are decoded into these types first and converted to the core
//! model afterwards; a missing required field is a decode error. Unknown
//! fields are ignored.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use sentinel_core::{
    AnalysisResult, AnalysisStage, BiasMetrics, FlaggedSpan, RiskTier, SpanCategory,
};

/// Bias axes in display order: (wire field, axis key, label).
pub const BIAS_AXES: [(&str, &str, &str); 5] = [
    ("racial_score", "racial", "Racial Bias"),
    ("gender_score", "gender", "Gender Bias"),
    ("age_score", "age", "Age Bias"),
    ("religious_score", "religious", "Religious Bias"),
    ("hate_speech_score", "hate_speech", "Hate Speech"),
];

/// A flagged character range as sent by the shield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpan {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanCategory,
    #[serde(rename = "piiType", default, skip_serializing_if = "Option::is_none")]
    pub pii_type: Option<String>,
    pub severity_score: f64,
    pub explanation: String,
}

impl From<IndexSpan> for FlaggedSpan {
    fn from(span: IndexSpan) -> Self {
        FlaggedSpan {
            start: span.start,
            end: span.end,
            category: span.kind,
            subtype: span.pii_type,
            severity: span.severity_score,
            explanation: span.explanation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub detected: bool,
    pub indices: Vec<IndexSpan>,
}

impl Detection {
    pub fn from_spans(indices: Vec<IndexSpan>) -> Self {
        Self {
            detected: !indices.is_empty(),
            indices,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasDetection {
    pub detected: bool,
    #[serde(default)]
    pub indices: Vec<IndexSpan>,
    pub racial_score: f64,
    pub gender_score: f64,
    pub age_score: f64,
    pub religious_score: f64,
    pub hate_speech_score: f64,
}

impl BiasDetection {
    /// Scores in display order.
    pub fn scores(&self) -> [f64; 5] {
        [
            self.racial_score,
            self.gender_score,
            self.age_score,
            self.religious_score,
            self.hate_speech_score,
        ]
    }

    pub fn metrics(&self) -> BiasMetrics {
        BIAS_AXES
            .iter()
            .zip(self.scores())
            .fold(BiasMetrics::new(), |metrics, ((_, axis, label), score)| {
                metrics.with(*axis, *label, score)
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub generated_text: String,
}

/// Response of `POST /shield/pre-process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreProcessResponse {
    pub pii: Detection,
    #[serde(rename = "promptInjection")]
    pub prompt_injection: Detection,
    pub overall_severity_score: f64,
    pub risk_level: RiskTier,
    pub summary_explanations: Vec<String>,
}

impl PreProcessResponse {
    /// Convert to the core model, normalizing spans against `text`.
    pub fn into_result(self, text: &str) -> AnalysisResult {
        let spans = self
            .pii
            .indices
            .into_iter()
            .chain(self.prompt_injection.indices)
            .map(FlaggedSpan::from)
            .collect();
        AnalysisResult::new(
            AnalysisStage::Pre,
            text,
            spans,
            self.overall_severity_score,
            self.risk_level,
            self.summary_explanations,
        )
        .with_analyzed_at(Utc::now())
    }
}

/// Response of `POST /shield/post-process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessResponse {
    pub pii: Detection,
    pub bias: BiasDetection,
    pub overall_severity_score: f64,
    pub risk_level: RiskTier,
    pub summary_explanations: Vec<String>,
}

impl PostProcessResponse {
    /// Convert to the core model. Only PII spans are highlighted; bias is
    /// carried as metrics.
    pub fn into_result(self, text: &str) -> AnalysisResult {
        let metrics = self.bias.metrics();
        let spans = self.pii.indices.into_iter().map(FlaggedSpan::from).collect();
        AnalysisResult::new(
            AnalysisStage::Post,
            text,
            spans,
            self.overall_severity_score,
            self.risk_level,
            self.summary_explanations,
        )
        .with_bias_metrics(metrics)
        .with_analyzed_at(Utc::now())
    }
}
