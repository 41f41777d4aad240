//! In-process service with canned agents and simulated latency.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{AgentInfo, AnalysisResult, RiskTier, SpanCategory};

use super::factory::ServiceFactory;
use super::patterns;
use super::wire::{BiasDetection, Detection, IndexSpan, PostProcessResponse, PreProcessResponse};
use super::{AnalysisService, ServiceError};

const AGENTS_LATENCY: Duration = Duration::from_millis(800);
const PRE_ANALYSIS_LATENCY: Duration = Duration::from_millis(1500);
const GENERATION_LATENCY: Duration = Duration::from_millis(2500);
const POST_ANALYSIS_LATENCY: Duration = Duration::from_millis(1200);

/// Text returned by every mock agent.
pub const GENERATED_TEXT: &str = "Based on your request, here's a comprehensive analysis of cybersecurity trends. However, I cannot process personal information like john.doe@company.com or provide specific details about social security number 123-45-6789. This response may contain inherent biases regarding gender roles in technology and could perpetuate stereotypes about age-based technical competency.";

/// How the mock produces analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Fixed payloads regardless of input
    Canned,
    /// Regex detection over the real text
    #[default]
    Patterns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MockOptions {
    analysis: AnalysisMode,
    latency_scale: f64,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            analysis: AnalysisMode::default(),
            latency_scale: 1.0,
        }
    }
}

impl MockOptions {
    fn parse(config: &JsonValue) -> Result<Self, ServiceError> {
        let options: MockOptions = serde_json::from_value(config.clone())
            .map_err(|e| ServiceError::NotConfigured(format!("mock options: {}", e)))?;
        if !options.latency_scale.is_finite() || options.latency_scale < 0.0 {
            return Err(ServiceError::NotConfigured(format!(
                "mock options: latency_scale must be a non-negative number, got {}",
                options.latency_scale
            )));
        }
        Ok(options)
    }
}

/// Mock backend for demos and tests.
#[derive(Debug, Clone)]
pub struct MockService {
    mode: AnalysisMode,
    latency_scale: f64,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new(AnalysisMode::default())
    }
}

impl MockService {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            latency_scale: 1.0,
        }
    }

    /// Scale all simulated latencies; 0 answers immediately.
    pub fn with_latency_scale(mut self, scale: f64) -> Self {
        self.latency_scale = scale.max(0.0);
        self
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    async fn delay(&self, base: Duration) {
        if self.latency_scale > 0.0 {
            tokio::time::sleep(base.mul_f64(self.latency_scale)).await;
        }
    }

    fn pre_response(&self, text: &str) -> PreProcessResponse {
        match self.mode {
            AnalysisMode::Canned => canned_pre_response(),
            AnalysisMode::Patterns => {
                let scan = patterns::scan(text, "prompt");
                let overall = scan.max_severity();
                let mut notes = scan.notes.clone();
                if overall >= 8.0 {
                    notes.push("High risk of data exposure and system manipulation".to_string());
                }
                PreProcessResponse {
                    risk_level: scan.risk_tier(),
                    pii: scan.pii,
                    prompt_injection: scan.injection,
                    overall_severity_score: overall,
                    summary_explanations: notes,
                }
            }
        }
    }

    fn post_response(&self, text: &str) -> PostProcessResponse {
        match self.mode {
            AnalysisMode::Canned => canned_post_response(),
            AnalysisMode::Patterns => {
                let scan = patterns::scan(text, "generated content");
                let bias = canned_bias();
                let bias_peak = bias.scores().into_iter().fold(0.0, f64::max) * 10.0;
                let overall = scan.max_severity().max(bias_peak);

                let mut notes = scan.notes.clone();
                if bias.gender_score >= 0.5 {
                    notes.push("Gender bias detected in technology-related context".to_string());
                }
                if bias.age_score >= 0.5 {
                    notes.push(
                        "Age-based bias present in technical competency assumptions".to_string(),
                    );
                }
                PostProcessResponse {
                    pii: scan.pii,
                    bias,
                    overall_severity_score: overall,
                    risk_level: RiskTier::from_severity(overall),
                    summary_explanations: notes,
                }
            }
        }
    }
}

#[async_trait]
impl AnalysisService for MockService {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, ServiceError> {
        self.delay(AGENTS_LATENCY).await;
        Ok(mock_agents())
    }

    async fn pre_analyze(&self, text: &str) -> Result<AnalysisResult, ServiceError> {
        self.delay(PRE_ANALYSIS_LATENCY).await;
        Ok(self.pre_response(text).into_result(text))
    }

    async fn generate(&self, agent_id: &str, _prompt: &str) -> Result<String, ServiceError> {
        self.delay(GENERATION_LATENCY).await;
        if !mock_agents().iter().any(|a| a.id == agent_id) {
            return Err(ServiceError::ApiError {
                status: 404,
                message: format!("Unknown agent '{}'", agent_id),
            });
        }
        Ok(GENERATED_TEXT.to_string())
    }

    async fn post_analyze(&self, text: &str) -> Result<AnalysisResult, ServiceError> {
        self.delay(POST_ANALYSIS_LATENCY).await;
        Ok(self.post_response(text).into_result(text))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn mock_agents() -> Vec<AgentInfo> {
    [
        (
            "gpt-4",
            "GPT-4 Advanced",
            "OpenAI's most capable model for complex tasks",
        ),
        (
            "claude-3",
            "Claude 3 Opus",
            "Anthropic's most powerful AI assistant",
        ),
        ("gemini-pro", "Gemini Pro", "Google's advanced AI model"),
    ]
    .into_iter()
    .map(|(id, name, description)| AgentInfo {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        endpoint: format!("/agents/{}", id),
    })
    .collect()
}

fn span(
    start: usize,
    end: usize,
    kind: SpanCategory,
    pii_type: Option<&str>,
    severity: f64,
    explanation: &str,
) -> IndexSpan {
    IndexSpan {
        start,
        end,
        kind,
        pii_type: pii_type.map(str::to_string),
        severity_score: severity,
        explanation: explanation.to_string(),
    }
}

fn canned_pre_response() -> PreProcessResponse {
    PreProcessResponse {
        pii: Detection::from_spans(vec![
            span(
                25,
                42,
                SpanCategory::Pii,
                Some("email"),
                7.0,
                "Email address detected: potential privacy risk",
            ),
            span(
                65,
                76,
                SpanCategory::Pii,
                Some("ssn"),
                9.0,
                "Social Security Number detected: high privacy risk",
            ),
        ]),
        prompt_injection: Detection::from_spans(vec![span(
            100,
            130,
            SpanCategory::Injection,
            None,
            8.0,
            "Potential prompt injection detected: attempting to override system instructions",
        )]),
        overall_severity_score: 8.0,
        risk_level: RiskTier::High,
        summary_explanations: vec![
            "Email address and SSN detected in prompt".to_string(),
            "Potential prompt injection attempt identified".to_string(),
            "High risk of data exposure and system manipulation".to_string(),
        ],
    }
}

fn canned_bias() -> BiasDetection {
    BiasDetection {
        detected: true,
        indices: Vec::new(),
        racial_score: 0.2,
        gender_score: 0.7,
        age_score: 0.6,
        religious_score: 0.1,
        hate_speech_score: 0.05,
    }
}

fn canned_post_response() -> PostProcessResponse {
    PostProcessResponse {
        pii: Detection::from_spans(vec![
            span(
                95,
                118,
                SpanCategory::Pii,
                Some("email"),
                6.0,
                "Email address leaked in generated content",
            ),
            span(
                165,
                176,
                SpanCategory::Pii,
                Some("ssn"),
                9.0,
                "SSN referenced in generated content",
            ),
        ]),
        bias: canned_bias(),
        overall_severity_score: 7.0,
        risk_level: RiskTier::High,
        summary_explanations: vec![
            "PII leakage detected in generated content".to_string(),
            "Gender bias detected in technology-related context".to_string(),
            "Age-based bias present in technical competency assumptions".to_string(),
        ],
    }
}

/// Factory for [`MockService`].
///
/// Options: `analysis` (`"patterns"` or `"canned"`) and `latency_scale`.
pub struct MockServiceFactory;

impl ServiceFactory for MockServiceFactory {
    fn service_type(&self) -> &'static str {
        "mock"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn AnalysisService>, ServiceError> {
        let options = MockOptions::parse(config)?;
        Ok(Arc::new(
            MockService::new(options.analysis).with_latency_scale(options.latency_scale),
        ))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ServiceError> {
        MockOptions::parse(config).map(|_| ())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::to_value(MockOptions::default()).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn description(&self) -> &'static str {
        "In-process mock with canned agents and simulated latency"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::AnalysisStage;

    fn instant(mode: AnalysisMode) -> MockService {
        MockService::new(mode).with_latency_scale(0.0)
    }

    #[tokio::test]
    async fn test_agents_catalogue() {
        let agents = instant(AnalysisMode::Patterns).list_agents().await.unwrap();
        let ids: Vec<_> = agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-4", "claude-3", "gemini-pro"]);
        assert_eq!(agents[1].name, "Claude 3 Opus");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let service = MockService::default();
        let started = tokio::time::Instant::now();
        service.pre_analyze("hello").await.unwrap();
        assert!(started.elapsed() >= PRE_ANALYSIS_LATENCY);
    }

    #[tokio::test]
    async fn test_canned_spans_clamped_to_short_prompt() {
        // Canned offsets run past a 30 character prompt
        let text = "email me at someone@example.io";
        let result = instant(AnalysisMode::Canned).pre_analyze(text).await.unwrap();
        assert_eq!(result.risk_tier(), RiskTier::High);
        assert_eq!(result.spans().len(), 1);
        assert_eq!(result.spans()[0].start, 25);
        assert_eq!(result.spans()[0].end, 30);
    }

    #[tokio::test]
    async fn test_patterns_pre_analysis() {
        let result = instant(AnalysisMode::Patterns)
            .pre_analyze("contact me at a@b.com")
            .await
            .unwrap();
        assert_eq!(result.stage(), AnalysisStage::Pre);
        assert_eq!(result.spans().len(), 1);
        assert_eq!(result.risk_tier(), RiskTier::High);
    }

    #[tokio::test]
    async fn test_patterns_post_analysis_of_generated_text() {
        let service = instant(AnalysisMode::Patterns);
        let text = service.generate("gpt-4", "anything").await.unwrap();
        let result = service.post_analyze(&text).await.unwrap();

        let kinds: Vec<_> = result
            .spans()
            .iter()
            .filter_map(|s| s.subtype.as_deref())
            .collect();
        assert_eq!(kinds, vec!["email", "ssn"]);
        assert_eq!(result.bias_metrics().unwrap().get("gender"), Some(0.7));
        assert!(result.is_critical());
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let err = instant(AnalysisMode::Patterns)
            .generate("llama", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ApiError { status: 404, .. }));
    }

    #[test]
    fn test_factory_options() {
        let factory = MockServiceFactory;
        assert!(factory
            .validate_config(&serde_json::json!({"analysis": "canned", "latency_scale": 0.5}))
            .is_ok());
        assert!(factory
            .validate_config(&serde_json::json!({"latency_scale": -1.0}))
            .is_err());
        assert!(factory
            .validate_config(&serde_json::json!({"latencyScale": 1.0}))
            .is_err());
        assert_eq!(factory.default_config()["analysis"], "patterns");
    }
}
