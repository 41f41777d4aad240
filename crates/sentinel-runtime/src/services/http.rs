//! Service backed by the shield and agent HTTP servers.
//!
//! Endpoints:
//! - `GET  {agent_url}/agents`
//! - `POST {shield_url}/shield/pre-process` with `{"text": ...}`
//! - `POST {agent_url}/agents/generate/{agent_id}` with `{"prompt": ...}`
//! - `POST {shield_url}/shield/post-process` with `{"text": ...}`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{AgentInfo, AnalysisResult};

use super::factory::ServiceFactory;
use super::wire::{
    GenerateRequest, GenerateResponse, PostProcessResponse, PreProcessResponse, TextRequest,
};
use super::{AnalysisService, ServiceError};

pub const DEFAULT_SHIELD_URL: &str = "http://localhost:8000";
pub const DEFAULT_AGENT_URL: &str = "http://localhost:8001";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HttpOptions {
    shield_url: String,
    agent_url: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            shield_url: DEFAULT_SHIELD_URL.to_string(),
            agent_url: DEFAULT_AGENT_URL.to_string(),
        }
    }
}

impl HttpOptions {
    fn parse(config: &JsonValue) -> Result<Self, ServiceError> {
        let options: HttpOptions = serde_json::from_value(config.clone())
            .map_err(|e| ServiceError::NotConfigured(format!("http options: {}", e)))?;
        for (name, url) in [("shield_url", &options.shield_url), ("agent_url", &options.agent_url)]
        {
            if reqwest::Url::parse(url).is_err() {
                return Err(ServiceError::NotConfigured(format!(
                    "http options: {} is not a valid URL: '{}'",
                    name, url
                )));
            }
        }
        Ok(options)
    }
}

/// HTTP client for the shield and agent servers.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::Client,
    shield_url: String,
    agent_url: String,
}

impl HttpService {
    pub fn new(
        shield_url: impl Into<String>,
        agent_url: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::NotConfigured(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            shield_url: trim_base(shield_url.into()),
            agent_url: trim_base(agent_url.into()),
        })
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::HttpError(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::ParseError(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, ServiceError> {
        tracing::debug!(url = %url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::HttpError(e.to_string()))?;
        self.decode(response).await
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl AnalysisService for HttpService {
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, ServiceError> {
        let url = format!("{}/agents", self.agent_url);
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::HttpError(e.to_string()))?;
        self.decode(response).await
    }

    async fn pre_analyze(&self, text: &str) -> Result<AnalysisResult, ServiceError> {
        let url = format!("{}/shield/pre-process", self.shield_url);
        let body = TextRequest {
            text: text.to_string(),
        };
        let response: PreProcessResponse = self.post(url, &body).await?;
        Ok(response.into_result(text))
    }

    async fn generate(&self, agent_id: &str, prompt: &str) -> Result<String, ServiceError> {
        let url = format!("{}/agents/generate/{}", self.agent_url, agent_id);
        let body = GenerateRequest {
            prompt: prompt.to_string(),
        };
        let response: GenerateResponse = self.post(url, &body).await?;
        Ok(response.generated_text)
    }

    async fn post_analyze(&self, text: &str) -> Result<AnalysisResult, ServiceError> {
        let url = format!("{}/shield/post-process", self.shield_url);
        let body = TextRequest {
            text: text.to_string(),
        };
        let response: PostProcessResponse = self.post(url, &body).await?;
        Ok(response.into_result(text))
    }

    async fn health_check(&self) -> bool {
        self.list_agents().await.is_ok()
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Factory for [`HttpService`].
///
/// Options: `shield_url` and `agent_url`.
pub struct HttpServiceFactory;

impl ServiceFactory for HttpServiceFactory {
    fn service_type(&self) -> &'static str {
        "http"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn AnalysisService>, ServiceError> {
        let options = HttpOptions::parse(config)?;
        Ok(Arc::new(HttpService::new(
            options.shield_url,
            options.agent_url,
        )?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ServiceError> {
        HttpOptions::parse(config).map(|_| ())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::to_value(HttpOptions::default()).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn description(&self) -> &'static str {
        "Shield and agent servers over HTTP"
    }
}
