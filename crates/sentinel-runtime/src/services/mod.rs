//! Analysis service abstractions for sentinel-runtime.
//!
//! A service bundles the four remote operations the workflow depends on:
//! listing agents, scanning a prompt, generating content and scanning the
//! generated content. The driver is the only caller.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use sentinel_core::{AgentInfo, AnalysisResult, WorkflowError};

mod factory;
mod mock;
pub mod patterns;
pub mod wire;

#[cfg(feature = "http")]
mod http;

pub use factory::{ServiceFactory, ServiceRegistry};
pub use mock::{AnalysisMode, MockService, MockServiceFactory};

#[cfg(feature = "http")]
pub use http::{HttpService, HttpServiceFactory};

/// Errors from analysis services.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Service not configured: {0}")]
    NotConfigured(String),
}

impl From<ServiceError> for WorkflowError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::ParseError(msg) => WorkflowError::MalformedResponse(msg),
            other => WorkflowError::ServiceUnavailable(other.to_string()),
        }
    }
}

/// Remote operations behind the workflow.
///
/// Implementations return results already converted to the core model;
/// span offsets are normalized against the analyzed text.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Fetch the agent catalogue.
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, ServiceError>;

    /// Scan a prompt for PII and injection attempts.
    async fn pre_analyze(&self, text: &str) -> Result<AnalysisResult, ServiceError>;

    /// Generate content with the given agent.
    async fn generate(&self, agent_id: &str, prompt: &str) -> Result<String, ServiceError>;

    /// Scan generated content for PII and bias.
    async fn post_analyze(&self, text: &str) -> Result<AnalysisResult, ServiceError>;

    /// Check if the service is reachable.
    async fn health_check(&self) -> bool;

    /// Service name for logs.
    fn name(&self) -> &str;
}
