//! Service factory pattern for selecting a backend by name.
//!
//! Backends register factories that build service instances from JSON
//! options, so the CLI and config layer only deal in names.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ServiceRegistry::with_defaults();
//! let service = registry.create("mock", &serde_json::json!({"latency_scale": 0.0}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{AnalysisService, ServiceError};

/// Factory for creating analysis services from configuration.
pub trait ServiceFactory: Send + Sync {
    /// Unique identifier for this service type, e.g. "mock" or "http".
    fn service_type(&self) -> &'static str;

    /// Create a service instance from JSON options.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn AnalysisService>, ServiceError>;

    /// Validate options without creating a service.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ServiceError>;

    /// Options used when none are given.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    fn description(&self) -> &'static str {
        "Analysis service"
    }
}

/// Registry of available service factories.
#[derive(Default)]
pub struct ServiceRegistry {
    factories: BTreeMap<String, Arc<dyn ServiceFactory>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory of the same type.
    pub fn register(&mut self, factory: Arc<dyn ServiceFactory>) {
        self.factories
            .insert(factory.service_type().to_string(), factory);
    }

    /// Create a service from type name and options.
    pub fn create(
        &self,
        service_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn AnalysisService>, ServiceError> {
        let factory = self.factories.get(service_type).ok_or_else(|| {
            ServiceError::NotConfigured(format!(
                "Unknown service type: '{}'. Available: {:?}",
                service_type,
                self.available_types()
            ))
        })?;
        factory.validate_config(config)?;
        let service = factory.create(config)?;
        tracing::info!(service = service_type, "Analysis service created");
        Ok(service)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn get_factory(&self, service_type: &str) -> Option<&Arc<dyn ServiceFactory>> {
        self.factories.get(service_type)
    }

    pub fn default_config(&self, service_type: &str) -> Option<JsonValue> {
        self.factories
            .get(service_type)
            .map(|f| f.default_config())
    }

    /// Create a registry with all built-in services registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::MockServiceFactory));
        #[cfg(feature = "http")]
        registry.register(Arc::new(super::HttpServiceFactory));
        registry
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_mock() {
        let registry = ServiceRegistry::with_defaults();
        assert!(registry.available_types().contains(&"mock"));
        assert!(registry.get_factory("unknown").is_none());
        assert_eq!(
            registry.get_factory("mock").map(|f| f.service_type()),
            Some("mock")
        );
    }

    #[test]
    fn test_create_mock_from_options() {
        let registry = ServiceRegistry::with_defaults();
        let service = registry
            .create("mock", &serde_json::json!({"latency_scale": 0.0}))
            .unwrap();
        assert_eq!(service.name(), "mock");
    }

    #[test]
    fn test_unknown_service_lists_available() {
        let registry = ServiceRegistry::with_defaults();
        let result = registry.create("grpc", &serde_json::json!({}));
        match result {
            Err(ServiceError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown service type"));
                assert!(msg.contains("mock"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let registry = ServiceRegistry::with_defaults();
        let bad = serde_json::json!({"analysis": "telepathy"});
        assert!(registry.create("mock", &bad).is_err());
        let factory = registry.get_factory("mock").unwrap();
        assert!(factory.validate_config(&bad).is_err());
        assert!(factory.validate_config(&factory.default_config()).is_ok());
    }

    #[test]
    fn test_empty_registry() {
        let registry = ServiceRegistry::new();
        assert!(registry.available_types().is_empty());
        assert!(registry.default_config("mock").is_none());
    }
}
