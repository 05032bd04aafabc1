//! Context provider abstraction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SwitchboardError};

/// A context provider fetches data to enrich the pre-LLM context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Retrieve context data using the resolved parameter map.
    async fn get_context(&self, params: &HashMap<String, Value>) -> Result<Value>;

    /// The provider name (the backend-map key).
    fn name(&self) -> &str;
}

/// Holds the providers loaded for one route, keyed by name.
pub struct ProviderClient {
    providers: HashMap<String, Arc<dyn ContextProvider>>,
}

impl ProviderClient {
    /// Build a client from provider instances.
    pub fn new(providers: Vec<Arc<dyn ContextProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self { providers }
    }

    /// Fetch context from a specific provider.
    pub async fn get(&self, name: &str, params: &HashMap<String, Value>) -> Result<Value> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| SwitchboardError::ProviderNotFound(name.to_string()))?;
        provider.get_context(params).await
    }

    /// Get a provider handle by name.
    pub fn provider(&self, name: &str) -> Option<Arc<dyn ContextProvider>> {
        self.providers.get(name).cloned()
    }

    /// Whether a provider with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// All provider names.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Number of loaded providers.
    pub fn count(&self) -> usize {
        self.providers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticProvider {
        name: String,
        value: Value,
    }

    #[async_trait]
    impl ContextProvider for StaticProvider {
        async fn get_context(&self, _params: &HashMap<String, Value>) -> Result<Value> {
            Ok(self.value.clone())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn client() -> ProviderClient {
        ProviderClient::new(vec![Arc::new(StaticProvider {
            name: "orders".into(),
            value: json!({"count": 3}),
        })])
    }

    #[tokio::test]
    async fn test_get_known_provider() {
        let value = client().get("orders", &HashMap::new()).await.unwrap();
        assert_eq!(value, json!({"count": 3}));
    }

    #[tokio::test]
    async fn test_get_unknown_provider() {
        let err = client().get("missing", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::ProviderNotFound(_)));
    }

    #[test]
    fn test_lookup_helpers() {
        let client = client();
        assert!(client.has("orders"));
        assert!(!client.has("missing"));
        assert_eq!(client.count(), 1);
        assert_eq!(client.names(), vec!["orders"]);
        assert!(client.provider("orders").is_some());
    }
}
