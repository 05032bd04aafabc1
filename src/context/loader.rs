//! Provider loader: turns provider descriptors into provider instances.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SwitchboardError};
use crate::manifest::{ProviderSpec, Route};
use crate::utils::duration::parse_duration;

use super::{ContextProvider, HttpProvider, HttpProviderConfig, ProviderClient};

/// Loads context providers from route configuration.
#[derive(Debug, Default)]
pub struct ProviderLoader;

impl ProviderLoader {
    pub fn new() -> Self {
        Self
    }

    /// Create a `ProviderClient` from a route's provider descriptors.
    ///
    /// Optional providers whose construction fails are skipped; required
    /// ones propagate the error.
    pub fn load_from_route(&self, route: &Route) -> Result<ProviderClient> {
        let mut providers: Vec<Arc<dyn ContextProvider>> = Vec::new();

        for spec in &route.context.providers {
            match self.create_provider(spec) {
                Ok(provider) => providers.push(provider),
                Err(e) if spec.optional => {
                    debug!(provider = %spec.name, error = %e, "Skipping optional provider that failed to load");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ProviderClient::new(providers))
    }

    /// Create a provider instance for a descriptor.
    pub fn create_provider(&self, spec: &ProviderSpec) -> Result<Arc<dyn ContextProvider>> {
        match spec.provider_type.as_str() {
            "http" => self.create_http_provider(spec),
            other => Err(SwitchboardError::UnsupportedProviderType(other.to_string())),
        }
    }

    fn create_http_provider(&self, spec: &ProviderSpec) -> Result<Arc<dyn ContextProvider>> {
        if spec.url.is_empty() {
            return Err(SwitchboardError::InvalidProvider {
                name: spec.name.clone(),
                reason: "URL is required for HTTP provider".to_string(),
            });
        }

        let timeout = if spec.timeout.is_empty() {
            std::time::Duration::from_secs(10)
        } else {
            parse_duration(&spec.timeout).map_err(|_| SwitchboardError::InvalidProvider {
                name: spec.name.clone(),
                reason: format!("invalid timeout format: {}", spec.timeout),
            })?
        };

        let method = if spec.method.is_empty() {
            "GET".to_string()
        } else {
            spec.method.clone()
        };

        let config = HttpProviderConfig {
            url: spec.url.clone(),
            method,
            headers: spec.headers.clone(),
            body: spec.body.clone(),
            timeout,
        };

        Ok(Arc::new(HttpProvider::new(&spec.name, config)?))
    }

    /// Validate a provider descriptor without constructing it.
    pub fn validate_spec(&self, spec: &ProviderSpec) -> Result<()> {
        if spec.name.is_empty() {
            return Err(SwitchboardError::InvalidProvider {
                name: String::new(),
                reason: "provider name is required".to_string(),
            });
        }
        if spec.provider_type.is_empty() {
            return Err(SwitchboardError::InvalidProvider {
                name: spec.name.clone(),
                reason: "provider type is required".to_string(),
            });
        }
        match spec.provider_type.as_str() {
            "http" => {
                if spec.url.is_empty() {
                    return Err(SwitchboardError::InvalidProvider {
                        name: spec.name.clone(),
                        reason: "URL is required for HTTP provider".to_string(),
                    });
                }
                Ok(())
            }
            other => Err(SwitchboardError::UnsupportedProviderType(other.to_string())),
        }
    }
}
