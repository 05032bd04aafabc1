//! HTTP context provider.
//!
//! Executes one templated HTTP request per context fetch. The response is
//! decoded as JSON when possible and returned as a raw string otherwise.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SwitchboardError};
use crate::utils::template;

use super::ContextProvider;

/// Configuration for an HTTP context provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Endpoint URL; supports templating.
    pub url: String,
    /// HTTP method; defaults to GET.
    pub method: String,
    /// Headers; values support templating.
    pub headers: HashMap<String, String>,
    /// Optional request body, JSON-encoded then template-resolved.
    pub body: Option<Value>,
    /// Request timeout; defaults to 10s.
    pub timeout: Duration,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Context provider that fetches data over HTTP.
pub struct HttpProvider {
    name: String,
    config: HttpProviderConfig,
    client: Client,
}

impl HttpProvider {
    /// Create a new HTTP provider; fills in method/timeout defaults.
    pub fn new(name: &str, mut config: HttpProviderConfig) -> Result<Self> {
        if config.method.is_empty() {
            config.method = "GET".to_string();
        }
        if config.timeout.is_zero() {
            config.timeout = Duration::from_secs(10);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SwitchboardError::InvalidProvider {
                name: name.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        debug!(
            provider = name,
            method = %config.method,
            url = %config.url,
            timeout_ms = config.timeout.as_millis() as u64,
            "HTTP provider created"
        );

        Ok(Self {
            name: name.to_string(),
            config,
            client,
        })
    }
}

#[async_trait]
impl ContextProvider for HttpProvider {
    async fn get_context(&self, params: &HashMap<String, Value>) -> Result<Value> {
        let url = template::resolve(&self.config.url, params);
        debug!(provider = %self.name, url = %url, "Fetching context");

        let method = Method::from_bytes(self.config.method.as_bytes()).map_err(|_| {
            SwitchboardError::ProviderFailed {
                name: self.name.clone(),
                reason: format!("invalid HTTP method: {}", self.config.method),
            }
        })?;

        let mut request = self.client.request(method, &url);

        let mut has_body = false;
        if let Some(body) = &self.config.body {
            let body_json =
                serde_json::to_string(body).map_err(|e| SwitchboardError::ProviderFailed {
                    name: self.name.clone(),
                    reason: format!("error encoding body: {}", e),
                })?;
            request = request.body(template::resolve(&body_json, params));
            has_body = true;
        }

        let mut has_content_type = false;
        for (key, value) in &self.config.headers {
            if key.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            request = request.header(key, template::resolve(value, params));
        }
        if has_body && !has_content_type {
            request = request.header("Content-Type", "application/json");
        }

        let start = std::time::Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(provider = %self.name, url = %url, "Provider request timed out");
                SwitchboardError::ProviderTimeout(self.name.clone())
            } else {
                SwitchboardError::ProviderFailed {
                    name: self.name.clone(),
                    reason: format!("error executing request: {}", e),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::ProviderFailed {
                name: self.name.clone(),
                reason: format!("unexpected status code {}: {}", status.as_u16(), body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SwitchboardError::ProviderFailed {
                name: self.name.clone(),
                reason: format!("error reading response: {}", e),
            })?;

        debug!(
            provider = %self.name,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Context fetched"
        );

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(body)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
