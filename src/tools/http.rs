//! HTTP tool: a manifest-defined tool that executes a templated HTTP
//! request.
//!
//! Parameters come from three sources resolved in declared order:
//! `agent` (LLM-supplied arguments), `route` (top-level workflow context),
//! and `context` (dot-path lookup into the layered workflow context).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SwitchboardError};
use crate::manifest::{param_source, ToolSpec};
use crate::utils::duration::parse_duration;
use crate::utils::template;

use super::{sanitize_name, Tool};

/// A tool backed by one HTTP endpoint, configured entirely by the manifest.
pub struct HttpTool {
    spec: ToolSpec,
    sanitized_name: String,
    workflow_context: Value,
    user_token: String,
    client: Client,
}

impl HttpTool {
    /// Build an HTTP tool bound to a request's workflow context and bearer
    /// token.
    pub fn new(spec: ToolSpec, workflow_context: Value, user_token: &str) -> Result<Self> {
        let timeout = if spec.config.timeout.is_empty() {
            Duration::from_secs(30)
        } else {
            parse_duration(&spec.config.timeout)
                .unwrap_or_else(|_| Duration::from_secs(30))
        };

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SwitchboardError::InvalidTool(format!(
                "tool '{}': failed to build HTTP client: {}",
                spec.name, e
            ))
        })?;

        let sanitized_name = sanitize_name(&spec.name);
        debug!(
            tool = %spec.name,
            method = %spec.config.method,
            url = %spec.config.url,
            timeout_ms = timeout.as_millis() as u64,
            has_auth = !user_token.is_empty(),
            "HTTP tool created"
        );

        Ok(Self {
            spec,
            sanitized_name,
            workflow_context,
            user_token: user_token.to_string(),
            client,
        })
    }

    /// Merge agent-provided arguments with route/context-injected
    /// parameters, in the descriptor's declared order.
    fn resolve_parameters(&self, agent_params: &Value) -> Result<HashMap<String, Value>> {
        let mut resolved = HashMap::new();

        for param in &self.spec.parameters {
            match param.source.as_str() {
                param_source::AGENT => {
                    if let Some(value) = agent_params.get(&param.name) {
                        resolved.insert(param.name.clone(), value.clone());
                    } else if param.required {
                        return Err(SwitchboardError::MissingParameter {
                            tool: self.spec.name.clone(),
                            parameter: param.name.clone(),
                        });
                    } else if let Some(default) = &param.default {
                        resolved.insert(param.name.clone(), default.clone());
                    }
                }
                param_source::ROUTE => {
                    if let Some(value) = self.workflow_context.get(&param.name) {
                        resolved.insert(param.name.clone(), value.clone());
                    } else if param.required {
                        return Err(SwitchboardError::MissingParameter {
                            tool: self.spec.name.clone(),
                            parameter: param.name.clone(),
                        });
                    }
                }
                param_source::CONTEXT => {
                    if param.context_path.is_empty() {
                        return Err(SwitchboardError::InvalidTool(format!(
                            "context_path missing for parameter: {}",
                            param.name
                        )));
                    }
                    match extract_from_context(&param.context_path, &self.workflow_context) {
                        Ok(value) => {
                            resolved.insert(param.name.clone(), value);
                        }
                        Err(reason) if param.required => {
                            return Err(SwitchboardError::ParameterResolution {
                                tool: self.spec.name.clone(),
                                parameter: param.name.clone(),
                                reason,
                            });
                        }
                        Err(reason) => {
                            debug!(
                                tool = %self.spec.name,
                                param = %param.name,
                                reason = %reason,
                                "Optional context parameter not found, skipping"
                            );
                        }
                    }
                }
                other => {
                    return Err(SwitchboardError::InvalidTool(format!(
                        "unknown parameter source '{}' for parameter: {}",
                        other, param.name
                    )));
                }
            }
        }

        Ok(resolved)
    }

    fn resolve_template(&self, input: &str, params: &HashMap<String, Value>) -> String {
        template::resolve_with_token(input, params, &self.user_token)
    }

    async fn execute_request(&self, params: &HashMap<String, Value>) -> Result<Value> {
        let url = self.resolve_template(&self.spec.config.url, params);
        let method_str = if self.spec.config.method.is_empty() {
            "GET"
        } else {
            self.spec.config.method.as_str()
        };
        let method = Method::from_bytes(method_str.as_bytes()).map_err(|_| {
            SwitchboardError::ToolExecution {
                name: self.spec.name.clone(),
                reason: format!("invalid HTTP method: {}", method_str),
            }
        })?;
        debug!(tool = %self.spec.name, method = %method, url = %url, "HTTP request built");

        let mut request = self.client.request(method, &url);

        let mut has_body = false;
        if let Some(body) = &self.spec.config.body {
            let body_json =
                serde_json::to_string(body).map_err(|e| SwitchboardError::ToolExecution {
                    name: self.spec.name.clone(),
                    reason: format!("failed to encode body: {}", e),
                })?;
            request = request.body(self.resolve_template(&body_json, params));
            has_body = true;
        }

        let mut has_content_type = false;
        for (key, value) in &self.spec.config.headers {
            if key.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            request = request.header(key, self.resolve_template(value, params));
        }
        if has_body && !has_content_type {
            request = request.header("Content-Type", "application/json");
        }

        let start = std::time::Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(tool = %self.spec.name, "HTTP tool request timed out");
                SwitchboardError::ToolTimeout(self.spec.name.clone())
            } else {
                SwitchboardError::ToolExecution {
                    name: self.spec.name.clone(),
                    reason: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SwitchboardError::ToolExecution {
                name: self.spec.name.clone(),
                reason: format!("failed to read response: {}", e),
            })?;

        debug!(
            tool = %self.spec.name,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "HTTP response received"
        );

        if !status.is_success() {
            return Err(SwitchboardError::ToolExecution {
                name: self.spec.name.clone(),
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }

        let mut result = match serde_json::from_str::<Value>(&body) {
            Ok(value) => value,
            Err(_) => return Ok(Value::String(body)),
        };

        if !self.spec.config.response_path.is_empty() {
            result = extract_json_path(&result, &self.spec.config.response_path);
        }

        Ok(result)
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        &self.sanitized_name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    /// JSON Schema over the agent-sourced parameters only; `route` and
    /// `context` parameters are invisible to the LLM.
    fn parameters(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.spec.parameters {
            if param.source != param_source::AGENT {
                continue;
            }

            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), Value::String(param.param_type.clone()));
            prop.insert(
                "description".into(),
                Value::String(param.description.clone()),
            );
            if !param.enum_values.is_empty() {
                prop.insert(
                    "enum".into(),
                    Value::Array(
                        param
                            .enum_values
                            .iter()
                            .map(|v| Value::String(v.clone()))
                            .collect(),
                    ),
                );
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            if param.param_type == "array" {
                prop.insert("items".into(), serde_json::json!({"type": "string"}));
            }

            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        let mut schema = serde_json::Map::new();
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        Value::Object(schema)
    }

    async fn call(&self, arguments: &str) -> Result<Value> {
        info!(tool = %self.spec.name, "Executing HTTP tool");

        let agent_params: Value = if arguments.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(arguments).map_err(|e| SwitchboardError::ToolExecution {
                name: self.spec.name.clone(),
                reason: format!("failed to parse inputs: {}", e),
            })?
        };

        let params = self.resolve_parameters(&agent_params)?;
        debug!(
            tool = %self.spec.name,
            param_count = params.len(),
            "Parameters resolved"
        );

        self.execute_request(&params).await
    }
}

/// Resolve a dot-notation path (optionally wrapped in `{{…}}`) against the
/// workflow context. Array segments may be numeric indexes.
fn extract_from_context(context_path: &str, context: &Value) -> std::result::Result<Value, String> {
    let path = context_path
        .trim()
        .trim_start_matches("{{")
        .trim_end_matches("}}")
        .trim();

    let mut current = context;
    for (level, part) in path.split('.').enumerate() {
        let part = part.trim();
        current = match current {
            Value::Object(map) => map
                .get(part)
                .ok_or_else(|| format!("path segment '{}' not found at level {}", part, level))?,
            Value::Array(items) => {
                let index: usize = part.parse().map_err(|_| {
                    format!("cannot index array with '{}' at level {}", part, level)
                })?;
                items.get(index).ok_or_else(|| {
                    format!("array index {} out of bounds at level {}", index, level)
                })?
            }
            other => {
                return Err(format!(
                    "cannot traverse non-container at '{}' (found {})",
                    part,
                    type_name(other)
                ))
            }
        };
    }

    Ok(current.clone())
}

/// Walk a decoded JSON response by dot path; a missing segment yields null.
fn extract_json_path(data: &Value, path: &str) -> Value {
    if path.is_empty() {
        return data.clone();
    }

    let mut current = data;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => match map.get(part) {
                Some(value) => value,
                None => return Value::Null,
            },
            Value::Array(items) => match part.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(value) => value,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ToolConfig, ToolParameter};
    use serde_json::json;

    fn param(name: &str, source: &str, required: bool) -> ToolParameter {
        ToolParameter {
            name: name.into(),
            param_type: "string".into(),
            description: format!("The {}", name),
            required,
            source: source.into(),
            ..Default::default()
        }
    }

    fn spec_with_params(parameters: Vec<ToolParameter>) -> ToolSpec {
        ToolSpec {
            name: "Order Lookup".into(),
            description: "Look up an order".into(),
            tool_type: "http".into(),
            config: ToolConfig {
                url: "https://api.internal/orders/{order_id}".into(),
                ..Default::default()
            },
            parameters,
        }
    }

    fn workflow_context() -> Value {
        json!({
            "id": "42",
            "user": {"id": "u1", "email": "u@example.com", "name": "U", "token": "tok"},
            "route": {"name": "orders", "path": "/orders/:id"},
            "backend": {
                "orders": {"items": [{"id": "o-1"}, {"id": "o-2"}], "count": 2}
            }
        })
    }

    fn tool(parameters: Vec<ToolParameter>) -> HttpTool {
        HttpTool::new(spec_with_params(parameters), workflow_context(), "tok").unwrap()
    }

    #[test]
    fn test_name_is_sanitized() {
        let t = tool(vec![]);
        assert_eq!(t.name(), "order_lookup");
    }

    #[test]
    fn test_schema_only_agent_params() {
        let t = tool(vec![
            param("order_id", "agent", true),
            param("id", "route", true),
            {
                let mut p = param("user_email", "context", false);
                p.context_path = "user.email".into();
                p
            },
        ]);
        let schema = t.parameters();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("order_id"));
        assert!(!props.contains_key("id"));
        assert!(!props.contains_key("user_email"));
        assert_eq!(schema["required"], json!(["order_id"]));
    }

    #[test]
    fn test_schema_enum_default_and_array_items() {
        let mut status = param("status", "agent", false);
        status.enum_values = vec!["open".into(), "closed".into()];
        status.default = Some(json!("open"));
        let mut tags = param("tags", "agent", false);
        tags.param_type = "array".into();

        let t = tool(vec![status, tags]);
        let schema = t.parameters();
        assert_eq!(schema["properties"]["status"]["enum"], json!(["open", "closed"]));
        assert_eq!(schema["properties"]["status"]["default"], json!("open"));
        assert_eq!(schema["properties"]["tags"]["items"], json!({"type": "string"}));
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn test_resolve_agent_param() {
        let t = tool(vec![param("order_id", "agent", true)]);
        let resolved = t.resolve_parameters(&json!({"order_id": "o-7"})).unwrap();
        assert_eq!(resolved["order_id"], json!("o-7"));
    }

    #[test]
    fn test_missing_required_agent_param() {
        let t = tool(vec![param("order_id", "agent", true)]);
        let err = t.resolve_parameters(&json!({})).unwrap_err();
        assert!(matches!(err, SwitchboardError::MissingParameter { .. }));
    }

    #[test]
    fn test_agent_param_default_applies() {
        let mut p = param("status", "agent", false);
        p.default = Some(json!("open"));
        let t = tool(vec![p]);
        let resolved = t.resolve_parameters(&json!({})).unwrap();
        assert_eq!(resolved["status"], json!("open"));
    }

    #[test]
    fn test_route_param_from_workflow_context() {
        let t = tool(vec![param("id", "route", true)]);
        let resolved = t.resolve_parameters(&json!({})).unwrap();
        assert_eq!(resolved["id"], json!("42"));
    }

    #[test]
    fn test_missing_required_route_param() {
        let t = tool(vec![param("absent", "route", true)]);
        assert!(matches!(
            t.resolve_parameters(&json!({})).unwrap_err(),
            SwitchboardError::MissingParameter { .. }
        ));
    }

    #[test]
    fn test_context_param_dot_path() {
        let mut p = param("email", "context", true);
        p.context_path = "user.email".into();
        let t = tool(vec![p]);
        let resolved = t.resolve_parameters(&json!({})).unwrap();
        assert_eq!(resolved["email"], json!("u@example.com"));
    }

    #[test]
    fn test_context_param_braces_stripped() {
        let mut p = param("email", "context", true);
        p.context_path = "{{ user.email }}".into();
        let t = tool(vec![p]);
        let resolved = t.resolve_parameters(&json!({})).unwrap();
        assert_eq!(resolved["email"], json!("u@example.com"));
    }

    #[test]
    fn test_context_param_array_index() {
        let mut p = param("first_order", "context", true);
        p.context_path = "backend.orders.items.0.id".into();
        let t = tool(vec![p]);
        let resolved = t.resolve_parameters(&json!({})).unwrap();
        assert_eq!(resolved["first_order"], json!("o-1"));
    }

    #[test]
    fn test_required_context_param_missing_path() {
        let mut p = param("oops", "context", true);
        p.context_path = "backend.nothing.here".into();
        let t = tool(vec![p]);
        assert!(matches!(
            t.resolve_parameters(&json!({})).unwrap_err(),
            SwitchboardError::ParameterResolution { .. }
        ));
    }

    #[test]
    fn test_optional_context_param_missing_path_skipped() {
        let mut p = param("maybe", "context", false);
        p.context_path = "backend.nothing.here".into();
        let t = tool(vec![p]);
        let resolved = t.resolve_parameters(&json!({})).unwrap();
        assert!(!resolved.contains_key("maybe"));
    }

    #[test]
    fn test_context_param_without_path_is_invalid() {
        let p = param("broken", "context", false);
        let t = tool(vec![p]);
        assert!(matches!(
            t.resolve_parameters(&json!({})).unwrap_err(),
            SwitchboardError::InvalidTool(_)
        ));
    }

    #[tokio::test]
    async fn test_call_rejects_bad_arguments_json() {
        let t = tool(vec![]);
        let err = t.call("not json").await.unwrap_err();
        assert!(matches!(err, SwitchboardError::ToolExecution { .. }));
    }

    #[test]
    fn test_extract_json_path() {
        let data = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        assert_eq!(extract_json_path(&data, "data.items.1.id"), json!(2));
        assert_eq!(extract_json_path(&data, "data.missing"), Value::Null);
        assert_eq!(extract_json_path(&data, ""), data);
    }

    #[test]
    fn test_extract_from_context_errors() {
        let ctx = json!({"a": {"b": 1}});
        assert!(extract_from_context("a.b", &ctx).is_ok());
        assert!(extract_from_context("a.c", &ctx).unwrap_err().contains("not found"));
        assert!(extract_from_context("a.b.c", &ctx)
            .unwrap_err()
            .contains("non-container"));
    }
}
