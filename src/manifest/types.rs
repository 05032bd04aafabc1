//! Manifest data model.
//!
//! The manifest is the declarative configuration document that defines
//! routes, their context providers, and their tools. It is parsed from YAML
//! or JSON, validated once, and immutable after load.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Schema version tag.
    pub version: String,
    /// Ordered list of route descriptors; declaration order is the matcher
    /// tie-break.
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Route returned when nothing matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Route>,
}

/// A single route configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Route {
    /// Path template; segments of the form `:name` capture one non-`/`
    /// segment each.
    #[serde(default)]
    pub pattern: String,
    /// Unique route name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Context providers executed before the agent runs.
    #[serde(default)]
    pub context: ContextBlock,
    /// Tools exposed to the agent on this route.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Free-form system-prompt fragment.
    #[serde(default)]
    pub agent_instructions: String,
    #[serde(default)]
    pub safety: Safety,
}

impl Route {
    /// Find a provider descriptor by name.
    pub fn provider_by_name(&self, name: &str) -> Option<&ProviderSpec> {
        self.context.providers.iter().find(|p| p.name == name)
    }

    /// Find a tool descriptor by name.
    pub fn tool_by_name(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Whether the safety block requires confirmation for a tool.
    pub fn requires_confirmation(&self, tool_name: &str) -> bool {
        self.safety
            .require_confirmation
            .iter()
            .any(|t| t == tool_name)
    }

    /// Names of all tools on this route, in declaration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Route{{name={}, pattern={}, tools={}}}",
            self.name,
            self.pattern,
            self.tools.len()
        )
    }
}

/// Context provider configurations for a route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContextBlock {
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

/// A single context provider descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProviderSpec {
    /// Provider type tag; currently only `"http"`.
    #[serde(rename = "type", default)]
    pub provider_type: String,
    #[serde(default)]
    pub name: String,
    /// URL template (supports `{param}` / `{env.NAME}` substitution).
    #[serde(default)]
    pub url: String,
    /// HTTP method; defaults to GET.
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Optional request body; JSON-encoded then template-resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Timeout string like `"10s"`; defaults to 10s.
    #[serde(default)]
    pub timeout: String,
    /// Per-provider parameter overlay; values may be templates.
    #[serde(default)]
    pub params: HashMap<String, Value>,
    /// Condition expression gating execution (see context builder).
    #[serde(default)]
    pub condition: String,
    /// When true, a failure of this provider does not fail the context build.
    #[serde(default)]
    pub optional: bool,
}

impl std::fmt::Display for ProviderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Provider{{name={}, type={}, url={}}}",
            self.name, self.provider_type, self.url
        )
    }
}

/// A tool definition in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tool type tag; currently only `"http"`.
    #[serde(rename = "type", default)]
    pub tool_type: String,
    #[serde(default)]
    pub config: ToolConfig,
    /// Ordered parameter list; resolution happens in declaration order.
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl std::fmt::Display for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tool{{name={}, type={}}}", self.name, self.tool_type)
    }
}

/// Tool-type-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolConfig {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Timeout string like `"30s"`; defaults to 30s.
    #[serde(default)]
    pub timeout: String,
    /// Dot path selecting a value out of the JSON response.
    #[serde(default)]
    pub response_path: String,
}

/// Parameter sources recognized in tool descriptors.
pub mod param_source {
    /// Supplied by the LLM at call time.
    pub const AGENT: &str = "agent";
    /// Injected from the top-level workflow context (route/query params).
    pub const ROUTE: &str = "route";
    /// Resolved from the workflow context by dot path.
    pub const CONTEXT: &str = "context";
}

/// A single tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolParameter {
    #[serde(default)]
    pub name: String,
    /// JSON-schema type tag ("string", "number", "boolean", "object",
    /// "array").
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// One of `agent`, `route`, `context`.
    #[serde(default)]
    pub source: String,
    /// Dot-notation path; required when source is `context`.
    #[serde(default)]
    pub context_path: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Safety settings for a route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Safety {
    /// Tool names that require user confirmation before execution.
    #[serde(default)]
    pub require_confirmation: Vec<String>,
    #[serde(default)]
    pub max_cost_per_query: f64,
    #[serde(default)]
    pub pii_protection: bool,
    #[serde(default)]
    pub rate_limit_per_user: i64,
}

/// A matched route with extracted parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    /// Pattern parameters captured positionally.
    pub params: HashMap<String, String>,
    /// Query-string parameters attached by the caller.
    pub query: HashMap<String, String>,
}

impl RouteMatch {
    /// Get a captured pattern parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Get a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(|s| s.as_str())
    }

    /// Whether the matched route carries a tool with this name.
    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.route.tool_by_name(tool_name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> Route {
        Route {
            pattern: "/products/:id".into(),
            name: "product-detail".into(),
            description: "Product detail page".into(),
            context: ContextBlock {
                providers: vec![ProviderSpec {
                    provider_type: "http".into(),
                    name: "product".into(),
                    url: "https://api.internal/products/{id}".into(),
                    ..Default::default()
                }],
            },
            tools: vec![ToolSpec {
                name: "add_to_cart".into(),
                description: "Add the product to the cart".into(),
                tool_type: "http".into(),
                ..Default::default()
            }],
            agent_instructions: "Help the user with this product.".into(),
            safety: Safety {
                require_confirmation: vec!["add_to_cart".into()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_route_lookups() {
        let route = sample_route();
        assert!(route.provider_by_name("product").is_some());
        assert!(route.provider_by_name("missing").is_none());
        assert!(route.tool_by_name("add_to_cart").is_some());
        assert_eq!(route.tool_names(), vec!["add_to_cart".to_string()]);
    }

    #[test]
    fn test_requires_confirmation() {
        let route = sample_route();
        assert!(route.requires_confirmation("add_to_cart"));
        assert!(!route.requires_confirmation("search"));
    }

    #[test]
    fn test_display_formats() {
        let route = sample_route();
        assert_eq!(
            route.to_string(),
            "Route{name=product-detail, pattern=/products/:id, tools=1}"
        );
        assert!(route.context.providers[0]
            .to_string()
            .starts_with("Provider{name=product"));
    }

    #[test]
    fn test_route_match_helpers() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        let m = RouteMatch {
            route: Arc::new(sample_route()),
            params,
            query: HashMap::new(),
        };
        assert_eq!(m.param("id"), Some("42"));
        assert_eq!(m.param("missing"), None);
        assert!(m.has_tool("add_to_cart"));
    }

    #[test]
    fn test_manifest_json_round_trip() {
        let manifest = Manifest {
            version: "1.0".into(),
            routes: vec![sample_route()],
            fallback: None,
        };
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_manifest_yaml_round_trip() {
        let manifest = Manifest {
            version: "1.0".into(),
            routes: vec![sample_route()],
            fallback: Some(Route {
                pattern: "/".into(),
                name: "fallback".into(),
                ..Default::default()
            }),
        };
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let parsed: Manifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_type_field_renames() {
        let yaml = r#"
type: http
name: orders
url: https://api.internal/orders
"#;
        let spec: ProviderSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.provider_type, "http");

        let yaml = r#"
name: qty
type: number
source: agent
enum: ["1", "2"]
"#;
        let param: ToolParameter = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(param.param_type, "number");
        assert_eq!(param.enum_values, vec!["1", "2"]);
    }
}
