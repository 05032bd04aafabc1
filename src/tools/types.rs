//! Tool types: the `Tool` trait and helpers.
//!
//! Tools are external capabilities exposed to the LLM as callable
//! functions. Each route builds its tool set from the manifest at request
//! time, bound to that request's workflow context and bearer token.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::llm::ToolDefinition;

static NAME_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]+").expect("name strip regex"));

/// Trait implemented by every tool the agent can execute.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The sanitized tool name exposed to the LLM.
    fn name(&self) -> &str;

    /// Human-readable description sent to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for the LLM-visible parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the LLM-provided JSON argument string.
    async fn call(&self, arguments: &str) -> Result<Value>;

    /// The function definition handed to the LLM backend.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Sanitize a tool name for the LLM: spaces become underscores, anything
/// outside `[a-zA-Z0-9_-]` is stripped, and the result is lowercased.
pub fn sanitize_name(name: &str) -> String {
    let name = name.replace(' ', "_");
    NAME_STRIP.replace_all(&name, "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_spaces() {
        assert_eq!(sanitize_name("Add To Cart"), "add_to_cart");
    }

    #[test]
    fn test_sanitize_name_special_chars() {
        assert_eq!(sanitize_name("lookup (v2)!"), "lookup_v2");
    }

    #[test]
    fn test_sanitize_name_keeps_dashes_and_underscores() {
        assert_eq!(sanitize_name("my-tool_x"), "my-tool_x");
    }

    #[test]
    fn test_sanitize_name_already_clean() {
        assert_eq!(sanitize_name("search"), "search");
    }
}
