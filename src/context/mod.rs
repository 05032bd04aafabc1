//! Context module - per-request context assembly
//!
//! A `FullContext` is built for every matched request: route information,
//! the (optional) user and frontend state, and a backend map filled by the
//! route's context providers. Rendered as text it becomes the system prompt
//! that seeds the conversation.

mod builder;
mod http_provider;
mod loader;
mod provider;

pub use builder::ContextBuilder;
pub use http_provider::{HttpProvider, HttpProviderConfig};
pub use loader::ProviderLoader;
pub use provider::{ContextProvider, ProviderClient};

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::Message;

/// All context available to the agent for one request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FullContext {
    pub route: RouteInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<FrontendContext>,
    /// Provider results keyed by provider name. A BTreeMap keeps the
    /// rendered prompt deterministic.
    pub backend: BTreeMap<String, Value>,
    pub instructions: String,
    pub available_tools: Vec<String>,
}

/// Information about the current route.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouteInfo {
    pub path: String,
    pub name: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

/// The current user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Bearer token forwarded to tools via `{user.token}`.
    #[serde(default)]
    pub token: String,
}

impl User {
    /// A user counts as authenticated when it has a non-empty id.
    pub fn is_authenticated(&self) -> bool {
        !self.id.is_empty()
    }

    /// Anonymous users carry a generated `anon_` id.
    pub fn is_anonymous(&self) -> bool {
        self.id.starts_with("anon_")
    }

    /// Check a permission string.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Context reported by the frontend widget.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FrontendContext {
    #[serde(default)]
    pub anonymous_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageStructure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub custom_data: HashMap<String, Value>,
}

/// The page structure as seen by the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageStructure {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub interactive_elements: Vec<InteractiveElement>,
}

/// A heading on the page.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// An interactive element on the page.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InteractiveElement {
    #[serde(rename = "type", default)]
    pub element_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub id: String,
}

/// Viewport dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl FullContext {
    /// Render the context as the system message seeding a conversation.
    pub fn to_system_message(&self) -> Message {
        Message::system(&self.render())
    }

    /// Render the context as human-readable sections for the LLM.
    ///
    /// Sections appear in a fixed order and are omitted when empty.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("=== CURRENT PAGE CONTEXT ===\n\n");
        out.push_str(&format!("Page: {} ({})\n", self.route.name, self.route.path));
        if !self.route.params.is_empty() {
            out.push_str(&format!(
                "Parameters: {}\n",
                format_string_map(&self.route.params)
            ));
        }
        if !self.route.query.is_empty() {
            out.push_str(&format!("Query: {}\n", format_string_map(&self.route.query)));
        }
        out.push('\n');

        if !self.instructions.is_empty() {
            out.push_str("=== YOUR INSTRUCTIONS ===\n");
            out.push_str(&self.instructions);
            out.push_str("\n\n");
        }

        if !self.backend.is_empty() {
            out.push_str("=== BACKEND DATA ===\n\n");
            for (key, value) in &self.backend {
                out.push_str(&format!("{}:\n", key));
                out.push_str(
                    &serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string()),
                );
                out.push_str("\n\n");
            }
        }

        if let Some(page) = self.frontend.as_ref().and_then(|f| f.page.as_ref()) {
            out.push_str("=== PAGE STRUCTURE ===\n");
            out.push_str(&format!("Title: {}\n", page.title));

            if !page.headings.is_empty() {
                out.push_str("\nHeadings:\n");
                for h in &page.headings {
                    out.push_str(&format!("  H{}: {}\n", h.level, h.text));
                }
            }

            if !page.interactive_elements.is_empty() {
                out.push_str("\nInteractive Elements:\n");
                for el in &page.interactive_elements {
                    out.push_str(&format!("  - {}: {}", el.element_type, el.label));
                    if !el.value.is_empty() {
                        out.push_str(&format!(" (value: {})", el.value));
                    }
                    out.push('\n');
                }
            }
            out.push('\n');
        }

        if !self.available_tools.is_empty() {
            out.push_str("=== AVAILABLE TOOLS ===\n");
            for tool in &self.available_tools {
                out.push_str(&format!("- {}\n", tool));
            }
            out.push('\n');
        }

        if let Some(user) = &self.user {
            out.push_str(&format!("User: {}", user.name));
            if !user.email.is_empty() {
                out.push_str(&format!(" ({})", user.email));
            }
            out.push('\n');
        }

        out
    }

    /// Serialize the context to pretty JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Render a string map as `map[k1:v1 k2:v2]` with keys sorted.
pub(crate) fn format_string_map(map: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    let inner = keys
        .iter()
        .map(|k| format!("{}:{}", k, map[*k]))
        .collect::<Vec<_>>()
        .join(" ");
    format!("map[{}]", inner)
}
