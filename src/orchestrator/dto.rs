//! Chat request/response DTOs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{FrontendContext, User};

/// An incoming chat request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub route: RoutePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<FrontendContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default)]
    pub conversation_id: String,
    /// Resume an existing persistent session.
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub stream_response: bool,
    /// The user's bearer token, forwarded to tools via `{user.token}`.
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    /// Route params supplied by the frontend; presence triggers a fresh
    /// context fetch and replaces the matcher's captured params wholesale.
    #[serde(default)]
    pub route_params: HashMap<String, String>,
    /// Explicit request for fresh backend data.
    #[serde(default)]
    pub should_fetch_context: bool,
}

/// The route the request addresses.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutePath {
    pub path: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
}

/// A whole (non-streaming) chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
    pub metadata: Value,
}

/// Token usage reported to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A chunk in a streaming response. The terminal chunk has `done = true`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl StreamChunk {
    /// A content-bearing chunk.
    pub fn content(text: &str) -> Self {
        Self {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// A terminal error chunk.
    pub fn error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            done: true,
            ..Default::default()
        }
    }
}
