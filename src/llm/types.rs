//! Chat types shared by the agent, memory, and LLM adapters.
//!
//! This module defines the conversation message model, tool definitions,
//! chat options, and the `LLMProvider` trait every backend implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::SwitchboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(crate::error::SwitchboardError::Validation(format!(
                "unknown message role: {}",
                other
            ))),
        }
    }
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}

/// A single message in a conversation.
///
/// Messages can be from users, assistants, system prompts, or tool results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (for tool results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use switchboard::llm::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a tool result message replying to a specific tool call.
    ///
    /// # Example
    /// ```
    /// use switchboard::llm::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "{\"ok\":true}");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Check whether this message carries any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check whether this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// Definition of a tool that can be called by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Tool-choice directive for a chat completion.
///
/// The agent loop drives this on a fixed schedule: `Auto` while tool
/// iterations remain, `None` to force a terminal text response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    Auto,
    /// The model must answer without calling tools.
    None,
}

impl ToolChoice {
    /// Wire representation used by chat-completions style APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// Options for chat completion requests.
///
/// Use the builder pattern to construct options.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter
    pub top_p: Option<f32>,
    /// Tool-choice override; `None` lets the backend default apply
    pub tool_choice: Option<ToolChoice>,
}

impl ChatOptions {
    /// Create new default chat options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top_p (nucleus sampling) parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the tool-choice directive.
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }
}

/// Token usage information from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used (prompt + completion)
    pub total_tokens: u32,
}

impl Usage {
    /// Create new usage information.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from an LLM chat completion request.
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The assistant message (content and any tool calls)
    pub message: Message,
    /// Token usage information (if the backend reports it)
    pub usage: Option<Usage>,
}

impl LLMResponse {
    /// Create a simple text response with no tool calls.
    pub fn text(content: &str) -> Self {
        Self {
            message: Message::assistant(content),
            usage: None,
        }
    }

    /// Create a response carrying tool calls.
    pub fn with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            message: Message::assistant_with_tools(content, tool_calls),
            usage: None,
        }
    }

    /// Attach usage information to this response.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Check whether the response requests any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.message.has_tool_calls()
    }

    /// The tool calls in this response, empty when none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// An event on a streaming chat completion.
#[derive(Debug)]
pub enum StreamEvent {
    /// A text fragment of the assistant response.
    Delta(String),
    /// Tool calls assembled from the stream (emitted once, before `Done`).
    ToolCalls(Vec<ToolCall>),
    /// Stream finished; carries the full assembled content and usage.
    Done {
        content: String,
        usage: Option<Usage>,
    },
    /// The stream failed mid-flight.
    Error(String),
}

/// Trait for LLM backends.
///
/// Implement this trait to plug in a new language-model provider. The
/// provider translates between the crate's message format and the backend's
/// wire format; it never retries or reorders on the caller's behalf.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` - The conversation history
    /// * `tools` - Tools the model may call
    /// * `model` - Optional model override (uses the default if None)
    /// * `options` - Sampling options and tool-choice directive
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse>;

    /// Send a streaming chat completion request.
    ///
    /// The default implementation falls back to `chat()` and emits the
    /// result as a single `Done` event (preceded by `ToolCalls` when
    /// present), which is sufficient for backends and mocks that do not
    /// stream natively.
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        let response = self.chat(messages, tools, model, options).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let content = response.message.content.clone();
        let tool_calls = response.tool_calls().to_vec();
        let usage = response.usage;
        tokio::spawn(async move {
            if !content.is_empty() {
                let _ = tx.send(StreamEvent::Delta(content.clone())).await;
            }
            if !tool_calls.is_empty() {
                let _ = tx.send(StreamEvent::ToolCalls(tool_calls)).await;
            }
            let _ = tx.send(StreamEvent::Done { content, usage }).await;
        });
        Ok(rx)
    }

    /// The default model for this provider.
    fn default_model(&self) -> &str;

    /// The provider name (e.g. "openai").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_calls.is_none());

        let msg = Message::system("You are helpful");
        assert_eq!(msg.role, Role::System);

        let msg = Message::tool_result("call_1", "result");
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_message_with_tool_calls() {
        let call = ToolCall::new("call_1", "lookup", r#"{"id": "42"}"#);
        let msg = Message::assistant_with_tools("Looking that up.", vec![call]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls.as_ref().unwrap()[0].name, "lookup");
    }

    #[test]
    fn test_role_serialize_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
        let parsed: Role = serde_json::from_str(r#""tool""#).unwrap();
        assert_eq!(parsed, Role::Tool);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("system".parse::<Role>().unwrap(), Role::System);
        assert!("robot".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(serde::Deserialize)]
        struct Args {
            id: String,
        }
        let call = ToolCall::new("call_1", "lookup", r#"{"id": "42"}"#);
        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.id, "42");
    }

    #[test]
    fn test_chat_options_builder() {
        let options = ChatOptions::new()
            .with_max_tokens(1000)
            .with_temperature(0.7)
            .with_tool_choice(ToolChoice::None);
        assert_eq!(options.max_tokens, Some(1000));
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.tool_choice, Some(ToolChoice::None));
    }

    #[test]
    fn test_tool_choice_wire_values() {
        assert_eq!(ToolChoice::Auto.as_str(), "auto");
        assert_eq!(ToolChoice::None.as_str(), "none");
    }

    #[test]
    fn test_llm_response_helpers() {
        let response = LLMResponse::text("Hello");
        assert!(!response.has_tool_calls());
        assert!(response.tool_calls().is_empty());

        let call = ToolCall::new("call_1", "lookup", "{}");
        let response = LLMResponse::with_tools("", vec![call]);
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls().len(), 1);
    }

    #[test]
    fn test_usage_totals() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(LLMResponse::text(&last))
        }

        fn default_model(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_default_chat_stream_falls_back_to_chat() {
        let provider = EchoProvider;
        let mut rx = provider
            .chat_stream(vec![Message::user("ping")], vec![], None, ChatOptions::new())
            .await
            .unwrap();

        let mut content = String::new();
        let mut saw_done = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Delta(delta) => content.push_str(&delta),
                StreamEvent::Done { content: full, .. } => {
                    assert_eq!(full, "ping");
                    saw_done = true;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(content, "ping");
        assert!(saw_done);
    }
}
