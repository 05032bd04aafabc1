//! OpenAI-compatible chat-completions adapter.
//!
//! Works against any backend that speaks the chat-completions wire format
//! (OpenAI itself, Azure deployments, local inference gateways) via a
//! configurable base URL.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SwitchboardError};

use super::{
    ChatOptions, LLMProvider, LLMResponse, Message, StreamEvent, ToolCall, ToolDefinition, Usage,
};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// LLM provider speaking the OpenAI chat-completions protocol.
pub struct OpenAiProvider {
    api_key: String,
    api_base: String,
    default_model: String,
    client: Client,
}

impl OpenAiProvider {
    /// Create a provider against the public OpenAI endpoint.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
        }
    }

    /// Create a provider against a custom OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: base_url.trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
        }
    }

    /// Override the default model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }

    fn build_request(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> WireRequest {
        WireRequest {
            model: model.to_string(),
            messages: messages.iter().map(to_wire_message).collect(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(to_wire_tool).collect())
            },
            tool_choice: options
                .tool_choice
                .filter(|_| !tools.is_empty())
                .map(|tc| tc.as_str().to_string()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stream: None,
        }
    }

    async fn post(&self, request: &WireRequest) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| SwitchboardError::Llm(format!("request failed: {}", e)))
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.default_model);
        let request = self.build_request(model, &messages, &tools, &options);
        debug!(model = model, tool_count = tools.len(), "LLM chat request");

        let response = self.post(&request).await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::Llm(format!(
                "backend returned {}: {}",
                status, body
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| SwitchboardError::Llm(format!("failed to parse response: {}", e)))?;

        Ok(from_wire_response(wire))
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        use futures::StreamExt;

        let model = model.unwrap_or(&self.default_model);
        let mut request = self.build_request(model, &messages, &tools, &options);
        request.stream = Some(true);
        debug!(model = model, "LLM streaming request");

        let response = self.post(&request).await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::Llm(format!(
                "backend returned {}: {}",
                status, body
            )));
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<StreamEvent>(32);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut assembled_content = String::new();
            let mut pending_tool_calls: Vec<PendingToolCall> = Vec::new();
            let mut usage: Option<Usage> = None;
            let mut line_buffer = String::new();
            let mut done_seen = false;

            tokio::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(format!("stream read error: {}", e)))
                            .await;
                        return;
                    }
                };

                line_buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_pos) = line_buffer.find('\n') {
                    let line = line_buffer[..newline_pos].trim().to_string();
                    line_buffer = line_buffer[newline_pos + 1..].to_string();

                    if line.is_empty() || line.starts_with("event:") {
                        continue;
                    }
                    let data = match line.strip_prefix("data:") {
                        Some(stripped) => stripped.trim_start(),
                        None => continue,
                    };
                    if data == "[DONE]" {
                        done_seen = true;
                        break;
                    }

                    let stream_chunk: WireStreamChunk = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if let Some(chunk_usage) = stream_chunk.usage {
                        usage = Some(Usage::new(
                            chunk_usage.prompt_tokens,
                            chunk_usage.completion_tokens,
                        ));
                    }

                    for choice in stream_chunk.choices {
                        if let Some(content) = choice.delta.content {
                            assembled_content.push_str(&content);
                            if tx.send(StreamEvent::Delta(content)).await.is_err() {
                                return;
                            }
                        }
                        if let Some(deltas) = choice.delta.tool_calls {
                            for delta in deltas {
                                if pending_tool_calls.len() <= delta.index {
                                    pending_tool_calls
                                        .resize_with(delta.index + 1, PendingToolCall::default);
                                }
                                let pending = &mut pending_tool_calls[delta.index];
                                if let Some(id) = delta.id {
                                    pending.id = id;
                                }
                                if let Some(function) = delta.function {
                                    if let Some(name) = function.name {
                                        pending.name = name;
                                    }
                                    if let Some(arguments) = function.arguments {
                                        pending.arguments.push_str(&arguments);
                                    }
                                }
                            }
                        }
                    }
                }

                if done_seen {
                    break;
                }
            }

            let tool_calls: Vec<ToolCall> = pending_tool_calls
                .into_iter()
                .filter(|p| !p.id.is_empty() && !p.name.is_empty())
                .map(|p| ToolCall::new(&p.id, &p.name, &p.arguments))
                .collect();
            if !tool_calls.is_empty() {
                let _ = tx.send(StreamEvent::ToolCalls(tool_calls)).await;
            }
            let _ = tx
                .send(StreamEvent::Done {
                    content: assembled_content,
                    usage,
                })
                .await;
        });

        Ok(rx)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

fn to_wire_message(msg: &Message) -> WireMessage {
    WireMessage {
        role: msg.role.to_string(),
        content: Some(msg.content.clone()),
        tool_calls: msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    call_type: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect()
        }),
        tool_call_id: msg.tool_call_id.clone(),
    }
}

fn to_wire_tool(tool: &ToolDefinition) -> WireTool {
    WireTool {
        tool_type: "function".to_string(),
        function: WireFunctionDef {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

fn from_wire_response(wire: WireResponse) -> LLMResponse {
    let (content, tool_calls) = match wire.choices.into_iter().next() {
        Some(choice) => {
            let content = choice.message.content.unwrap_or_default();
            let tool_calls: Vec<ToolCall> = choice
                .message
                .tool_calls
                .map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| ToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
                        .collect()
                })
                .unwrap_or_default();
            (content, tool_calls)
        }
        None => (String::new(), Vec::new()),
    };

    let mut response = if tool_calls.is_empty() {
        LLMResponse::text(&content)
    } else {
        LLMResponse::with_tools(&content, tool_calls)
    };
    if let Some(usage) = wire.usage {
        response = response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }
    response
}
