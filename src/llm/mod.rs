//! LLM module - chat types and language-model backends
//!
//! Defines the conversation message model (`Message`, `Role`, `ToolCall`),
//! the `LLMProvider` trait every backend implements, and the shipped
//! OpenAI-compatible adapter. The agent and memory layers depend only on the
//! types and the trait, never on a concrete backend.

mod types;

pub mod openai;

pub use openai::OpenAiProvider;
pub use types::{
    ChatOptions, LLMProvider, LLMResponse, Message, Role, StreamEvent, ToolCall, ToolChoice,
    ToolDefinition, Usage,
};
