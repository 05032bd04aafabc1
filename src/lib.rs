//! Switchboard — declarative orchestrator for conversational assistants
//!
//! A manifest (YAML or JSON) declares URL-pattern-keyed routes, each with
//! context providers, tools, and agent instructions. For every chat request
//! Switchboard matches the path, fans out to the route's providers to
//! assemble fresh context, builds a tool-enabled agent bound to a
//! conversation memory, runs a bounded tool-calling loop against the LLM
//! backend, and returns either a whole response or a stream of chunks.
//!
//! # Subsystems
//!
//! - [`manifest`] — manifest parsing/validation and the route registry
//! - [`context`] — per-request context assembly with parallel provider
//!   fan-out
//! - [`tools`] — manifest-defined tools exposed to the LLM
//! - [`agent`] — the bounded tool-calling loop
//! - [`memory`] — buffer and session-backed conversation memory
//! - [`llm`] — chat types and LLM backends
//! - [`orchestrator`] — the request pipeline composing all of the above
//! - [`gateway`] — the Axum HTTP surface

pub mod agent;
pub mod context;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod manifest;
pub mod memory;
pub mod orchestrator;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentEvaluation, AgentStep};
pub use context::{ContextBuilder, FrontendContext, FullContext, User};
pub use error::{ErrorKind, Result, SwitchboardError};
pub use llm::{
    ChatOptions, LLMProvider, LLMResponse, Message, Role, StreamEvent, ToolCall, ToolChoice,
    ToolDefinition, Usage,
};
pub use manifest::{Manifest, Registry, Route, RouteMatch};
pub use memory::{BufferMemory, Memory, SessionMemory, SessionService};
pub use orchestrator::{ChatRequest, ChatResponse, Orchestrator, OrchestratorConfig, StreamChunk};
pub use tools::{Tool, ToolLoader, ToolRegistry};
