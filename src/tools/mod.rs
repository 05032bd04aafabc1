//! Tools module - manifest-defined capabilities exposed to the LLM
//!
//! A route's tool descriptors become `Tool` instances at request time,
//! bound to that request's workflow context and bearer token. The
//! `ToolRegistry` executes tool calls on the agent's behalf and wraps
//! results as tool-role messages.

mod http;
mod loader;
mod registry;
mod types;

pub use http::HttpTool;
pub use loader::ToolLoader;
pub use registry::ToolRegistry;
pub use types::{sanitize_name, Tool};
