//! Error types for Switchboard
//!
//! This module defines the single error enum used throughout the crate.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations. Every variant maps onto a fixed taxonomy
//! (`ErrorKind`), a stable machine code, and an HTTP status so the gateway
//! can translate failures at the transport boundary without string matching.

use thiserror::Error;

/// Coarse error category, fixed across the crate.
///
/// The orchestrator and gateway branch on this rather than on individual
/// variants when deciding recovery and HTTP semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input (manifest, request, descriptor).
    Validation,
    /// A named thing does not exist (route, provider, tool, session).
    NotFound,
    /// An upstream HTTP call failed or timed out.
    External,
    /// A bug or infrastructure failure inside the orchestrator.
    Internal,
    /// A precondition on domain state was not met (e.g. inactive session).
    Business,
}

/// The primary error type for Switchboard operations.
#[derive(Error, Debug)]
pub enum SwitchboardError {
    /// Generic request/descriptor validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Manifest validation failed; all rule violations are accumulated.
    #[error("Manifest validation failed: {}", .0.join("; "))]
    ManifestInvalid(Vec<String>),

    /// Manifest document could not be parsed in the detected format.
    #[error("Invalid manifest {format}: {reason}")]
    ManifestParse { format: String, reason: String },

    /// No route matched the path and no fallback is configured.
    #[error("No route matches path: {0}")]
    RouteNotFound(String),

    /// Match was attempted before any manifest was loaded.
    #[error("Manifest registry not loaded")]
    RegistryNotLoaded,

    /// A context provider returned an error or a non-2xx status.
    #[error("Provider '{name}' failed: {reason}")]
    ProviderFailed { name: String, reason: String },

    /// A context provider exceeded its configured timeout.
    #[error("Provider '{0}' timed out")]
    ProviderTimeout(String),

    /// Lookup of a provider by name failed.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// The manifest names a provider type this build does not support.
    #[error("Unsupported provider type: {0}")]
    UnsupportedProviderType(String),

    /// A provider descriptor is structurally invalid.
    #[error("Invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },

    /// One or more required providers failed during context fan-out.
    #[error("Required providers failed: {}", .names.join(", "))]
    ProvidersFailed {
        names: Vec<String>,
        reasons: Vec<String>,
    },

    /// A tool descriptor is structurally invalid.
    #[error("Invalid tool configuration: {0}")]
    InvalidTool(String),

    /// The manifest names a tool type this build does not support.
    #[error("Unsupported tool type: {0}")]
    UnsupportedToolType(String),

    /// A tool call failed during execution (bad arguments, HTTP failure).
    #[error("Tool '{name}' execution failed: {reason}")]
    ToolExecution { name: String, reason: String },

    /// A tool call exceeded its configured timeout.
    #[error("Tool '{0}' timed out")]
    ToolTimeout(String),

    /// The LLM requested a tool that is not on the route.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A required tool parameter was not supplied by its source.
    #[error("Tool '{tool}' is missing required parameter '{parameter}'")]
    MissingParameter { tool: String, parameter: String },

    /// A context-sourced tool parameter could not be resolved by dot-path.
    #[error("Tool '{tool}' failed to resolve parameter '{parameter}': {reason}")]
    ParameterResolution {
        tool: String,
        parameter: String,
        reason: String,
    },

    /// The LLM backend returned an error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// The tool-calling loop hit its hard iteration ceiling.
    #[error("Maximum total iterations ({0}) exceeded")]
    IterationLimit(usize),

    /// Session id does not exist in the store.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session exists but was soft-deleted.
    #[error("Session is inactive: {0}")]
    SessionInactive(String),

    /// A session operation was requested without a configured session service.
    #[error("Session service not configured")]
    SessionServiceUnavailable,

    /// Session store failure (connection, migration, query).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Standard I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors not already classified as provider/tool failures.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SwitchboardError {
    /// The taxonomy category for this error.
    pub fn kind(&self) -> ErrorKind {
        use SwitchboardError::*;
        match self {
            Validation(_)
            | ManifestInvalid(_)
            | ManifestParse { .. }
            | UnsupportedProviderType(_)
            | InvalidProvider { .. }
            | InvalidTool(_)
            | UnsupportedToolType(_)
            | MissingParameter { .. } => ErrorKind::Validation,
            RouteNotFound(_) | ProviderNotFound(_) | ToolNotFound(_) | SessionNotFound(_) => {
                ErrorKind::NotFound
            }
            ProviderFailed { .. }
            | ProviderTimeout(_)
            | ProvidersFailed { .. }
            | ToolExecution { .. }
            | ToolTimeout(_)
            | Llm(_)
            | Http(_) => ErrorKind::External,
            SessionInactive(_) => ErrorKind::Business,
            RegistryNotLoaded
            | ParameterResolution { .. }
            | IterationLimit(_)
            | SessionServiceUnavailable
            | Storage(_)
            | Io(_)
            | Json(_) => ErrorKind::Internal,
        }
    }

    /// A stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        use SwitchboardError::*;
        match self {
            Validation(_) => "INVALID_REQUEST",
            ManifestInvalid(_) => "VALIDATION_FAILED",
            ManifestParse { .. } => "INVALID_FORMAT",
            RouteNotFound(_) => "ROUTE_NOT_FOUND",
            RegistryNotLoaded => "REGISTRY_NOT_LOADED",
            ProviderFailed { .. } => "PROVIDER_FAILED",
            ProviderTimeout(_) => "PROVIDER_TIMEOUT",
            ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            UnsupportedProviderType(_) => "UNSUPPORTED_PROVIDER_TYPE",
            InvalidProvider { .. } => "INVALID_PROVIDER_CONFIG",
            ProvidersFailed { .. } => "MULTIPLE_PROVIDERS_FAILED",
            InvalidTool(_) => "INVALID_TOOL",
            UnsupportedToolType(_) => "UNSUPPORTED_TOOL_TYPE",
            ToolExecution { .. } => "TOOL_EXECUTION_FAILED",
            ToolTimeout(_) => "TOOL_TIMEOUT",
            ToolNotFound(_) => "TOOL_NOT_FOUND",
            MissingParameter { .. } => "MISSING_PARAMETER",
            ParameterResolution { .. } => "PARAMETER_RESOLUTION_FAILED",
            Llm(_) => "LLM_FAILED",
            IterationLimit(_) => "ITERATION_LIMIT_EXCEEDED",
            SessionNotFound(_) => "SESSION_NOT_FOUND",
            SessionInactive(_) => "SESSION_INACTIVE",
            SessionServiceUnavailable => "SESSION_SERVICE_UNAVAILABLE",
            Storage(_) => "STORAGE_FAILED",
            Io(_) => "IO_ERROR",
            Json(_) => "SERIALIZATION_FAILED",
            Http(_) => "HTTP_ERROR",
        }
    }

    /// The HTTP status the gateway should respond with.
    ///
    /// `SessionInactive` is the only Business-kind error and is handled
    /// before the kind-based fallback.
    pub fn status_code(&self) -> u16 {
        use SwitchboardError::*;
        match self {
            ProviderTimeout(_) | ToolTimeout(_) => 504,
            SessionInactive(_) => 410,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::External => 502,
                _ => 500,
            },
        }
    }
}

/// A specialized `Result` type for Switchboard operations.
pub type Result<T> = std::result::Result<T, SwitchboardError>;
