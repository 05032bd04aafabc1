//! Orchestrator module - the request pipeline
//!
//! Composes the registry, context builder, tool loader, memory selection,
//! and agent into one handler per chat request. This is the seam the HTTP
//! gateway calls into.

mod dto;

pub use dto::{ChatRequest, ChatResponse, RoutePath, StreamChunk, UsageInfo};

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::context::{format_string_map, ContextBuilder, FrontendContext, FullContext, User};
use crate::error::{Result, SwitchboardError};
use crate::llm::{ChatOptions, LLMProvider, Message};
use crate::manifest::{Registry, Route, RouteMatch};
use crate::memory::{BufferMemory, Memory, Session, SessionService, SessionWithMessages};
use crate::tools::{ToolLoader, ToolRegistry};

/// Orchestrator configuration.
pub struct OrchestratorConfig {
    pub llm: Arc<dyn LLMProvider>,
    pub registry: Arc<Registry>,
    /// When present, conversations persist in sessions; otherwise each
    /// request gets a fresh in-process buffer.
    pub session_service: Option<Arc<SessionService>>,
    /// Cap for buffer memory (0 = unlimited).
    pub buffer_max_messages: usize,
}

/// Orchestrates the entire assistant flow for one deployment.
pub struct Orchestrator {
    llm: Arc<dyn LLMProvider>,
    context_builder: ContextBuilder,
    registry: Arc<Registry>,
    tool_loader: ToolLoader,
    session_service: Option<Arc<SessionService>>,
    buffer_max_messages: usize,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            llm: config.llm,
            context_builder: ContextBuilder::new(),
            registry: config.registry,
            tool_loader: ToolLoader::new(),
            session_service: config.session_service,
            buffer_max_messages: config.buffer_max_messages,
        }
    }

    /// Process a chat request and return a whole response.
    pub async fn handle_chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.validate_request(&req)?;

        let mut route_match = self.match_route(&req.route.path, &req.route.query)?;

        // Route params supplied by the caller replace the captured ones
        // wholesale.
        if !req.route_params.is_empty() {
            info!(
                route_path = %req.route.path,
                param_count = req.route_params.len(),
                "Overriding route params with caller-supplied values"
            );
            route_match.params = req.route_params.clone();
        }

        let user = self.user_with_token(&req);

        let should_build_context = req.should_fetch_context || !req.route_params.is_empty();
        let full_context = if should_build_context {
            info!(route_name = %route_match.route.name, "Building fresh context");
            self.context_builder
                .build(&route_match, req.frontend.clone(), user.clone())
                .await?
        } else {
            debug!("Using minimal context (no backend fetch)");
            self.context_builder.build_minimal(&route_match, user)
        };

        let (memory, session_id) = self
            .get_or_create_memory(&req, &full_context, &route_match)
            .await?;

        // Inject fresh backend data into an existing session; failure to
        // append is non-fatal.
        let mut context_injected = false;
        if !req.session_id.is_empty() && should_build_context && !full_context.backend.is_empty() {
            let injection = context_injection_message(&full_context);
            match memory.add(injection).await {
                Ok(()) => {
                    context_injected = true;
                    info!(session_id = %session_id, "Fresh context injected into session");
                }
                Err(e) => {
                    warn!(error = %e, "Failed to inject context message, continuing");
                }
            }
        }

        let (agent, tools_count) =
            self.create_agent(memory, &full_context, &route_match, &req.bearer_token)?;

        let response = agent.run(&req.message).await?;

        let messages = agent.messages().await.unwrap_or_default();
        let usage = calculate_usage(&messages);

        Ok(ChatResponse {
            response,
            session_id,
            conversation_id: req.conversation_id,
            usage: Some(usage),
            metadata: json!({
                "route": route_match.route.name,
                "tools_count": tools_count,
                "context_injected": context_injected,
            }),
        })
    }

    /// Process a chat request, emitting stream chunks through `sink`.
    ///
    /// Errors are delivered as an error chunk followed by the terminal
    /// chunk; the terminal chunk carries the session id and metadata.
    pub async fn handle_chat_stream<F>(&self, req: ChatRequest, mut sink: F) -> Result<()>
    where
        F: FnMut(StreamChunk) + Send,
    {
        macro_rules! fail {
            ($err:expr) => {{
                let err = $err;
                sink(StreamChunk::error(&err.to_string()));
                return Err(err);
            }};
        }

        if let Err(e) = self.validate_request(&req) {
            fail!(e);
        }

        let mut route_match = match self.match_route(&req.route.path, &req.route.query) {
            Ok(m) => m,
            Err(e) => fail!(e),
        };

        if !req.route_params.is_empty() {
            route_match.params = req.route_params.clone();
        }

        let user = self.user_with_token(&req);

        let should_build_context = req.should_fetch_context || !req.route_params.is_empty();
        let full_context = if should_build_context {
            match self
                .context_builder
                .build(&route_match, req.frontend.clone(), user.clone())
                .await
            {
                Ok(ctx) => ctx,
                Err(e) => fail!(e),
            }
        } else {
            self.context_builder.build_minimal(&route_match, user)
        };

        let (memory, session_id) = match self
            .get_or_create_memory(&req, &full_context, &route_match)
            .await
        {
            Ok(pair) => pair,
            Err(e) => fail!(e),
        };

        let mut context_injected = false;
        if !req.session_id.is_empty() && should_build_context && !full_context.backend.is_empty() {
            match memory.add(context_injection_message(&full_context)).await {
                Ok(()) => context_injected = true,
                Err(e) => warn!(error = %e, "Failed to inject context message, continuing"),
            }
        }

        let (agent, _tools_count) =
            match self.create_agent(memory, &full_context, &route_match, &req.bearer_token) {
                Ok(pair) => pair,
                Err(e) => fail!(e),
            };

        let result = agent
            .run_stream(&req.message, |chunk| {
                sink(StreamChunk::content(chunk));
            })
            .await;

        if let Err(e) = result {
            fail!(e);
        }

        sink(StreamChunk {
            done: true,
            session_id: if session_id.is_empty() {
                None
            } else {
                Some(session_id)
            },
            metadata: Some(json!({
                "route": route_match.route.name,
                "context_injected": context_injected,
            })),
            ..Default::default()
        });

        Ok(())
    }

    /// Create a session whose seed system message renders the route's
    /// context: full context when route params are supplied, minimal
    /// otherwise. Returns the new session id.
    pub async fn create_session_with_context(
        &self,
        user_id: &str,
        title: &str,
        route_path: &str,
        route_params: HashMap<String, String>,
        frontend: Option<FrontendContext>,
    ) -> Result<String> {
        let service = self
            .session_service
            .as_ref()
            .ok_or(SwitchboardError::SessionServiceUnavailable)?;

        let mut route_match = self.match_route(route_path, &HashMap::new())?;

        let user = User {
            id: user_id.to_string(),
            ..Default::default()
        };

        let full_context = if !route_params.is_empty() {
            info!(route_path = route_path, "Creating session with full context");
            route_match.params = route_params;
            self.context_builder
                .build(&route_match, frontend, Some(user))
                .await?
        } else {
            info!(route_path = route_path, "Creating session with minimal context");
            self.context_builder.build_minimal(&route_match, Some(user))
        };

        let session = service
            .create_session(user_id, title, &full_context.to_system_message())
            .await?;

        Ok(session.id)
    }

    /// Create a session with minimal context (no backend fetch).
    pub async fn create_session(
        &self,
        user_id: &str,
        title: &str,
        route_path: &str,
    ) -> Result<String> {
        self.create_session_with_context(user_id, title, route_path, HashMap::new(), None)
            .await
    }

    /// List a user's active sessions.
    pub async fn list_user_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>> {
        self.require_sessions()?
            .list_user_sessions(user_id, limit, offset)
            .await
    }

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.require_sessions()?.get_session(session_id).await
    }

    /// Get a session with its full message log.
    pub async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages> {
        self.require_sessions()?
            .get_session_with_messages(session_id)
            .await
    }

    /// Soft-delete a session.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.require_sessions()?.delete_session(session_id).await
    }

    /// The route a path resolves to.
    pub fn get_route_info(&self, path: &str) -> Result<Arc<Route>> {
        Ok(self.registry.match_path(path)?.route)
    }

    /// All route patterns.
    pub fn list_routes(&self) -> Vec<String> {
        self.registry.list_routes()
    }

    /// Liveness check: a manifest must be loaded.
    pub fn health(&self) -> Result<()> {
        if self.registry.manifest().is_none() {
            return Err(SwitchboardError::RegistryNotLoaded);
        }
        Ok(())
    }

    /// Operational statistics.
    pub fn stats(&self) -> Value {
        json!({
            "manifest": self.registry.stats(),
            "healthy": self.health().is_ok(),
            "sessions_enabled": self.session_service.is_some(),
        })
    }

    fn require_sessions(&self) -> Result<&Arc<SessionService>> {
        self.session_service
            .as_ref()
            .ok_or(SwitchboardError::SessionServiceUnavailable)
    }

    fn validate_request(&self, req: &ChatRequest) -> Result<()> {
        if req.message.is_empty() {
            return Err(SwitchboardError::Validation("message is required".into()));
        }
        if req.route.path.is_empty() {
            return Err(SwitchboardError::Validation(
                "route information is required".into(),
            ));
        }
        Ok(())
    }

    fn match_route(&self, path: &str, query: &HashMap<String, String>) -> Result<RouteMatch> {
        self.registry.route_context(
            path,
            if query.is_empty() {
                None
            } else {
                Some(query.clone())
            },
        )
    }

    fn user_with_token(&self, req: &ChatRequest) -> Option<User> {
        let mut user = req.user.clone();
        if let Some(user) = &mut user {
            if !req.bearer_token.is_empty() {
                user.token = req.bearer_token.clone();
            }
        }
        user
    }

    /// Select memory per the request: an existing session, a new session,
    /// or a per-request buffer. Returns the memory and the session id to
    /// report (empty for buffer memory).
    async fn get_or_create_memory(
        &self,
        req: &ChatRequest,
        full_context: &FullContext,
        route_match: &RouteMatch,
    ) -> Result<(Arc<dyn Memory>, String)> {
        if let Some(service) = &self.session_service {
            if !req.session_id.is_empty() {
                debug!(session_id = %req.session_id, "Using existing session");
                let memory = service.session_memory(&req.session_id).await?;
                return Ok((memory, req.session_id.clone()));
            }

            let user_id = req
                .user
                .as_ref()
                .map(|u| u.id.as_str())
                .filter(|id| !id.is_empty())
                .unwrap_or("guest");
            let title = format!("Chat - {}", route_match.route.name);

            let session = service
                .create_session(user_id, &title, &full_context.to_system_message())
                .await?;
            info!(session_id = %session.id, user_id = user_id, "New session created");

            let memory = service.session_memory(&session.id).await?;
            return Ok((memory, session.id));
        }

        debug!("Using buffer memory (no session service)");
        let mut buffer = BufferMemory::new(full_context.to_system_message());
        if self.buffer_max_messages > 0 {
            buffer = buffer.with_max_messages(self.buffer_max_messages);
        }
        Ok((Arc::new(buffer), String::new()))
    }

    /// Build the agent for this request: tools bound to the workflow
    /// context, memory attached. Returns the agent and the tool count.
    fn create_agent(
        &self,
        memory: Arc<dyn Memory>,
        full_context: &FullContext,
        route_match: &RouteMatch,
        user_token: &str,
    ) -> Result<(Agent, usize)> {
        let workflow_context = build_workflow_context(full_context, route_match);

        let tools =
            self.tool_loader
                .load_from_route(&route_match.route, &workflow_context, user_token)?;
        let tools_count = tools.len();
        let registry = ToolRegistry::from_tools(tools);

        let agent = Agent::new(Arc::clone(&self.llm), memory)
            .with_tools(Arc::new(registry))
            .with_options(ChatOptions::new().with_temperature(1.0));

        Ok((agent, tools_count))
    }
}

/// The layered map tools use to resolve `route`- and `context`-sourced
/// parameters: route/query params at the top level, plus `user`, `route`,
/// and `backend` sub-objects.
fn build_workflow_context(full_context: &FullContext, route_match: &RouteMatch) -> Value {
    let mut map = serde_json::Map::new();

    for (key, value) in &route_match.params {
        map.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in &route_match.query {
        map.insert(key.clone(), Value::String(value.clone()));
    }

    if let Some(user) = &full_context.user {
        map.insert(
            "user".to_string(),
            json!({
                "id": user.id,
                "email": user.email,
                "name": user.name,
                "token": user.token,
            }),
        );
    }

    map.insert(
        "route".to_string(),
        json!({
            "name": full_context.route.name,
            "path": full_context.route.path,
            "params": full_context.route.params,
            "query": full_context.route.query,
        }),
    );

    if !full_context.backend.is_empty() {
        map.insert(
            "backend".to_string(),
            serde_json::to_value(&full_context.backend).unwrap_or(Value::Null),
        );
    }

    Value::Object(map)
}

/// System message injecting fresh backend data into an existing session.
fn context_injection_message(full_context: &FullContext) -> Message {
    let mut out = String::new();

    out.push_str("=== UPDATED CONTEXT FOR CURRENT ROUTE ===\n\n");
    out.push_str(&format!(
        "Current Route: {} ({})\n",
        full_context.route.name, full_context.route.path
    ));
    if !full_context.route.params.is_empty() {
        out.push_str(&format!(
            "Parameters: {}\n",
            format_string_map(&full_context.route.params)
        ));
    }
    out.push('\n');

    if !full_context.backend.is_empty() {
        out.push_str("=== FRESH BACKEND DATA ===\n\n");
        for (key, value) in &full_context.backend {
            out.push_str(&format!("{}:\n", key));
            out.push_str(
                &serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string()),
            );
            out.push_str("\n\n");
        }
    }

    out.push_str("Use this fresh data to answer the user's question.\n");
    out.push_str("=== END UPDATED CONTEXT ===\n");

    Message::system(&out)
}

/// Character-length token estimate: total = len/4, split evenly between
/// prompt and completion. A backend-reported count should be preferred when
/// available; this mirrors the transport's historical behavior.
fn calculate_usage(messages: &[Message]) -> UsageInfo {
    let total: usize = messages.iter().map(|m| m.content.len() / 4).sum();
    UsageInfo {
        prompt_tokens: (total / 2) as u32,
        completion_tokens: (total / 2) as u32,
        total_tokens: total as u32,
    }
}
