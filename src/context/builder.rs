//! Context builder: assembles a `FullContext` for a matched request.
//!
//! Providers run concurrently; a failing optional provider is logged and
//! dropped, a failing required provider fails the build after every sibling
//! has finished. Siblings are never cancelled on failure — partial context
//! is the design intent.

use std::collections::HashMap;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SwitchboardError};
use crate::manifest::RouteMatch;
use crate::utils::template;

use super::{FrontendContext, FullContext, ProviderLoader, RouteInfo, User};

/// Builds complete context for the agent.
pub struct ContextBuilder {
    loader: ProviderLoader,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            loader: ProviderLoader::new(),
        }
    }

    /// Construct the complete context, executing the route's providers.
    pub async fn build(
        &self,
        route_match: &RouteMatch,
        frontend: Option<FrontendContext>,
        user: Option<User>,
    ) -> Result<FullContext> {
        info!(
            route_name = %route_match.route.name,
            has_user = user.is_some(),
            "Building full context"
        );

        let mut full_context = self.base_context(route_match, user.as_ref());
        full_context.frontend = frontend;

        let client = self.loader.load_from_route(&route_match.route).map_err(|e| {
            error!(error = %e, "Failed to load providers from route config");
            e
        })?;

        let base_params = build_provider_params(route_match, user.as_ref());
        debug!(param_count = base_params.len(), "Provider parameters built");

        let mut tasks: JoinSet<(String, bool, Result<Value>)> = JoinSet::new();
        let mut skipped = 0usize;

        for spec in &route_match.route.context.providers {
            if !spec.condition.is_empty() && !evaluate_condition(&spec.condition, &base_params) {
                debug!(
                    provider = %spec.name,
                    condition = %spec.condition,
                    "Provider skipped, condition not met"
                );
                skipped += 1;
                continue;
            }

            let provider = match client.provider(&spec.name) {
                Some(p) => p,
                None => {
                    // Optional providers that failed to construct were
                    // dropped at load time.
                    debug!(provider = %spec.name, "Provider not loaded, skipping");
                    skipped += 1;
                    continue;
                }
            };

            // Overlay the provider's own params, template-resolved against
            // the base set.
            let mut params = base_params.clone();
            for (key, value) in &spec.params {
                params.insert(key.clone(), resolve_value(value, &base_params));
            }

            let name = spec.name.clone();
            let optional = spec.optional;
            tasks.spawn(async move {
                let result = provider.get_context(&params).await;
                (name, optional, result)
            });
        }

        let mut failed_names = Vec::new();
        let mut failed_reasons = Vec::new();
        let mut success = 0usize;

        while let Some(joined) = tasks.join_next().await {
            let (name, optional, result) = match joined {
                Ok(tuple) => tuple,
                Err(e) => {
                    warn!(error = %e, "Provider task aborted");
                    continue;
                }
            };
            match result {
                Ok(value) => {
                    full_context.backend.insert(name, value);
                    success += 1;
                }
                Err(e) if optional => {
                    warn!(provider = %name, error = %e, "Optional provider failed");
                }
                Err(e) => {
                    error!(provider = %name, error = %e, "Required provider failed");
                    failed_names.push(name);
                    failed_reasons.push(e.to_string());
                }
            }
        }

        info!(
            total = route_match.route.context.providers.len(),
            success,
            failed = failed_names.len(),
            skipped,
            "Provider execution completed"
        );

        if !failed_names.is_empty() {
            return Err(SwitchboardError::ProvidersFailed {
                names: failed_names,
                reasons: failed_reasons,
            });
        }

        Ok(full_context)
    }

    /// Build a minimal context without executing providers.
    ///
    /// The backend map is empty and no frontend context is attached. Used
    /// when the caller wants to defer external fetches.
    pub fn build_minimal(&self, route_match: &RouteMatch, user: Option<User>) -> FullContext {
        debug!(route_name = %route_match.route.name, "Building minimal context");
        self.base_context(route_match, user.as_ref())
    }

    fn base_context(&self, route_match: &RouteMatch, user: Option<&User>) -> FullContext {
        FullContext {
            route: RouteInfo {
                path: route_match.route.pattern.clone(),
                name: route_match.route.name.clone(),
                params: route_match.params.clone(),
                query: route_match.query.clone(),
            },
            user: user.cloned(),
            frontend: None,
            backend: Default::default(),
            instructions: route_match.route.agent_instructions.clone(),
            available_tools: route_match.route.tool_names(),
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Union of route params, query params, and user keys used for provider
/// templating and condition evaluation.
fn build_provider_params(
    route_match: &RouteMatch,
    user: Option<&User>,
) -> HashMap<String, Value> {
    let mut params = HashMap::new();

    for (key, value) in &route_match.params {
        params.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in &route_match.query {
        params.insert(key.clone(), Value::String(value.clone()));
    }

    match user {
        Some(user) => {
            params.insert("user_id".to_string(), Value::String(user.id.clone()));
            if !user.email.is_empty() {
                params.insert("user_email".to_string(), Value::String(user.email.clone()));
            }
            if !user.name.is_empty() {
                params.insert("user_name".to_string(), Value::String(user.name.clone()));
            }
            params.insert(
                "user_authenticated".to_string(),
                Value::Bool(user.is_authenticated()),
            );
        }
        None => {
            params.insert("user_authenticated".to_string(), Value::Bool(false));
        }
    }

    params
}

/// Evaluate a provider condition against the base parameters.
///
/// Recognized conditions: `user.authenticated`, `user.guest`. Anything else
/// evaluates true (logged).
fn evaluate_condition(condition: &str, params: &HashMap<String, Value>) -> bool {
    let authenticated = params
        .get("user_authenticated")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match condition {
        "user.authenticated" => authenticated,
        "user.guest" => !authenticated,
        other => {
            debug!(condition = other, "Unknown condition, defaulting to true");
            true
        }
    }
}

/// Resolve a single provider-param value: strings go through the template
/// engine, everything else passes through unchanged.
fn resolve_value(value: &Value, params: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(template::resolve(s, params)),
        other => other.clone(),
    }
}
