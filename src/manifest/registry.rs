//! Route registry and pattern matcher.
//!
//! Patterns are compiled exactly once at load: each `:name` segment becomes
//! a greedy one-segment capture group, the whole expression is anchored, and
//! the ordered parameter-name list is kept for positional binding. The
//! registry is single-writer/many-reader; `load` swaps the compiled state
//! atomically so a concurrent match sees either the old set or the new set,
//! never a mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, SwitchboardError};

use super::{Manifest, Route, RouteMatch};

static PARAM_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\w+)").expect("param regex"));

struct CompiledRoute {
    route: Arc<Route>,
    matcher: Regex,
    params: Vec<String>,
}

#[derive(Default)]
struct RegistryState {
    manifest: Option<Arc<Manifest>>,
    routes: Vec<CompiledRoute>,
    fallback: Option<Arc<Route>>,
}

/// Manages route configurations and path matching.
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Create a new, empty registry. `match_path` fails until `load` runs.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Load a manifest, replacing the current state atomically.
    ///
    /// All patterns are compiled before the write lock is taken, so a
    /// compile failure leaves the previous state intact.
    pub fn load(&self, manifest: Manifest) -> Result<()> {
        let mut compiled = Vec::with_capacity(manifest.routes.len());
        for route in &manifest.routes {
            let entry = compile_route(route).map_err(|e| {
                SwitchboardError::Validation(format!(
                    "error compiling route {}: {}",
                    route.pattern, e
                ))
            })?;
            compiled.push(entry);
        }

        let fallback = manifest.fallback.clone().map(Arc::new);
        let manifest = Arc::new(manifest);

        let mut state = self.state.write().expect("registry lock poisoned");
        state.manifest = Some(manifest);
        state.routes = compiled;
        state.fallback = fallback;
        debug!(routes = state.routes.len(), "Manifest registry loaded");
        Ok(())
    }

    /// Find the first declared route whose compiled pattern matches `path`.
    ///
    /// Captured groups bind to parameter names positionally; with duplicate
    /// `:name` segments the last occurrence wins. Falls back to the
    /// fallback route (empty params) when nothing matches.
    pub fn match_path(&self, path: &str) -> Result<RouteMatch> {
        let state = self.state.read().expect("registry lock poisoned");

        if state.manifest.is_none() {
            return Err(SwitchboardError::RegistryNotLoaded);
        }

        for entry in &state.routes {
            if let Some(captures) = entry.matcher.captures(path) {
                let mut params = HashMap::new();
                for (i, name) in entry.params.iter().enumerate() {
                    if let Some(m) = captures.get(i + 1) {
                        params.insert(name.clone(), m.as_str().to_string());
                    }
                }
                return Ok(RouteMatch {
                    route: Arc::clone(&entry.route),
                    params,
                    query: HashMap::new(),
                });
            }
        }

        if let Some(fallback) = &state.fallback {
            return Ok(RouteMatch {
                route: Arc::clone(fallback),
                params: HashMap::new(),
                query: HashMap::new(),
            });
        }

        Err(SwitchboardError::RouteNotFound(path.to_string()))
    }

    /// Like `match_path` but never fails; returns `None` instead.
    pub fn match_or_fallback(&self, path: &str) -> Option<RouteMatch> {
        self.match_path(path).ok()
    }

    /// Match a path and attach the caller's query-string map.
    pub fn route_context(
        &self,
        path: &str,
        query: Option<HashMap<String, String>>,
    ) -> Result<RouteMatch> {
        let mut route_match = self.match_path(path)?;
        if let Some(query) = query {
            route_match.query = query;
        }
        Ok(route_match)
    }

    /// Look up a route by its unique name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Route>> {
        let state = self.state.read().expect("registry lock poisoned");
        state
            .routes
            .iter()
            .find(|e| e.route.name == name)
            .map(|e| Arc::clone(&e.route))
    }

    /// All route patterns in declaration order.
    pub fn list_routes(&self) -> Vec<String> {
        let state = self.state.read().expect("registry lock poisoned");
        state
            .routes
            .iter()
            .map(|e| e.route.pattern.clone())
            .collect()
    }

    /// All route configurations in declaration order.
    pub fn list_route_configs(&self) -> Vec<Arc<Route>> {
        let state = self.state.read().expect("registry lock poisoned");
        state.routes.iter().map(|e| Arc::clone(&e.route)).collect()
    }

    /// The loaded manifest, if any.
    pub fn manifest(&self) -> Option<Arc<Manifest>> {
        let state = self.state.read().expect("registry lock poisoned");
        state.manifest.clone()
    }

    /// Statistics about the loaded routes.
    pub fn stats(&self) -> Value {
        let state = self.state.read().expect("registry lock poisoned");
        let total_providers: usize = state
            .routes
            .iter()
            .map(|e| e.route.context.providers.len())
            .sum();
        let total_tools: usize = state.routes.iter().map(|e| e.route.tools.len()).sum();
        json!({
            "version": state.manifest.as_ref().map(|m| m.version.clone()).unwrap_or_default(),
            "total_routes": state.routes.len(),
            "total_providers": total_providers,
            "total_tools": total_tools,
            "has_fallback": state.fallback.is_some(),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a route pattern to an anchored regex plus its ordered parameter
/// names.
fn compile_route(route: &Route) -> Result<CompiledRoute> {
    let pattern = &route.pattern;

    let params: Vec<String> = PARAM_NAME
        .captures_iter(pattern)
        .map(|c| c[1].to_string())
        .collect();

    let regex_pattern = format!("^{}$", PARAM_NAME.replace_all(pattern, "([^/]+)"));
    let matcher = Regex::new(&regex_pattern)
        .map_err(|e| SwitchboardError::Validation(format!("invalid pattern: {}", e)))?;

    Ok(CompiledRoute {
        route: Arc::new(route.clone()),
        matcher,
        params,
    })
}
