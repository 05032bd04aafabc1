//! Template resolution for provider URLs, headers, bodies, and tool requests.
//!
//! Grammar:
//! - `{key}` / `{{key}}` — replaced by the string form of `params[key]`
//! - `{env.NAME}` — replaced by the process environment variable `NAME`
//! - `{user.token}` — replaced by the per-request bearer token (token-aware
//!   variant only)
//! - `{route.params.KEY}` — alias for `{KEY}`
//!
//! Resolution is layered, not recursive: each category is substituted once
//! per invocation and the output is never re-scanned, so values containing
//! brace characters cannot trigger further expansion. Unresolved
//! placeholders are left verbatim.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{env\.([^}]+)\}").expect("env var regex"));

/// Resolve a template against a parameter map.
pub fn resolve(template: &str, params: &HashMap<String, Value>) -> String {
    resolve_inner(template, params, None)
}

/// Resolve a template against a parameter map, also substituting
/// `{user.token}` with the given bearer token.
pub fn resolve_with_token(template: &str, params: &HashMap<String, Value>, token: &str) -> String {
    resolve_inner(template, params, Some(token))
}

fn resolve_inner(template: &str, params: &HashMap<String, Value>, token: Option<&str>) -> String {
    let mut result = template.to_string();

    if let Some(token) = token {
        if result.contains("{user.token}") {
            result = result.replace("{user.token}", token);
        }
    }

    result = ENV_VAR
        .replace_all(&result, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let value = std::env::var(name).unwrap_or_default();
            if value.is_empty() {
                warn!(var = name, "Environment variable not found or empty");
            }
            value
        })
        .into_owned();

    for (key, value) in params {
        let single = format!("{{{}}}", key);
        let double = format!("{{{{{}}}}}", key);
        let route_alias = format!("{{route.params.{}}}", key);
        if result.contains(&single) || result.contains(&double) || result.contains(&route_alias) {
            let value_str = value_to_string(value);
            // Double braces first so `{{key}}` is not left as `{…}` debris.
            result = result.replace(&double, &value_str);
            result = result.replace(&single, &value_str);
            result = result.replace(&route_alias, &value_str);
        }
    }

    result
}

/// Render a JSON value the way it should appear inside a template: bare
/// strings without quotes, everything else in compact JSON form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_single_brace_substitution() {
        let p = params(&[("id", json!("42"))]);
        assert_eq!(resolve("/products/{id}", &p), "/products/42");
    }

    #[test]
    fn test_double_brace_alias() {
        let p = params(&[("id", json!("42"))]);
        assert_eq!(resolve("/products/{{id}}", &p), "/products/42");
    }

    #[test]
    fn test_route_params_alias() {
        let p = params(&[("id", json!("7"))]);
        assert_eq!(resolve("/api/{route.params.id}", &p), "/api/7");
    }

    #[test]
    fn test_unresolved_placeholder_left_verbatim() {
        let p = params(&[("id", json!("42"))]);
        assert_eq!(resolve("/x/{missing}/{id}", &p), "/x/{missing}/42");
    }

    #[test]
    fn test_number_and_bool_values() {
        let p = params(&[("count", json!(3)), ("flag", json!(true))]);
        assert_eq!(resolve("n={count}&f={flag}", &p), "n=3&f=true");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SWITCHBOARD_TEST_TOKEN", "secret");
        let p = HashMap::new();
        assert_eq!(
            resolve("Bearer {env.SWITCHBOARD_TEST_TOKEN}", &p),
            "Bearer secret"
        );
        std::env::remove_var("SWITCHBOARD_TEST_TOKEN");
    }

    #[test]
    fn test_missing_env_var_resolves_empty() {
        let p = HashMap::new();
        assert_eq!(
            resolve("x={env.SWITCHBOARD_DEFINITELY_UNSET}&y=1", &p),
            "x=&y=1"
        );
    }

    #[test]
    fn test_user_token_only_in_token_variant() {
        let p = HashMap::new();
        assert_eq!(
            resolve_with_token("Bearer {user.token}", &p, "tok123"),
            "Bearer tok123"
        );
        // The tokenless variant leaves the placeholder alone.
        assert_eq!(resolve("Bearer {user.token}", &p), "Bearer {user.token}");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let p = params(&[("id", json!("42")), ("name", json!("widget"))]);
        let once = resolve("/p/{id}?name={name}", &p);
        let twice = resolve(&once, &p);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_not_recursive() {
        // A value containing template syntax must not be re-expanded.
        let p = params(&[("a", json!("{b}")), ("b", json!("deep"))]);
        let mut only_a = HashMap::new();
        only_a.insert("a".to_string(), json!("{b}"));
        assert_eq!(resolve("{a}", &only_a), "{b}");
        // Even with both keys present a single pass may substitute {b},
        // but resolving the output again yields the same string.
        let once = resolve("{a}", &p);
        assert_eq!(resolve(&once, &HashMap::new()), once);
    }

    #[test]
    fn test_object_value_compact_json() {
        let p = params(&[("filter", json!({"a": 1}))]);
        assert_eq!(resolve("q={filter}", &p), "q={\"a\":1}");
    }
}
