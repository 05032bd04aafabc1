//! Manifest parsing, format autodetection, and validation.
//!
//! Format is detected by file extension first, then by the first
//! non-whitespace byte (`{` or `[` means JSON), defaulting to YAML.
//! Validation accumulates every rule violation and surfaces them together.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::{Result, SwitchboardError};

use super::{Manifest, ProviderSpec, Registry, Route};

/// The manifest document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Unknown,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Json => write!(f, "json"),
            Format::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detect the manifest format from the file path and contents.
pub fn detect_format(path: &str, data: &[u8]) -> Format {
    let lower = path.to_lowercase();
    if lower.ends_with(".json") {
        return Format::Json;
    }
    if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        return Format::Yaml;
    }

    let trimmed = String::from_utf8_lossy(data);
    let trimmed = trimmed.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Format::Json;
    }

    Format::Yaml
}

/// Format implied by the file extension alone.
pub fn format_from_path(path: &str) -> Format {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("json") => Format::Json,
        Some("yaml") | Some("yml") => Format::Yaml,
        _ => Format::Unknown,
    }
}

/// Parse a manifest document in the given format.
///
/// `Unknown` tries JSON first, then YAML.
pub fn parse_manifest(data: &[u8], format: Format) -> Result<Manifest> {
    match format {
        Format::Yaml => serde_yaml::from_slice(data).map_err(|e| SwitchboardError::ManifestParse {
            format: "yaml".into(),
            reason: e.to_string(),
        }),
        Format::Json => serde_json::from_slice(data).map_err(|e| SwitchboardError::ManifestParse {
            format: "json".into(),
            reason: e.to_string(),
        }),
        Format::Unknown => serde_json::from_slice(data)
            .or_else(|_| serde_yaml::from_slice(data))
            .map_err(|_| SwitchboardError::ManifestParse {
                format: "unknown".into(),
                reason: "document is neither valid JSON nor valid YAML".into(),
            }),
    }
}

/// Load and validate a manifest from a file.
pub fn load_manifest(path: &str) -> Result<Manifest> {
    let data = std::fs::read(path)?;
    let format = detect_format(path, &data);
    let manifest = parse_manifest(&data, format)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Serialize a manifest to a file in the given format (autodetected from the
/// extension when `Unknown`).
pub fn save_manifest(manifest: &Manifest, path: &str, format: Format) -> Result<()> {
    let format = match format {
        Format::Unknown => match format_from_path(path) {
            Format::Json => Format::Json,
            _ => Format::Yaml,
        },
        other => other,
    };

    let data = match format {
        Format::Json => serde_json::to_vec_pretty(manifest)?,
        _ => serde_yaml::to_string(manifest)
            .map_err(|e| SwitchboardError::ManifestParse {
                format: "yaml".into(),
                reason: e.to_string(),
            })?
            .into_bytes(),
    };

    std::fs::write(path, data)?;
    Ok(())
}

/// Validate a manifest; all rule violations are accumulated and returned
/// together.
pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    let mut errors = Vec::new();

    if manifest.version.is_empty() {
        errors.push("manifest version is required".to_string());
    }
    if manifest.routes.is_empty() {
        errors.push("at least one route is required".to_string());
    }

    let mut seen_names = HashSet::new();
    for route in &manifest.routes {
        validate_route(route, &mut errors);

        if !route.name.is_empty() && !seen_names.insert(route.name.clone()) {
            errors.push(format!("duplicate route name: {}", route.name));
        }

        // Surface check only; real compilation happens in Registry::load.
        if !route.pattern.is_empty() && !route.pattern.starts_with('/') {
            errors.push(format!(
                "route '{}': pattern must start with /",
                route.name
            ));
        }
    }

    if let Some(fallback) = &manifest.fallback {
        validate_route(fallback, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SwitchboardError::ManifestInvalid(errors))
    }
}

fn validate_route(route: &Route, errors: &mut Vec<String>) {
    if route.pattern.is_empty() {
        errors.push(format!("route '{}': pattern is required", route.name));
    }
    if route.name.is_empty() {
        errors.push(format!(
            "route with pattern '{}': name is required",
            route.pattern
        ));
    }

    for provider in &route.context.providers {
        validate_provider(provider, errors);
    }
}

fn validate_provider(provider: &ProviderSpec, errors: &mut Vec<String>) {
    if provider.provider_type.is_empty() {
        errors.push(format!(
            "provider '{}': type is required",
            provider.name
        ));
    }
    if provider.name.is_empty() {
        errors.push("provider name is required".to_string());
    }

    if provider.provider_type == "http" && provider.url.is_empty() {
        errors.push(format!(
            "provider '{}': URL is required for http providers",
            provider.name
        ));
    }
}

impl Registry {
    /// Load a manifest from a file, auto-detecting the format.
    pub fn load_from_file(&self, path: &str) -> Result<()> {
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SwitchboardError::Validation(format!("manifest file not found: {}", path))
            } else {
                SwitchboardError::Io(e)
            }
        })?;
        let format = detect_format(path, &data);
        info!(path = path, format = %format, "Loading manifest");
        self.load_from_bytes(&data, format)
    }

    /// Load a manifest from raw bytes in a known format.
    pub fn load_from_bytes(&self, data: &[u8], format: Format) -> Result<()> {
        let manifest = parse_manifest(data, format)?;
        validate_manifest(&manifest)?;
        self.load(manifest)
    }

    /// Load a manifest from YAML bytes.
    pub fn load_from_yaml(&self, data: &[u8]) -> Result<()> {
        self.load_from_bytes(data, Format::Yaml)
    }

    /// Load a manifest from JSON bytes.
    pub fn load_from_json(&self, data: &[u8]) -> Result<()> {
        self.load_from_bytes(data, Format::Json)
    }

    /// Reload the manifest from the same file (hot reload).
    pub fn reload(&self, path: &str) -> Result<()> {
        self.load_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ContextBlock;

    const MINIMAL_YAML: &str = r#"
version: "1.0"
routes:
  - pattern: /products/:id
    name: product-detail
    description: Product page
    agent_instructions: Help with this product.
"#;

    const MINIMAL_JSON: &str = r#"{
  "version": "1.0",
  "routes": [
    {"pattern": "/products/:id", "name": "product-detail"}
  ]
}"#;

    #[test]
    fn test_detect_format_by_extension() {
        assert_eq!(detect_format("m.json", b"version: 1"), Format::Json);
        assert_eq!(detect_format("m.yaml", b"{}"), Format::Yaml);
        assert_eq!(detect_format("m.yml", b"{}"), Format::Yaml);
    }

    #[test]
    fn test_detect_format_by_content() {
        assert_eq!(detect_format("manifest", b"  {\"a\": 1}"), Format::Json);
        assert_eq!(detect_format("manifest", b"[1]"), Format::Json);
        assert_eq!(detect_format("manifest", b"version: 1"), Format::Yaml);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(format_from_path("a/b.json"), Format::Json);
        assert_eq!(format_from_path("a/b.yml"), Format::Yaml);
        assert_eq!(format_from_path("a/b.txt"), Format::Unknown);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let from_yaml = parse_manifest(MINIMAL_YAML.as_bytes(), Format::Yaml).unwrap();
        let from_json = parse_manifest(MINIMAL_JSON.as_bytes(), Format::Json).unwrap();
        assert_eq!(from_yaml.routes[0].pattern, "/products/:id");
        assert_eq!(from_json.routes[0].name, "product-detail");
    }

    #[test]
    fn test_parse_unknown_tries_both() {
        assert!(parse_manifest(MINIMAL_JSON.as_bytes(), Format::Unknown).is_ok());
        assert!(parse_manifest(MINIMAL_YAML.as_bytes(), Format::Unknown).is_ok());
        assert!(parse_manifest(b"\t: : :", Format::Unknown).is_err());
    }

    #[test]
    fn test_validate_ok() {
        let manifest = parse_manifest(MINIMAL_YAML.as_bytes(), Format::Yaml).unwrap();
        assert!(validate_manifest(&manifest).is_ok());
    }

    #[test]
    fn test_validate_missing_version_and_routes() {
        let manifest = Manifest {
            version: String::new(),
            routes: vec![],
            fallback: None,
        };
        let err = validate_manifest(&manifest).unwrap_err();
        match err {
            SwitchboardError::ManifestInvalid(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("version")));
                assert!(reasons.iter().any(|r| r.contains("at least one route")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validate_accumulates_all_errors() {
        let manifest = Manifest {
            version: "1.0".into(),
            routes: vec![
                Route {
                    pattern: "no-slash".into(),
                    name: "a".into(),
                    ..Default::default()
                },
                Route {
                    pattern: "/b".into(),
                    name: String::new(),
                    ..Default::default()
                },
                Route {
                    pattern: "/a".into(),
                    name: "a".into(),
                    ..Default::default()
                },
            ],
            fallback: None,
        };
        let err = validate_manifest(&manifest).unwrap_err();
        match err {
            SwitchboardError::ManifestInvalid(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("must start with /")));
                assert!(reasons.iter().any(|r| r.contains("name is required")));
                assert!(reasons.iter().any(|r| r.contains("duplicate route name")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validate_provider_rules() {
        let manifest = Manifest {
            version: "1.0".into(),
            routes: vec![Route {
                pattern: "/a".into(),
                name: "a".into(),
                context: ContextBlock {
                    providers: vec![
                        ProviderSpec {
                            provider_type: "http".into(),
                            name: "no-url".into(),
                            ..Default::default()
                        },
                        ProviderSpec {
                            provider_type: String::new(),
                            name: "no-type".into(),
                            url: "https://x".into(),
                            ..Default::default()
                        },
                    ],
                },
                ..Default::default()
            }],
            fallback: None,
        };
        let err = validate_manifest(&manifest).unwrap_err();
        match err {
            SwitchboardError::ManifestInvalid(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("URL is required")));
                assert!(reasons.iter().any(|r| r.contains("type is required")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validate_fallback_route() {
        let manifest = Manifest {
            version: "1.0".into(),
            routes: vec![Route {
                pattern: "/a".into(),
                name: "a".into(),
                ..Default::default()
            }],
            fallback: Some(Route::default()),
        };
        assert!(validate_manifest(&manifest).is_err());
    }

    #[test]
    fn test_registry_load_from_yaml_bytes() {
        let registry = Registry::new();
        registry.load_from_yaml(MINIMAL_YAML.as_bytes()).unwrap();
        let m = registry.match_path("/products/42").unwrap();
        assert_eq!(m.param("id"), Some("42"));
    }

    #[test]
    fn test_registry_load_rejects_invalid() {
        let registry = Registry::new();
        let err = registry
            .load_from_yaml(b"version: \"\"\nroutes: []\n")
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::ManifestInvalid(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join("switchboard-manifest-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("manifest.yaml");
        let path_str = path.to_str().unwrap();

        let manifest = parse_manifest(MINIMAL_YAML.as_bytes(), Format::Yaml).unwrap();
        save_manifest(&manifest, path_str, Format::Unknown).unwrap();

        let reloaded = load_manifest(path_str).unwrap();
        assert_eq!(reloaded, manifest);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let registry = Registry::new();
        let err = registry.load_from_file("/nonexistent/manifest.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
