//! Manifest module - declarative route configuration
//!
//! A manifest is parsed from YAML or JSON, validated, and loaded into a
//! `Registry` that compiles every route pattern into an anchored matcher.
//! The registry is the only shared state in the system: it is read by every
//! request and replaced wholesale on hot reload.
//!
//! # Example
//!
//! ```
//! use switchboard::manifest::Registry;
//!
//! let registry = Registry::new();
//! registry
//!     .load_from_yaml(
//!         br#"
//! version: "1.0"
//! routes:
//!   - pattern: /orders/:id
//!     name: order-detail
//! "#,
//!     )
//!     .unwrap();
//!
//! let matched = registry.match_path("/orders/42").unwrap();
//! assert_eq!(matched.param("id"), Some("42"));
//! ```

mod loader;
mod registry;
mod types;

pub use loader::{
    detect_format, format_from_path, load_manifest, parse_manifest, save_manifest,
    validate_manifest, Format,
};
pub use registry::Registry;
pub use types::{
    param_source, ContextBlock, Manifest, ProviderSpec, Route, RouteMatch, Safety, ToolConfig,
    ToolParameter, ToolSpec,
};
