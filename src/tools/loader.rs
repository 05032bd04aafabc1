//! Tool loader: builds tool instances from manifest descriptors.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, SwitchboardError};
use crate::manifest::{param_source, Route, ToolSpec};

use super::{HttpTool, Tool};

/// Creates tools from manifest configuration.
#[derive(Debug, Default)]
pub struct ToolLoader;

impl ToolLoader {
    pub fn new() -> Self {
        Self
    }

    /// Create tool instances for a route, bound to the request's workflow
    /// context and bearer token.
    pub fn load_from_route(
        &self,
        route: &Route,
        workflow_context: &Value,
        user_token: &str,
    ) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(route.tools.len());

        for spec in &route.tools {
            let tool = self.create_tool(spec, workflow_context.clone(), user_token)?;
            tools.push(tool);
        }

        Ok(tools)
    }

    fn create_tool(
        &self,
        spec: &ToolSpec,
        workflow_context: Value,
        user_token: &str,
    ) -> Result<Arc<dyn Tool>> {
        self.validate_tool(spec)?;

        match spec.tool_type.as_str() {
            "http" => Ok(Arc::new(HttpTool::new(
                spec.clone(),
                workflow_context,
                user_token,
            )?)),
            other => Err(SwitchboardError::UnsupportedToolType(other.to_string())),
        }
    }

    /// Validate a tool descriptor.
    pub fn validate_tool(&self, spec: &ToolSpec) -> Result<()> {
        if spec.name.is_empty() {
            return Err(SwitchboardError::InvalidTool(
                "tool name is required".to_string(),
            ));
        }
        if spec.description.is_empty() {
            return Err(SwitchboardError::InvalidTool(
                "tool description is required".to_string(),
            ));
        }
        if spec.tool_type.is_empty() {
            return Err(SwitchboardError::InvalidTool(
                "tool type is required".to_string(),
            ));
        }

        if spec.tool_type == "http" && spec.config.url.is_empty() {
            return Err(SwitchboardError::InvalidTool(
                "URL is required for HTTP tools".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for param in &spec.parameters {
            if param.name.is_empty() {
                return Err(SwitchboardError::InvalidTool(
                    "parameter name is required".to_string(),
                ));
            }
            if !seen.insert(param.name.clone()) {
                return Err(SwitchboardError::InvalidTool(format!(
                    "duplicate parameter name: {}",
                    param.name
                )));
            }
            if param.param_type.is_empty() {
                return Err(SwitchboardError::InvalidTool(format!(
                    "parameter type is required for: {}",
                    param.name
                )));
            }
            if param.source.is_empty() {
                return Err(SwitchboardError::InvalidTool(format!(
                    "parameter source is required for: {}",
                    param.name
                )));
            }
            if param.source == param_source::CONTEXT && param.context_path.is_empty() {
                return Err(SwitchboardError::InvalidTool(format!(
                    "context_path is required for context parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}
