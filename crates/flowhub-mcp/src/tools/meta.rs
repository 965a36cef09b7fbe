//! Meta tools: progressive disclosure of the hidden catalog

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{definition, get_object, get_str};
use crate::protocol::{ToolDefinition, ToolResult};
use crate::registry::{RegistryError, Tool, ToolContext};

const USE_TOOL: &str = "use_tool";

/// Lists hidden tools, optionally filtered
pub struct SearchTools;

#[async_trait]
impl Tool for SearchTools {
    fn definition(&self) -> ToolDefinition {
        definition(
            "search_tools",
            "Search the additional tools that are not listed by default. Call a result with use_tool.",
            json!({
                "query": {
                    "type": "string",
                    "description": "Case-insensitive text matched against tool names and descriptions"
                }
            }),
            &[],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let query = get_str(&arguments, "query").map(|q| q.to_lowercase());

        let matches: Vec<ToolDefinition> = ctx
            .registry
            .list_hidden()
            .into_iter()
            .filter(|tool| match &query {
                Some(q) => {
                    tool.name.to_lowercase().contains(q)
                        || tool.description.to_lowercase().contains(q)
                }
                None => true,
            })
            .collect();

        if matches.is_empty() {
            return Ok(ToolResult::success("No matching tools."));
        }

        Ok(ToolResult::json(&json!({
            "tools": matches,
            "usage": "Call with use_tool {\"name\": <tool>, \"arguments\": {...}}",
        })))
    }
}

/// Runs any registered tool by name
pub struct UseTool;

#[async_trait]
impl Tool for UseTool {
    fn definition(&self) -> ToolDefinition {
        definition(
            USE_TOOL,
            "Run a tool by name, including tools found with search_tools",
            json!({
                "name": {
                    "type": "string",
                    "description": "Exact tool name"
                },
                "arguments": {
                    "type": "object",
                    "description": "Arguments for the tool"
                }
            }),
            &["name"],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let name = match get_str(&arguments, "name") {
            Some(n) => n,
            None => return Ok(ToolResult::error("Missing required argument: name")),
        };
        if name == USE_TOOL {
            return Ok(ToolResult::error("use_tool cannot run itself"));
        }
        let inner = get_object(&arguments, "arguments").unwrap_or_default();

        match ctx.registry.execute(&name, inner).await {
            Ok(result) => Ok(result),
            Err(RegistryError::ToolNotFound(_)) => Ok(ToolResult::error(format!(
                "Unknown tool: {}. Use search_tools to find available tools.",
                name
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
