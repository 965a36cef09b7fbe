//! Flow tools: the universal trigger and flow discovery

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{definition, get_object, get_str, TRIGGER_TOOL};
use crate::protocol::{ToolDefinition, ToolResult};
use crate::registry::{Tool, ToolContext};

/// Fires the flow listening for a command, mapping named parameters to tokens
pub struct TriggerFlow;

#[async_trait]
impl Tool for TriggerFlow {
    fn definition(&self) -> ToolDefinition {
        definition(
            TRIGGER_TOOL,
            "Trigger an AI-callable flow by its command. Named parameters are mapped to the \
             flow's [[value1]]..[[value5]] tokens in the order the flow declares them; at most \
             5 values reach the flow.",
            json!({
                "command": {
                    "type": "string",
                    "description": "Command of the flow (the flow tool's name)"
                },
                "parameters": {
                    "type": "object",
                    "description": "Named parameters for the flow"
                }
            }),
            &["command"],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let raw = match get_str(&arguments, "command") {
            Some(c) => c,
            None => return Ok(ToolResult::error("Missing required argument: command")),
        };
        let parameters = match arguments.get("parameters") {
            None | Some(Value::Null) => Map::new(),
            Some(_) => match get_object(&arguments, "parameters") {
                Some(p) => p,
                None => return Ok(ToolResult::error("Argument 'parameters' must be an object")),
            },
        };

        // A compiled tool name is already normalized; normalizing it again
        // would strip a second prefix from names like `ai_assistant`.
        let naming = ctx.services.naming();
        let command = if ctx.services.orders.contains(raw.trim()) {
            raw.trim().to_string()
        } else {
            naming.tool_name_from_flow(&raw)
        };
        if command.is_empty() {
            return Ok(ToolResult::error("Argument 'command' is empty"));
        }

        let result = ctx.services.mapper.map_and_invoke(&command, &parameters).await;
        if result.success {
            Ok(ToolResult::success(result.message.unwrap_or_default()))
        } else {
            Ok(ToolResult::error(format!(
                "Failed to trigger flow \"{}\" (expected flow name \"{}\"): {}",
                command,
                naming.flow_name_for_tool(&command),
                result.error.unwrap_or_default()
            )))
        }
    }
}

/// Lists the flows currently compiled into tools
pub struct ListAiFlows;

#[async_trait]
impl Tool for ListAiFlows {
    fn definition(&self) -> ToolDefinition {
        definition(
            "list_ai_flows",
            "List the flows that can be called as tools, with their parameters in token order",
            json!({}),
            &[],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        _arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let naming = ctx.services.naming();
        let flows: Vec<Value> = ctx
            .services
            .discover()
            .await
            .iter()
            .map(|flow| {
                json!({
                    "tool": flow.name(),
                    "flow_id": flow.candidate.flow_id,
                    "flow_name": flow.candidate.flow_name,
                    "kind": flow.candidate.kind,
                    "expected_flow_name": naming.flow_name_for_tool(flow.name()),
                    "parameters": flow.parameters.order,
                    "required": flow.parameters.required,
                })
            })
            .collect();

        if flows.is_empty() {
            return Ok(ToolResult::success(format!(
                "No AI-callable flows found. Add the AI tool call trigger to a flow, e.g. a flow named \"{}\".",
                naming.flow_name_for_tool("example")
            )));
        }

        Ok(ToolResult::json(&json!({ "flows": flows })))
    }
}

/// Commands discovered or invoked since the server started
pub struct ListKnownCommands;

#[async_trait]
impl Tool for ListKnownCommands {
    fn definition(&self) -> ToolDefinition {
        definition(
            "list_known_commands",
            "List every flow command seen since startup, including commands that were called \
             before any flow declared them, with their cached parameter order",
            json!({}),
            &[],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        _arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let commands: Vec<Value> = ctx
            .services
            .known
            .list()
            .into_iter()
            .map(|command| {
                let order = ctx.services.orders.get(&command);
                json!({ "command": command, "parameters": order })
            })
            .collect();

        Ok(ToolResult::json(&json!({ "commands": commands })))
    }
}
