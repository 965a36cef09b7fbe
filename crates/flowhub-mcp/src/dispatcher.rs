//! Protocol dispatcher
//!
//! Routes JSON-RPC requests to the tool registry, the flow tools compiled
//! from the hub, or protocol bookkeeping, and wraps every outcome in a
//! response envelope carrying the request id.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::protocol::{
    CallToolParams, EmptyCapability, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, RpcMethod, ServerCapabilities, ServerInfo, ToolDefinition, ToolsCapability,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::registry::{RegistryError, ToolRegistry};
use crate::tools::TRIGGER_TOOL;

/// Identity reported on `initialize`
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "flowhub".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: "2024-11-05".to_string(),
        }
    }
}

type RpcResult = Result<Value, (i32, String)>;

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    identity: ServerIdentity,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, identity: ServerIdentity) -> Self {
        Self { registry, identity }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw message.
    ///
    /// Returns `None` for notifications, which get no reply on a stream
    /// transport.
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(req) => req,
            Err(e) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                warn!("Invalid request: {}", e);
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ));
            }
        };

        if request.id.is_none() && RpcMethod::parse(&request.method).is_notification() {
            self.handle(request).await;
            return None;
        }

        Some(self.handle(request).await)
    }

    /// Handle a parsed request and always produce an envelope
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.unwrap_or(Value::Null);
        let method = RpcMethod::parse(&request.method);
        debug!(method = %request.method, "Handling request");

        match self.dispatch(&method, request.params).await {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        }
    }

    async fn dispatch(&self, method: &RpcMethod, params: Option<Value>) -> RpcResult {
        match method {
            RpcMethod::Initialize => self.handle_initialize(),
            RpcMethod::ToolsList => self.handle_list_tools().await,
            RpcMethod::ToolsCall => self.handle_call_tool(params).await,
            RpcMethod::Ping => Ok(json!({})),
            RpcMethod::PromptsList => Ok(json!({ "prompts": [] })),
            RpcMethod::ResourcesList => Ok(json!({ "resources": [] })),
            RpcMethod::Initialized => {
                info!("Client initialized");
                Ok(json!({}))
            }
            RpcMethod::Notification(name) => {
                debug!("Notification: {}", name);
                Ok(json!({}))
            }
            RpcMethod::Unknown(name) => {
                warn!("Unknown method: {}", name);
                Err((METHOD_NOT_FOUND, format!("Method not found: {}", name)))
            }
        }
    }

    fn handle_initialize(&self) -> RpcResult {
        info!("Initializing MCP server");

        let result = InitializeResult {
            protocol_version: self.identity.protocol_version.clone(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
                prompts: EmptyCapability::default(),
                resources: EmptyCapability::default(),
            },
            server_info: ServerInfo {
                name: self.identity.name.clone(),
                version: self.identity.version.clone(),
            },
        };

        serde_json::to_value(result)
            .map_err(|e| (INTERNAL_ERROR, format!("Serialization error: {}", e)))
    }

    /// Registry tools plus flow tools from a fresh discovery pass
    async fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = self.registry.list_visible();
        let mut names: HashSet<String> = tools.iter().map(|t| t.name.clone()).collect();

        for flow in self.registry.services().discover().await {
            if self.registry.has(flow.name()) || !names.insert(flow.name().to_string()) {
                warn!(tool = flow.name(), "Flow tool shadowed by a built-in tool, skipping");
                continue;
            }
            tools.push(flow.definition);
        }

        tools
    }

    async fn handle_list_tools(&self) -> RpcResult {
        let result = ListToolsResult {
            tools: self.list_tools().await,
        };

        serde_json::to_value(result)
            .map_err(|e| (INTERNAL_ERROR, format!("Serialization error: {}", e)))
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> RpcResult {
        let params: CallToolParams = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))?,
            None => return Err((INVALID_PARAMS, "Missing params".to_string())),
        };

        info!("Calling tool: {}", params.name);

        let result = if self.registry.has(&params.name) {
            self.registry.execute(&params.name, params.arguments).await
        } else {
            let compiled = self.registry.services().discover().await;
            if !compiled.iter().any(|flow| flow.name() == params.name) {
                return Err((INVALID_PARAMS, format!("Unknown tool: {}", params.name)));
            }

            debug!(tool = %params.name, "Delegating flow tool to {}", TRIGGER_TOOL);
            let mut forwarded = Map::new();
            forwarded.insert("command".to_string(), Value::String(params.name.clone()));
            forwarded.insert("parameters".to_string(), Value::Object(params.arguments));
            self.registry.execute(TRIGGER_TOOL, forwarded).await
        };

        let result = result.map_err(|e| match e {
            RegistryError::ToolNotFound(name) => (INVALID_PARAMS, format!("Unknown tool: {}", name)),
            other => (INTERNAL_ERROR, other.to_string()),
        })?;

        serde_json::to_value(result)
            .map_err(|e| (INTERNAL_ERROR, format!("Serialization error: {}", e)))
    }
}
