//! Built-in tools
//!
//! The fixed catalog registered at startup. Flow tools are not registered
//! here; they are compiled from the hub on every discovery pass and reach
//! the hub through `trigger_flow`.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::protocol::{InputSchema, ToolDefinition};
use crate::registry::{RegistryError, ToolRegistry};
use crate::services::Services;

pub mod flows;
pub mod home;
pub mod meta;

/// Name of the universal flow trigger tool
pub const TRIGGER_TOOL: &str = "trigger_flow";

/// Registry with every built-in tool in its tier
pub fn builtin_registry(services: Arc<Services>) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new(services);

    registry.register(flows::TriggerFlow)?;
    registry.register(flows::ListAiFlows)?;
    registry.register(home::GetHomeStructure)?;
    registry.register(home::ControlDevice)?;

    registry.register_meta(meta::SearchTools)?;
    registry.register_meta(meta::UseTool)?;

    registry.register_hidden(home::GetDeviceState)?;
    registry.register_hidden(home::ControlZone)?;
    registry.register_hidden(flows::ListKnownCommands)?;

    Ok(registry)
}

/// Create a tool definition with the given name, description, and schema properties
pub(crate) fn definition(
    name: &str,
    description: &str,
    properties: Value,
    required: &[&str],
) -> ToolDefinition {
    let props = properties.as_object().cloned().unwrap_or_default();
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties: props,
            required: required.iter().map(|s| s.to_string()).collect(),
        },
    }
}

/// Helper to get a string argument
pub(crate) fn get_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Helper to get a boolean argument
pub(crate) fn get_bool(args: &Map<String, Value>, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

/// Helper to get an object argument
pub(crate) fn get_object(args: &Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    args.get(key).and_then(|v| v.as_object()).cloned()
}
