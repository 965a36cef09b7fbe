//! Home tools: zones and devices

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use flowhub_core::store::{Device, Zone};

use super::{definition, get_bool, get_str};
use crate::protocol::{ToolDefinition, ToolResult};
use crate::registry::{Tool, ToolContext};

fn device_summary(device: &Device) -> Value {
    json!({
        "id": device.id,
        "name": device.name,
        "class": device.class,
    })
}

/// Ids of `root` and every zone nested below it
fn zone_tree(zones: &[Zone], root: &str) -> HashSet<String> {
    let mut ids = HashSet::from([root.to_string()]);
    loop {
        let before = ids.len();
        for zone in zones {
            if zone.parent.as_ref().map_or(false, |p| ids.contains(p)) {
                ids.insert(zone.id.clone());
            }
        }
        if ids.len() == before {
            return ids;
        }
    }
}

/// Zones with the devices in them
pub struct GetHomeStructure;

#[async_trait]
impl Tool for GetHomeStructure {
    fn definition(&self) -> ToolDefinition {
        definition(
            "get_home_structure",
            "Get all zones of the home with the devices in each zone",
            json!({}),
            &[],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        _arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let zones = ctx.services.store.zones().await?;
        let devices = ctx.services.store.devices().await?;

        let known: HashSet<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        let zone_list: Vec<Value> = zones
            .iter()
            .map(|zone| {
                let members: Vec<Value> = devices
                    .iter()
                    .filter(|d| d.zone.as_deref() == Some(zone.id.as_str()))
                    .map(device_summary)
                    .collect();
                json!({
                    "id": zone.id,
                    "name": zone.name,
                    "parent": zone.parent,
                    "devices": members,
                })
            })
            .collect();

        let unassigned: Vec<Value> = devices
            .iter()
            .filter(|d| d.zone.as_deref().map_or(true, |z| !known.contains(z)))
            .map(device_summary)
            .collect();

        Ok(ToolResult::json(&json!({
            "zones": zone_list,
            "unassigned": unassigned,
        })))
    }
}

/// Sets one capability of one device
pub struct ControlDevice;

#[async_trait]
impl Tool for ControlDevice {
    fn definition(&self) -> ToolDefinition {
        definition(
            "control_device",
            "Set a capability of a device, e.g. onoff=true or dim=0.5",
            json!({
                "device_id": {
                    "type": "string",
                    "description": "Device id (see get_home_structure)"
                },
                "capability": {
                    "type": "string",
                    "description": "Capability to set, e.g. onoff, dim, target_temperature"
                },
                "value": {
                    "description": "New value"
                }
            }),
            &["device_id", "capability", "value"],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let device_id = match get_str(&arguments, "device_id") {
            Some(d) => d,
            None => return Ok(ToolResult::error("Missing required argument: device_id")),
        };
        let capability = match get_str(&arguments, "capability") {
            Some(c) => c,
            None => return Ok(ToolResult::error("Missing required argument: capability")),
        };
        let value = match arguments.get("value") {
            Some(v) => v.clone(),
            None => return Ok(ToolResult::error("Missing required argument: value")),
        };

        ctx.services
            .store
            .set_capability(&device_id, &capability, value.clone())
            .await?;

        Ok(ToolResult::success(format!(
            "Set {} of {} to {}",
            capability, device_id, value
        )))
    }
}

/// All capability values of one device
pub struct GetDeviceState;

#[async_trait]
impl Tool for GetDeviceState {
    fn definition(&self) -> ToolDefinition {
        definition(
            "get_device_state",
            "Get the current value of every capability of a device",
            json!({
                "device_id": {
                    "type": "string",
                    "description": "Device id"
                }
            }),
            &["device_id"],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let device_id = match get_str(&arguments, "device_id") {
            Some(d) => d,
            None => return Ok(ToolResult::error("Missing required argument: device_id")),
        };

        let devices = ctx.services.store.devices().await?;
        match devices.into_iter().find(|d| d.id == device_id) {
            Some(device) => Ok(ToolResult::json(&serde_json::to_value(&device)?)),
            None => Ok(ToolResult::error(format!("Device not found: {}", device_id))),
        }
    }
}

/// Sets one capability on every device of a zone that has it
pub struct ControlZone;

#[async_trait]
impl Tool for ControlZone {
    fn definition(&self) -> ToolDefinition {
        definition(
            "control_zone",
            "Set a capability on every device in a zone that supports it, e.g. turn off all lights",
            json!({
                "zone_id": {
                    "type": "string",
                    "description": "Zone id"
                },
                "capability": {
                    "type": "string",
                    "description": "Capability to set"
                },
                "value": {
                    "description": "New value"
                },
                "include_subzones": {
                    "type": "boolean",
                    "description": "Also control devices in nested zones (default: true)"
                }
            }),
            &["zone_id", "capability", "value"],
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let zone_id = match get_str(&arguments, "zone_id") {
            Some(z) => z,
            None => return Ok(ToolResult::error("Missing required argument: zone_id")),
        };
        let capability = match get_str(&arguments, "capability") {
            Some(c) => c,
            None => return Ok(ToolResult::error("Missing required argument: capability")),
        };
        let value = match arguments.get("value") {
            Some(v) => v.clone(),
            None => return Ok(ToolResult::error("Missing required argument: value")),
        };
        let include_subzones = get_bool(&arguments, "include_subzones").unwrap_or(true);

        let store = &ctx.services.store;
        let zones = store.zones().await?;
        if !zones.iter().any(|z| z.id == zone_id) {
            return Ok(ToolResult::error(format!("Zone not found: {}", zone_id)));
        }

        let scope = if include_subzones {
            zone_tree(&zones, &zone_id)
        } else {
            HashSet::from([zone_id.clone()])
        };

        let targets: Vec<Device> = store
            .devices()
            .await?
            .into_iter()
            .filter(|d| d.zone.as_ref().map_or(false, |z| scope.contains(z)))
            .filter(|d| d.capabilities.contains_key(&capability))
            .collect();

        if targets.is_empty() {
            return Ok(ToolResult::error(format!(
                "No device in zone {} has capability {}",
                zone_id, capability
            )));
        }

        let mut changed = Vec::new();
        let mut failed = Vec::new();
        for device in &targets {
            match store.set_capability(&device.id, &capability, value.clone()).await {
                Ok(()) => changed.push(device.name.clone()),
                Err(e) => failed.push(format!("{}: {}", device.name, e)),
            }
        }

        let mut text = format!(
            "Set {} to {} on {} device(s): {}",
            capability,
            value,
            changed.len(),
            changed.join(", ")
        );
        if !failed.is_empty() {
            text.push_str(&format!("\nFailed: {}", failed.join("; ")));
        }

        if changed.is_empty() {
            Ok(ToolResult::error(text))
        } else {
            Ok(ToolResult::success(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::FlowNaming;
    use crate::registry::ToolRegistry;
    use crate::services::Services;
    use crate::tools::builtin_registry;
    use flowhub_core::{HubStore, MemoryStore};
    use std::sync::Arc;

    fn zone(id: &str, parent: Option<&str>) -> Zone {
        Zone {
            id: id.to_string(),
            name: format!("Zone {}", id),
            parent: parent.map(str::to_string),
        }
    }

    fn device(id: &str, zone: Option<&str>, caps: Value) -> Device {
        Device {
            id: id.to_string(),
            name: format!("Device {}", id),
            zone: zone.map(str::to_string),
            class: "light".to_string(),
            capabilities: caps.as_object().cloned().unwrap(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, ToolRegistry) {
        let store = Arc::new(
            MemoryStore::new()
                .with_zone(zone("home", None))
                .with_zone(zone("ground", Some("home")))
                .with_zone(zone("kitchen", Some("ground")))
                .with_device(device("lamp", Some("kitchen"), json!({"onoff": false})))
                .with_device(device("strip", Some("ground"), json!({"onoff": false, "dim": 0.1})))
                .with_device(device("sensor", Some("ground"), json!({"measure_temperature": 20})))
                .with_device(device("loose", None, json!({"onoff": true}))),
        );
        let services = Services::new(store.clone(), FlowNaming::default());
        (store, builtin_registry(Arc::new(services)).unwrap())
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_zone_tree() {
        let zones = vec![zone("home", None), zone("a", Some("home")), zone("b", Some("a")), zone("x", None)];
        let tree = zone_tree(&zones, "home");
        assert_eq!(tree.len(), 3);
        assert!(!tree.contains("x"));
    }

    #[tokio::test]
    async fn test_home_structure() {
        let (_, registry) = setup();
        let result = registry.execute("get_home_structure", Map::new()).await.unwrap();
        let value: Value = serde_json::from_str(&result.text()).unwrap();

        assert_eq!(value["zones"].as_array().unwrap().len(), 3);
        assert_eq!(value["zones"][2]["devices"][0]["id"], "lamp");
        assert_eq!(value["unassigned"][0]["id"], "loose");
    }

    #[tokio::test]
    async fn test_control_device() {
        let (store, registry) = setup();
        let result = registry
            .execute(
                "control_device",
                args(json!({"device_id": "lamp", "capability": "onoff", "value": true})),
            )
            .await
            .unwrap();
        assert!(!result.is_error);

        let devices = store.devices().await.unwrap();
        assert_eq!(devices[0].capabilities["onoff"], json!(true));
    }

    #[tokio::test]
    async fn test_control_device_unknown_capability_is_error_result() {
        let (_, registry) = setup();
        let result = registry
            .execute(
                "control_device",
                args(json!({"device_id": "lamp", "capability": "volume_set", "value": 3})),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("volume_set"));

        let result = registry
            .execute("control_device", args(json!({"device_id": "lamp"})))
            .await
            .unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_device_state() {
        let (_, registry) = setup();
        let result = registry
            .execute("get_device_state", args(json!({"device_id": "strip"})))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&result.text()).unwrap();
        assert_eq!(value["capabilities"]["dim"], 0.1);

        let result = registry
            .execute("get_device_state", args(json!({"device_id": "ghost"})))
            .await
            .unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_control_zone_with_and_without_subzones() {
        let (store, registry) = setup();
        let result = registry
            .execute(
                "control_zone",
                args(json!({"zone_id": "ground", "capability": "onoff", "value": true})),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.text().contains("2 device(s)"));

        let devices = store.devices().await.unwrap();
        assert_eq!(devices[0].capabilities["onoff"], json!(true));
        assert_eq!(devices[1].capabilities["onoff"], json!(true));
        assert_eq!(devices[3].capabilities["onoff"], json!(true));

        let result = registry
            .execute(
                "control_zone",
                args(json!({
                    "zone_id": "ground",
                    "capability": "onoff",
                    "value": false,
                    "include_subzones": false
                })),
            )
            .await
            .unwrap();
        assert!(result.text().contains("1 device(s)"));
        let devices = store.devices().await.unwrap();
        assert_eq!(devices[0].capabilities["onoff"], json!(true));
        assert_eq!(devices[1].capabilities["onoff"], json!(false));
    }

    #[tokio::test]
    async fn test_control_zone_errors() {
        let (_, registry) = setup();
        let result = registry
            .execute(
                "control_zone",
                args(json!({"zone_id": "attic", "capability": "onoff", "value": true})),
            )
            .await
            .unwrap();
        assert!(result.is_error);

        let result = registry
            .execute(
                "control_zone",
                args(json!({"zone_id": "kitchen", "capability": "dim", "value": 1})),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("No device"));
    }

    #[tokio::test]
    async fn test_store_failure_is_error_result() {
        let (store, registry) = setup();
        store.fail_reads(true);
        let result = registry.execute("get_home_structure", Map::new()).await.unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("unreachable"));
    }
}
