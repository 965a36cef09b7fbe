//! End-to-end protocol tests against an in-memory hub

use std::sync::Arc;

use flowhub_core::store::{AdvancedFlow, FlowRule};
use flowhub_core::{Config, JsonFileStore, MemoryStore};
use flowhub_mcp::protocol::{INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use flowhub_mcp::{build_dispatcher, Dispatcher};
use serde_json::{json, Value};
use tempfile::TempDir;

fn flow(value: Value) -> FlowRule {
    serde_json::from_value(value).unwrap()
}

fn advanced(value: Value) -> AdvancedFlow {
    serde_json::from_value(value).unwrap()
}

fn radio() -> FlowRule {
    flow(json!({
        "id": "f-radio",
        "name": "ai_play_radio",
        "trigger": {
            "id": "ai_tool_call",
            "type": "trigger",
            "args": {
                "command": "play_radio",
                "description": "Play a radio stream\nstreamUrl: string - Stream URL\nvolume: number(0-100)? - Volume"
            }
        }
    }))
}

fn hub() -> MemoryStore {
    MemoryStore::new()
        .with_flow(radio())
        .with_flow(flow(json!({
            "id": "f-off",
            "name": "ai_disabled",
            "enabled": false,
            "trigger": {"id": "ai_tool_call", "type": "trigger", "args": {"command": "disabled"}}
        })))
        .with_flow(flow(json!({
            "id": "f-plain",
            "name": "Morning",
            "trigger": {"id": "time", "type": "trigger", "args": {}}
        })))
        .with_advanced_flow(advanced(json!({
            "id": "a-1",
            "name": "Evening routines",
            "cards": {
                "c1": {
                    "id": "homey:app:com.flowhub.mcp:ai_tool_call",
                    "type": "trigger",
                    "args": {"command": "dim_lights", "description": "level: number - Target level"}
                },
                "c2": {
                    "id": "ai_tool_call",
                    "uri": "homey:app:com.flowhub.mcp",
                    "type": "trigger",
                    "args": {"command": "close_blinds"}
                },
                "c3": {"id": "ai_tool_call", "type": "action", "args": {"command": "ignored"}}
            }
        })))
}

fn dispatcher(store: Arc<MemoryStore>) -> Dispatcher {
    build_dispatcher(store, &Config::default()).unwrap()
}

async fn call(d: &Dispatcher, message: Value) -> Value {
    let resp = d.handle_message(&message.to_string()).await.unwrap();
    serde_json::to_value(resp).unwrap()
}

fn tool_names(resp: &Value) -> Vec<String> {
    resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_initialize() {
    let d = dispatcher(Arc::new(MemoryStore::new()));
    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})).await;

    assert_eq!(resp["id"], 1);
    assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(resp["result"]["serverInfo"]["name"], "flowhub");
    assert_eq!(resp["result"]["capabilities"]["tools"]["listChanged"], false);
    assert!(resp.get("error").is_none());
}

#[tokio::test]
async fn test_tools_list_merges_builtins_and_flows() {
    let d = dispatcher(Arc::new(hub()));
    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
    let names = tool_names(&resp);

    for builtin in [
        "trigger_flow",
        "list_ai_flows",
        "get_home_structure",
        "control_device",
        "search_tools",
        "use_tool",
    ] {
        assert!(names.contains(&builtin.to_string()), "missing {}", builtin);
    }
    assert!(!names.contains(&"get_device_state".to_string()));
    assert!(!names.contains(&"control_zone".to_string()));

    assert!(names.contains(&"play_radio".to_string()));
    assert!(names.contains(&"dim_lights".to_string()));
    assert!(names.contains(&"close_blinds".to_string()));
    assert!(!names.contains(&"disabled".to_string()));
    assert!(!names.contains(&"ignored".to_string()));

    let radio = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "play_radio")
        .unwrap();
    assert_eq!(radio["inputSchema"]["required"], json!(["streamUrl"]));
    assert_eq!(radio["inputSchema"]["properties"]["volume"]["maximum"], 100.0);
    assert!(radio["description"]
        .as_str()
        .unwrap()
        .starts_with("Play a radio stream"));
}

#[tokio::test]
async fn test_flow_tool_call_maps_parameters_to_slots() {
    let store = Arc::new(hub());
    let d = dispatcher(store.clone());

    call(&d, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "play_radio", "arguments": {"volume": 42}}
        }),
    )
    .await;

    assert_eq!(resp["id"], 3);
    assert!(resp["result"].get("isError").is_none());

    let fired = store.fired();
    assert_eq!(fired.len(), 1);
    let (tokens, state) = &fired[0];
    assert_eq!(state.command, "play_radio");
    assert_eq!(tokens.slot(1), Some(""));
    assert_eq!(tokens.slot(2), Some("42"));
    assert_eq!(tokens.slot(5), Some(""));
}

#[tokio::test]
async fn test_flow_tool_call_without_prior_listing() {
    let store = Arc::new(hub());
    let d = dispatcher(store.clone());

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "dim_lights", "arguments": {"level": 30}}
        }),
    )
    .await;

    assert!(resp["result"].get("isError").is_none());
    assert_eq!(store.fired()[0].0.slot(1), Some("30"));
}

#[tokio::test]
async fn test_flow_tool_name_starting_with_prefix_keeps_its_order() {
    let store = Arc::new(MemoryStore::new().with_flow(flow(json!({
        "id": "f-assistant",
        "name": "Assistant",
        "trigger": {
            "id": "ai_tool_call",
            "type": "trigger",
            "args": {"command": "ai_ai_assistant", "description": "a: string - A\nb: string - B"}
        }
    }))));
    let d = dispatcher(store.clone());

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    assert!(tool_names(&resp).contains(&"ai_assistant".to_string()));

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "ai_assistant", "arguments": {"b": "x"}}
        }),
    )
    .await;
    assert!(resp["result"].get("isError").is_none());

    let fired = store.fired();
    assert_eq!(fired[0].1.command, "ai_assistant");
    assert_eq!(fired[0].0.slot(1), Some(""));
    assert_eq!(fired[0].0.slot(2), Some("x"));
}

#[tokio::test]
async fn test_flow_named_like_builtin_is_shadowed() {
    let marker = |id: &str, command: &str| {
        flow(json!({
            "id": id,
            "name": id,
            "trigger": {"id": "ai_tool_call", "type": "trigger", "args": {"command": command}}
        }))
    };
    let store = Arc::new(
        hub()
            .with_flow(marker("f-use", "use_tool"))
            .with_flow(marker("f-trigger", "ai_Trigger_Flow")),
    );
    let d = dispatcher(store.clone());

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    let names = tool_names(&resp);
    assert_eq!(names.iter().filter(|n| *n == "use_tool").count(), 1);
    assert_eq!(names.iter().filter(|n| *n == "trigger_flow").count(), 1);
    assert!(names.contains(&"play_radio".to_string()));

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "use_tool", "arguments": {"name": "search_tools"}}
        }),
    )
    .await;
    assert!(resp["result"].get("isError").is_none());
    assert!(resp["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("get_device_state"));
    assert!(store.fired().is_empty());

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "trigger_flow", "arguments": {"command": "play_radio"}}
        }),
    )
    .await;
    assert!(resp["result"].get("isError").is_none());
    let fired = store.fired();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].1.command, "play_radio");
}

#[tokio::test]
async fn test_hidden_tool_is_callable_directly() {
    let store = Arc::new(hub().with_device(
        serde_json::from_value(json!({
            "id": "d1",
            "name": "Lamp",
            "capabilities": {"onoff": true}
        }))
        .unwrap(),
    ));
    let d = dispatcher(store);

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "get_device_state", "arguments": {"device_id": "d1"}}
        }),
    )
    .await;

    assert!(resp["result"].get("isError").is_none());
    assert!(resp["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Lamp"));
}

#[tokio::test]
async fn test_unknown_tool_and_method() {
    let d = dispatcher(Arc::new(hub()));

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {"name": "launch_rocket", "arguments": {}}
        }),
    )
    .await;
    assert_eq!(resp["id"], 6);
    assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    assert!(resp["error"]["message"]
        .as_str()
        .unwrap()
        .contains("launch_rocket"));

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 7, "method": "sampling/create"})).await;
    assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
    assert!(resp.get("result").is_none());
}

#[tokio::test]
async fn test_parse_error_and_bookkeeping_methods() {
    let d = dispatcher(Arc::new(MemoryStore::new()));

    let resp = d.handle_message("not json").await.unwrap();
    assert_eq!(resp.id, Value::Null);
    assert_eq!(resp.error.unwrap().code, PARSE_ERROR);

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": "p", "method": "ping"})).await;
    assert_eq!(resp["result"], json!({}));

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 8, "method": "prompts/list"})).await;
    assert_eq!(resp["result"], json!({"prompts": []}));

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"})).await;
    assert_eq!(resp["result"], json!({"resources": []}));

    let none = d
        .handle_message(&json!({"jsonrpc": "2.0", "method": "notifications/cancelled"}).to_string())
        .await;
    assert!(none.is_none());
}

#[tokio::test]
async fn test_store_failure_still_lists_builtins() {
    let store = Arc::new(hub());
    store.fail_reads(true);
    let d = dispatcher(store);

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 10, "method": "tools/list"})).await;
    let names = tool_names(&resp);

    assert!(resp.get("error").is_none());
    assert!(names.contains(&"trigger_flow".to_string()));
    assert!(!names.contains(&"play_radio".to_string()));
}

#[tokio::test]
async fn test_file_store_end_to_end_with_prefixed_command() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("hub.json");
    let journal = dir.path().join("triggers.jsonl");
    std::fs::write(
        &snapshot,
        json!({
            "flows": [{
                "id": "f1",
                "name": "AI_Doorbell",
                "trigger": {
                    "id": "ai_tool_call",
                    "type": "trigger",
                    "args": {"command": "ai_Doorbell", "description": "who: string - Visitor"}
                }
            }]
        })
        .to_string(),
    )
    .unwrap();

    let d = build_dispatcher(
        Arc::new(JsonFileStore::new(&snapshot, &journal)),
        &Config::default(),
    )
    .unwrap();

    let resp = call(&d, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    assert!(tool_names(&resp).contains(&"doorbell".to_string()));

    let resp = call(
        &d,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "doorbell", "arguments": {"who": "postman"}}
        }),
    )
    .await;
    assert!(resp["result"].get("isError").is_none());

    let logged = std::fs::read_to_string(&journal).unwrap();
    let entry: Value = serde_json::from_str(logged.lines().next().unwrap()).unwrap();
    assert_eq!(entry["tokens"]["command"], "doorbell");
    assert_eq!(entry["tokens"]["value1"], "postman");
    assert_eq!(entry["matched"], 1);
}
