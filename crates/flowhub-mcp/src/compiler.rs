//! Flow tool compiler
//!
//! Turns scanner candidates into tool definitions. Each compile records the
//! parameter order of its command so named arguments can later be mapped to
//! positional token slots.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use flowhub_core::store::{HubStore, TOKEN_SLOTS};

use crate::dsl::{self, ParameterSpec, PropertySchema};
use crate::protocol::ToolDefinition;
use crate::scanner::{FlowCandidate, FlowScanner};

/// Positional parameter order per command, capped at the token slot count.
///
/// Entries are overwritten on every compile of a command; entries of
/// commands that disappear from the hub are kept.
#[derive(Debug, Default)]
pub struct ParameterOrderCache {
    orders: RwLock<HashMap<String, Vec<String>>>,
}

impl ParameterOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, command: &str, mut order: Vec<String>) {
        order.truncate(TOKEN_SLOTS);
        if let Ok(mut orders) = self.orders.write() {
            orders.insert(command.to_string(), order);
        }
    }

    pub fn get(&self, command: &str) -> Option<Vec<String>> {
        self.orders.read().ok()?.get(command).cloned()
    }

    /// Whether `command` has been compiled
    pub fn contains(&self, command: &str) -> bool {
        self.orders
            .read()
            .map(|o| o.contains_key(command))
            .unwrap_or(false)
    }
}

/// Commands seen during this process, discovered or invoked
#[derive(Debug, Default)]
pub struct KnownCommands {
    commands: RwLock<BTreeSet<String>>,
}

impl KnownCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, command: &str) {
        if let Ok(mut commands) = self.commands.write() {
            commands.insert(command.to_string());
        }
    }

    pub fn contains(&self, command: &str) -> bool {
        self.commands
            .read()
            .map(|c| c.contains(command))
            .unwrap_or(false)
    }

    /// Sorted snapshot
    pub fn list(&self) -> Vec<String> {
        self.commands
            .read()
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// A candidate compiled into a callable tool
#[derive(Debug, Clone, Serialize)]
pub struct CompiledFlow {
    #[serde(flatten)]
    pub candidate: FlowCandidate,
    #[serde(skip)]
    pub parameters: ParameterSpec,
    #[serde(skip)]
    pub definition: ToolDefinition,
}

impl CompiledFlow {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Compiles marker flows into tool definitions
pub struct FlowCompiler {
    scanner: FlowScanner,
    orders: Arc<ParameterOrderCache>,
    known: Arc<KnownCommands>,
}

impl FlowCompiler {
    pub fn new(
        scanner: FlowScanner,
        orders: Arc<ParameterOrderCache>,
        known: Arc<KnownCommands>,
    ) -> Self {
        Self {
            scanner,
            orders,
            known,
        }
    }

    pub fn scanner(&self) -> &FlowScanner {
        &self.scanner
    }

    /// Compile one candidate and record its parameter order
    pub fn compile(&self, candidate: FlowCandidate) -> CompiledFlow {
        let parameters = dsl::parse(candidate.description.as_deref());
        let definition = ToolDefinition {
            name: candidate.command.clone(),
            description: describe(&candidate, &parameters),
            input_schema: parameters.input_schema(),
        };

        self.orders.set(&candidate.command, parameters.order.clone());
        self.known.remember(&candidate.command);

        CompiledFlow {
            candidate,
            parameters,
            definition,
        }
    }

    /// Compile every candidate; a command already compiled earlier in the
    /// batch is skipped so tool names stay unique.
    pub fn compile_all(&self, candidates: Vec<FlowCandidate>) -> Vec<CompiledFlow> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !seen.insert(candidate.command.clone()) {
                warn!(
                    command = %candidate.command,
                    flow = %candidate.flow_name,
                    "Command already provided by another flow, skipping"
                );
                continue;
            }
            compiled.push(self.compile(candidate));
        }

        compiled
    }

    /// Full discovery pass against the hub.
    ///
    /// Read failures are logged and treated as an empty source, so a broken
    /// hub yields an empty or partial list rather than an error.
    pub async fn discover(&self, store: &dyn HubStore) -> Vec<CompiledFlow> {
        let flows = store.flows().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read flows during discovery");
            Vec::new()
        });
        let advanced = store.advanced_flows().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read advanced flows during discovery");
            Vec::new()
        });

        let candidates = self.scanner.scan_all(&flows, &advanced);
        let compiled = self.compile_all(candidates);
        debug!(count = compiled.len(), "Discovered flow tools");
        compiled
    }
}

/// Tool description: prose (or a fallback), parameter list, token mapping
fn describe(candidate: &FlowCandidate, parameters: &ParameterSpec) -> String {
    let prose = dsl::prose(candidate.description.as_deref());
    let mut text = if prose.is_empty() {
        format!("Trigger flow \"{}\"", candidate.flow_name)
    } else {
        prose
    };

    if parameters.is_empty() {
        return text;
    }

    text.push_str("\n\nParameters:");
    let mut listed = HashSet::new();
    for (position, name) in parameters.order.iter().enumerate() {
        let Some(schema) = parameters.properties.get(name) else {
            continue;
        };
        if listed.insert(name.as_str()) {
            let required = parameters.required.contains(name);
            text.push_str(&format!("\n- {}", describe_parameter(name, schema, required)));
        } else {
            text.push_str(&format!(
                "\n- {} (repeated, value{} receives the same value)",
                name,
                position + 1
            ));
        }
    }

    let mapping: Vec<String> = parameters
        .order
        .iter()
        .take(TOKEN_SLOTS)
        .enumerate()
        .map(|(i, name)| format!("{}=[[value{}]]", name, i + 1))
        .collect();
    text.push_str(&format!("\n\nToken mapping: {}", mapping.join(", ")));

    if parameters.order.len() > TOKEN_SLOTS {
        text.push_str(&format!(
            "\nOnly the first {} parameters reach the flow; the rest are dropped.",
            TOKEN_SLOTS
        ));
    }

    text
}

fn describe_parameter(name: &str, schema: &PropertySchema, required: bool) -> String {
    let mut traits = vec![
        schema.kind.to_string(),
        if required { "required" } else { "optional" }.to_string(),
    ];
    if let (Some(min), Some(max)) = (schema.minimum, schema.maximum) {
        traits.push(format!("{}-{}", min, max));
    }
    if let Some(allowed) = &schema.allowed {
        traits.push(format!("one of: {}", allowed.join("|")));
    }

    if schema.description.is_empty() {
        format!("{} ({})", name, traits.join(", "))
    } else {
        format!("{} ({}): {}", name, traits.join(", "), schema.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::FlowKind;
    use flowhub_core::store::{
        AdvancedFlow, CardSet, FlowCard, FlowRule, MARKER_TRIGGER_ID,
    };
    use flowhub_core::MemoryStore;
    use serde_json::json;

    fn compiler() -> (FlowCompiler, Arc<ParameterOrderCache>, Arc<KnownCommands>) {
        let orders = Arc::new(ParameterOrderCache::new());
        let known = Arc::new(KnownCommands::new());
        (
            FlowCompiler::new(FlowScanner::default(), orders.clone(), known.clone()),
            orders,
            known,
        )
    }

    fn candidate(command: &str, description: Option<&str>) -> FlowCandidate {
        FlowCandidate {
            flow_id: format!("id-{}", command),
            flow_name: format!("ai_{}", command),
            kind: FlowKind::Simple,
            command: command.to_string(),
            description: description.map(str::to_string),
        }
    }

    fn marker_card(command: &str) -> FlowCard {
        let mut args = serde_json::Map::new();
        args.insert("command".to_string(), json!(command));
        FlowCard {
            id: MARKER_TRIGGER_ID.to_string(),
            card_type: "trigger".to_string(),
            uri: None,
            args,
        }
    }

    #[test]
    fn test_fallback_description_without_parameters() {
        let (compiler, orders, _) = compiler();
        let compiled = compiler.compile(candidate("doorbell", None));

        assert_eq!(compiled.name(), "doorbell");
        assert_eq!(compiled.definition.description, "Trigger flow \"ai_doorbell\"");
        assert!(compiled.definition.input_schema.properties.is_empty());
        assert_eq!(orders.get("doorbell"), Some(vec![]));
    }

    #[test]
    fn test_description_with_parameters_and_mapping() {
        let (compiler, orders, known) = compiler();
        let compiled = compiler.compile(candidate(
            "play_radio",
            Some("Play a stream.\nstreamUrl: string - URL\nvolume: number(0-100)? - Vol"),
        ));

        let description = &compiled.definition.description;
        assert!(description.starts_with("Play a stream."));
        assert!(description.contains("- streamUrl (string, required): URL"));
        assert!(description.contains("- volume (number, optional, 0-100): Vol"));
        assert!(description.contains("streamUrl=[[value1]], volume=[[value2]]"));
        assert!(!description.contains("dropped"));

        assert_eq!(
            orders.get("play_radio"),
            Some(vec!["streamUrl".to_string(), "volume".to_string()])
        );
        assert!(known.contains("play_radio"));
        assert_eq!(compiled.definition.input_schema.required, vec!["streamUrl"]);
    }

    #[test]
    fn test_more_than_five_parameters_notes_the_limit() {
        let (compiler, _, _) = compiler();
        let text = (1..=6)
            .map(|i| format!("p{}: string - P{}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let compiled = compiler.compile(candidate("many", Some(&text)));

        let description = &compiled.definition.description;
        assert!(description.contains("p5=[[value5]]"));
        assert!(!description.contains("[[value6]]"));
        assert!(description.contains("Only the first 5 parameters"));
    }

    #[test]
    fn test_repeated_parameter_is_listed_once_with_its_repeat() {
        let (compiler, orders, _) = compiler();
        let compiled = compiler.compile(candidate(
            "scene",
            Some("room: string - Room\nlevel: number - Level\nroom: string(a|b) - Again"),
        ));

        let description = &compiled.definition.description;
        assert_eq!(description.matches("- room (string, required").count(), 1);
        assert!(description.contains("- room (string, required, one of: a|b): Again"));
        assert!(description.contains("- room (repeated, value3 receives the same value)"));
        assert!(description.contains("room=[[value1]], level=[[value2]], room=[[value3]]"));
        assert_eq!(orders.get("scene").unwrap().len(), 3);
    }

    #[test]
    fn test_cached_order_is_capped_at_token_slots() {
        let (compiler, orders, _) = compiler();
        let text = (1..=7)
            .map(|i| format!("p{}: string - P{}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let compiled = compiler.compile(candidate("many", Some(&text)));

        assert_eq!(compiled.parameters.order.len(), 7);
        let cached = orders.get("many").unwrap();
        assert_eq!(cached.len(), TOKEN_SLOTS);
        assert_eq!(cached.last().map(String::as_str), Some("p5"));
        assert!(orders.contains("many"));
        assert!(!orders.contains("p6"));
    }

    #[test]
    fn test_recompile_overwrites_order() {
        let (compiler, orders, _) = compiler();
        compiler.compile(candidate("scene", Some("a: string - A\nb: string - B")));
        compiler.compile(candidate("scene", Some("b: string - B")));
        assert_eq!(orders.get("scene"), Some(vec!["b".to_string()]));
    }

    #[test]
    fn test_compile_all_skips_duplicate_commands() {
        let (compiler, orders, _) = compiler();
        let compiled = compiler.compile_all(vec![
            candidate("scene", Some("a: string - A")),
            candidate("scene", Some("b: string - B")),
            candidate("other", None),
        ]);

        let names: Vec<&str> = compiled.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["scene", "other"]);
        assert_eq!(orders.get("scene"), Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn test_discover_from_store() {
        let (compiler, _, _) = compiler();
        let store = MemoryStore::new()
            .with_flow(FlowRule {
                id: "f1".to_string(),
                name: "ai_doorbell".to_string(),
                enabled: true,
                trigger: Some(marker_card("doorbell")),
            })
            .with_flow(FlowRule {
                id: "f2".to_string(),
                name: "ai_disabled".to_string(),
                enabled: false,
                trigger: Some(marker_card("disabled")),
            })
            .with_advanced_flow(AdvancedFlow {
                id: "a1".to_string(),
                name: "Evening".to_string(),
                enabled: true,
                cards: CardSet {
                    cards: vec![marker_card("lights_on"), marker_card("lights_off")],
                },
            });

        let compiled = compiler.discover(&store).await;
        let names: Vec<&str> = compiled.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["doorbell", "lights_on", "lights_off"]);
    }

    #[tokio::test]
    async fn test_discover_survives_store_failure() {
        let (compiler, _, _) = compiler();
        let store = MemoryStore::new().with_flow(FlowRule {
            id: "f1".to_string(),
            name: "ai_doorbell".to_string(),
            enabled: true,
            trigger: Some(marker_card("doorbell")),
        });
        store.fail_reads(true);

        assert!(compiler.discover(&store).await.is_empty());
    }
}
