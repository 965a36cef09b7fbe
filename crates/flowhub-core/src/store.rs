//! Hub store boundary
//!
//! Narrow, typed views of the records the hub hands out. Only the fields
//! flowhub reads are modelled; everything else in the hub's JSON is ignored.
//! Records are validated and defaulted here so nothing untyped travels
//! further in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Short id of the trigger card that marks a flow as AI-callable
pub const MARKER_TRIGGER_ID: &str = "ai_tool_call";

/// Fully-qualified id of the marker trigger card
pub const MARKER_TRIGGER_URI_ID: &str = "homey:app:com.flowhub.mcp:ai_tool_call";

/// Number of positional value slots handed to a fired flow
pub const TOKEN_SLOTS: usize = 5;

/// Hub store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to read from hub: {0}")]
    Read(String),

    #[error("Malformed hub data: {0}")]
    Parse(String),

    #[error("Trigger failed: {0}")]
    Trigger(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One card of a flow (trigger, condition or action)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowCard {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub card_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default)]
    pub args: Map<String, Value>,
}

impl FlowCard {
    /// Whether this card is the marker trigger, by short or fully-qualified id
    pub fn is_marker(&self) -> bool {
        if self.id == MARKER_TRIGGER_ID || self.id == MARKER_TRIGGER_URI_ID {
            return true;
        }
        match &self.uri {
            Some(uri) => format!("{}:{}", uri, self.id) == MARKER_TRIGGER_URI_ID,
            None => false,
        }
    }

    /// Whether the card is declared as a trigger
    pub fn is_trigger(&self) -> bool {
        self.card_type.eq_ignore_ascii_case("trigger")
    }

    /// A string argument of the card
    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(|v| v.as_str())
    }
}

/// A simple flow: one trigger plus conditions/actions flowhub does not inspect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub trigger: Option<FlowCard>,
}

/// An advanced flow: a graph of cards, any number of them triggers
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdvancedFlow {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub cards: CardSet,
}

fn default_enabled() -> bool {
    true
}

/// Cards of an advanced flow in source order.
///
/// The hub delivers them either as a list or as a map keyed by card id;
/// both shapes are accepted. Cards that do not parse are dropped.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct CardSet {
    pub cards: Vec<FlowCard>,
}

impl From<Value> for CardSet {
    fn from(value: Value) -> Self {
        let raw: Vec<Value> = match value {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        };

        let cards = raw
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<FlowCard>(v) {
                Ok(card) => Some(card),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed flow card");
                    None
                }
            })
            .collect();

        Self { cards }
    }
}

impl CardSet {
    pub fn iter(&self) -> impl Iterator<Item = &FlowCard> {
        self.cards.iter()
    }
}

/// A zone (room, floor, ...) of the home
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// A device with its current capability values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub capabilities: Map<String, Value>,
}

/// The fixed token set handed to the hub when a marker trigger fires.
///
/// All five value slots are always present; unused slots are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    pub command: String,
    pub values: [String; TOKEN_SLOTS],
}

impl TokenSet {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            values: Default::default(),
        }
    }

    /// Value of a 1-indexed slot
    pub fn slot(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.values.get(i))
            .map(|s| s.as_str())
    }

    /// Hub-facing representation: `command` plus `value1`..`value5`
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("command".to_string(), Value::String(self.command.clone()));
        for (i, value) in self.values.iter().enumerate() {
            map.insert(format!("value{}", i + 1), Value::String(value.clone()));
        }
        Value::Object(map)
    }
}

/// Matching state for a marker trigger: only flows whose `command`
/// argument normalizes to this command run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    pub command: String,
}

/// The hub's flow, zone and device API as seen by flowhub
#[async_trait]
pub trait HubStore: Send + Sync {
    /// All simple flows
    async fn flows(&self) -> Result<Vec<FlowRule>, StoreError>;

    /// All advanced flows
    async fn advanced_flows(&self) -> Result<Vec<AdvancedFlow>, StoreError>;

    /// Fire the marker trigger with the given tokens and matching state
    async fn fire_marker(&self, tokens: &TokenSet, state: &TriggerState) -> Result<(), StoreError>;

    async fn zones(&self) -> Result<Vec<Zone>, StoreError>;

    async fn devices(&self) -> Result<Vec<Device>, StoreError>;

    /// Write one capability value of one device
    async fn set_capability(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<(), StoreError>;
}

/// Parse each element of a JSON array into `T`, dropping the ones that fail
pub(crate) fn parse_each<T: serde::de::DeserializeOwned>(items: &[Value], kind: &str) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(kind, error = %e, "Skipping malformed hub record");
                None
            }
        })
        .collect()
}
