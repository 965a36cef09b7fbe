//! Token mapper
//!
//! Bridges named tool arguments to the five positional token slots the hub
//! hands to a fired flow.
//!
//! With a cached parameter order for the command, each name's value goes to
//! the slot at that name's position; positions beyond the fifth are dropped.
//! Without one, the arguments fill the slots in the order the caller sent
//! them. That fallback is only as stable as the caller's key order; it is
//! kept because flows invoked before discovery still expect their values in
//! the slots.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use flowhub_core::store::{HubStore, TokenSet, TriggerState, TOKEN_SLOTS};

use crate::compiler::{KnownCommands, ParameterOrderCache};

/// Outcome of firing a flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
        }
    }
}

/// String form of an argument for a token slot; `null` counts as absent
fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub struct TokenMapper {
    store: Arc<dyn HubStore>,
    orders: Arc<ParameterOrderCache>,
    known: Arc<KnownCommands>,
}

impl TokenMapper {
    pub fn new(
        store: Arc<dyn HubStore>,
        orders: Arc<ParameterOrderCache>,
        known: Arc<KnownCommands>,
    ) -> Self {
        Self {
            store,
            orders,
            known,
        }
    }

    /// Build the token set for a call
    pub fn tokens(&self, command: &str, parameters: &Map<String, Value>) -> TokenSet {
        let mut tokens = TokenSet::new(command);

        match self.orders.get(command) {
            Some(order) => {
                for (position, name) in order.iter().enumerate() {
                    if position >= TOKEN_SLOTS {
                        break;
                    }
                    if let Some(value) = parameters.get(name).and_then(coerce) {
                        tokens.values[position] = value;
                    }
                }
            }
            None => {
                debug!(command, "No parameter order cached, using argument order");
                for (position, value) in parameters.values().take(TOKEN_SLOTS).enumerate() {
                    if let Some(value) = coerce(value) {
                        tokens.values[position] = value;
                    }
                }
            }
        }

        tokens
    }

    /// Map the arguments and fire the flow for `command`
    pub async fn map_and_invoke(
        &self,
        command: &str,
        parameters: &Map<String, Value>,
    ) -> ExecutionResult {
        self.known.remember(command);

        let tokens = self.tokens(command, parameters);
        let state = TriggerState {
            command: command.to_string(),
        };

        match self.store.fire_marker(&tokens, &state).await {
            Ok(()) => {
                debug!(command, "Flow triggered");
                ExecutionResult::ok(format!("Flow \"{}\" triggered", command))
            }
            Err(e) => {
                warn!(command, error = %e, "Flow trigger failed");
                ExecutionResult::failed(e.to_string())
            }
        }
    }
}
