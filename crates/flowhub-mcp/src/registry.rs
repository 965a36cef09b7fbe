//! Tool registry
//!
//! Catalog of the built-in tools with tiered visibility. Core and meta tools
//! are listed to clients; hidden tools are only reachable by exact name,
//! normally through the `use_tool` meta tool after `search_tools` surfaced
//! them.
//!
//! Registration happens once at startup and rejects duplicate names. A
//! tool's failure, whether an error or a panic, is turned into an error
//! result here and never reaches the dispatcher.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::protocol::{ToolDefinition, ToolResult};
use crate::services::Services;

/// Registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateRegistration(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

/// Visibility of a registered tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTier {
    /// Always listed
    Core,
    /// Always listed; tools about tools
    Meta,
    /// Never listed, callable by name
    Hidden,
}

impl ToolTier {
    pub fn is_listed(self) -> bool {
        matches!(self, Self::Core | Self::Meta)
    }
}

/// What a tool sees while it runs
pub struct ToolContext<'a> {
    pub registry: &'a ToolRegistry,
    pub services: &'a Services,
}

/// A built-in tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(
        &self,
        ctx: &ToolContext<'_>,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResult>;
}

struct Entry {
    tool: Arc<dyn Tool>,
    tier: ToolTier,
    definition: ToolDefinition,
}

pub struct ToolRegistry {
    services: Arc<Services>,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Register a core tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.insert(Arc::new(tool), ToolTier::Core)
    }

    /// Register a meta tool
    pub fn register_meta<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.insert(Arc::new(tool), ToolTier::Meta)
    }

    /// Register a hidden tool
    pub fn register_hidden<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.insert(Arc::new(tool), ToolTier::Hidden)
    }

    fn insert(&mut self, tool: Arc<dyn Tool>, tier: ToolTier) -> Result<(), RegistryError> {
        let definition = tool.definition();
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateRegistration(definition.name));
        }

        debug!(tool = %definition.name, ?tier, "Registered tool");
        self.index.insert(definition.name.clone(), self.entries.len());
        self.entries.push(Entry {
            tool,
            tier,
            definition,
        });
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tier(&self, name: &str) -> Option<ToolTier> {
        self.index.get(name).map(|&i| self.entries[i].tier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions of core and meta tools, in registration order
    pub fn list_visible(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .filter(|e| e.tier.is_listed())
            .map(|e| e.definition.clone())
            .collect()
    }

    /// Definitions of hidden tools, in registration order
    pub fn list_hidden(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .filter(|e| !e.tier.is_listed())
            .map(|e| e.definition.clone())
            .collect()
    }

    /// Run a tool by exact name, whatever its tier
    pub async fn execute(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, RegistryError> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        let ctx = ToolContext {
            registry: self,
            services: &self.services,
        };

        let outcome = AssertUnwindSafe(entry.tool.execute(&ctx, arguments))
            .catch_unwind()
            .await;

        Ok(match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool failed");
                ToolResult::error(format!("Tool '{}' failed: {}", name, e))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tool = name, reason = %reason, "Tool panicked");
                ToolResult::error(format!("Tool '{}' crashed: {}", name, reason))
            }
        })
    }
}
