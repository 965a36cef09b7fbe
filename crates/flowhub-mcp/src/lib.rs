//! flowhub MCP server
//!
//! Exposes a home automation hub to AI assistants via the Model Context
//! Protocol. Built-in tools cover the home structure and devices; every
//! flow carrying the AI marker trigger is published as a tool of its own.

pub mod compiler;
pub mod dispatcher;
pub mod dsl;
pub mod mapper;
pub mod protocol;
pub mod registry;
pub mod scanner;
pub mod server;
pub mod services;
pub mod tools;

use std::sync::Arc;

use flowhub_core::{Config, HubStore};

pub use dispatcher::{Dispatcher, ServerIdentity};
pub use flowhub_core::naming;
pub use registry::{RegistryError, ToolRegistry};
pub use server::McpServer;
pub use services::Services;

/// Wire a dispatcher over `store` with the built-in tool catalog
pub fn build_dispatcher(
    store: Arc<dyn HubStore>,
    config: &Config,
) -> Result<Dispatcher, RegistryError> {
    let services = Services::new(store, naming::FlowNaming::new(config.flow_prefix.clone()));
    let registry = tools::builtin_registry(Arc::new(services))?;

    let identity = ServerIdentity {
        name: config.server_name.clone(),
        protocol_version: config.protocol_version.clone(),
        ..ServerIdentity::default()
    };

    Ok(Dispatcher::new(Arc::new(registry), identity))
}
