//! Flowhub Core - Shared functionality for the flowhub tools
//!
//! Configuration, standard paths, and the boundary towards the home
//! automation hub (rules, flows, zones and devices).

pub mod config;
pub mod paths;
pub mod store;
pub mod file_store;
pub mod memory_store;
pub mod naming;

pub use config::Config;
pub use paths::Paths;
pub use store::{HubStore, StoreError};
pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use naming::FlowNaming;
