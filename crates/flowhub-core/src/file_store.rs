//! File-backed hub store
//!
//! Reads a JSON snapshot of the hub on every call, so edits to the file are
//! visible without a restart. Fired marker triggers are appended to a JSON
//! lines journal; capability writes are persisted back into the snapshot.
//! A flow's `command` argument is compared in its normalized tool-name form,
//! so `ai_Doorbell` answers to the command `doorbell`.
//!
//! Snapshot layout:
//!
//! ```json
//! {
//!   "flows": [{"id": "...", "name": "...", "enabled": true, "trigger": {...}}],
//!   "advanced_flows": [{"id": "...", "name": "...", "cards": {...}}],
//!   "zones": [{"id": "...", "name": "..."}],
//!   "devices": [{"id": "...", "name": "...", "zone": "...", "capabilities": {...}}]
//! }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::naming::FlowNaming;
use crate::store::{
    parse_each, AdvancedFlow, Device, FlowRule, HubStore, StoreError, TokenSet, TriggerState, Zone,
};

/// Hub store backed by a snapshot file and a trigger journal
pub struct JsonFileStore {
    snapshot: PathBuf,
    journal: PathBuf,
    naming: FlowNaming,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(snapshot: impl Into<PathBuf>, journal: impl Into<PathBuf>) -> Self {
        Self {
            snapshot: snapshot.into(),
            journal: journal.into(),
            naming: FlowNaming::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Use a naming convention other than the default `ai_` prefix
    pub fn with_naming(mut self, naming: FlowNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot
    }

    async fn read_snapshot(&self) -> Result<Value, StoreError> {
        if !self.snapshot.exists() {
            return Err(StoreError::Read(format!(
                "hub snapshot not found at {}",
                self.snapshot.display()
            )));
        }

        let content = tokio::fs::read_to_string(&self.snapshot).await?;
        serde_json::from_str(&content).map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn section<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let snapshot = self.read_snapshot().await?;
        match snapshot.get(key) {
            Some(Value::Array(items)) => Ok(parse_each(items, key)),
            Some(_) => Err(StoreError::Parse(format!("'{}' is not a list", key))),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HubStore for JsonFileStore {
    async fn flows(&self) -> Result<Vec<FlowRule>, StoreError> {
        self.section("flows").await
    }

    async fn advanced_flows(&self) -> Result<Vec<AdvancedFlow>, StoreError> {
        self.section("advanced_flows").await
    }

    async fn fire_marker(&self, tokens: &TokenSet, state: &TriggerState) -> Result<(), StoreError> {
        let flows: Vec<FlowRule> = self.section("flows").await?;
        let advanced: Vec<AdvancedFlow> = self.section("advanced_flows").await?;

        let matches_state = |card: &crate::store::FlowCard| {
            card.is_marker()
                && card
                    .arg_str("command")
                    .map_or(false, |c| self.naming.tool_name_from_flow(c) == state.command)
        };

        let matched = flows
            .iter()
            .filter(|f| f.enabled)
            .filter(|f| f.trigger.as_ref().map_or(false, |t| matches_state(t)))
            .count()
            + advanced
                .iter()
                .filter(|f| f.enabled)
                .map(|f| f.cards.iter().filter(|c| c.is_trigger() && matches_state(c)).count())
                .sum::<usize>();

        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "state": state,
            "tokens": tokens.to_json(),
            "matched": matched,
        });

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.journal.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal)
            .await?;
        file.write_all(format!("{}\n", entry).as_bytes()).await?;
        file.flush().await?;

        info!(command = %state.command, matched, "Fired marker trigger");
        Ok(())
    }

    async fn zones(&self) -> Result<Vec<Zone>, StoreError> {
        self.section("zones").await
    }

    async fn devices(&self) -> Result<Vec<Device>, StoreError> {
        self.section("devices").await
    }

    async fn set_capability(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_snapshot().await?;

        let device = snapshot
            .get_mut("devices")
            .and_then(|d| d.as_array_mut())
            .and_then(|devices| {
                devices
                    .iter_mut()
                    .find(|d| d.get("id").and_then(|v| v.as_str()) == Some(device_id))
            })
            .ok_or_else(|| StoreError::NotFound(format!("device {}", device_id)))?;

        let slot = device
            .get_mut("capabilities")
            .and_then(|c| c.as_object_mut())
            .and_then(|caps| caps.get_mut(capability))
            .ok_or_else(|| {
                StoreError::NotFound(format!("capability {} on device {}", capability, device_id))
            })?;
        *slot = value;

        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        tokio::fs::write(&self.snapshot, content).await?;

        debug!(device = device_id, capability, "Capability written");
        Ok(())
    }
}
