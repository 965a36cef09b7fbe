//! In-memory hub store
//!
//! Holds flows, zones and devices in memory and records every fired trigger.
//! Reads and triggers can be switched to fail to exercise error paths.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::store::{
    AdvancedFlow, Device, FlowRule, HubStore, StoreError, TokenSet, TriggerState, Zone,
};

#[derive(Default)]
pub struct MemoryStore {
    flows: RwLock<Vec<FlowRule>>,
    advanced: RwLock<Vec<AdvancedFlow>>,
    zones: RwLock<Vec<Zone>>,
    devices: RwLock<Vec<Device>>,
    fired: RwLock<Vec<(TokenSet, TriggerState)>>,
    fail_reads: AtomicBool,
    fail_triggers: AtomicBool,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Read("store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flow(self, flow: FlowRule) -> Self {
        if let Ok(mut flows) = self.flows.write() {
            flows.push(flow);
        }
        self
    }

    pub fn with_advanced_flow(self, flow: AdvancedFlow) -> Self {
        if let Ok(mut advanced) = self.advanced.write() {
            advanced.push(flow);
        }
        self
    }

    pub fn with_zone(self, zone: Zone) -> Self {
        if let Ok(mut zones) = self.zones.write() {
            zones.push(zone);
        }
        self
    }

    pub fn with_device(self, device: Device) -> Self {
        if let Ok(mut devices) = self.devices.write() {
            devices.push(device);
        }
        self
    }

    /// Replace all simple flows
    pub fn set_flows(&self, flows: Vec<FlowRule>) {
        if let Ok(mut current) = self.flows.write() {
            *current = flows;
        }
    }

    /// Make flow/zone/device reads fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `fire_marker` fail
    pub fn fail_triggers(&self, fail: bool) {
        self.fail_triggers.store(fail, Ordering::SeqCst);
    }

    /// Every trigger fired so far, oldest first
    pub fn fired(&self) -> Vec<(TokenSet, TriggerState)> {
        self.fired.read().map(|f| f.clone()).unwrap_or_default()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read("hub unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HubStore for MemoryStore {
    async fn flows(&self) -> Result<Vec<FlowRule>, StoreError> {
        self.check_reads()?;
        Ok(self.flows.read().map_err(poisoned)?.clone())
    }

    async fn advanced_flows(&self) -> Result<Vec<AdvancedFlow>, StoreError> {
        self.check_reads()?;
        Ok(self.advanced.read().map_err(poisoned)?.clone())
    }

    async fn fire_marker(&self, tokens: &TokenSet, state: &TriggerState) -> Result<(), StoreError> {
        if self.fail_triggers.load(Ordering::SeqCst) {
            return Err(StoreError::Trigger(format!(
                "no listener for command {}",
                state.command
            )));
        }
        self.fired
            .write()
            .map_err(poisoned)?
            .push((tokens.clone(), state.clone()));
        Ok(())
    }

    async fn zones(&self) -> Result<Vec<Zone>, StoreError> {
        self.check_reads()?;
        Ok(self.zones.read().map_err(poisoned)?.clone())
    }

    async fn devices(&self) -> Result<Vec<Device>, StoreError> {
        self.check_reads()?;
        Ok(self.devices.read().map_err(poisoned)?.clone())
    }

    async fn set_capability(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut devices = self.devices.write().map_err(poisoned)?;
        let device = devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| StoreError::NotFound(format!("device {}", device_id)))?;

        match device.capabilities.get_mut(capability) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "capability {} on device {}",
                capability, device_id
            ))),
        }
    }
}
