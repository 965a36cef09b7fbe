//! Flow scanner
//!
//! Finds the flows that carry the marker trigger and extracts, per marker
//! card, the command and the free-text parameter description.

use serde::Serialize;
use tracing::warn;

use flowhub_core::store::{AdvancedFlow, FlowCard, FlowRule};

use crate::naming::FlowNaming;

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Simple,
    Advanced,
}

/// One marker trigger found in an enabled flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowCandidate {
    pub flow_id: String,
    pub flow_name: String,
    pub kind: FlowKind,
    /// Normalized command; also the compiled tool's name
    pub command: String,
    /// Free text from the trigger, passed unmodified to the DSL parser
    pub description: Option<String>,
}

/// Scans flows for marker triggers
#[derive(Debug, Clone, Default)]
pub struct FlowScanner {
    naming: FlowNaming,
}

impl FlowScanner {
    pub fn new(naming: FlowNaming) -> Self {
        Self { naming }
    }

    pub fn naming(&self) -> &FlowNaming {
        &self.naming
    }

    /// A simple flow yields at most one candidate
    pub fn scan_flow(&self, flow: &FlowRule) -> Option<FlowCandidate> {
        if !flow.enabled {
            return None;
        }
        let trigger = flow.trigger.as_ref().filter(|t| t.is_marker())?;
        self.candidate(trigger, &flow.id, &flow.name, FlowKind::Simple)
    }

    /// An advanced flow yields one candidate per marker trigger card
    pub fn scan_advanced(&self, flow: &AdvancedFlow) -> Vec<FlowCandidate> {
        if !flow.enabled {
            return Vec::new();
        }
        flow.cards
            .iter()
            .filter(|card| card.is_trigger() && card.is_marker())
            .filter_map(|card| self.candidate(card, &flow.id, &flow.name, FlowKind::Advanced))
            .collect()
    }

    /// Scan a whole catalog, simple flows first
    pub fn scan_all(&self, flows: &[FlowRule], advanced: &[AdvancedFlow]) -> Vec<FlowCandidate> {
        let mut candidates: Vec<FlowCandidate> =
            flows.iter().filter_map(|f| self.scan_flow(f)).collect();
        for flow in advanced {
            candidates.extend(self.scan_advanced(flow));
        }
        candidates
    }

    fn candidate(
        &self,
        card: &FlowCard,
        flow_id: &str,
        flow_name: &str,
        kind: FlowKind,
    ) -> Option<FlowCandidate> {
        let Some(raw) = card.arg_str("command") else {
            warn!(flow_id, flow_name, "Marker trigger without a command argument, skipping");
            return None;
        };

        let command = self.naming.tool_name_from_flow(raw);
        if command.is_empty() {
            warn!(flow_id, flow_name, "Marker trigger with an empty command, skipping");
            return None;
        }

        Some(FlowCandidate {
            flow_id: flow_id.to_string(),
            flow_name: flow_name.to_string(),
            kind,
            command,
            description: card.arg_str("description").map(str::to_string),
        })
    }
}
