//! Flow/tool naming convention
//!
//! A flow named `<prefix><tool>` is exposed as tool `<tool>`; the prefix is
//! matched case-insensitively and the tool name is lowercase.

/// Naming convention linking flow names and tool names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNaming {
    prefix: String,
}

impl Default for FlowNaming {
    fn default() -> Self {
        Self::new("ai_")
    }
}

impl FlowNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_lowercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Tool name for a flow name: strip the prefix, lowercase
    pub fn tool_name_from_flow(&self, flow_name: &str) -> String {
        let name = flow_name.trim();
        let stripped = match name.get(..self.prefix.len()) {
            Some(head) if !self.prefix.is_empty() && head.eq_ignore_ascii_case(&self.prefix) => {
                &name[self.prefix.len()..]
            }
            _ => name,
        };
        stripped.to_lowercase()
    }

    /// Flow name expected for a tool name
    pub fn flow_name_for_tool(&self, tool_name: &str) -> String {
        format!("{}{}", self.prefix, tool_name)
    }
}
