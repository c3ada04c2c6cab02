//! The aggregated tool surface: every tool contributed by plugins, MCP
//! servers, and OpenClaw skills lives in one lookup table the agent
//! runtime dispatches against (spec.md §4.8's "uniform interface").

use crate::tool::Tool;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Removes every tool whose name starts with `prefix` — used when an
    /// MCP server disconnects (`mcp__{serverId}__`) or a plugin is
    /// uninstalled.
    pub fn remove_prefixed(&self, prefix: &str) {
        self.tools.retain(|name, _| !name.starts_with(prefix));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| Arc::clone(&t))
    }

    pub fn list(&self) -> Vec<(String, Value)> {
        self.tools
            .iter()
            .map(|e| (e.key().clone(), e.value().input_schema().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
