//! The uniform tool interface every surface (plugin, MCP, OpenClaw skill)
//! exposes to the agent runtime (spec.md §4.8). Grounded on
//! `mcp-sdk::tool::Tool`'s `name`/`description`/`input_schema`/`execute`
//! shape, re-expressed without the mcp-sdk crate itself since that crate
//! is not part of this workspace's dependency stack.

use async_trait::async_trait;
use kernel_core::Result;
use serde_json::Value;
use std::fmt;

/// Context handed to a tool at execution time — the caller's identity and
/// any ambient state a tool implementation may need (pid for logging,
/// owner uid for path scoping).
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub pid: kernel_core::Pid,
    pub owner_uid: String,
}

/// Outcome of a tool execution, already rendered to the single text blob
/// the agent runtime appends to its observation (spec.md §4.8's MCP
/// `callTool` contract, generalized to every tool source).
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: format!("Error: {}", text.into()), is_error: true }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Value;
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

impl fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}
