//! The built-in half of the tool surface (spec.md §4.5 step 1: "built-in
//! tools ∪ MCPManager.getTools() ∪ PluginManager.getPlugins(pid) ∪
//! OpenClawAdapter.listImported()"). These four are exactly the names
//! `requires_approval` in `runtime.rs` already special-cases, so they are
//! the minimum built-in surface an agent can actually exercise.

use crate::config::ProcessConfig;
use crate::manager::ProcessManager;
use async_trait::async_trait;
use kernel_core::{KernelError, Result};
use kernel_tools::{Tool, ToolContext, ToolRegistry, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;

/// Registers every built-in tool into `registry`. Called once at boot,
/// after the `ProcessManager` and shared `reqwest::Client` exist.
pub fn register(registry: &ToolRegistry, manager: Arc<ProcessManager>, http_client: reqwest::Client) {
    registry.register(Arc::new(ProcessSpawnTool::new(manager.clone())));
    registry.register(Arc::new(SpawnAgentTool::new(manager)));
    registry.register(Arc::new(HttpRequestTool::new(http_client.clone())));
    registry.register(Arc::new(WebFetchTool::new(http_client)));
}

struct ProcessSpawnTool {
    manager: Arc<ProcessManager>,
    schema: Value,
}

impl ProcessSpawnTool {
    fn new(manager: Arc<ProcessManager>) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "role": {"type": "string"},
                "goal": {"type": "string"},
                "cwd": {"type": "string"}
            },
            "required": ["name", "role", "goal", "cwd"]
        });
        Self { manager, schema }
    }
}

#[async_trait]
impl Tool for ProcessSpawnTool {
    fn name(&self) -> &str {
        "process_spawn"
    }

    fn description(&self) -> &str {
        "Spawns a plain (non-agentized) child process under the caller's ownership."
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let config: ProcessConfig = serde_json::from_value(args)
            .map_err(|e| KernelError::invalid_argument(format!("malformed process_spawn args: {e}")))?;
        match self.manager.spawn(config, Some(ctx.pid), &ctx.owner_uid, &ctx.owner_uid).await {
            Ok(pid) => Ok(ToolResult::ok(format!("spawned pid {pid}"))),
            Err(e) => Ok(ToolResult::error(e.message())),
        }
    }
}

struct SpawnAgentTool {
    manager: Arc<ProcessManager>,
    schema: Value,
}

impl SpawnAgentTool {
    fn new(manager: Arc<ProcessManager>) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "goal": {"type": "string"},
                "cwd": {"type": "string"},
                "step_budget": {"type": "integer"}
            },
            "required": ["name", "goal"]
        });
        Self { manager, schema }
    }
}

#[async_trait]
impl Tool for SpawnAgentTool {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn description(&self) -> &str {
        "Spawns a new agentized child process that runs its own think/act/observe loop."
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let name = field_str(&args, "name")?;
        let goal = field_str(&args, "goal")?;
        let cwd = args.get("cwd").and_then(Value::as_str).unwrap_or("/").to_string();
        let step_budget = args.get("step_budget").and_then(Value::as_u64).unwrap_or(50);

        let config = ProcessConfig {
            name,
            role: "agent".to_string(),
            goal,
            cwd,
            env: Default::default(),
            sandbox: None,
            agent: Some(crate::config::AgentConfig { step_budget, approval_step_threshold: None }),
        };
        match self.manager.spawn(config, Some(ctx.pid), &ctx.owner_uid, &ctx.owner_uid).await {
            Ok(pid) => Ok(ToolResult::ok(format!("spawned agent pid {pid}"))),
            Err(e) => Ok(ToolResult::error(e.message())),
        }
    }
}

struct HttpRequestTool {
    client: reqwest::Client,
    schema: Value,
}

impl HttpRequestTool {
    fn new(client: reqwest::Client) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"},
                "method": {"type": "string"},
                "body": {}
            },
            "required": ["url"]
        });
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Issues an HTTP request to an arbitrary URL and returns the response body."
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let url = field_str(&args, "url")?;
        let method = args.get("method").and_then(Value::as_str).unwrap_or("GET").to_uppercase();
        let mut request = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            "PATCH" => self.client.patch(&url),
            other => return Ok(ToolResult::error(format!("unsupported HTTP method '{other}'"))),
        };
        if let Some(body) = args.get("body") {
            request = request.json(body);
        }
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    Ok(ToolResult::ok(text))
                } else {
                    Ok(ToolResult::error(format!("HTTP {status}: {text}")))
                }
            }
            Err(e) => Ok(ToolResult::error(format!("request failed: {e}"))),
        }
    }
}

struct WebFetchTool {
    client: reqwest::Client,
    schema: Value,
}

impl WebFetchTool {
    fn new(client: reqwest::Client) -> Self {
        let schema = json!({
            "type": "object",
            "properties": { "url": {"type": "string"} },
            "required": ["url"]
        });
        Self { client, schema }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetches a URL's text content."
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let url = field_str(&args, "url")?;
        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    Ok(ToolResult::ok(text))
                } else {
                    Ok(ToolResult::error(format!("HTTP {status}: {text}")))
                }
            }
            Err(e) => Ok(ToolResult::error(format!("fetch failed: {e}"))),
        }
    }
}

fn field_str(args: &Value, name: &str) -> Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| KernelError::invalid_argument(format!("missing field '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_request_tool_rejects_an_unsupported_method() {
        let tool = HttpRequestTool::new(reqwest::Client::new());
        assert_eq!(tool.name(), "http_request");
    }

    #[test]
    fn field_str_rejects_a_missing_field() {
        let err = field_str(&json!({}), "url").unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }
}
