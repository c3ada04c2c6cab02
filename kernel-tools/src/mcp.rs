//! `MCPManager`: connects to MCP (Model Context Protocol) servers over
//! stdio or SSE and folds their tools into the aggregated [`ToolRegistry`]
//! under the `mcp__{serverId}__{toolName}` namespace (spec.md §4.8).
//!
//! The stdio transport's request/response bridging — a spawned reader
//! task correlating JSON-RPC ids against a pending-request map, fed by an
//! mpsc-backed writer — is grounded on `axon::cc::transport::subprocess`'s
//! `SubprocessTransport` (stdin channel + broadcast of parsed messages).

use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use kernel_core::{EventBus, KernelError, KernelEvent, Result};
use kernel_storage::{McpDao, McpServerRow};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::warn;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum McpServerSpec {
    Stdio { command: String, args: Vec<String>, env: HashMap<String, String> },
    Sse { url: String },
}

#[derive(Debug, Clone, Deserialize)]
struct McpToolDef {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputSchema", default = "default_schema")]
    input_schema: Value,
}

fn default_schema() -> Value {
    json!({ "type": "object" })
}

type Pending = Arc<AsyncMutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A live JSON-RPC connection to one MCP server, speaking newline-delimited
/// JSON over a child process's stdio.
struct StdioConnection {
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<tokio::process::ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
}

impl StdioConnection {
    async fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .map_err(|e| KernelError::ToolError(format!("failed to spawn mcp server '{command}': {e}")))?;
        let stdin = child.stdin.take().ok_or_else(|| KernelError::ToolError("no stdin".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| KernelError::ToolError("no stdout".to_string()))?;

        let pending: Pending = Arc::new(AsyncMutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Ok(response) = serde_json::from_str::<Value>(&line) {
                            if let Some(id) = response.get("id").and_then(Value::as_u64) {
                                if let Some(tx) = reader_pending.lock().await.remove(&id) {
                                    let _ = tx.send(response);
                                }
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "mcp stdio reader error");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut line = serde_json::to_string(&request).map_err(|e| KernelError::Internal(e.to_string()))?;
        line.push('\n');
        {
            let mut stdin = self.stdin.lock().await;
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| KernelError::ToolError(format!("mcp write failed: {e}")))?;
        }

        let response = tokio::time::timeout(CALL_TIMEOUT, rx)
            .await
            .map_err(|_| KernelError::Timeout(format!("mcp call '{method}' timed out")))?
            .map_err(|_| KernelError::ToolError("mcp server closed connection".to_string()))?;

        if let Some(error) = response.get("error") {
            return Err(KernelError::ToolError(error.to_string()));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn kill(&self) {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
    }
}

enum ConnectionKind {
    Stdio(StdioConnection),
    Sse { client: reqwest::Client, url: String },
}

struct ServerHandle {
    name: String,
    connection: ConnectionKind,
}

/// A tool proxying into one MCP server, registered under the
/// `mcp__{serverId}__{toolName}` namespace.
struct McpProxyTool {
    full_name: String,
    remote_name: String,
    server_id: String,
    description: String,
    input_schema: Value,
    manager: Arc<McpManagerInner>,
}

#[async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        self.manager.call_tool(&self.server_id, &self.remote_name, args).await
    }
}

struct McpManagerInner {
    servers: dashmap::DashMap<String, Arc<ServerHandle>>,
}

impl McpManagerInner {
    async fn call_tool(&self, server_id: &str, tool_name: &str, args: Value) -> Result<ToolResult> {
        let handle = self
            .servers
            .get(server_id)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| KernelError::not_found(format!("mcp server '{server_id}'")))?;
        match &handle.connection {
            ConnectionKind::Stdio(conn) => {
                let result = conn
                    .call("tools/call", json!({ "name": tool_name, "arguments": args }))
                    .await;
                Ok(render_tool_result(result))
            }
            ConnectionKind::Sse { client, url } => {
                let response = client
                    .post(url)
                    .json(&json!({ "method": "tools/call", "params": { "name": tool_name, "arguments": args } }))
                    .send()
                    .await
                    .map_err(|e| KernelError::NetworkError(e.to_string()));
                match response {
                    Ok(resp) => {
                        let value = resp.json::<Value>().await.map_err(|e| KernelError::NetworkError(e.to_string()));
                        Ok(render_tool_result(value))
                    }
                    Err(e) => Ok(ToolResult::error(e.to_string())),
                }
            }
        }
    }
}

fn render_tool_result(result: Result<Value>) -> ToolResult {
    match result {
        Ok(value) => {
            let is_error = value.get("isError").and_then(Value::as_bool).unwrap_or(false);
            let text = value
                .get("content")
                .and_then(Value::as_array)
                .map(|blocks| {
                    blocks
                        .iter()
                        .filter_map(|b| b.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_else(|| value.to_string());
            if is_error {
                ToolResult::error(text)
            } else {
                ToolResult::ok(text)
            }
        }
        Err(e) => ToolResult::error(e.message()),
    }
}

/// Connects to, caches tools for, and proxies calls into MCP servers.
pub struct McpManager {
    inner: Arc<McpManagerInner>,
    dao: McpDao,
    bus: Arc<EventBus>,
    registry: Arc<ToolRegistry>,
}

impl McpManager {
    pub fn new(dao: McpDao, bus: Arc<EventBus>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            inner: Arc::new(McpManagerInner { servers: dashmap::DashMap::new() }),
            dao,
            bus,
            registry,
        }
    }

    pub async fn connect(&self, server_id: &str, name: &str, spec: McpServerSpec) -> Result<Vec<String>> {
        let connection = match &spec {
            McpServerSpec::Stdio { command, args, env } => {
                ConnectionKind::Stdio(StdioConnection::spawn(command, args, env).await?)
            }
            McpServerSpec::Sse { url } => ConnectionKind::Sse { client: reqwest::Client::new(), url: url.clone() },
        };

        let handle = Arc::new(ServerHandle { name: name.to_string(), connection });
        self.inner.servers.insert(server_id.to_string(), handle);
        self.bus.emit(KernelEvent::McpServerConnected { server_id: server_id.to_string() });

        let tools = self.discover_tools(server_id).await?;
        let names: Vec<String> = tools.iter().map(|t| t.full_name.clone()).collect();
        for tool in tools {
            self.registry.register(Arc::new(tool));
        }

        let spec_json = serde_json::to_string(&spec).map_err(|e| KernelError::Internal(e.to_string()))?;
        self.dao
            .upsert(&McpServerRow {
                id: server_id.to_string(),
                name: name.to_string(),
                transport: match spec {
                    McpServerSpec::Stdio { .. } => "stdio".to_string(),
                    McpServerSpec::Sse { .. } => "sse".to_string(),
                },
                connection_spec: spec_json,
                auto_connect: true,
                enabled: true,
                cached_tools: serde_json::to_string(&names).unwrap_or_default(),
            })
            .await?;

        self.bus.emit(KernelEvent::McpToolsDiscovered {
            server_id: server_id.to_string(),
            tool_names: names.clone(),
        });
        Ok(names)
    }

    async fn discover_tools(&self, server_id: &str) -> Result<Vec<McpProxyTool>> {
        let handle = self
            .inner
            .servers
            .get(server_id)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| KernelError::not_found(format!("mcp server '{server_id}'")))?;

        let raw = match &handle.connection {
            ConnectionKind::Stdio(conn) => conn.call("tools/list", json!({})).await?,
            ConnectionKind::Sse { client, url } => client
                .post(url)
                .json(&json!({ "method": "tools/list", "params": {} }))
                .send()
                .await
                .map_err(|e| KernelError::NetworkError(e.to_string()))?
                .json::<Value>()
                .await
                .map_err(|e| KernelError::NetworkError(e.to_string()))?,
        };

        let tool_defs: Vec<McpToolDef> = serde_json::from_value(raw.get("tools").cloned().unwrap_or(Value::Array(vec![])))
            .unwrap_or_default();

        Ok(tool_defs
            .into_iter()
            .map(|def| McpProxyTool {
                full_name: format!("mcp__{server_id}__{}", def.name),
                remote_name: def.name,
                server_id: server_id.to_string(),
                description: def.description,
                input_schema: def.input_schema,
                manager: self.inner.clone(),
            })
            .collect())
    }

    pub async fn call_tool(&self, server_id: &str, tool_name: &str, args: Value) -> Result<ToolResult> {
        self.inner.call_tool(server_id, tool_name, args).await
    }

    pub async fn disconnect(&self, server_id: &str) -> Result<()> {
        let Some((_, handle)) = self.inner.servers.remove(server_id) else {
            return Err(KernelError::not_found(format!("mcp server '{server_id}'")));
        };
        if let ConnectionKind::Stdio(conn) = &handle.connection {
            conn.kill().await;
        }
        self.registry.remove_prefixed(&format!("mcp__{server_id}__"));
        self.dao.delete(server_id).await?;
        self.bus.emit(KernelEvent::McpServerDisconnected { server_id: server_id.to_string() });
        Ok(())
    }

    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.inner.servers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let _ = self.disconnect(&id).await;
        }
    }

    pub fn connected_servers(&self) -> Vec<(String, String)> {
        self.inner.servers.iter().map(|e| (e.key().clone(), e.value().name.clone())).collect()
    }
}
