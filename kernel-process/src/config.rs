//! Process spawn configuration (spec.md §4.4 `spawn(config, ...)`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the caller of `ProcessManager::spawn` asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub cwd: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub sandbox: Option<SandboxConfig>,
    pub agent: Option<AgentConfig>,
}

/// Declares that a process needs a PTY/container shell attached at spawn
/// time (spec.md §4.4: "If config declares a sandbox, PTYManager/
/// ContainerBackend is invoked").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub containerized: bool,
}

/// Declares that a process is agentized: `AgentRuntime` drives it rather
/// than the process sitting idle until killed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum think/act/observe iterations before the runtime forces
    /// `failed` (spec.md §4.5 "step budget exhausted").
    pub step_budget: u64,
    /// Step index at or beyond which every tool call becomes
    /// approval-required, regardless of what it touches (spec.md §4.4's
    /// "configurable step-budget threshold").
    pub approval_step_threshold: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { step_budget: 50, approval_step_threshold: None }
    }
}
