//! `AgentRuntime`: the think → act → observe loop (spec.md §4.5). The
//! model is an opaque collaborator (spec.md §1's "LLM provider layer —
//! treated as an opaque `LanguageModel` interface"); a scripted test
//! double stands in for it in this crate's own tests, grounded in the
//! teacher's heavy reliance on `mockall` across its test suites.

use crate::config::AgentConfig;
use crate::manager::{ApprovalDecision, ManagedProcess, ProcessManager};
use async_trait::async_trait;
use kernel_core::domain::{AgentPhase, ProcessState};
use kernel_core::{KernelError, Pid, Result};
use kernel_tools::ToolContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

/// A tool's name and input schema, as presented to the model (spec.md
/// §4.5 step 1's "gather the current tool surface").
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub input_schema: Value,
}

/// One turn of the conversation the model sees on its next call.
#[derive(Debug, Clone)]
pub enum HistoryEntry {
    Thought(String),
    Action { tool: String, args: Value },
    Observation { content: String, is_error: bool },
}

/// The model's decision for one step (spec.md §4.5 step 3's think/tool-call
/// classification, plus the natural terminal outcome of declaring the goal
/// done).
#[derive(Debug, Clone)]
pub enum ModelAction {
    Think { content: String },
    CallTool { tool: String, args: Value },
    Complete { summary: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn next_action(&self, goal: &str, history: &[HistoryEntry], tools: &[ToolDescriptor]) -> Result<ModelAction>;
}

/// A tool call is approval-required when it writes outside the agent's
/// `cwd`, has a network side effect, spawns a child process, or the step
/// count has crossed the configured threshold (spec.md §4.4's "hard rule").
fn requires_approval(tool: &str, args: &Value, cwd: &str, step: u64, threshold: Option<u64>) -> bool {
    if let Some(t) = threshold {
        if step >= t {
            return true;
        }
    }
    const SPAWNS_CHILDREN: &[&str] = &["process_spawn", "spawn_agent"];
    if SPAWNS_CHILDREN.contains(&tool) {
        return true;
    }
    if tool.starts_with("mcp__") || tool == "http_request" || tool == "web_fetch" {
        return true;
    }
    if let Some(path) = args.get("path").and_then(Value::as_str) {
        let root = std::path::Path::new(cwd);
        let target = root.join(path);
        if !target.starts_with(root) {
            return true;
        }
    }
    false
}

pub struct AgentRuntime;

impl AgentRuntime {
    /// Starts the loop as a detached Tokio task (spec.md §4.4 "If agentized,
    /// AgentRuntime is started asynchronously").
    pub fn spawn(
        pid: Pid,
        managed: Arc<ManagedProcess>,
        manager: Arc<ProcessManager>,
        agent_cfg: AgentConfig,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = Self::run(pid, managed, manager.clone(), agent_cfg).await {
                error!(pid = %pid, error = %e, "agent runtime terminated with an error");
                let _ = manager.finish(pid, 1).await;
            }
        })
    }

    async fn run(pid: Pid, managed: Arc<ManagedProcess>, manager: Arc<ProcessManager>, agent_cfg: AgentConfig) -> Result<()> {
        let tools = manager.tools();
        let model = manager.model();
        let mut history: Vec<HistoryEntry> = Vec::new();

        loop {
            if managed.abort.is_cancelled() {
                manager.finish(pid, 143).await?;
                return Ok(());
            }

            let step = managed.next_step();
            if step > agent_cfg.step_budget {
                manager.set_phase(pid, AgentPhase::Failed).await?;
                manager.finish(pid, 1).await?;
                return Ok(());
            }

            manager.set_phase(pid, AgentPhase::Thinking).await?;
            let descriptors: Vec<ToolDescriptor> = tools
                .list()
                .into_iter()
                .map(|(name, input_schema)| ToolDescriptor { name, input_schema })
                .collect();
            let action = model.next_action(&managed.config.goal, &history, &descriptors).await?;

            match action {
                ModelAction::Think { content } => {
                    manager.append_log(pid, step, "thinking", None, &content).await?;
                    manager.emit_thought(pid, step, &content);
                    history.push(HistoryEntry::Thought(content));
                }
                ModelAction::CallTool { tool, args } => {
                    if !Self::dispatch_tool_call(pid, &managed, &manager, &tools, step, &agent_cfg, tool, args, &mut history).await? {
                        return Ok(());
                    }
                }
                ModelAction::Complete { summary } => {
                    manager.append_log(pid, step, "observing", None, &summary).await?;
                    manager.set_phase(pid, AgentPhase::Completed).await?;
                    manager.finish(pid, 0).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Runs one tool call, including the approval suspend/resume path.
    /// Returns `false` when the caller should stop looping (the process
    /// already reached a terminal state).
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_tool_call(
        pid: Pid,
        managed: &Arc<ManagedProcess>,
        manager: &Arc<ProcessManager>,
        tools: &kernel_tools::ToolRegistry,
        step: u64,
        agent_cfg: &AgentConfig,
        tool: String,
        args: Value,
        history: &mut Vec<HistoryEntry>,
    ) -> Result<bool> {
        let needs_approval = requires_approval(&tool, &args, &managed.config.cwd, step, agent_cfg.approval_step_threshold);
        manager.emit_action(pid, step, &tool, &args, needs_approval);
        history.push(HistoryEntry::Action { tool: tool.clone(), args: args.clone() });

        if needs_approval {
            manager.transition_to(pid, ProcessState::Waiting).await?;
            manager.set_phase(pid, AgentPhase::Waiting).await?;
            let rx = manager.await_approval(pid)?;

            let decision = tokio::select! {
                _ = managed.abort.cancelled() => {
                    manager.finish(pid, 143).await?;
                    return Ok(false);
                }
                decision = rx => decision.map_err(|_| KernelError::Internal("approval channel closed before a decision arrived".into()))?,
            };

            match decision {
                ApprovalDecision::Rejected(reason) => {
                    manager.append_log(pid, step, "observing", Some(&tool), &format!("rejected: {reason}")).await?;
                    manager.set_phase(pid, AgentPhase::Failed).await?;
                    manager.finish(pid, 1).await?;
                    return Ok(false);
                }
                ApprovalDecision::Approved => {
                    manager.transition_to(pid, ProcessState::Running).await?;
                }
            }
        }

        manager.set_phase(pid, AgentPhase::Executing).await?;
        let Some(tool_impl) = tools.get(&tool) else {
            let msg = format!("unknown tool '{tool}'");
            manager.append_log(pid, step, "observing", Some(&tool), &msg).await?;
            manager.emit_observation(pid, step, &msg, true);
            history.push(HistoryEntry::Observation { content: msg, is_error: true });
            return Ok(true);
        };

        let ctx = ToolContext { pid, owner_uid: managed.owner_uid.clone() };
        let outcome = tool_impl.execute(args, &ctx).await;
        manager.set_phase(pid, AgentPhase::Observing).await?;

        let (content, is_error) = match outcome {
            Ok(result) => (result.text, result.is_error),
            Err(e) => (e.message(), true),
        };
        manager.append_log(pid, step, "observing", Some(&tool), &content).await?;
        manager.emit_observation(pid, step, &content, is_error);
        history.push(HistoryEntry::Observation { content, is_error });
        Ok(true)
    }
}

/// Stands in for `Arc<dyn LanguageModel>` at boot when no provider has been
/// wired in. The provider layer's internals are out of scope for this
/// kernel; this keeps the trait boundary honest rather than faking a
/// `Complete` action that would read as silent success.
pub struct UnconfiguredModel;

#[async_trait]
impl LanguageModel for UnconfiguredModel {
    async fn next_action(&self, _goal: &str, _history: &[HistoryEntry], _tools: &[ToolDescriptor]) -> Result<ModelAction> {
        Err(KernelError::SandboxUnavailable("no LanguageModel provider is configured for this kernel build".into()))
    }
}

/// A hand-scripted `LanguageModel` double used by this crate's own tests
/// and re-used by `manager`'s integration tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    pub struct ScriptedModel {
        actions: Mutex<Vec<ModelAction>>,
    }

    impl ScriptedModel {
        pub fn new(mut actions: Vec<ModelAction>) -> Self {
            actions.reverse();
            Self { actions: Mutex::new(actions) }
        }

        pub fn complete_immediately() -> Self {
            Self::new(vec![ModelAction::Complete { summary: "done".into() }])
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn next_action(&self, _goal: &str, _history: &[HistoryEntry], _tools: &[ToolDescriptor]) -> Result<ModelAction> {
            let mut actions = self.actions.lock().unwrap();
            Ok(actions.pop().unwrap_or(ModelAction::Complete { summary: "script exhausted".into() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedModel;
    use super::*;
    use crate::config::ProcessConfig;
    use kernel_core::EventBus;
    use kernel_sandbox::backend::{LocalPtyBackend, NullContainerBackend};
    use kernel_sandbox::PtyManager;
    use kernel_storage::Store;
    use kernel_tools::ToolRegistry;
    use tempfile::TempDir;

    async fn manager_with_model(model: Arc<dyn LanguageModel>) -> (Arc<ProcessManager>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).await.unwrap();
        let bus = EventBus::new();
        let pty = Arc::new(PtyManager::new(
            Arc::new(LocalPtyBackend::new("/bin/sh")),
            Arc::new(NullContainerBackend),
            bus.clone(),
        ));
        let tools = Arc::new(ToolRegistry::new());
        (Arc::new(ProcessManager::new(store.process, store.ipc, store.metrics, bus, pty, tools, model)), dir)
    }

    async fn manager() -> (Arc<ProcessManager>, TempDir) {
        manager_with_model(Arc::new(ScriptedModel::complete_immediately())).await
    }

    fn agentized_config(agent: AgentConfig) -> ProcessConfig {
        ProcessConfig {
            name: "worker".into(),
            role: "assistant".into(),
            goal: "finish the task".into(),
            cwd: "/tmp".into(),
            env: Default::default(),
            sandbox: None,
            agent: Some(agent),
        }
    }

    #[tokio::test]
    async fn agent_completes_immediately_and_reaches_zombie() {
        let (manager, _dir) = manager().await;
        let pid = manager.spawn(agentized_config(AgentConfig::default()), None, "u1", "u1").await.unwrap();
        // The loop runs on its own task; give it a few scheduler turns.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.managed(pid).unwrap().state(), kernel_core::domain::ProcessState::Zombie);
    }

    #[tokio::test]
    async fn step_budget_exhaustion_marks_failed() {
        let model: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::new(vec![
            ModelAction::Think { content: "still going".into() },
            ModelAction::Think { content: "still going".into() },
            ModelAction::Think { content: "still going".into() },
        ]));
        let (manager, _dir) = manager_with_model(model).await;
        let config = agentized_config(AgentConfig { step_budget: 1, approval_step_threshold: None });
        let pid = manager.spawn(config, None, "u1", "u1").await.unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.managed(pid).unwrap().phase(), kernel_core::domain::AgentPhase::Failed);
    }

    #[tokio::test]
    async fn sigterm_during_run_ends_loop_cooperatively() {
        let (manager, _dir) = manager().await;
        let pid = manager.spawn(agentized_config(AgentConfig { step_budget: 1000, approval_step_threshold: None }), None, "u1", "u1").await.unwrap();
        manager.signal(pid, kernel_core::domain::Signal::Sigterm).await.unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.managed(pid).unwrap().state(), kernel_core::domain::ProcessState::Zombie);
    }
}
