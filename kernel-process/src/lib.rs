//! Process table and agent execution loop (spec.md §4.4, §4.5): spawn,
//! signal, IPC mailboxes, approval gating, and the think→act→observe loop
//! that drives an agentized process against a pluggable `LanguageModel`.

pub mod builtins;
pub mod config;
pub mod mailbox;
pub mod manager;
pub mod runtime;

pub use config::{AgentConfig, ProcessConfig, SandboxConfig};
pub use mailbox::IpcMessage;
pub use manager::{ApprovalDecision, ManagedProcess, ProcessInfo, ProcessManager};
pub use runtime::{AgentRuntime, HistoryEntry, LanguageModel, ModelAction, ToolDescriptor, UnconfiguredModel};
