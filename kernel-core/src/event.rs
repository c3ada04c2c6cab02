//! The kernel [`EventBus`] — a typed, synchronous, in-process pub/sub used by
//! every subsystem to announce state changes (spec.md §4.1).
//!
//! Handlers are invoked synchronously, in registration order, on the calling
//! task. A handler that needs to do async work (a DB write, a WS broadcast)
//! is expected to hand its payload to a channel it owns rather than block —
//! this keeps `emit` itself cheap and keeps the cross-event ordering
//! guarantee of spec.md §5 ("dispatch order equals the emit order on the
//! calling goroutine/thread").

use crate::ids::Pid;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// All events the kernel broadcasts, per the catalog in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum KernelEvent {
    KernelReady { version: String },
    KernelMetrics {
        timestamp: DateTime<Utc>,
        process_count: u32,
        cpu_percent: f32,
        memory_mb: f32,
        container_count: u32,
    },
    ProcessSpawned { pid: Pid, ppid: Option<Pid>, owner_uid: String, name: String, role: String },
    ProcessStateChange { pid: Pid, from: String, to: String },
    ProcessExit { pid: Pid, exit_code: i32 },
    ProcessReaped { pid: Pid },
    AgentThought { pid: Pid, step: u64, content: String },
    AgentAction { pid: Pid, step: u64, tool: String, args: serde_json::Value, needs_approval: bool },
    AgentObservation { pid: Pid, step: u64, content: String, is_error: bool },
    AgentPhaseChange { pid: Pid, phase: String },
    AgentProgress { pid: Pid, message: String },
    AgentFileCreated { pid: Pid, path: String },
    AgentBrowsing { pid: Pid, url: String },
    IpcDelivered { from_pid: Pid, to_pid: Pid, channel: String },
    IpcMessage { from_pid: Pid, to_pid: Pid, channel: String, payload: serde_json::Value },
    ContainerCreated { id: String, pid: Pid },
    ContainerStarted { id: String },
    ContainerStopped { id: String },
    ContainerRemoved { id: String },
    FsChanged { path: String, owner_uid: String },
    TtyOutput { tty_id: uuid::Uuid, data: Vec<u8> },
    TtyOpened { tty_id: uuid::Uuid, pid: Pid, containerized: bool },
    TtyClosed { tty_id: uuid::Uuid },
    PluginLoaded { plugin_id: String, name: String },
    PluginError { message: String },
    McpToolsDiscovered { server_id: String, tool_names: Vec<String> },
    McpServerConnected { server_id: String },
    McpServerDisconnected { server_id: String },
    OpenclawSkillImported { skill_id: String, dependencies_met: bool },
    OpenclawBatchImported { imported: usize, failed: usize, total_scanned: usize },
}

impl KernelEvent {
    /// The curated wire name used in `response`-style broadcasts, matching
    /// the dotted names in spec.md §6 exactly.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::KernelReady { .. } => "kernel.ready",
            Self::KernelMetrics { .. } => "kernel.metrics",
            Self::ProcessSpawned { .. } => "process.spawned",
            Self::ProcessStateChange { .. } => "process.stateChange",
            Self::ProcessExit { .. } => "process.exit",
            Self::ProcessReaped { .. } => "process.reaped",
            Self::AgentThought { .. } => "agent.thought",
            Self::AgentAction { .. } => "agent.action",
            Self::AgentObservation { .. } => "agent.observation",
            Self::AgentPhaseChange { .. } => "agent.phaseChange",
            Self::AgentProgress { .. } => "agent.progress",
            Self::AgentFileCreated { .. } => "agent.file_created",
            Self::AgentBrowsing { .. } => "agent.browsing",
            Self::IpcDelivered { .. } => "ipc.delivered",
            Self::IpcMessage { .. } => "ipc.message",
            Self::ContainerCreated { .. } => "container.created",
            Self::ContainerStarted { .. } => "container.started",
            Self::ContainerStopped { .. } => "container.stopped",
            Self::ContainerRemoved { .. } => "container.removed",
            Self::FsChanged { .. } => "fs.changed",
            Self::TtyOutput { .. } => "tty.output",
            Self::TtyOpened { .. } => "tty.opened",
            Self::TtyClosed { .. } => "tty.closed",
            Self::PluginLoaded { .. } => "plugin.loaded",
            Self::PluginError { .. } => "plugin.error",
            Self::McpToolsDiscovered { .. } => "mcp.tools.discovered",
            Self::McpServerConnected { .. } => "mcp.server.connected",
            Self::McpServerDisconnected { .. } => "mcp.server.disconnected",
            Self::OpenclawSkillImported { .. } => "openclaw.skill.imported",
            Self::OpenclawBatchImported { .. } => "openclaw.batch.imported",
        }
    }
}

/// A [`KernelEvent`] stamped with a monotonic, unique event id (spec.md
/// §4.1: "every emission stamps the payload with a unique `__eventId`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "__eventId")]
    pub event_id: u64,
    #[serde(flatten)]
    pub event: KernelEvent,
}

type Handler = Box<dyn Fn(&EventEnvelope) + Send + Sync>;

struct Subscription {
    id: u64,
    handler: Handler,
}

/// Typed in-process pub/sub. See module docs.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscription>>,
    next_event_id: AtomicU64,
    next_sub_id: AtomicU64,
}

/// Dropping this, or calling [`Unsubscribe::cancel`], removes the handler.
pub struct Unsubscribe {
    bus: Arc<EventBus>,
    sub_id: u64,
}

impl Unsubscribe {
    pub fn cancel(self) {
        self.bus.subscribers.lock().retain(|s| s.id != self.sub_id);
    }
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(Vec::new()),
            next_event_id: AtomicU64::new(1),
            next_sub_id: AtomicU64::new(1),
        })
    }

    /// Register a handler. Handlers run synchronously inside `emit`, in
    /// registration order; a panicking handler is caught and logged, never
    /// propagated to the next handler or to the emitter.
    pub fn on<F>(self: &Arc<Self>, handler: F) -> Unsubscribe
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push(Subscription { id, handler: Box::new(handler) });
        Unsubscribe { bus: self.clone(), sub_id: id }
    }

    /// Emit an event to all current subscribers, in registration order.
    pub fn emit(&self, event: KernelEvent) -> u64 {
        let event_id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { event_id, event };

        // Handlers must be fast: the lock is held for the whole dispatch
        // loop, matching the "invoked synchronously" contract.
        let guard = self.subscribers.lock();
        for sub in guard.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| (sub.handler)(&envelope)));
            if result.is_err() {
                error!(event = envelope.event.wire_name(), "event handler panicked");
            }
        }
        event_id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_event_id: AtomicU64::new(1),
            next_sub_id: AtomicU64::new(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.on(move |_| o1.lock().push(1));
        let o2 = order.clone();
        bus.on(move |_| o2.lock().push(2));

        bus.emit(KernelEvent::KernelReady { version: "0.1.0".into() });
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn event_ids_are_unique_and_increasing() {
        let bus = EventBus::new();
        let a = bus.emit(KernelEvent::KernelReady { version: "a".into() });
        let b = bus.emit(KernelEvent::KernelReady { version: "b".into() });
        assert!(b > a);
    }

    #[test]
    fn panicking_handler_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.on(|_| panic!("boom"));
        let c = count.clone();
        bus.on(move |_| { c.fetch_add(1, Ordering::SeqCst); });

        bus.emit(KernelEvent::KernelReady { version: "x".into() });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let unsub = bus.on(move |_| { c.fetch_add(1, Ordering::SeqCst); });
        bus.emit(KernelEvent::KernelReady { version: "x".into() });
        unsub.cancel();
        bus.emit(KernelEvent::KernelReady { version: "y".into() });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
