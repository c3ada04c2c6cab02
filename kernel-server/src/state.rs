//! Shared application state handed to every route and WS connection,
//! grounded on the teacher's `AppState`/`routes::AppState` (a `Clone`
//! struct of `Arc`s, never a module-scope singleton).

use kernel_auth::AuthManager;
use kernel_core::{EventBus, EventEnvelope, KernelConfig};
use kernel_fs::FileSystem;
use kernel_integrations::IntegrationManager;
use kernel_process::ProcessManager;
use kernel_sandbox::PtyManager;
use kernel_scheduler::{CronScheduler, NodeRegistry, TriggerEngine};
use kernel_storage::Store;
use kernel_tools::{McpManager, OpenClawAdapter, PluginManager};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: KernelConfig,
    pub bus: Arc<EventBus>,
    pub store: Store,
    pub auth: Arc<AuthManager>,
    pub process: Arc<ProcessManager>,
    pub pty: Arc<PtyManager>,
    pub fs: Arc<FileSystem>,
    pub plugins: Arc<PluginManager>,
    pub mcp: Arc<McpManager>,
    pub openclaw: Arc<OpenClawAdapter>,
    pub cron: Arc<CronScheduler>,
    pub triggers: Arc<TriggerEngine>,
    pub integrations: Arc<IntegrationManager>,
    /// Only populated when `cluster_role = hub`.
    pub cluster: Option<Arc<NodeRegistry>>,
    pub http_client: reqwest::Client,
    pub started_at: Instant,
    /// Set at boot from a one-shot `docker info` probe; best-effort, never
    /// re-checked per request.
    pub docker_enabled: bool,
    /// Fan-out channel every WS connection subscribes to. Fed by a single
    /// bus handler registered once at boot (see [`install_event_forwarder`]),
    /// never one handler per connection.
    pub events_tx: tokio::sync::broadcast::Sender<EventEnvelope>,
}

/// Bridges the synchronous, in-process [`EventBus`] to a
/// [`tokio::sync::broadcast`] channel WS connections can subscribe to.
/// Registered exactly once, at server boot, grounded on the teacher's
/// `WsManager` which holds the single broadcast sender every connection
/// clones a receiver from.
pub fn install_event_forwarder(bus: &Arc<EventBus>) -> tokio::sync::broadcast::Sender<EventEnvelope> {
    let (tx, _rx) = tokio::sync::broadcast::channel(1024);
    let forward = tx.clone();
    // Held for the lifetime of the process; never cancelled, so the
    // returned `Unsubscribe` is simply dropped without calling `.cancel()`.
    let _subscription = bus.on(move |envelope| {
        // `send` only fails when there are no receivers; a quiet kernel
        // with no WS clients connected is not an error.
        let _ = forward.send(envelope.clone());
    });
    tx
}
