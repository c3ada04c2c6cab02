//! Aether kernel CLI, grounded on the teacher's `axon::main`: a small
//! `clap` surface over a handful of daemon-lifecycle subcommands, with all
//! manager construction happening here via plain dependency injection —
//! no module-scope singleton anywhere in this wiring.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kernel_auth::AuthManager;
use kernel_core::{EventBus, KernelConfig, PidAllocator};
use kernel_fs::FileSystem;
use kernel_integrations::IntegrationManager;
use kernel_process::{ProcessManager, UnconfiguredModel};
use kernel_sandbox::{DockerContainerBackend, LocalPtyBackend, NullContainerBackend, PtyManager};
use kernel_scheduler::{CronScheduler, NodeRegistry, TriggerEngine};
use kernel_server::{install_event_forwarder, AppState};
use kernel_storage::{Store, StateStore};
use kernel_tools::{McpManager, OpenClawAdapter, PluginManager, ToolRegistry};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "aether")]
#[command(about = "Aether agent kernel", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the WS/REST control plane and block until shutdown
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print a one-shot status snapshot and exit
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    kernel_core::logging::init_tracing(None);
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = KernelConfig::load().context("loading kernel configuration")?;

    match cli.command {
        Commands::Migrate => {
            StateStore::open(&config.db_path()).await.context("opening database")?;
            println!("migrations applied");
            Ok(())
        }
        Commands::Status => {
            let state = boot(config).await?;
            let status = kernel_server::dispatcher::kernel_status(&state).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Serve => {
            let state = boot(config).await?;
            kernel_server::start_server(state).await.context("running kernel server")
        }
    }
}

/// Constructs every manager by hand and wires their shared collaborators
/// (`EventBus`, `ToolRegistry`, `Store`). Grounded on the teacher's own
/// `run()` composition root, generalized from a single agent runtime to
/// this kernel's dozen-odd subsystems.
async fn boot(config: KernelConfig) -> Result<AppState> {
    let state_store = StateStore::open(&config.db_path()).await.context("opening database")?;
    let store = Store::new(state_store);

    let bus = EventBus::new();
    let tools = Arc::new(ToolRegistry::new());
    let http_client = reqwest::Client::new();

    let docker_enabled = docker_available().await;
    let container_backend: Arc<dyn kernel_sandbox::ContainerBackend> = if docker_enabled {
        Arc::new(DockerContainerBackend::new("alpine".to_string()))
    } else {
        Arc::new(NullContainerBackend)
    };
    let pty = Arc::new(PtyManager::new(Arc::new(LocalPtyBackend::default()), container_backend, bus.clone()));

    let fs = Arc::new(FileSystem::new(config.users_root(), store.fs.clone(), bus.clone()));
    let auth = Arc::new(AuthManager::new(store.clone()));
    let plugins = Arc::new(PluginManager::new(config.users_root(), store.plugins.clone(), bus.clone(), tools.clone()));
    let mcp = Arc::new(McpManager::new(store.mcp.clone(), bus.clone(), tools.clone()));
    let openclaw = Arc::new(OpenClawAdapter::new(store.openclaw.clone(), bus.clone(), store.plugins.clone(), tools.clone()));
    let integrations = Arc::new(IntegrationManager::new(store.integrations.clone()));

    let max_pid = store.process.max_pid().await.map_err(|e| anyhow::anyhow!(e))?;
    let pid_alloc = PidAllocator::restore(max_pid.map(|p| p as u64));
    let process = Arc::new(ProcessManager::with_pid_allocator(
        store.process.clone(),
        store.ipc.clone(),
        store.metrics.clone(),
        bus.clone(),
        pty.clone(),
        tools.clone(),
        Arc::new(UnconfiguredModel) as Arc<dyn kernel_process::LanguageModel>,
        pid_alloc,
    ));

    kernel_process::builtins::register(&tools, process.clone(), http_client.clone());
    plugins.restore_all().await;
    openclaw.restore().await;

    let cron = Arc::new(CronScheduler::new(store.scheduler.clone(), process.clone()));
    tokio::spawn(cron.clone().run());

    let triggers = TriggerEngine::new(store.scheduler.clone(), process.clone(), bus.clone());
    // Held for the process lifetime; the subscription never needs cancelling.
    let _trigger_subscription = triggers.start();

    let cluster = match config.cluster_role {
        kernel_core::config::ClusterRole::Hub => Some(Arc::new(NodeRegistry::new())),
        _ => None,
    };

    let events_tx = install_event_forwarder(&bus);

    Ok(AppState {
        config,
        bus,
        store,
        auth,
        process,
        pty,
        fs,
        plugins,
        mcp,
        openclaw,
        cron,
        triggers,
        integrations,
        cluster,
        http_client,
        started_at: Instant::now(),
        docker_enabled,
        events_tx,
    })
}

/// Best-effort, one-shot probe at boot; never re-checked per request.
async fn docker_available() -> bool {
    tokio::process::Command::new("docker")
        .arg("info")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}
