//! Durable state layer for the Aether kernel: a SQLite-backed `StateStore`
//! plus one narrow DAO struct per entity family from spec.md §3, grounded
//! on the teacher's own DAO-per-concern split in `cortex-storage` (there
//! expressed over SurrealDB; here over `sqlx`/SQLite per spec.md §2's
//! "SQLite-style relational store" requirement).

pub mod dao;
pub mod models;
pub mod store;

pub use dao::*;
pub use models::*;
pub use store::StateStore;

/// Bundles every DAO behind one handle so a subsystem only needs to carry
/// a single `Store` clone instead of one field per DAO.
#[derive(Clone)]
pub struct Store {
    pub state: StateStore,
    pub auth: AuthDao,
    pub process: ProcessDao,
    pub fs: FileDao,
    pub plugins: PluginDao,
    pub mcp: McpDao,
    pub openclaw: OpenClawDao,
    pub integrations: IntegrationDao,
    pub scheduler: SchedulerDao,
    pub ipc: IpcDao,
    pub memory: MemoryDao,
    pub metrics: MetricDao,
}

impl Store {
    pub fn new(state: StateStore) -> Self {
        Self {
            auth: AuthDao::new(state.clone()),
            process: ProcessDao::new(state.clone()),
            fs: FileDao::new(state.clone()),
            plugins: PluginDao::new(state.clone()),
            mcp: McpDao::new(state.clone()),
            openclaw: OpenClawDao::new(state.clone()),
            integrations: IntegrationDao::new(state.clone()),
            scheduler: SchedulerDao::new(state.clone()),
            ipc: IpcDao::new(state.clone()),
            memory: MemoryDao::new(state.clone()),
            metrics: MetricDao::new(state.clone()),
            state,
        }
    }

    pub async fn open(path: &std::path::Path) -> Result<Self, sqlx::Error> {
        Ok(Self::new(StateStore::open(path).await?))
    }

    pub async fn shutdown(&self) {
        self.state.shutdown().await;
    }
}
