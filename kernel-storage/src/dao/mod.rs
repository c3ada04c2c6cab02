pub mod auth;
pub mod fs;
pub mod integrations;
pub mod ipc;
pub mod memory;
pub mod metrics;
pub mod process;
pub mod scheduler;
pub mod tools;

pub use auth::AuthDao;
pub use fs::FileDao;
pub use integrations::IntegrationDao;
pub use ipc::IpcDao;
pub use memory::MemoryDao;
pub use metrics::MetricDao;
pub use process::ProcessDao;
pub use scheduler::SchedulerDao;
pub use tools::{McpDao, OpenClawDao, PluginDao};
