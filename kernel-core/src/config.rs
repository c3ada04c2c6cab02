//! Kernel configuration, loaded env > file > default (spec.md §6).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// `AETHER_PORT` — HTTP/WS listen port.
    pub port: u16,
    /// `AETHER_FS_ROOT` — root of the per-user VFS and the SQLite db file.
    pub fs_root: PathBuf,
    /// `AETHER_SECRET` — token signing / KDF pepper.
    pub secret: String,
    /// Cluster role: `standalone` or `hub`.
    pub cluster_role: ClusterRole,
    /// Step budget before an agent is force-failed.
    pub max_agent_steps: u32,
    /// Token absolute lifetime, in days (Open Question resolution: 30).
    pub token_lifetime_days: i64,
    /// Default RPC timeout ceiling, in seconds (spec.md §5: 30s).
    pub rpc_timeout_secs: u64,
    /// MCP/integration discovery timeout ceiling, in seconds (spec.md §5: 10s).
    pub discovery_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterRole {
    Standalone,
    Hub,
    Node,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            fs_root: PathBuf::from("./aether-data"),
            secret: "insecure-development-secret-change-me".to_string(),
            cluster_role: ClusterRole::Standalone,
            max_agent_steps: 64,
            token_lifetime_days: 30,
            rpc_timeout_secs: 30,
            discovery_timeout_secs: 10,
        }
    }
}

impl KernelConfig {
    /// Loads configuration with precedence `env > ./aether.toml > default`,
    /// mirroring the teacher's `cc::settings` scope-precedence loader
    /// collapsed to the two scopes this kernel actually has.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&KernelConfig::default())?)
            .add_source(config::File::with_name("aether").required(false))
            .add_source(
                config::Environment::with_prefix("AETHER")
                    .try_parsing(true)
                    .separator("__"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn db_path(&self) -> PathBuf {
        self.fs_root.join("kernel.sqlite")
    }

    pub fn users_root(&self) -> PathBuf {
        self.fs_root.join("users")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_standalone() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.cluster_role, ClusterRole::Standalone);
        assert_eq!(cfg.token_lifetime_days, 30);
    }

    #[test]
    fn db_path_is_under_fs_root() {
        let cfg = KernelConfig::default();
        assert!(cfg.db_path().starts_with(&cfg.fs_root));
    }
}
